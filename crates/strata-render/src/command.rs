//! The per-frame command list and the state it is recorded against.

use std::ops::Range;

use strata_core::{geometry::Rect, math::Affine2, profiling::profile_function};

use crate::{
    color::Color,
    state::{BlendState, DepthStencilState, RasterizerState, RenderStateSnapshot, SamplerState},
    types::{
        ConstantBufferId, MAX_TEXTURE_SLOTS, PixelShaderId, ShaderStage, StandardShaders2D,
        TextureId, VertexShaderId,
    },
};

/// Everything a draw depends on. Two draws merge only when these are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawState {
    pub render: RenderStateSnapshot,
    /// Pixel stage textures. Slot 0 is owned by the draw itself.
    pub textures: [Option<TextureId>; MAX_TEXTURE_SLOTS],
    pub vertex_shader: VertexShaderId,
    pub pixel_shader: PixelShaderId,
    /// A rect without area means "not set".
    pub scissor_rect: Rect<i32>,
    /// `None` covers the whole render target.
    pub viewport: Option<Rect<i32>>,
    /// Bumped by every constant change so draws on either side never merge.
    pub constants_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub state: DrawState,
    pub batch_index: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawNullCommand {
    pub state: DrawState,
    pub vertex_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBufferCommand {
    pub stage: ShaderStage,
    pub slot: u32,
    pub buffer: ConstantBufferId,
    /// Snapshot location in [`CommandManager::constant_data`].
    pub data: Range<usize>,
}

/// One recorded step of the frame, replayed strictly in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Renderer2DCommand {
    Draw(DrawCommand),
    DrawNull(DrawNullCommand),
    ScissorRect(Rect<i32>),
    Viewport(Option<Rect<i32>>),
    SetVS(Option<VertexShaderId>),
    SetPS(Option<PixelShaderId>),
    SetConstantBuffer(ConstantBufferCommand),
    ColorMul(Color),
    ColorAdd(Color),
    /// Combined camera and local transform, before the screen mapping.
    Transform(Affine2),
    Flush,
}

impl Renderer2DCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draw(_) => "Draw",
            Self::DrawNull(_) => "DrawNull",
            Self::ScissorRect(_) => "ScissorRect",
            Self::Viewport(_) => "Viewport",
            Self::SetVS(_) => "SetVS",
            Self::SetPS(_) => "SetPS",
            Self::SetConstantBuffer(_) => "SetConstantBuffer",
            Self::ColorMul(_) => "ColorMul",
            Self::ColorAdd(_) => "ColorAdd",
            Self::Transform(_) => "Transform",
            Self::Flush => "Flush",
        }
    }
}

/// Records commands and the current state they are recorded against.
///
/// State setters for blend, rasterizer, depth-stencil, samplers and textures
/// only update the current state: the change shows up in the next draw's
/// [`DrawState`]. Everything else appends a command immediately.
pub struct CommandManager {
    commands: Vec<Renderer2DCommand>,
    constant_data: Vec<u8>,
    standard: StandardShaders2D,
    render: RenderStateSnapshot,
    textures: [Option<TextureId>; MAX_TEXTURE_SLOTS],
    custom_vs: Option<VertexShaderId>,
    custom_ps: Option<PixelShaderId>,
    scissor_rect: Rect<i32>,
    viewport: Option<Rect<i32>>,
    constants_version: u32,
    color_mul: Color,
    color_add: Color,
    local_transform: Affine2,
    camera_transform: Affine2,
    merged_draws: u32,
}

impl CommandManager {
    pub fn new(standard: StandardShaders2D) -> Self {
        Self {
            commands: Vec::new(),
            constant_data: Vec::new(),
            standard,
            render: RenderStateSnapshot::DEFAULT_2D,
            textures: [None; MAX_TEXTURE_SLOTS],
            custom_vs: None,
            custom_ps: None,
            scissor_rect: Rect::default(),
            viewport: None,
            constants_version: 0,
            color_mul: Color::WHITE,
            color_add: Color::ZERO,
            local_transform: Affine2::IDENTITY,
            camera_transform: Affine2::IDENTITY,
            merged_draws: 0,
        }
    }

    pub fn commands(&self) -> &[Renderer2DCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn constant_data(&self, range: Range<usize>) -> &[u8] {
        self.constant_data.get(range).unwrap_or_default()
    }

    /// Submissions folded into an earlier draw since the last reset.
    pub fn merged_draws(&self) -> u32 {
        self.merged_draws
    }

    /// Drop the frame's commands. Current state carries over, custom shaders
    /// do not.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.constant_data.clear();
        self.custom_vs = None;
        self.custom_ps = None;
        self.merged_draws = 0;
    }

    /// State a draw recorded now would use. `texture` goes to slot 0 and picks
    /// the standard pixel shader.
    pub fn draw_state(&self, texture: Option<TextureId>) -> DrawState {
        let mut textures = self.textures;
        textures[0] = texture;
        let standard_ps = if texture.is_some() {
            self.standard.texture_ps
        } else {
            self.standard.shape_ps
        };
        DrawState {
            render: self.render,
            textures,
            vertex_shader: self.custom_vs.unwrap_or(self.standard.sprite_vs),
            pixel_shader: self.custom_ps.unwrap_or(standard_ps),
            scissor_rect: self.scissor_rect,
            viewport: self.viewport,
            constants_version: self.constants_version,
        }
    }

    /// Record `index_count` indices of batch `batch_index`.
    ///
    /// Folds into the previous command when that command is a draw of the same
    /// batch with an identical state.
    pub fn push_draw(&mut self, index_count: u32, batch_index: u32, texture: Option<TextureId>) {
        profile_function!();
        let state = self.draw_state(texture);
        if let Some(Renderer2DCommand::Draw(last)) = self.commands.last_mut()
            && last.batch_index == batch_index
            && last.state == state
        {
            last.index_count += index_count;
            self.merged_draws += 1;
            return;
        }
        self.commands.push(Renderer2DCommand::Draw(DrawCommand {
            state,
            batch_index,
            index_count,
        }));
    }

    pub fn push_draw_null(&mut self, vertex_count: u32) {
        let state = self.draw_state(None);
        self.commands
            .push(Renderer2DCommand::DrawNull(DrawNullCommand { state, vertex_count }));
    }

    pub fn push_flush(&mut self) {
        self.commands.push(Renderer2DCommand::Flush);
    }

    pub fn blend_state(&self) -> BlendState {
        self.render.blend
    }

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.render.blend = state;
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.render.rasterizer
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.render.rasterizer = state;
    }

    pub fn depth_stencil_state(&self) -> DepthStencilState {
        self.render.depth_stencil
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.render.depth_stencil = state;
    }

    /// `None` when `slot` is out of range.
    pub fn sampler_state(&self, stage: ShaderStage, slot: usize) -> Option<SamplerState> {
        self.render.samplers(stage).get(slot).copied()
    }

    pub fn set_sampler_state(&mut self, stage: ShaderStage, slot: usize, state: SamplerState) -> bool {
        match self.render.samplers_mut(stage).get_mut(slot) {
            Some(current) => {
                *current = state;
                true
            }
            None => false,
        }
    }

    pub fn ps_texture(&self, slot: usize) -> Option<TextureId> {
        self.textures.get(slot).copied().flatten()
    }

    /// Bind a texture for custom shaders. Slot 0 belongs to the draw calls.
    pub fn set_ps_texture(&mut self, slot: usize, texture: Option<TextureId>) -> bool {
        if slot == 0 {
            return false;
        }
        match self.textures.get_mut(slot) {
            Some(current) => {
                *current = texture;
                true
            }
            None => false,
        }
    }

    pub fn scissor_rect(&self) -> Rect<i32> {
        self.scissor_rect
    }

    pub fn set_scissor_rect(&mut self, rect: Rect<i32>) {
        self.scissor_rect = rect;
        self.commands.push(Renderer2DCommand::ScissorRect(rect));
    }

    pub fn viewport(&self) -> Option<Rect<i32>> {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Option<Rect<i32>>) {
        self.viewport = viewport;
        self.commands.push(Renderer2DCommand::Viewport(viewport));
    }

    pub fn custom_vs(&self) -> Option<VertexShaderId> {
        self.custom_vs
    }

    pub fn set_custom_vs(&mut self, shader: Option<VertexShaderId>) {
        self.custom_vs = shader;
        self.commands.push(Renderer2DCommand::SetVS(shader));
    }

    pub fn custom_ps(&self) -> Option<PixelShaderId> {
        self.custom_ps
    }

    pub fn set_custom_ps(&mut self, shader: Option<PixelShaderId>) {
        self.custom_ps = shader;
        self.commands.push(Renderer2DCommand::SetPS(shader));
    }

    /// Record a by-value snapshot of `data` for `buffer` at `stage`/`slot`.
    pub fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: ConstantBufferId, data: &[u8]) {
        let start = self.constant_data.len();
        self.constant_data.extend_from_slice(data);
        self.bump_constants();
        self.commands
            .push(Renderer2DCommand::SetConstantBuffer(ConstantBufferCommand {
                stage,
                slot,
                buffer,
                data: start..self.constant_data.len(),
            }));
    }

    pub fn color_mul(&self) -> Color {
        self.color_mul
    }

    pub fn set_color_mul(&mut self, color: Color) {
        self.color_mul = color;
        self.bump_constants();
        self.commands.push(Renderer2DCommand::ColorMul(color));
    }

    pub fn color_add(&self) -> Color {
        self.color_add
    }

    pub fn set_color_add(&mut self, color: Color) {
        self.color_add = color;
        self.bump_constants();
        self.commands.push(Renderer2DCommand::ColorAdd(color));
    }

    pub fn local_transform(&self) -> Affine2 {
        self.local_transform
    }

    pub fn camera_transform(&self) -> Affine2 {
        self.camera_transform
    }

    /// Local then camera.
    pub fn combined_transform(&self) -> Affine2 {
        self.camera_transform * self.local_transform
    }

    pub fn set_local_transform(&mut self, transform: Affine2) {
        self.local_transform = transform;
        self.push_transform();
    }

    pub fn set_camera_transform(&mut self, transform: Affine2) {
        self.camera_transform = transform;
        self.push_transform();
    }

    fn push_transform(&mut self) {
        self.bump_constants();
        let combined = self.combined_transform();
        self.commands.push(Renderer2DCommand::Transform(combined));
    }

    fn bump_constants(&mut self) {
        self.constants_version = self.constants_version.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::Vec2;

    fn manager() -> CommandManager {
        CommandManager::new(StandardShaders2D {
            sprite_vs: VertexShaderId(0),
            shape_ps: PixelShaderId(0),
            texture_ps: PixelShaderId(1),
        })
    }

    fn draws(manager: &CommandManager) -> Vec<DrawCommand> {
        manager
            .commands()
            .iter()
            .filter_map(|c| match c {
                Renderer2DCommand::Draw(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_identical_draws_merge() {
        let mut m = manager();
        m.push_draw(6, 0, None);
        m.push_draw(6, 0, None);
        m.push_draw(3, 0, None);
        assert_eq!(m.len(), 1);
        assert_eq!(draws(&m)[0].index_count, 15);
        assert_eq!(m.merged_draws(), 2);
    }

    #[test]
    fn test_batch_change_prevents_merge() {
        let mut m = manager();
        m.push_draw(6, 0, None);
        m.push_draw(6, 1, None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_texture_change_prevents_merge() {
        let mut m = manager();
        m.push_draw(6, 0, Some(TextureId(1)));
        m.push_draw(6, 0, Some(TextureId(2)));
        let d = draws(&m);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].state.pixel_shader, PixelShaderId(1));
    }

    #[test]
    fn test_blend_change_prevents_merge() {
        let mut m = manager();
        m.push_draw(6, 0, None);
        m.set_blend_state(BlendState::ADDITIVE);
        m.push_draw(6, 0, None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_state_commands_always_append() {
        let mut m = manager();
        let rect = Rect::new(0, 0, 10, 10);
        m.set_scissor_rect(rect);
        m.set_scissor_rect(rect);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_state_command_splits_identical_draws() {
        let mut m = manager();
        m.push_draw(6, 0, None);
        m.set_scissor_rect(Rect::default());
        m.push_draw(6, 0, None);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_constant_change_splits_draws() {
        let mut m = manager();
        m.push_draw(6, 0, None);
        let before = m.draw_state(None).constants_version;
        m.set_color_mul(Color::RED);
        assert_ne!(m.draw_state(None).constants_version, before);
        m.push_draw(6, 0, None);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_custom_shader_overrides_standard() {
        let mut m = manager();
        m.set_custom_ps(Some(PixelShaderId(9)));
        assert_eq!(m.draw_state(Some(TextureId(1))).pixel_shader, PixelShaderId(9));
        m.set_custom_ps(None);
        assert_eq!(m.draw_state(Some(TextureId(1))).pixel_shader, PixelShaderId(1));
    }

    #[test]
    fn test_reset_clears_commands_and_custom_shaders() {
        let mut m = manager();
        m.set_custom_vs(Some(VertexShaderId(4)));
        m.set_blend_state(BlendState::ADDITIVE);
        m.push_draw(6, 0, None);
        m.reset();
        assert!(m.is_empty());
        assert_eq!(m.custom_vs(), None);
        assert_eq!(m.blend_state(), BlendState::ADDITIVE);
    }

    #[test]
    fn test_constant_snapshot_is_by_value() {
        let mut m = manager();
        let mut data = [1u8, 2, 3, 4];
        m.set_constant_buffer(ShaderStage::Pixel, 1, ConstantBufferId(0), &data);
        data[0] = 42;
        let Renderer2DCommand::SetConstantBuffer(cmd) = &m.commands()[0] else {
            panic!("expected a constant buffer command");
        };
        assert_eq!(m.constant_data(cmd.data.clone()), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_texture_slot_zero_is_reserved() {
        let mut m = manager();
        assert!(!m.set_ps_texture(0, Some(TextureId(1))));
        assert!(m.set_ps_texture(1, Some(TextureId(1))));
        assert!(!m.set_ps_texture(MAX_TEXTURE_SLOTS, Some(TextureId(1))));
        assert_eq!(m.draw_state(None).textures[1], Some(TextureId(1)));
    }

    #[test]
    fn test_combined_transform_applies_local_first() {
        let mut m = manager();
        m.set_local_transform(Affine2::from_translation(Vec2::new(1.0, 0.0)));
        m.set_camera_transform(Affine2::from_scale(Vec2::splat(2.0)));
        let p = m.combined_transform().transform_point2(Vec2::ZERO);
        assert_eq!(p, Vec2::new(2.0, 0.0));
        assert_eq!(m.len(), 2);
    }
}
