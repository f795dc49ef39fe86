//! Frame-level behaviour of Renderer2D, observed through the mock backend.

use std::sync::Arc;

use strata_render::{
    Color, PixelShaderId, RenderBackend2D, RenderStates2D, Renderer2D, Renderer2DCommand, Renderer2DConfig,
    Renderer2DError, ShaderStage, TextureId, Vertex2D,
    state::BlendState,
    strata_core::{geometry::Rect, math::Vec2},
};
use strata_test_utils::{BackendCall, MockBackend2D};

fn setup() -> (Arc<MockBackend2D>, Renderer2D) {
    setup_with(Renderer2DConfig::default())
}

fn setup_with(config: Renderer2DConfig) -> (Arc<MockBackend2D>, Renderer2D) {
    let mock = Arc::new(MockBackend2D::new());
    let renderer = Renderer2D::new(mock.clone(), config).unwrap();
    (mock, renderer)
}

fn quad_vertices(x: f32) -> [Vertex2D; 4] {
    [
        Vertex2D::new([x, 0.0], [0.0, 0.0], [1.0; 4]),
        Vertex2D::new([x + 10.0, 0.0], [1.0, 0.0], [1.0; 4]),
        Vertex2D::new([x + 10.0, 10.0], [1.0, 1.0], [1.0; 4]),
        Vertex2D::new([x, 10.0], [0.0, 1.0], [1.0; 4]),
    ]
}

const QUAD: [u16; 6] = [0, 1, 2, 2, 3, 0];

fn draw_count(renderer: &Renderer2D) -> usize {
    renderer
        .commands()
        .iter()
        .filter(|c| matches!(c, Renderer2DCommand::Draw(_)))
        .count()
}

#[test]
fn test_draw_order_is_preserved() {
    let (mock, mut renderer) = setup();
    let a = mock.add_texture();
    let b = mock.add_texture();

    renderer.add_textured_sprite(a, &quad_vertices(0.0), &QUAD);
    renderer.add_textured_sprite(b, &quad_vertices(20.0), &QUAD);
    renderer.add_textured_sprite(a, &quad_vertices(40.0), &QUAD);
    assert_eq!(renderer.commands().len(), 3);
    renderer.flush().unwrap();

    let textures: Vec<_> = mock.draws().iter().map(|d| d.texture).collect();
    assert_eq!(textures, vec![Some(a), Some(b), Some(a)]);

    let xs: Vec<f32> = mock.drawn_triangles().iter().map(|t| t[0].pos[0]).collect();
    assert_eq!(xs, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
}

#[test]
fn test_compatible_draws_merge() {
    let (mock, mut renderer) = setup();
    for i in 0..100 {
        renderer.add_rect(Vec2::new(i as f32, 0.0), Vec2::splat(4.0), Color::WHITE);
    }
    assert_eq!(renderer.commands().len(), 1);
    renderer.flush().unwrap();

    assert_eq!(mock.count_draw_calls(), 1);
    assert_eq!(mock.drawn_triangles().len(), 200);
    let stats = renderer.stats();
    assert_eq!(stats.merged_draws, 99);
    assert_eq!(stats.triangles, 200);
    assert_eq!(stats.draw_calls, 1);
}

#[test]
fn test_blend_change_breaks_merge() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
    renderer.set_blend_state(BlendState::DEFAULT_2D);
    renderer.add_rect(Vec2::ZERO, Vec2::splat(4.0), Color::WHITE);
    assert_eq!(draw_count(&renderer), 3);

    renderer.flush().unwrap();
    assert_eq!(mock.count_draw_calls(), 3);
    assert_eq!(mock.count_blend_binds(), 2);
    let blends: Vec<_> = mock.draws().iter().map(|d| d.blend).collect();
    assert_eq!(blends, vec![BlendState::DEFAULT_2D, BlendState::ADDITIVE, BlendState::DEFAULT_2D]);
}

#[test]
fn test_batch_rollover_splits_draws() {
    let config = Renderer2DConfig::default().with_batch_capacity(16, 24);
    let (mock, mut renderer) = setup_with(config);
    for i in 0..10 {
        assert!(renderer.add_rect(Vec2::new(i as f32 * 10.0, 0.0), Vec2::splat(8.0), Color::WHITE));
    }
    // 40 vertices in batches of 16
    assert_eq!(renderer.num_batches(), 3);
    assert_eq!(draw_count(&renderer), 3);

    for frame in 0..2 {
        if frame > 0 {
            renderer.begin_frame();
            for i in 0..10 {
                renderer.add_rect(Vec2::new(i as f32 * 10.0, 0.0), Vec2::splat(8.0), Color::WHITE);
            }
        }
        mock.clear_calls();
        renderer.flush().unwrap();
        assert_eq!(mock.count_draw_calls(), 3);
        assert_eq!(renderer.stats().batches, 3);

        // Every triangle resolves to the two triangles of its own rect, in order.
        let triangles = mock.drawn_triangles();
        assert_eq!(triangles.len(), 20);
        for (n, triangle) in triangles.iter().enumerate() {
            let left = (n / 2) as f32 * 10.0;
            for vertex in triangle {
                assert!(
                    (left..=left + 8.0).contains(&vertex.pos[0]),
                    "frame {} triangle {} has vertex {:?}",
                    frame,
                    n,
                    vertex.pos
                );
            }
        }
    }
}

#[test]
fn test_oversized_submission_is_dropped() {
    let config = Renderer2DConfig::default().with_batch_capacity(16, 24);
    let (mock, mut renderer) = setup_with(config);
    let vertices = vec![Vertex2D::default(); 17];
    let indices: Vec<u16> = (0..15).collect();
    assert!(!renderer.add_sprite(&vertices, &indices));
    assert!(renderer.commands().is_empty());
    assert_eq!(renderer.stats().dropped_draws, 1);

    renderer.flush().unwrap();
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_scissor_round_trip() {
    let (mock, mut renderer) = setup();
    let a = mock.add_texture();
    let b = mock.add_texture();
    let rect = Rect::new(10, 10, 100, 50);

    renderer.add_textured_sprite(a, &quad_vertices(0.0), &QUAD);
    renderer.set_scissor_rect(rect);
    renderer.add_textured_sprite(a, &quad_vertices(0.0), &QUAD);
    renderer.add_textured_sprite(b, &quad_vertices(0.0), &QUAD);
    assert_eq!(renderer.commands().len(), 4);
    assert!(matches!(renderer.commands()[1], Renderer2DCommand::ScissorRect(r) if r == rect));

    renderer.flush().unwrap();
    assert_eq!(mock.count_scissor_binds(), 1);
    assert_eq!(mock.count_texture_binds(b), 1);
    assert_eq!(mock.count_texture_binds(a), 1);
    assert_eq!(mock.count_draw_calls(), 3);
}

#[test]
fn test_empty_flush_touches_nothing() {
    let (mock, mut renderer) = setup();
    renderer.flush().unwrap();
    assert_eq!(mock.call_count(), 0);

    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();
    mock.clear_calls();

    renderer.flush().unwrap();
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_flush_resets_frame() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();
    assert!(renderer.commands().is_empty());
    assert_eq!(renderer.num_batches(), 0);

    renderer.begin_frame();
    renderer.begin_frame();
    assert!(renderer.commands().is_empty());
    assert_eq!(renderer.stats(), Default::default());
    assert_eq!(mock.count_draw_calls(), 1);
}

#[test]
fn test_state_survives_across_frames() {
    let (mock, mut renderer) = setup();
    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.end_frame().unwrap();

    renderer.begin_frame();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.end_frame().unwrap();

    assert_eq!(renderer.blend_state(), BlendState::ADDITIVE);
    // The state cache remembers the bind from the first frame.
    assert_eq!(mock.count_blend_binds(), 1);
    assert_eq!(mock.count_calls(|c| matches!(c, BackendCall::Present)), 2);
}

#[test]
fn test_second_flush_appends_to_ring() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    let draws: Vec<_> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::DrawIndexed {
                start_index,
                base_vertex,
                ..
            } => Some((start_index, base_vertex)),
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![(0, 0), (6, 4)]);
    // Ring buffers are only created once.
    assert_eq!(
        mock.count_calls(|c| matches!(c, BackendCall::CreateBuffer { .. })),
        4
    );
}

#[test]
fn test_invalid_texture_uses_fallback() {
    let (mock, mut renderer) = setup();
    let texture = mock.add_texture();
    mock.forget_texture(texture);

    renderer.add_textured_sprite(texture, &quad_vertices(0.0), &QUAD);
    renderer.flush().unwrap();

    let draws = mock.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].texture, Some(TextureId(0)));
    assert_eq!(renderer.stats().substituted_handles, 1);
}

#[test]
fn test_invalid_pixel_shader_uses_standard() {
    let (mock, mut renderer) = setup();
    renderer.set_custom_ps(Some(PixelShaderId(77)));
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    let draws = mock.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].pixel_shader, mock.standard_shaders().shape_ps);
    assert_eq!(renderer.stats().substituted_handles, 1);
}

#[test]
fn test_rejected_state_skips_draw() {
    let (mock, mut renderer) = setup();
    mock.fail_blend_state(Some(BlendState::ADDITIVE));

    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::GREEN);
    renderer.set_blend_state(BlendState::DEFAULT_2D);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::BLUE);

    assert!(renderer.flush().is_ok());
    assert_eq!(mock.count_draw_calls(), 2);
    // The failed bind was not recorded, so the default needs no rebind.
    assert_eq!(mock.count_blend_binds(), 1);
}

#[test]
fn test_failed_upload_skips_only_its_draw() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(Vec2::new(100.0, 0.0), Vec2::ONE, Color::BLUE);
    assert_eq!(draw_count(&renderer), 2);
    assert_eq!(renderer.num_batches(), 1);

    mock.fail_next_write();
    renderer.flush().unwrap();

    assert_eq!(mock.count_draw_calls(), 1);
    let triangles = mock.drawn_triangles();
    assert_eq!(triangles.len(), 2);
    for triangle in &triangles {
        assert!(triangle.iter().all(|v| v.pos[0] >= 100.0), "{:?}", triangle);
        assert!(triangle.iter().all(|v| v.color == Color::BLUE.to_array()));
    }
    let draw = mock.calls().into_iter().find(|c| c.is_draw());
    assert_eq!(
        draw,
        Some(BackendCall::DrawIndexed {
            index_count: 6,
            start_index: 6,
            base_vertex: 0,
        })
    );
}

#[test]
fn test_device_lost_discards_frame() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    mock.set_device_lost(true);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    let result = renderer.flush();
    assert!(matches!(result, Err(Renderer2DError::DeviceLost(_))));
    assert!(renderer.commands().is_empty());

    mock.restore_device();
    mock.clear_calls();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    // Ring buffers and both engine constant buffers are recreated.
    assert_eq!(mock.count_buffer_creates(), 4);
    assert_eq!(mock.count_draw_calls(), 1);
}

#[test]
fn test_device_reset_recreates_gpu_resources() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();
    assert_eq!(mock.count_buffer_creates(), 4);

    mock.restore_device();
    mock.clear_calls();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.handle_device_reset();
    assert!(renderer.commands().is_empty());

    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();
    assert_eq!(mock.count_buffer_creates(), 4);
    assert_eq!(mock.count_draw_calls(), 1);
}

#[test]
fn test_triangle_and_quad_merge_with_rects() {
    let (mock, mut renderer) = setup();
    let colors = [Color::RED, Color::GREEN, Color::BLUE, Color::WHITE];
    renderer.add_triangle([Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0)], Color::RED);
    renderer.add_quad(
        [
            Vec2::new(20.0, 0.0),
            Vec2::new(30.0, 0.0),
            Vec2::new(30.0, 10.0),
            Vec2::new(20.0, 10.0),
        ],
        colors,
    );
    assert_eq!(draw_count(&renderer), 1);
    renderer.flush().unwrap();

    assert_eq!(mock.count_draw_calls(), 1);
    let triangles = mock.drawn_triangles();
    assert_eq!(triangles.len(), 3);
    assert_eq!(triangles[0][1].pos, [10.0, 0.0]);
    assert_eq!(triangles[1][0].pos, [20.0, 0.0]);
    assert_eq!(triangles[1][0].color, Color::RED.to_array());
    assert_eq!(triangles[1][1].color, Color::GREEN.to_array());
}

#[test]
fn test_viewport_applies_to_following_draws() {
    let (mock, mut renderer) = setup();
    let viewport = Rect::new(0, 0, 640, 360);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.set_viewport(Some(viewport));
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.set_viewport(None);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    let viewports: Vec<_> = mock.draws().iter().map(|d| d.viewport).collect();
    let full = Rect::new(0, 0, 1280, 720);
    assert_eq!(viewports, vec![full, viewport, full]);
}

#[test]
fn test_user_constant_buffer() {
    let (mock, mut renderer) = setup();
    let buffer = renderer.create_constant_buffer(16);
    assert!(!renderer.set_constant_buffer(ShaderStage::Pixel, 0, buffer, &[0; 16]));
    assert!(!renderer.set_constant_buffer(ShaderStage::Pixel, 1, buffer, &[0; 8]));

    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    assert!(renderer.set_constant_buffer(ShaderStage::Pixel, 1, buffer, &[7; 16]));
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    assert_eq!(renderer.commands().len(), 3);

    renderer.flush().unwrap();
    let bound: Vec<_> = mock
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::BindConstantBuffer { stage, slot: 1, buffer } => Some((stage, buffer)),
            _ => None,
        })
        .collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].0, ShaderStage::Pixel);
    assert_eq!(mock.buffer_contents(bound[0].1).unwrap(), vec![7; 16]);
    assert_eq!(mock.count_draw_calls(), 2);
}

#[test]
fn test_color_mul_splits_draws() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::WHITE);
    renderer.set_color_mul(Color::RED);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::WHITE);
    assert_eq!(draw_count(&renderer), 2);
    assert_eq!(renderer.color_mul(), Color::RED);

    renderer.flush().unwrap();
    assert_eq!(mock.count_draw_calls(), 2);
}

#[test]
fn test_scoped_render_states_restore() {
    let (_mock, mut renderer) = setup();
    {
        let mut scoped = renderer.scoped_render_states(RenderStates2D::blend(BlendState::ADDITIVE));
        assert_eq!(scoped.blend_state(), BlendState::ADDITIVE);
        scoped.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    }
    assert_eq!(renderer.blend_state(), BlendState::DEFAULT_2D);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    assert_eq!(draw_count(&renderer), 2);
}

#[test]
fn test_scoped_custom_shader_restore() {
    let (mock, mut renderer) = setup();
    let ps = mock.add_pixel_shader();
    {
        let mut scoped = renderer.scoped_custom_shader(None, Some(ps));
        scoped.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    }
    assert_eq!(renderer.custom_ps(), None);
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.flush().unwrap();

    let shaders: Vec<_> = mock.draws().iter().map(|d| d.pixel_shader).collect();
    assert_eq!(shaders, vec![ps, mock.standard_shaders().shape_ps]);
}

#[test]
fn test_insert_flush_submits_midframe() {
    let (mock, mut renderer) = setup();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    renderer.insert_flush();
    renderer.add_rect(Vec2::ZERO, Vec2::ONE, Color::RED);
    assert_eq!(renderer.commands().len(), 3);

    renderer.flush().unwrap();
    let kinds: Vec<_> = mock
        .calls()
        .into_iter()
        .filter(|c| c.is_draw() || matches!(c, BackendCall::Submit))
        .collect();
    assert_eq!(kinds.len(), 3);
    assert!(matches!(kinds[1], BackendCall::Submit));
}

#[test]
fn test_null_vertex_draw() {
    let (mock, mut renderer) = setup();
    let vs = mock.add_vertex_shader();
    renderer.set_custom_vs(Some(vs));
    renderer.add_null_vertices(3);
    renderer.add_null_vertices(0);
    assert_eq!(renderer.commands().len(), 2);

    renderer.flush().unwrap();
    assert_eq!(mock.count_calls(|c| matches!(c, BackendCall::Draw { vertex_count: 3 })), 1);
    assert_eq!(renderer.stats().triangles, 1);
}

#[test]
fn test_polygon_split_across_batches() {
    let config = Renderer2DConfig::default().with_batch_capacity(8, 12);
    let (mock, mut renderer) = setup_with(config);
    // Triangle fan with 20 outer vertices
    let mut vertices = vec![Vertex2D::colored([0.0, 0.0], [1.0; 4])];
    let mut indices = Vec::new();
    for i in 0..20u32 {
        let angle = i as f32 / 20.0 * std::f32::consts::TAU;
        vertices.push(Vertex2D::colored([angle.cos(), angle.sin()], [1.0; 4]));
        if i > 0 {
            indices.extend([0, i, i + 1]);
        }
    }
    assert!(renderer.add_polygon(&vertices, &indices));
    renderer.flush().unwrap();
    assert_eq!(mock.drawn_triangles().len(), 19);
    assert!(mock.count_draw_calls() > 1);
}
