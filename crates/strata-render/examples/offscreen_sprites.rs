//! Offscreen Sprites: Renderer2D on the wgpu backend without a window
//!
//! Draws a few shapes and a procedurally generated texture into an offscreen
//! target, reads the image back and prints frame statistics.
//!
//! Run with:
//!   cargo run -p strata-render --example offscreen_sprites
//!
//! Set `PROFILE=1` to serve the puffin profiler on 127.0.0.1:8585.

use std::sync::Arc;

use strata_core::{
    config::{Config, ProfilingMode},
    geometry::{Rect, Size},
    math::{Affine2, Vec2},
    profiling::{new_frame, profile_scope},
};
use strata_render::{
    Color, Renderer2D, Renderer2DConfig, RenderStates2D,
    state::{BlendState, SamplerState},
    wgpu,
    wgpu_backend::{GraphicsContext, RenderTarget, WgpuBackend2D},
};

const SIZE: Size<u32> = Size::new(256, 256);

fn checkerboard(cells: u32, cell_size: u32) -> Vec<u8> {
    let side = cells * cell_size;
    let mut pixels = Vec::with_capacity((side * side * 4) as usize);
    for y in 0..side {
        for x in 0..side {
            let on = ((x / cell_size) + (y / cell_size)) % 2 == 0;
            let v = if on { 255 } else { 40 };
            pixels.extend_from_slice(&[v, v, v, 255]);
        }
    }
    pixels
}

fn main() {
    let profiling = if std::env::var_os("PROFILE").is_some() {
        ProfilingMode::WithServer
    } else {
        ProfilingMode::Off
    };
    Config {
        profiling,
        log_filter: None,
    }
    .apply();

    let ctx = GraphicsContext::new_owned_sync().expect("Failed to create graphics context");

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let target_texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: SIZE.width,
            height: SIZE.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let target = RenderTarget {
        view: target_texture.create_view(&wgpu::TextureViewDescriptor::default()),
        size: SIZE,
        format,
    };

    let backend = Arc::new(WgpuBackend2D::new(ctx.clone(), target).expect("Failed to create backend"));
    backend.set_clear_color(Some(Color::from_hex(0x202830)));
    let checker = backend
        .create_texture_rgba8(Size::new(32, 32), &checkerboard(4, 8))
        .expect("Failed to upload texture");

    let mut renderer = Renderer2D::new(backend.clone(), Renderer2DConfig::default().with_log_commands(true))
        .expect("Failed to create renderer");

    for frame in 0..3 {
        new_frame();
        profile_scope!("frame");
        renderer.begin_frame();

        renderer.add_rect(Vec2::new(16.0, 16.0), Vec2::new(96.0, 64.0), Color::RED);
        renderer.add_circle(Vec2::new(180.0, 60.0), 40.0, Color::GREEN.with_alpha(0.8));
        renderer.add_line(
            Vec2::new(10.0, 240.0),
            Vec2::new(246.0, 120.0),
            4.0,
            [Color::BLUE, Color::WHITE],
        );

        {
            let mut scoped = renderer.scoped_render_states(RenderStates2D::sampler(SamplerState::CLAMP_NEAREST));
            scoped.add_texture_region(
                checker,
                Vec2::new(24.0, 120.0),
                Vec2::new(96.0, 96.0),
                [0.0, 0.0, 1.0, 1.0],
                Color::WHITE,
            );
        }

        renderer.set_blend_state(BlendState::ADDITIVE);
        renderer.set_scissor_rect(Rect::new(128, 128, 128, 128));
        renderer.set_camera_transform(Affine2::from_angle_translation(frame as f32 * 0.1, Vec2::new(192.0, 192.0)));
        renderer.add_rect_frame(Vec2::splat(-40.0), Vec2::splat(80.0), 6.0, Color::WHITE.with_alpha(0.5));
        renderer.set_camera_transform(Affine2::IDENTITY);
        renderer.set_scissor_rect(Rect::default());
        renderer.set_blend_state(BlendState::NON_PREMULTIPLIED);

        renderer.end_frame().expect("Frame failed");
        let stats = renderer.stats();
        tracing::info!(
            "frame {}: {} commands, {} draw calls, {} triangles, {} state binds, {} merged",
            frame,
            stats.commands,
            stats.draw_calls,
            stats.triangles,
            stats.state_binds,
            stats.merged_draws
        );
    }

    let pixel = read_pixel(&ctx, &target_texture, 40, 40);
    tracing::info!("pixel at (40, 40): {:?}", pixel);
    tracing::info!("{} pipelines created", backend.pipeline_count());
}

fn read_pixel(ctx: &GraphicsContext, texture: &wgpu::Texture, x: u32, y: u32) -> [u8; 4] {
    let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback"),
        size: 256,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(256),
                rows_per_image: Some(1),
            },
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |result| {
        result.expect("Failed to map readback buffer");
    });
    ctx.device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .expect("Failed to wait for readback");
    let data = slice.get_mapped_range();
    [data[0], data[1], data[2], data[3]]
}
