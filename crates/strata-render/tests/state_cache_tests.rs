//! Render state diffing against the mock backend.

use strata_render::{
    RenderStateCache, ShaderStage,
    state::{
        BlendState, CullMode, DepthStencilChanges, DepthStencilState, FillMode, RasterizerChanges, RasterizerState,
        RenderStateSnapshot, SamplerState,
    },
};
use strata_test_utils::{BackendCall, MockBackend2D};

#[test]
fn test_default_state_needs_no_binds() {
    let mock = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    assert_eq!(cache.set(&mock, &RenderStateSnapshot::DEFAULT_2D).unwrap(), 0);
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn test_set_is_idempotent() {
    let mock = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    let mut state = RenderStateSnapshot::DEFAULT_2D;
    state.blend = BlendState::ADDITIVE;
    state.rasterizer = RasterizerState::SOLID_CULL_BACK;

    assert_eq!(cache.set(&mock, &state).unwrap(), 2);
    assert_eq!(cache.set(&mock, &state).unwrap(), 0);
    assert_eq!(cache.set(&mock, &state).unwrap(), 0);
    assert_eq!(mock.count_state_binds(), 2);
    assert_eq!(cache.current(), &state);
}

#[test]
fn test_only_changed_fields_are_sent() {
    let mock = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    let mut state = RenderStateSnapshot::DEFAULT_2D;
    state.rasterizer.cull_mode = CullMode::Back;
    state.depth_stencil = DepthStencilState::DEPTH_TEST_WRITE;
    cache.set(&mock, &state).unwrap();

    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        BackendCall::BindRasterizerState {
            state: state.rasterizer,
            changes: RasterizerChanges::CULL_MODE,
        }
    );
    assert_eq!(
        calls[1],
        BackendCall::BindDepthStencilState {
            state: state.depth_stencil,
            changes: DepthStencilChanges::DEPTH_ENABLE
                | DepthStencilChanges::DEPTH_WRITE
                | DepthStencilChanges::DEPTH_FUNC,
        }
    );
}

#[test]
fn test_sampler_slots_diffed_individually() {
    let mock = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    let mut state = RenderStateSnapshot::DEFAULT_2D;
    state.samplers_mut(ShaderStage::Pixel)[2] = SamplerState::REPEAT_NEAREST;
    state.samplers_mut(ShaderStage::Vertex)[0] = SamplerState::MIRROR_LINEAR;

    assert_eq!(cache.set(&mock, &state).unwrap(), 2);
    let calls = mock.calls();
    assert!(calls.contains(&BackendCall::BindSamplerState {
        stage: ShaderStage::Pixel,
        slot: 2,
        state: SamplerState::REPEAT_NEAREST,
    }));
    assert!(calls.contains(&BackendCall::BindSamplerState {
        stage: ShaderStage::Vertex,
        slot: 0,
        state: SamplerState::MIRROR_LINEAR,
    }));
}

#[test]
fn test_failed_bind_keeps_previous_shadow() {
    let mock = MockBackend2D::new();
    mock.fail_blend_state(Some(BlendState::ADDITIVE));
    let mut cache = RenderStateCache::new();
    let mut state = RenderStateSnapshot::DEFAULT_2D;
    state.blend = BlendState::ADDITIVE;

    assert!(cache.set(&mock, &state).is_err());
    assert_eq!(cache.current().blend, BlendState::DEFAULT_2D);

    // Retried on the next request.
    mock.fail_blend_state(None);
    assert_eq!(cache.set(&mock, &state).unwrap(), 1);
    assert_eq!(mock.count_blend_binds(), 2);
}

#[test]
fn test_reset_returns_to_default() {
    let mock = MockBackend2D::new();
    let mut cache = RenderStateCache::new();
    let mut state = RenderStateSnapshot::DEFAULT_2D;
    state.rasterizer = RasterizerState::new(FillMode::Wireframe, CullMode::None);
    cache.set(&mock, &state).unwrap();

    cache.reset();
    assert_eq!(cache.current(), &RenderStateSnapshot::DEFAULT_2D);
    mock.clear_calls();
    assert_eq!(cache.set(&mock, &state).unwrap(), 1);
}
