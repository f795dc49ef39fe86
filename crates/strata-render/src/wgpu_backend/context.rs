use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// Instance, adapter, device and queue shared by everything rendering with wgpu.
///
/// ```rust,no_run
/// use strata_render::wgpu_backend::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
/// let ctx2 = ctx.clone(); // Cheap clone (Arc)
/// ```
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

/// Options for [`GraphicsContext::new_owned_with_descriptor`].
#[derive(Debug, Clone)]
pub struct GraphicsContextDescriptor {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Enabled only when the adapter supports them, e.g. `POLYGON_MODE_LINE`
    /// for wireframe rasterization.
    pub requested_features: wgpu::Features,
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            requested_features: wgpu::Features::POLYGON_MODE_LINE | wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER,
            label: Some("strata"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsContextError {
    NoAdapter(String),
    DeviceRequest(String),
}

impl fmt::Display for GraphicsContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter(msg) => write!(f, "No suitable GPU adapter: {}", msg),
            Self::DeviceRequest(msg) => write!(f, "Failed to create device: {}", msg),
        }
    }
}

impl std::error::Error for GraphicsContextError {}

impl GraphicsContext {
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsContextError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Blocks the current thread until the context is created.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsContextError> {
        pollster::block_on(Self::new_owned())
    }

    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|e| GraphicsContextError::NoAdapter(e.to_string()))?;

        let available = descriptor.requested_features & adapter.features();
        let unavailable = descriptor.requested_features - available;
        if !unavailable.is_empty() {
            tracing::warn!("Some requested GPU features are not available: {:?}", unavailable);
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: available,
                required_limits: wgpu::Limits::default(),
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(|e| GraphicsContextError::DeviceRequest(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::error!("GPU device lost ({:?}): {}", reason, message);
            flag.store(true, Ordering::Release);
        });

        tracing::info!(
            "Created graphics context on {} with features: {:?}",
            adapter.get_info().name,
            available
        );

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
            lost,
        }))
    }

    /// True once the device-lost callback fired. A lost context never recovers;
    /// create a new one.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }
}
