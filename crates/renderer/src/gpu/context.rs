use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use texdecode::Dimensions;
use winit::dpi::PhysicalSize;

use crate::types::AdapterProfile;

/// Swapchain half of the context; absent in headless runs.
pub(crate) struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: Option<SurfaceState>,
    pub adapter_profile: AdapterProfile,
    /// `TIMESTAMP_QUERY` was requested and granted.
    pub timestamps: bool,
}

impl GpuContext {
    /// Creates a device able to present to `target` at `initial_size`.
    pub(crate) fn new_windowed<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        dims: Dimensions,
        vsync: bool,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue, adapter_profile, timestamps) = open_device(&adapter, dims)?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        if surface_format.is_srgb() {
            tracing::warn!(
                ?surface_format,
                "no linear (non-sRGB) surface format available; presented colours will be re-encoded"
            );
        }

        let present_mode = choose_present_mode(&caps, vsync);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        tracing::debug!(?present_mode, ?surface_format, vsync, "using present mode");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: initial_size.width.max(1),
            height: initial_size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            surface: Some(SurfaceState { surface, config }),
            adapter_profile,
            timestamps,
        })
    }

    /// Creates a device with no presentation surface.
    pub(crate) fn new_headless(dims: Dimensions) -> Result<Self> {
        let instance = create_instance();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue, adapter_profile, timestamps) = open_device(&adapter, dims)?;

        Ok(Self {
            _instance: instance,
            device,
            queue,
            surface: None,
            adapter_profile,
            timestamps,
        })
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(state) = self.surface.as_mut() {
            state.config.width = new_size.width;
            state.config.height = new_size.height;
            state.surface.configure(&self.device, &state.config);
        }
    }

    /// Reconfigures the surface with its current size after `Lost`/`Outdated`.
    pub(crate) fn reconfigure(&self) {
        if let Some(state) = self.surface.as_ref() {
            state.surface.configure(&self.device, &state.config);
        }
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Requests the device, logs the adapter and installs the fatal error hook.
fn open_device(
    adapter: &wgpu::Adapter,
    dims: Dimensions,
) -> Result<(wgpu::Device, wgpu::Queue, AdapterProfile, bool)> {
    let info = adapter.get_info();
    let limits = adapter.limits();
    let adapter_profile = AdapterProfile::from_wgpu(&info);
    tracing::info!(
        name = %adapter_profile.name,
        backend = %adapter_profile.backend,
        driver = %adapter_profile.driver,
        driver_info = %adapter_profile.driver_info,
        device_type = %adapter_profile.device_type,
        "selected GPU adapter"
    );
    if adapter_profile.is_software() {
        tracing::warn!("software rasterizer detected; GPU timings will not be representative");
    }

    let max_dimension = limits.max_texture_dimension_2d;
    if dims.width() > max_dimension || dims.height() > max_dimension {
        anyhow::bail!(
            "GPU max texture dimension is {max_dimension}, requested image is {}x{}",
            dims.width(),
            dims.height()
        );
    }
    if limits.max_storage_buffers_per_shader_stage == 0 {
        anyhow::bail!(
            "adapter {} cannot bind storage buffers in fragment shaders",
            adapter_profile.name
        );
    }
    let packed_size = dims.texel_count() as u64 * 2;
    if packed_size > u64::from(limits.max_storage_buffer_binding_size) {
        anyhow::bail!(
            "packed image of {packed_size} bytes exceeds the GPU storage binding limit of {} bytes",
            limits.max_storage_buffer_binding_size
        );
    }

    let timestamps = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
    let mut required_features = wgpu::Features::empty();
    if timestamps {
        required_features |= wgpu::Features::TIMESTAMP_QUERY;
    }

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("texbench device"),
        required_features,
        required_limits: limits,
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")?;

    device.on_uncaptured_error(Box::new(|err| {
        tracing::error!(error = %err, "GPU device reported an error; aborting");
        std::process::abort();
    }));

    Ok((device, queue, adapter_profile, timestamps))
}

/// FIFO when vsync is on; otherwise Immediate, then Mailbox, then FIFO.
fn choose_present_mode(caps: &wgpu::SurfaceCapabilities, vsync: bool) -> wgpu::PresentMode {
    let supports = |mode: wgpu::PresentMode| caps.present_modes.contains(&mode);
    if !vsync {
        if supports(wgpu::PresentMode::Immediate) {
            return wgpu::PresentMode::Immediate;
        }
        if supports(wgpu::PresentMode::Mailbox) {
            return wgpu::PresentMode::Mailbox;
        }
    }
    wgpu::PresentMode::Fifo
}
