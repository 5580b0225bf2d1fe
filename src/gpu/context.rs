//! Device context.

use crate::error::GpuError;

use super::plan::DeviceLimits;

/// Owns the wgpu device and queue, plus the planning budgets derived from
/// the adapter's limits.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: DeviceLimits,
}

impl GpuContext {
    /// Acquire a high-performance adapter, blocking on the async setup.
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("dg-local"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_buffer_size: adapter_limits.max_buffer_size,
                    max_storage_buffer_binding_size: adapter_limits
                        .max_storage_buffer_binding_size,
                    ..wgpu::Limits::downlevel_defaults()
                },
            },
            None,
        ))
        .map_err(|e| GpuError::DeviceRequest(e.to_string()))?;

        let limits = DeviceLimits::from_wgpu(&device.limits());
        Ok(Self {
            device,
            queue,
            limits,
        })
    }

    /// Like [`new`](Self::new), but `None` when no adapter exists — lets
    /// tests skip on headless machines instead of failing.
    pub fn try_new() -> Option<Self> {
        Self::new().ok()
    }
}
