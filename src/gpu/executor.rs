//! Kernel compilation cache and launch machinery.
//!
//! Compiles the generated lifting kernels once per `(is_lift, element kind,
//! order, plan)` and launches them against live flux buffers. Launches are
//! synchronous from the host's perspective; an optional instrumentation
//! timer accumulates kernel wall time, and a debug flag dumps the scratch
//! buffer after each launch. Diagnostics never affect numerical output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use wgpu::util::DeviceExt;

use crate::error::GpuError;
use crate::operators::LocalOperators;

use super::context::GpuContext;
use super::kernel::{
    generate_lift_kernel, KernelSource, BINDING_DEBUG_BUF, BINDING_FLUXES_ON_FACES,
    BINDING_FLUX_OUT, BINDING_INVERSE_JACOBIANS, BINDING_LIFT_MAT, DEBUG_BUF_FLOATS,
};
use super::plan::{FloatKind, LiftPlan};

/// Debug flag enabling the scratch-buffer dump after each launch.
pub const DEBUG_FLAG_BUFFER_DUMP: &str = "lift_debugbuf";

/// Running wall-time accumulator for kernel launches.
#[derive(Default, Clone, Copy, Debug)]
pub struct KernelTimer {
    pub launches: u64,
    pub seconds: f64,
}

impl KernelTimer {
    fn add(&mut self, seconds: f64) {
        self.launches += 1;
        self.seconds += seconds;
    }
}

struct PreparedKernel {
    pipeline: wgpu::ComputePipeline,
    matrix_buffer: wgpu::Buffer,
    source: KernelSource,
}

/// Applies the lifting (or multi-face mass) operator to flux buffers for
/// one element group.
pub struct LiftExecutor {
    context: Arc<GpuContext>,
    ops: Arc<LocalOperators>,
    plan: LiftPlan,
    /// Per-element inverse Jacobians, microblock-padded, device-resident.
    inverse_jacobians: wgpu::Buffer,
    element_count: usize,
    kernels: HashMap<bool, PreparedKernel>,
    instrumented: bool,
    debug_flags: HashSet<String>,
    pub timer: KernelTimer,
}

impl LiftExecutor {
    /// Set up the executor for an element group.
    ///
    /// `inverse_jacobians` holds one scalar per element, in element order;
    /// it is padded to the microblock layout and uploaded once. `float`
    /// selects the device float width; widths the kernel backend cannot
    /// express are rejected at kernel generation.
    pub fn new(
        context: Arc<GpuContext>,
        ops: Arc<LocalOperators>,
        element_count: usize,
        inverse_jacobians: &[f64],
        float: FloatKind,
        debug_flags: HashSet<String>,
        instrumented: bool,
    ) -> Result<Self, GpuError> {
        let plan = LiftPlan::plan(&ops.element, float, &context.limits)?;

        if inverse_jacobians.len() != element_count {
            return Err(GpuError::JacobianSizeMismatch {
                expected: element_count,
                actual: inverse_jacobians.len(),
            });
        }

        let padded_mbs = plan.padded_microblock_count(element_count);
        let mut padded = vec![1.0f32; padded_mbs * plan.microblock.elements];
        for (el, &ij) in inverse_jacobians.iter().enumerate() {
            padded[el] = ij as f32;
        }
        let inverse_jacobians =
            context
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("inverse_jacobians"),
                    contents: bytemuck::cast_slice(&padded),
                    usage: wgpu::BufferUsages::STORAGE,
                });

        Ok(Self {
            context,
            ops,
            plan,
            inverse_jacobians,
            element_count,
            kernels: HashMap::new(),
            instrumented,
            debug_flags,
            timer: KernelTimer::default(),
        })
    }

    /// The generated source for a variant, once built (diagnostics).
    pub fn kernel_source(&self, is_lift: bool) -> Option<&KernelSource> {
        self.kernels.get(&is_lift).map(|k| &k.source)
    }

    /// Flux values expected per call: the aligned face-dof stride times the
    /// (unpadded) microblock count.
    pub fn flux_len(&self) -> usize {
        self.plan.microblock_count(self.element_count) * self.plan.aligned_face_dofs_per_microblock
    }

    /// Output values produced per call: the aligned volume-dof stride times
    /// the microblock count.
    pub fn output_len(&self) -> usize {
        self.plan.microblock_count(self.element_count) * self.plan.microblock.aligned_floats
    }

    pub fn plan(&self) -> &LiftPlan {
        &self.plan
    }

    /// Apply the lifting matrix (`is_lift`) or the multi-face mass matrix
    /// to a flux buffer laid out `[microblock][element][face][face_dof]`.
    ///
    /// Returns the per-element volume contributions in the padded
    /// microblock layout.
    pub fn apply(&mut self, fluxes_on_faces: &[f32], is_lift: bool) -> Result<Vec<f32>, GpuError> {
        if fluxes_on_faces.len() != self.flux_len() {
            return Err(GpuError::FluxSizeMismatch {
                expected: self.flux_len(),
                actual: fluxes_on_faces.len(),
            });
        }

        self.prepare(is_lift)?;
        let kernel = &self.kernels[&is_lift];
        let device = &self.context.device;
        let plan = &self.plan;

        let padded_mbs = plan.padded_microblock_count(self.element_count);

        // Flux upload, zero-padded to the macroblock grid plus one chunk of
        // slack: the batched fetch path reads whole chunks past the last
        // element's face dofs.
        let padded_flux_len =
            padded_mbs * plan.aligned_face_dofs_per_microblock + plan.chunk_size;
        let mut padded_flux = vec![0.0f32; padded_flux_len];
        padded_flux[..fluxes_on_faces.len()].copy_from_slice(fluxes_on_faces);
        let flux_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fluxes_on_faces"),
            contents: bytemuck::cast_slice(&padded_flux),
            usage: wgpu::BufferUsages::STORAGE,
        });

        // Output, zero-initialized: padding dofs are never written by the
        // kernel.
        let out_len = padded_mbs * plan.microblock.aligned_floats;
        let out_bytes = (out_len * std::mem::size_of::<f32>()) as u64;
        let out_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("flux_out"),
            size: out_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let debug_bytes = (DEBUG_BUF_FLOATS * std::mem::size_of::<f32>()) as u64;
        let debug_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("debug_buf"),
            size: debug_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let layout = kernel.pipeline.get_bind_group_layout(0);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lift_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: BINDING_FLUX_OUT,
                    resource: out_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_FLUXES_ON_FACES,
                    resource: flux_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_LIFT_MAT,
                    resource: kernel.matrix_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_INVERSE_JACOBIANS,
                    resource: self.inverse_jacobians.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: BINDING_DEBUG_BUF,
                    resource: debug_buffer.as_entire_binding(),
                },
            ],
        });

        let started = Instant::now();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lift_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("apply_lift_mat"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (grid_x, grid_y) = plan.grid(self.element_count);
            pass.dispatch_workgroups(grid_x, grid_y, 1);
        }
        self.context.queue.submit(Some(encoder.finish()));

        let result = self.read_back(&out_buffer, out_bytes)?;

        if self.instrumented {
            self.timer.add(started.elapsed().as_secs_f64());
        }

        if self.debug_flags.contains(DEBUG_FLAG_BUFFER_DUMP) {
            let dump = self.read_back(&debug_buffer, debug_bytes)?;
            log::debug!("lift debug buffer: {:?}", &dump[..dump.len().min(144)]);
        }

        // Hand back the unpadded microblock range.
        Ok(result[..self.output_len()].to_vec())
    }

    /// Get or build the compiled kernel for this operator variant.
    fn prepare(&mut self, is_lift: bool) -> Result<(), GpuError> {
        if self.kernels.contains_key(&is_lift) {
            return Ok(());
        }

        let debug = self.debug_flags.contains(DEBUG_FLAG_BUFFER_DUMP);
        let source = generate_lift_kernel(&self.ops, &self.plan, is_lift, debug)?;

        let device = &self.context.device;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.entry_point),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(source.wgsl.as_str())),
        });

        // Explicit layout: every kernel variant binds the full buffer set,
        // whether or not this variant reads them all.
        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lift_layout"),
            entries: &[
                storage_entry(BINDING_FLUX_OUT, false),
                storage_entry(BINDING_FLUXES_ON_FACES, true),
                storage_entry(BINDING_LIFT_MAT, true),
                storage_entry(BINDING_INVERSE_JACOBIANS, true),
                storage_entry(BINDING_DEBUG_BUF, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lift_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(source.entry_point),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: source.entry_point,
            compilation_options: Default::default(),
        });

        let matrix_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lift_mat"),
            contents: bytemuck::cast_slice(&source.matrix_data),
            usage: wgpu::BufferUsages::STORAGE,
        });

        // wgpu exposes no register counts; report the plan's budgets.
        log::info!(
            "lift kernel ({}, is_lift={}): smem={}B regs~{} wg={:?}",
            source.entry_point,
            is_lift,
            self.plan.shared_mem_bytes,
            self.plan.registers,
            source.workgroup_size,
        );

        self.kernels.insert(
            is_lift,
            PreparedKernel {
                pipeline,
                matrix_buffer,
                source,
            },
        );
        Ok(())
    }

    fn read_back(&self, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<f32>, GpuError> {
        let device = &self.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.context.queue.submit(Some(encoder.finish()));

        let (sender, receiver) = std::sync::mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        let _ = device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| GpuError::Readback(e.to_string()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        let data = staging.slice(..).get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }
}
