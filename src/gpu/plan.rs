//! Execution planning for the lifting kernel.
//!
//! The planner sizes the work decomposition against the device budgets:
//! how many elements form a microblock, how a microblock's degrees of
//! freedom split into shared-memory chunks, how many microblocks run in
//! parallel per workgroup versus sequentially inside it, and which of the
//! two kernel strategies applies. Planning is pure host-side arithmetic;
//! a plan is derived once per discretization and reused for every timestep.

use crate::element::ReferenceElement;
use crate::error::PlanError;

/// Device resource budgets the plan must respect.
#[derive(Clone, Copy, Debug)]
pub struct DeviceLimits {
    pub shared_mem_bytes: usize,
    pub max_registers_per_thread: usize,
    pub warp_size: usize,
    /// Global-memory alignment granularity for coalesced access.
    pub alignment_bytes: usize,
    pub max_threads_per_block: usize,
}

impl DeviceLimits {
    /// Budgets typical of the compute devices this kernel family targets.
    pub fn default_budgets() -> Self {
        Self {
            shared_mem_bytes: 16384,
            max_registers_per_thread: 64,
            warp_size: 32,
            alignment_bytes: 128,
            max_threads_per_block: 256,
        }
    }

    /// Derive budgets from a live wgpu device.
    ///
    /// wgpu does not expose a register file; the per-thread register budget
    /// stays at the conservative default.
    #[cfg(feature = "gpu")]
    pub fn from_wgpu(limits: &wgpu::Limits) -> Self {
        Self {
            shared_mem_bytes: limits.max_compute_workgroup_storage_size as usize,
            max_registers_per_thread: 64,
            warp_size: 32,
            alignment_bytes: 128,
            max_threads_per_block: limits.max_compute_invocations_per_workgroup as usize,
        }
    }
}

/// Floating-point width of device data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub fn size_bytes(self) -> usize {
        match self {
            FloatKind::F32 => 4,
            FloatKind::F64 => 8,
        }
    }
}

/// A fixed-size batch of elements processed together, padded to the
/// device alignment boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Microblock {
    pub elements: usize,
    /// Element dofs rounded up to the alignment granularity.
    pub aligned_floats: usize,
}

impl Microblock {
    /// Pick the element count (up to 16) that wastes the least padding.
    ///
    /// Ties go to the smaller count, which keeps the chunk lookup tables
    /// short.
    pub fn choose(dofs_per_el: usize, float: FloatKind, limits: &DeviceLimits) -> Self {
        let granularity = (limits.alignment_bytes / float.size_bytes()).max(1);
        let mut best = Microblock {
            elements: 1,
            aligned_floats: round_up(dofs_per_el, granularity),
        };
        let mut best_waste = waste_fraction(dofs_per_el, best.elements, best.aligned_floats);

        for elements in 2..=16 {
            let aligned = round_up(elements * dofs_per_el, granularity);
            let waste = waste_fraction(dofs_per_el, elements, aligned);
            if waste < best_waste - 1e-12 {
                best = Microblock {
                    elements,
                    aligned_floats: aligned,
                };
                best_waste = waste;
            }
        }
        best
    }
}

fn waste_fraction(dofs_per_el: usize, elements: usize, aligned: usize) -> f64 {
    (aligned - elements * dofs_per_el) as f64 / aligned as f64
}

fn round_up(value: usize, granularity: usize) -> usize {
    value.div_ceil(granularity) * granularity
}

/// Microblocks processed concurrently within a workgroup (`p`) versus
/// iterated sequentially inside the kernel (`s`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Parallelism {
    pub p: usize,
    pub s: usize,
}

impl Parallelism {
    pub fn total(self) -> usize {
        self.p * self.s
    }
}

/// Which kernel variant the plan selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelStrategy {
    /// Matrix tile in shared memory, flux streamed chunk by chunk.
    Chunked,
    /// A full microblock of face dofs staged in shared memory up front;
    /// fewer barriers, more shared memory.
    WholeMicroblock,
}

/// Sequential depth per workgroup. The original tuned (p, s) pairs by
/// benchmarking; a fixed depth keeps plans reproducible.
const SEQUENTIAL_DEPTH: usize = 4;

/// Register estimates per strategy, calibrated against the original's
/// compiled kernels.
const CHUNKED_REGISTERS: usize = 20;
const WHOLE_MICROBLOCK_REGISTERS: usize = 16;

/// Fixed shared-memory overhead: parameters, block header, bookkeeping.
const SHARED_MEM_HEADER: usize = 64;

/// The lifting-kernel execution plan for one `(kind, order)` discretization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LiftPlan {
    pub strategy: KernelStrategy,
    pub float: FloatKind,

    pub dofs_per_el: usize,
    pub faces_per_el: usize,
    pub dofs_per_face: usize,

    pub microblock: Microblock,
    pub aligned_face_dofs_per_microblock: usize,

    /// Microblock dofs per shared-memory tile (Chunked strategy; for
    /// WholeMicroblock this equals the aligned microblock dof count).
    pub chunk_size: usize,
    pub parallelism: Parallelism,

    /// Matrix column count, padded to an odd number to avoid
    /// shared-memory bank conflicts.
    pub matrix_columns: usize,
    /// Tile stride: chunk rows × columns, rounded up to the alignment
    /// granularity.
    pub matrix_chunk_floats: usize,

    pub shared_mem_bytes: usize,
    pub registers: usize,
}

impl LiftPlan {
    /// Plan the lifting kernel for one reference element.
    ///
    /// Fails fast when no decomposition fits the budgets; there is no
    /// runtime fallback.
    pub fn plan(
        element: &ReferenceElement,
        float: FloatKind,
        limits: &DeviceLimits,
    ) -> Result<Self, PlanError> {
        let dofs_per_el = element.node_count();
        let faces_per_el = element.face_count();
        let dofs_per_face = element.face_node_count();
        let face_dofs_per_el = faces_per_el * dofs_per_face;

        let microblock = Microblock::choose(dofs_per_el, float, limits);
        let granularity = (limits.alignment_bytes / float.size_bytes()).max(1);
        let aligned_face_dofs =
            round_up(microblock.elements * face_dofs_per_el, granularity);

        let mut matrix_columns = face_dofs_per_el;
        if matrix_columns % 2 == 0 {
            matrix_columns += 1;
        }

        let float_size = float.size_bytes();

        // Prefer the whole-microblock variant: it synchronizes twice per
        // sequential iteration instead of twice per flux chunk.
        let mut whole_p = limits.max_threads_per_block / microblock.aligned_floats;
        while whole_p >= 1 {
            let shared = SHARED_MEM_HEADER + float_size * whole_p * aligned_face_dofs;
            if shared <= limits.shared_mem_bytes {
                break;
            }
            whole_p -= 1;
        }
        if whole_p >= 1 && WHOLE_MICROBLOCK_REGISTERS <= limits.max_registers_per_thread {
            let shared = SHARED_MEM_HEADER + float_size * whole_p * aligned_face_dofs;
            return Ok(Self {
                strategy: KernelStrategy::WholeMicroblock,
                float,
                dofs_per_el,
                faces_per_el,
                dofs_per_face,
                microblock,
                aligned_face_dofs_per_microblock: aligned_face_dofs,
                chunk_size: microblock.aligned_floats,
                parallelism: Parallelism {
                    p: whole_p,
                    s: SEQUENTIAL_DEPTH,
                },
                matrix_columns,
                matrix_chunk_floats: round_up(dofs_per_el * matrix_columns, granularity),
                shared_mem_bytes: shared,
                registers: WHOLE_MICROBLOCK_REGISTERS,
            });
        }

        // Chunked fallback: search (chunk_size desc, p desc) for the
        // largest workgroup that fits.
        if CHUNKED_REGISTERS > limits.max_registers_per_thread {
            return Err(PlanError::RegisterBudget {
                kind: element.kind,
                order: element.order,
                estimate: CHUNKED_REGISTERS,
                budget: limits.max_registers_per_thread,
            });
        }

        let mut best: Option<Self> = None;
        let mut smallest_need = usize::MAX;
        let max_chunk = microblock
            .aligned_floats
            .min(limits.max_threads_per_block);

        for chunk_size in (1..=max_chunk).rev() {
            let tile_floats = round_up(chunk_size * matrix_columns, granularity);
            for p in (1..=limits.max_threads_per_block / chunk_size).rev() {
                let shared = SHARED_MEM_HEADER
                    + float_size * tile_floats
                    + float_size * p * chunk_size
                    + 8;
                smallest_need = smallest_need.min(shared);
                if shared > limits.shared_mem_bytes {
                    continue;
                }
                let candidate = Self {
                    strategy: KernelStrategy::Chunked,
                    float,
                    dofs_per_el,
                    faces_per_el,
                    dofs_per_face,
                    microblock,
                    aligned_face_dofs_per_microblock: aligned_face_dofs,
                    chunk_size,
                    parallelism: Parallelism {
                        p,
                        s: SEQUENTIAL_DEPTH,
                    },
                    matrix_columns,
                    matrix_chunk_floats: tile_floats,
                    shared_mem_bytes: shared,
                    registers: CHUNKED_REGISTERS,
                };
                let better = match &best {
                    None => true,
                    Some(b) => candidate.threads_per_block() > b.threads_per_block(),
                };
                if better {
                    best = Some(candidate);
                }
                break; // larger p always wins for this chunk size
            }
        }

        best.ok_or(PlanError::SharedMemExceeded {
            kind: element.kind,
            order: element.order,
            budget: limits.shared_mem_bytes,
            needed: smallest_need,
        })
    }

    pub fn face_dofs_per_el(&self) -> usize {
        self.faces_per_el * self.dofs_per_face
    }

    pub fn threads_per_block(&self) -> usize {
        match self.strategy {
            KernelStrategy::Chunked => self.chunk_size * self.parallelism.p,
            KernelStrategy::WholeMicroblock => {
                self.microblock.aligned_floats * self.parallelism.p
            }
        }
    }

    /// Dofs a microblock actually uses (its aligned stride minus padding).
    pub fn dofs_per_microblock(&self) -> usize {
        self.microblock.elements * self.dofs_per_el
    }

    /// Chunks covering a microblock's used dofs; output padding is never
    /// written, so it needs no chunk.
    pub fn chunks_per_microblock(&self) -> usize {
        self.dofs_per_microblock().div_ceil(self.chunk_size)
    }

    /// First element index each chunk's dof range touches.
    pub fn chunk_start_el_table(&self) -> Vec<usize> {
        (0..self.chunks_per_microblock())
            .map(|chk| ((chk * self.chunk_size) / self.dofs_per_el).min(self.microblock.elements))
            .collect()
    }

    /// One-past-last element index each chunk's dof range touches.
    pub fn chunk_stop_el_table(&self) -> Vec<usize> {
        (0..self.chunks_per_microblock())
            .map(|chk| {
                self.microblock.elements.min(
                    (chk * self.chunk_size + self.chunk_size - 1) / self.dofs_per_el + 1,
                )
            })
            .collect()
    }

    /// The largest element count any chunk touches; chunks touching one
    /// element take the batched-prefetch path, the rest fetch directly.
    pub fn max_elements_touched_by_chunk(&self) -> usize {
        self.chunk_start_el_table()
            .iter()
            .zip(self.chunk_stop_el_table().iter())
            .map(|(&start, &stop)| stop.saturating_sub(start))
            .max()
            .unwrap_or(0)
    }

    /// Number of microblocks needed to cover `element_count` elements.
    pub fn microblock_count(&self, element_count: usize) -> usize {
        element_count.div_ceil(self.microblock.elements)
    }

    /// Microblock count padded so macroblocks divide it evenly.
    pub fn padded_microblock_count(&self, element_count: usize) -> usize {
        round_up(
            self.microblock_count(element_count).max(1),
            self.parallelism.total(),
        )
    }

    /// Dispatch grid (x, y) for `element_count` elements.
    pub fn grid(&self, element_count: usize) -> (u32, u32) {
        let macroblocks =
            (self.padded_microblock_count(element_count) / self.parallelism.total()) as u32;
        match self.strategy {
            KernelStrategy::Chunked => (self.chunks_per_microblock() as u32, macroblocks),
            KernelStrategy::WholeMicroblock => (macroblocks, 1),
        }
    }

    /// Workgroup dimensions (x, y, z).
    pub fn workgroup_size(&self) -> (u32, u32, u32) {
        match self.strategy {
            KernelStrategy::Chunked => (self.chunk_size as u32, self.parallelism.p as u32, 1),
            KernelStrategy::WholeMicroblock => (
                self.microblock.aligned_floats as u32,
                self.parallelism.p as u32,
                1,
            ),
        }
    }
}
