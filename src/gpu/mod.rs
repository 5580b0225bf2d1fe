//! GPU execution of the lifting operator.
//!
//! The pipeline: [`plan`] sizes microblocks, chunks and parallelism against
//! the device budgets (host-only, usable without a device); [`wgsl`] is the
//! typed kernel IR; [`kernel`] emits the two lifting-kernel variants from a
//! plan; [`executor`] compiles, caches and launches them.

pub mod plan;
pub mod wgsl;

pub mod kernel;

#[cfg(feature = "gpu")]
pub mod context;
#[cfg(feature = "gpu")]
pub mod executor;

pub use kernel::{generate_lift_kernel, KernelSource};
pub use plan::{DeviceLimits, FloatKind, KernelStrategy, LiftPlan, Microblock, Parallelism};

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use executor::{KernelTimer, LiftExecutor};
