//! # dg-local
//!
//! Element-local operators and GPU lifting kernels for nodal
//! discontinuous-Galerkin methods.
//!
//! This crate provides the per-element machinery every element of a DG mesh
//! shares:
//! - Warp-and-blend interpolation nodes and orthonormal simplex bases for
//!   intervals, triangles and tetrahedra
//! - The reference matrix bundle: mass, differentiation, face-mass,
//!   multi-face-mass and lifting matrices, plus face-orientation shuffles
//!   and time-step scaling factors
//! - An over-integrated quadrature variant of the matrix set for
//!   integrands outside the nodal polynomial space
//! - A GPU execution layer that plans shared-memory tiling against device
//!   budgets, generates the specialized lifting kernel as WGSL, and
//!   compiles, caches and launches it
//!
//! Mesh handling, flux assembly and time integration are external
//! collaborators; this crate consumes their buffers and configuration and
//! hands back reference matrices and volume-contribution buffers.

pub mod element;
pub mod error;
pub mod gpu;
pub mod operators;
pub mod polynomial;

pub use element::{ElementKind, ReferenceElement};
pub use error::{ElementError, PlanError};
pub use operators::{
    dt_geometric_factor, dt_non_geometric_factor, ElementGeometry, FaceShuffle, LocalOperators,
    OperatorCache, QuadratureOperators, ShuffleLookup,
};

pub use gpu::{DeviceLimits, FloatKind, KernelStrategy, LiftPlan, Microblock, Parallelism};

#[cfg(feature = "gpu")]
pub use error::GpuError;
#[cfg(feature = "gpu")]
pub use gpu::{GpuContext, KernelTimer, LiftExecutor};
