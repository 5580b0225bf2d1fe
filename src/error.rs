//! Error types for discretization setup and GPU planning.

use thiserror::Error;

use crate::element::ElementKind;

/// Errors raised while building a reference element or its operators.
#[derive(Error, Debug)]
pub enum ElementError {
    /// The requested (kind, order) combination is not supported.
    #[error("unsupported discretization: {kind:?} of order {order}")]
    UnsupportedOrder { kind: ElementKind, order: i64 },

    /// Two faces that are supposed to be glued do not share a vertex set.
    ///
    /// Raised during face matching so mesh-connectivity code can report
    /// which pairing is invalid instead of silently corrupting flux data.
    #[error("face vertices do not match: {face_1:?} vs {face_2:?}")]
    FaceVertexMismatch {
        face_1: Vec<usize>,
        face_2: Vec<usize>,
    },

    /// A derived operator failed an internal consistency check.
    ///
    /// This indicates a defect in node or basis construction; setup must
    /// abort rather than proceed with an inconsistent operator.
    #[error("inconsistent operators for {kind:?} order {order}: {detail}")]
    InconsistentOperators {
        kind: ElementKind,
        order: usize,
        detail: String,
    },

    /// A transformed face node had no partner within tolerance.
    #[error("no matching face node for permutation {permutation:?} of {kind:?} order {order}")]
    UnmatchedFaceNode {
        kind: ElementKind,
        order: usize,
        permutation: Vec<usize>,
    },
}

/// Errors raised by the GPU execution planner and kernel generator.
///
/// All of these are fatal configuration errors: the caller must pick a
/// smaller parallelism or a different discretization. There is no runtime
/// fallback, since replanning would require re-deriving the shared-memory
/// budgets.
#[derive(Error, Debug)]
pub enum PlanError {
    /// No candidate plan fits the device's shared memory.
    #[error(
        "no lifting plan fits in {budget} bytes of shared memory \
         ({kind:?} order {order}: smallest candidate needs {needed} bytes)"
    )]
    SharedMemExceeded {
        kind: ElementKind,
        order: usize,
        budget: usize,
        needed: usize,
    },

    /// Every candidate plan exceeds the per-thread register budget.
    #[error("register estimate {estimate} exceeds budget {budget} ({kind:?} order {order})")]
    RegisterBudget {
        kind: ElementKind,
        order: usize,
        estimate: usize,
        budget: usize,
    },

    /// The kernel backend cannot express the requested float width.
    #[error("kernel generation does not support {0}-byte floats")]
    UnsupportedFloatWidth(usize),
}

/// Errors raised by the kernel executor.
#[cfg(feature = "gpu")]
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("no suitable GPU adapter is available")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("flux buffer has {actual} values, layout requires {expected}")]
    FluxSizeMismatch { expected: usize, actual: usize },

    #[error("inverse-jacobian buffer has {actual} values, element group has {expected}")]
    JacobianSizeMismatch { expected: usize, actual: usize },

    #[error("buffer readback failed: {0}")]
    Readback(String),
}
