//! Lifting-kernel generation.
//!
//! Emits the compute kernel applying the lifting (or multi-face mass)
//! matrix across all elements of a group, specialized to one
//! [`LiftPlan`](super::plan::LiftPlan). Two variants exist:
//!
//! - **Chunked**: the matrix tile for one chunk of microblock dofs lives in
//!   shared memory; flux data streams through a small staging buffer
//!   (single-element chunks) or is fetched per multiply term (chunks
//!   spanning elements).
//! - **WholeMicroblock**: an entire microblock's face dofs are staged in
//!   shared memory up front, trading memory for fewer barriers.
//!
//! All size parameters are emitted as named compile-time constants and
//! cross-checked against the plan while the IR is built.

use faer::Mat;

use crate::error::PlanError;
use crate::operators::LocalOperators;

use super::plan::{FloatKind, KernelStrategy, LiftPlan};
use super::wgsl::{Expr, Function, Item, Module, Stmt, Type};

/// Storage-buffer binding indices, in bind-group order.
pub const BINDING_FLUX_OUT: u32 = 0;
pub const BINDING_FLUXES_ON_FACES: u32 = 1;
pub const BINDING_LIFT_MAT: u32 = 2;
pub const BINDING_INVERSE_JACOBIANS: u32 = 3;
pub const BINDING_DEBUG_BUF: u32 = 4;

/// Entries in the diagnostic scratch buffer.
pub const DEBUG_BUF_FLOATS: usize = 1024;

/// A generated kernel: WGSL source plus the matrix buffer contents laid
/// out the way the kernel expects them.
pub struct KernelSource {
    pub entry_point: &'static str,
    pub wgsl: String,
    pub workgroup_size: (u32, u32, u32),
    /// Matrix data to upload, in the kernel's tile layout.
    pub matrix_data: Vec<f32>,
    pub is_lift: bool,
    pub plan: LiftPlan,
}

/// Generate the kernel applying `lifting` (is_lift) or `multi_face_mass`
/// to a flux buffer.
///
/// When `is_lift` is set the accumulated value is scaled by the per-element
/// inverse Jacobian; the mass-only variant applies no scaling. When `debug`
/// is set the kernel additionally records per-workgroup bookkeeping in the
/// scratch buffer; this never affects the numerical output.
pub fn generate_lift_kernel(
    ops: &LocalOperators,
    plan: &LiftPlan,
    is_lift: bool,
    debug: bool,
) -> Result<KernelSource, PlanError> {
    if plan.float != FloatKind::F32 {
        // WGSL has no f64; failing here beats silently demoting precision.
        return Err(PlanError::UnsupportedFloatWidth(plan.float.size_bytes()));
    }

    let matrix = if is_lift {
        &ops.lifting
    } else {
        &ops.multi_face_mass
    };
    assert_eq!(matrix.nrows(), plan.dofs_per_el);
    assert_eq!(matrix.ncols(), plan.face_dofs_per_el());
    assert_eq!(plan.dofs_per_el, ops.element.node_count());
    assert_eq!(plan.dofs_per_face, ops.element.face_node_count());

    match plan.strategy {
        KernelStrategy::Chunked => Ok(chunked_kernel(matrix, plan, is_lift, debug)),
        KernelStrategy::WholeMicroblock => Ok(whole_microblock_kernel(matrix, plan, is_lift, debug)),
    }
}

fn storage_bindings(module: &mut Module) {
    module.push(Item::StorageVar {
        name: "flux_out".into(),
        ty: Type::runtime_array(Type::F32),
        group: 0,
        binding: BINDING_FLUX_OUT,
        read_write: true,
    });
    module.push(Item::StorageVar {
        name: "fluxes_on_faces".into(),
        ty: Type::runtime_array(Type::F32),
        group: 0,
        binding: BINDING_FLUXES_ON_FACES,
        read_write: false,
    });
    module.push(Item::StorageVar {
        name: "lift_mat".into(),
        ty: Type::runtime_array(Type::F32),
        group: 0,
        binding: BINDING_LIFT_MAT,
        read_write: false,
    });
    module.push(Item::StorageVar {
        name: "inverse_jacobians".into(),
        ty: Type::runtime_array(Type::F32),
        group: 0,
        binding: BINDING_INVERSE_JACOBIANS,
        read_write: false,
    });
    module.push(Item::StorageVar {
        name: "debug_buf".into(),
        ty: Type::runtime_array(Type::F32),
        group: 0,
        binding: BINDING_DEBUG_BUF,
        read_write: true,
    });
}

fn shared_constants(module: &mut Module, plan: &LiftPlan) {
    module.push(Item::ConstU32("DOFS_PER_EL".into(), plan.dofs_per_el as u64));
    module.push(Item::ConstU32("FACES_PER_EL".into(), plan.faces_per_el as u64));
    module.push(Item::ConstU32("DOFS_PER_FACE".into(), plan.dofs_per_face as u64));
    module.push(Item::ConstU32(
        "FACE_DOFS_PER_EL".into(),
        plan.face_dofs_per_el() as u64,
    ));
    module.push(Item::ConstU32(
        "MB_EL_COUNT".into(),
        plan.microblock.elements as u64,
    ));
    module.push(Item::ConstU32(
        "ALIGNED_DOFS_PER_MB".into(),
        plan.microblock.aligned_floats as u64,
    ));
    module.push(Item::ConstU32(
        "ALIGNED_FACE_DOFS_PER_MB".into(),
        plan.aligned_face_dofs_per_microblock as u64,
    ));
    module.push(Item::ConstU32("DOFS_PER_MB".into(), plan.dofs_per_microblock() as u64));
    module.push(Item::ConstU32("PAR_MB_COUNT".into(), plan.parallelism.p as u64));
    module.push(Item::ConstU32("SEQ_MB_COUNT".into(), plan.parallelism.s as u64));
    module.push(Item::BlankLine);
}

/// `result * inverse_jacobian` or plain `result` for the mass-only variant.
fn scaled_result(is_lift: bool, element_expr: Expr) -> Expr {
    if is_lift {
        Expr::ident("result").mul(
            Expr::ident("inverse_jacobians")
                .index(Expr::ident("global_mb_nr").mul(Expr::ident("MB_EL_COUNT")).add(element_expr)),
        )
    } else {
        Expr::ident("result")
    }
}

fn debug_stamp(debug: bool, value: Expr) -> Vec<Stmt> {
    if !debug {
        return Vec::new();
    }
    // One slot per workgroup, written by its first thread.
    vec![Stmt::If {
        condition: Expr::ident("thread_num").eq(Expr::u32(0)),
        then_body: vec![Stmt::Assign(
            Expr::ident("debug_buf").index(
                Expr::ident("wid.x")
                    .add(Expr::ident("wid.y").mul(Expr::u32(64)))
                    .binary_mod(DEBUG_BUF_FLOATS as u64),
            ),
            Expr::Call("f32".into(), vec![value]),
        )],
        else_body: vec![],
    }]
}

trait ExprModExt {
    fn binary_mod(self, modulus: u64) -> Expr;
}

impl ExprModExt for Expr {
    fn binary_mod(self, modulus: u64) -> Expr {
        Expr::binary("%", self, Expr::u32(modulus))
    }
}

// ---------------------------------------------------------------------
// Chunked variant
// ---------------------------------------------------------------------

fn chunked_kernel(matrix: &Mat<f64>, plan: &LiftPlan, is_lift: bool, debug: bool) -> KernelSource {
    let start_table = plan.chunk_start_el_table();
    let stop_table = plan.chunk_stop_el_table();
    assert_eq!(start_table.len(), plan.chunks_per_microblock());
    assert_eq!(stop_table.len(), plan.chunks_per_microblock());

    let mut module = Module::new();
    module.push(Item::Comment(format!(
        "lifting kernel, chunked: chunk {} dofs, parallelism ({}, {})",
        plan.chunk_size, plan.parallelism.p, plan.parallelism.s
    )));
    storage_bindings(&mut module);
    module.push(Item::BlankLine);
    shared_constants(&mut module, plan);
    module.push(Item::ConstU32("CHUNK_DOF_COUNT".into(), plan.chunk_size as u64));
    module.push(Item::ConstU32(
        "MB_CHUNK_COUNT".into(),
        plan.chunks_per_microblock() as u64,
    ));
    module.push(Item::ConstU32(
        "LIFTMAT_COLUMNS".into(),
        plan.matrix_columns as u64,
    ));
    module.push(Item::ConstU32(
        "LIFTMAT_CHUNK_FLOATS".into(),
        plan.matrix_chunk_floats as u64,
    ));
    module.push(Item::ConstU32(
        "COALESCING_THREAD_COUNT".into(),
        (plan.parallelism.p * plan.chunk_size) as u64,
    ));
    module.push(Item::ConstU32Array(
        "chunk_start_el_lookup".into(),
        start_table.iter().map(|&v| v as u64).collect(),
    ));
    module.push(Item::ConstU32Array(
        "chunk_stop_el_lookup".into(),
        stop_table.iter().map(|&v| v as u64).collect(),
    ));
    module.push(Item::BlankLine);
    module.push(Item::WorkgroupVar {
        name: "smem_lift_mat".into(),
        ty: Type::array(Type::F32, "LIFTMAT_CHUNK_FLOATS"),
    });
    module.push(Item::WorkgroupVar {
        name: "dof_buffer".into(),
        ty: Type::array(Type::array(Type::F32, "CHUNK_DOF_COUNT"), "PAR_MB_COUNT"),
    });
    module.push(Item::BlankLine);

    let mut body = vec![
        Stmt::Let("chunk_dof".into(), Expr::ident("lid.x")),
        Stmt::Let("par_mb_nr".into(), Expr::ident("lid.y")),
        Stmt::Let("mb_chunk".into(), Expr::ident("wid.x")),
        Stmt::Let("macroblock_nr".into(), Expr::ident("wid.y")),
        Stmt::Let(
            "thread_num".into(),
            Expr::ident("chunk_dof").add(Expr::ident("par_mb_nr").mul(Expr::ident("CHUNK_DOF_COUNT"))),
        ),
        Stmt::Let(
            "mb_dof".into(),
            Expr::ident("mb_chunk")
                .mul(Expr::ident("CHUNK_DOF_COUNT"))
                .add(Expr::ident("chunk_dof")),
        ),
        Stmt::Let("dof_el".into(), Expr::ident("mb_dof").div(Expr::ident("DOFS_PER_EL"))),
        Stmt::Let(
            "global_mb_nr_base".into(),
            Expr::ident("macroblock_nr")
                .mul(Expr::ident("PAR_MB_COUNT"))
                .mul(Expr::ident("SEQ_MB_COUNT")),
        ),
        // Responsibility data: uniform per workgroup, straight from the
        // constant tables.
        Stmt::Let(
            "chunk_start_el".into(),
            Expr::ident("chunk_start_el_lookup").index(Expr::ident("mb_chunk")),
        ),
        Stmt::Let(
            "chunk_el_count".into(),
            Expr::ident("chunk_stop_el_lookup")
                .index(Expr::ident("mb_chunk"))
                .sub(Expr::ident("chunk_start_el")),
        ),
        Stmt::Comment("load lift mat chunk, striped across the workgroup".into()),
        Stmt::For {
            variable: "i".into(),
            start: Expr::ident("thread_num"),
            end: Expr::ident("LIFTMAT_CHUNK_FLOATS"),
            step: Expr::ident("COALESCING_THREAD_COUNT"),
            body: vec![Stmt::Assign(
                Expr::ident("smem_lift_mat").index(Expr::ident("i")),
                Expr::ident("lift_mat").index(
                    Expr::ident("mb_chunk")
                        .mul(Expr::ident("LIFTMAT_CHUNK_FLOATS"))
                        .add(Expr::ident("i")),
                ),
            )],
        },
        Stmt::WorkgroupBarrier,
    ];
    body.extend(debug_stamp(debug, Expr::ident("chunk_el_count")));

    // One branch per element-fetch count; count one takes the batched
    // staging path, larger counts fetch each term directly.
    let max_count = plan.max_elements_touched_by_chunk().max(1);
    let mut branches: Vec<Stmt> = Vec::new();
    for fetch_count in (1..=max_count).rev() {
        let mat_mul = if fetch_count == 1 {
            batched_fetch_mat_mul(plan)
        } else {
            direct_fetch_mat_mul(plan)
        };
        let seq_loop = sequential_microblock_loop(is_lift, mat_mul);
        let branch = Stmt::If {
            condition: Expr::ident("chunk_el_count").eq(Expr::u32(fetch_count as u64)),
            then_body: vec![seq_loop],
            else_body: branches,
        };
        branches = vec![branch];
    }
    body.extend(branches);

    module.push(Item::Function(Function {
        name: "apply_lift_mat".into(),
        workgroup_size: plan.workgroup_size(),
        body,
    }));

    KernelSource {
        entry_point: "apply_lift_mat",
        wgsl: module.render(),
        workgroup_size: plan.workgroup_size(),
        matrix_data: chunked_matrix_data(matrix, plan),
        is_lift,
        plan: plan.clone(),
    }
}

/// The per-microblock sequential loop wrapping one mat-mul body.
fn sequential_microblock_loop(is_lift: bool, mat_mul: Vec<Stmt>) -> Stmt {
    let mut loop_body = vec![
        Stmt::Let(
            "global_mb_nr".into(),
            Expr::ident("global_mb_nr_base")
                .add(Expr::ident("seq_mb_number").mul(Expr::ident("PAR_MB_COUNT")))
                .add(Expr::ident("par_mb_nr")),
        ),
        Stmt::Let(
            "global_mb_dof_base".into(),
            Expr::ident("global_mb_nr").mul(Expr::ident("ALIGNED_DOFS_PER_MB")),
        ),
        Stmt::Let(
            "global_mb_facedof_base".into(),
            Expr::ident("global_mb_nr").mul(Expr::ident("ALIGNED_FACE_DOFS_PER_MB")),
        ),
        Stmt::Var("result".into(), Expr::f32(0.0)),
    ];
    loop_body.extend(mat_mul);
    loop_body.push(Stmt::If {
        // Padding dofs past the microblock's elements are never written.
        condition: Expr::ident("mb_dof").lt(Expr::ident("DOFS_PER_MB")),
        then_body: vec![Stmt::Assign(
            Expr::ident("flux_out").index(Expr::ident("global_mb_dof_base").add(Expr::ident("mb_dof"))),
            scaled_result(is_lift, Expr::ident("dof_el")),
        )],
        else_body: vec![],
    });

    Stmt::For {
        variable: "seq_mb_number".into(),
        start: Expr::u32(0),
        end: Expr::ident("SEQ_MB_COUNT"),
        step: Expr::u32(1),
        body: loop_body,
    }
}

/// Batched path: stream this element's face dofs through the staging
/// buffer in chunk-sized loads, multiplying each batch against the shared
/// matrix tile. Valid only when the chunk touches a single element.
fn batched_fetch_mat_mul(plan: &LiftPlan) -> Vec<Stmt> {
    let mut statements = Vec::new();
    let face_dofs = plan.face_dofs_per_el();

    let mut load_chunk_start = 0;
    while load_chunk_start < face_dofs {
        // The staging buffer is reused: the previous batch must be fully
        // consumed before it is overwritten.
        statements.push(Stmt::WorkgroupBarrier);
        statements.push(Stmt::Assign(
            Expr::ident("dof_buffer")
                .index(Expr::ident("par_mb_nr"))
                .index(Expr::ident("chunk_dof")),
            Expr::ident("fluxes_on_faces").index(
                Expr::ident("global_mb_facedof_base")
                    .add(Expr::ident("chunk_start_el").mul(Expr::ident("FACE_DOFS_PER_EL")))
                    .add(Expr::u32(load_chunk_start as u64))
                    .add(Expr::ident("chunk_dof")),
            ),
        ));
        statements.push(Stmt::WorkgroupBarrier);

        for dof in load_chunk_start..(load_chunk_start + plan.chunk_size).min(face_dofs) {
            statements.push(Stmt::AddAssign(
                Expr::ident("result"),
                Expr::ident("smem_lift_mat")
                    .index(
                        Expr::ident("chunk_dof")
                            .mul(Expr::ident("LIFTMAT_COLUMNS"))
                            .add(Expr::u32(dof as u64)),
                    )
                    .mul(
                        Expr::ident("dof_buffer")
                            .index(Expr::ident("par_mb_nr"))
                            .index(Expr::u32((dof - load_chunk_start) as u64)),
                    ),
            ));
        }
        load_chunk_start += plan.chunk_size;
    }
    statements
}

/// Direct path: fetch every multiply term straight from the flux buffer.
/// Used for chunks whose dof range spans several elements.
fn direct_fetch_mat_mul(plan: &LiftPlan) -> Vec<Stmt> {
    (0..plan.face_dofs_per_el())
        .map(|j| {
            Stmt::AddAssign(
                Expr::ident("result"),
                Expr::ident("fluxes_on_faces")
                    .index(
                        Expr::ident("global_mb_facedof_base")
                            .add(Expr::ident("dof_el").mul(Expr::ident("FACE_DOFS_PER_EL")))
                            .add(Expr::u32(j as u64)),
                    )
                    .mul(
                        Expr::ident("smem_lift_mat").index(
                            Expr::ident("chunk_dof")
                                .mul(Expr::ident("LIFTMAT_COLUMNS"))
                                .add(Expr::u32(j as u64)),
                        ),
                    ),
            )
        })
        .collect()
}

/// Chunked matrix layout: the matrix stacked once per microblock element,
/// columns padded to the odd column count, sliced into chunk_size-row
/// tiles, each tile padded to the aligned tile stride.
fn chunked_matrix_data(matrix: &Mat<f64>, plan: &LiftPlan) -> Vec<f32> {
    let rows_total = plan.dofs_per_microblock();
    let mut data = vec![0.0f32; plan.chunks_per_microblock() * plan.matrix_chunk_floats];

    for row in 0..rows_total {
        let el_dof = row % plan.dofs_per_el;
        let chunk = row / plan.chunk_size;
        let row_in_chunk = row % plan.chunk_size;
        for col in 0..matrix.ncols() {
            data[chunk * plan.matrix_chunk_floats + row_in_chunk * plan.matrix_columns + col] =
                matrix[(el_dof, col)] as f32;
        }
    }
    data
}

// ---------------------------------------------------------------------
// Whole-microblock variant
// ---------------------------------------------------------------------

fn whole_microblock_kernel(
    matrix: &Mat<f64>,
    plan: &LiftPlan,
    is_lift: bool,
    debug: bool,
) -> KernelSource {
    let mut module = Module::new();
    module.push(Item::Comment(format!(
        "lifting kernel, whole-microblock staging: parallelism ({}, {})",
        plan.parallelism.p, plan.parallelism.s
    )));
    storage_bindings(&mut module);
    module.push(Item::BlankLine);
    shared_constants(&mut module, plan);
    module.push(Item::ConstU32(
        "LIFTMAT_COLUMNS".into(),
        plan.matrix_columns as u64,
    ));
    module.push(Item::BlankLine);
    module.push(Item::WorkgroupVar {
        name: "smem_fluxes_on_faces".into(),
        ty: Type::array(
            Type::array(Type::F32, "ALIGNED_FACE_DOFS_PER_MB"),
            "PAR_MB_COUNT",
        ),
    });
    module.push(Item::BlankLine);

    let mut seq_body = vec![
        Stmt::Let(
            "global_mb_nr".into(),
            Expr::ident("wid.x")
                .mul(Expr::ident("PAR_MB_COUNT"))
                .mul(Expr::ident("SEQ_MB_COUNT"))
                .add(Expr::ident("seq_mb_number").mul(Expr::ident("PAR_MB_COUNT")))
                .add(Expr::ident("par_mb_nr")),
        ),
        Stmt::Comment("everybody needs to be done with the old data".into()),
        Stmt::WorkgroupBarrier,
        Stmt::For {
            variable: "i".into(),
            start: Expr::ident("mb_dof"),
            end: Expr::ident("ALIGNED_FACE_DOFS_PER_MB"),
            step: Expr::ident("ALIGNED_DOFS_PER_MB"),
            body: vec![Stmt::Assign(
                Expr::ident("smem_fluxes_on_faces")
                    .index(Expr::ident("par_mb_nr"))
                    .index(Expr::ident("i")),
                Expr::ident("fluxes_on_faces").index(
                    Expr::ident("global_mb_nr")
                        .mul(Expr::ident("ALIGNED_FACE_DOFS_PER_MB"))
                        .add(Expr::ident("i")),
                ),
            )],
        },
        Stmt::Comment("all the new data must be loaded".into()),
        Stmt::WorkgroupBarrier,
        Stmt::Var("result".into(), Expr::f32(0.0)),
    ];

    let mut guarded: Vec<Stmt> = (0..plan.face_dofs_per_el())
        .map(|j| {
            Stmt::AddAssign(
                Expr::ident("result"),
                Expr::ident("lift_mat")
                    .index(
                        Expr::ident("el_dof")
                            .mul(Expr::ident("LIFTMAT_COLUMNS"))
                            .add(Expr::u32(j as u64)),
                    )
                    .mul(
                        Expr::ident("smem_fluxes_on_faces")
                            .index(Expr::ident("par_mb_nr"))
                            .index(
                                Expr::ident("mb_el")
                                    .mul(Expr::ident("FACE_DOFS_PER_EL"))
                                    .add(Expr::u32(j as u64)),
                            ),
                    ),
            )
        })
        .collect();
    guarded.push(Stmt::Assign(
        Expr::ident("flux_out").index(
            Expr::ident("global_mb_nr")
                .mul(Expr::ident("ALIGNED_DOFS_PER_MB"))
                .add(Expr::ident("mb_dof")),
        ),
        scaled_result(is_lift, Expr::ident("mb_el")),
    ));
    seq_body.push(Stmt::If {
        condition: Expr::ident("mb_dof").lt(Expr::ident("DOFS_PER_MB")),
        then_body: guarded,
        else_body: vec![],
    });

    let mut body = vec![
        Stmt::Let("mb_dof".into(), Expr::ident("lid.x")),
        Stmt::Let("par_mb_nr".into(), Expr::ident("lid.y")),
        Stmt::Let("mb_el".into(), Expr::ident("mb_dof").div(Expr::ident("DOFS_PER_EL"))),
        Stmt::Let(
            "el_dof".into(),
            Expr::ident("mb_dof").sub(Expr::ident("mb_el").mul(Expr::ident("DOFS_PER_EL"))),
        ),
    ];
    if debug {
        body.push(Stmt::Let(
            "thread_num".into(),
            Expr::ident("mb_dof")
                .add(Expr::ident("par_mb_nr").mul(Expr::ident("ALIGNED_DOFS_PER_MB"))),
        ));
        body.extend(debug_stamp(debug, Expr::ident("mb_el")));
    }
    body.push(Stmt::For {
        variable: "seq_mb_number".into(),
        start: Expr::u32(0),
        end: Expr::ident("SEQ_MB_COUNT"),
        step: Expr::u32(1),
        body: seq_body,
    });

    module.push(Item::Function(Function {
        name: "apply_lift_mat_smem".into(),
        workgroup_size: plan.workgroup_size(),
        body,
    }));

    KernelSource {
        entry_point: "apply_lift_mat_smem",
        wgsl: module.render(),
        workgroup_size: plan.workgroup_size(),
        matrix_data: plain_matrix_data(matrix, plan),
        is_lift,
        plan: plan.clone(),
    }
}

/// Row-major matrix with columns padded to the odd column count; the
/// whole-microblock kernel indexes it per element dof directly.
fn plain_matrix_data(matrix: &Mat<f64>, plan: &LiftPlan) -> Vec<f32> {
    let mut data = vec![0.0f32; plan.dofs_per_el * plan.matrix_columns];
    for row in 0..matrix.nrows() {
        for col in 0..matrix.ncols() {
            data[row * plan.matrix_columns + col] = matrix[(row, col)] as f32;
        }
    }
    data
}
