//! A typed WGSL subset for building the lifting kernels.
//!
//! Kernel source is assembled as a small IR — declarations, shared-memory
//! allocations, loops, branches — and rendered to text as the final step.
//! Size parameters (dof counts, chunk sizes, lookup tables) enter the IR as
//! named compile-time constants, so the generator can check them for
//! consistency instead of splicing raw strings.

use std::fmt;

#[derive(Debug, Clone, Default)]
pub struct Module {
    items: Vec<Item>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn extend<I: IntoIterator<Item = Item>>(&mut self, items: I) {
        self.items.extend(items);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            item.render(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Comment(String),
    /// `const NAME: u32 = value;`
    ConstU32(String, u64),
    /// `const NAME = array<u32, N>(...);`
    ConstU32Array(String, Vec<u64>),
    /// `var<workgroup> name: ty;`
    WorkgroupVar { name: String, ty: Type },
    /// `@group(g) @binding(b) var<storage, access> name: ty;`
    StorageVar {
        name: String,
        ty: Type,
        group: u32,
        binding: u32,
        read_write: bool,
    },
    Function(Function),
    BlankLine,
}

impl Item {
    fn render(&self, out: &mut String) {
        match self {
            Item::Comment(text) => line(out, 0, &format!("// {}", text)),
            Item::ConstU32(name, value) => {
                line(out, 0, &format!("const {}: u32 = {}u;", name, value))
            }
            Item::ConstU32Array(name, values) => {
                let rendered: Vec<String> = values.iter().map(|v| format!("{}u", v)).collect();
                line(
                    out,
                    0,
                    &format!(
                        "const {} = array<u32, {}>({});",
                        name,
                        values.len(),
                        rendered.join(", ")
                    ),
                );
            }
            Item::WorkgroupVar { name, ty } => {
                line(out, 0, &format!("var<workgroup> {}: {};", name, ty))
            }
            Item::StorageVar {
                name,
                ty,
                group,
                binding,
                read_write,
            } => {
                let access = if *read_write { "read_write" } else { "read" };
                line(
                    out,
                    0,
                    &format!(
                        "@group({}) @binding({}) var<storage, {}> {}: {};",
                        group, binding, access, name, ty
                    ),
                );
            }
            Item::Function(function) => function.render(out),
            Item::BlankLine => out.push('\n'),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    F32,
    U32,
    Array(Box<Type>, String),
    RuntimeArray(Box<Type>),
}

impl Type {
    pub fn array(inner: Type, len: impl Into<String>) -> Self {
        Type::Array(Box::new(inner), len.into())
    }

    pub fn runtime_array(inner: Type) -> Self {
        Type::RuntimeArray(Box::new(inner))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::F32 => write!(f, "f32"),
            Type::U32 => write!(f, "u32"),
            Type::Array(inner, len) => write!(f, "array<{}, {}>", inner, len),
            Type::RuntimeArray(inner) => write!(f, "array<{}>", inner),
        }
    }
}

/// A compute entry point. Parameters are the two builtin id vectors the
/// kernels need.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub workgroup_size: (u32, u32, u32),
    pub body: Vec<Stmt>,
}

impl Function {
    fn render(&self, out: &mut String) {
        let (x, y, z) = self.workgroup_size;
        line(out, 0, &format!("@compute @workgroup_size({}, {}, {})", x, y, z));
        line(
            out,
            0,
            &format!(
                "fn {}(@builtin(local_invocation_id) lid: vec3<u32>, \
                 @builtin(workgroup_id) wid: vec3<u32>) {{",
                self.name
            ),
        );
        for stmt in &self.body {
            stmt.render(out, 1);
        }
        line(out, 0, "}");
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Comment(String),
    /// `let name = expr;`
    Let(String, Expr),
    /// `var name = expr;`
    Var(String, Expr),
    /// `lhs = rhs;`
    Assign(Expr, Expr),
    /// `lhs += rhs;`
    AddAssign(Expr, Expr),
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    /// `for (var name = start; name < end; name += step) { ... }`
    For {
        variable: String,
        start: Expr,
        end: Expr,
        step: Expr,
        body: Vec<Stmt>,
    },
    WorkgroupBarrier,
}

impl Stmt {
    fn render(&self, out: &mut String, depth: usize) {
        match self {
            Stmt::Comment(text) => line(out, depth, &format!("// {}", text)),
            Stmt::Let(name, expr) => line(out, depth, &format!("let {} = {};", name, expr)),
            Stmt::Var(name, expr) => line(out, depth, &format!("var {} = {};", name, expr)),
            Stmt::Assign(lhs, rhs) => line(out, depth, &format!("{} = {};", lhs, rhs)),
            Stmt::AddAssign(lhs, rhs) => line(out, depth, &format!("{} += {};", lhs, rhs)),
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                line(out, depth, &format!("if ({}) {{", condition));
                for stmt in then_body {
                    stmt.render(out, depth + 1);
                }
                if else_body.is_empty() {
                    line(out, depth, "}");
                } else {
                    line(out, depth, "} else {");
                    for stmt in else_body {
                        stmt.render(out, depth + 1);
                    }
                    line(out, depth, "}");
                }
            }
            Stmt::For {
                variable,
                start,
                end,
                step,
                body,
            } => {
                line(
                    out,
                    depth,
                    &format!(
                        "for (var {v} = {}; {v} < {}; {v} += {}) {{",
                        start,
                        end,
                        step,
                        v = variable
                    ),
                );
                for stmt in body {
                    stmt.render(out, depth + 1);
                }
                line(out, depth, "}");
            }
            Stmt::WorkgroupBarrier => line(out, depth, "workgroupBarrier();"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String),
    LitU32(u64),
    LitF32(f64),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn u32(value: u64) -> Self {
        Expr::LitU32(value)
    }

    pub fn f32(value: f64) -> Self {
        Expr::LitF32(value)
    }

    pub fn binary(op: &'static str, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn add(self, rhs: Expr) -> Self {
        Expr::binary("+", self, rhs)
    }

    pub fn sub(self, rhs: Expr) -> Self {
        Expr::binary("-", self, rhs)
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Expr::binary("*", self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        Expr::binary("/", self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Expr::binary("<", self, rhs)
    }

    pub fn eq(self, rhs: Expr) -> Self {
        Expr::binary("==", self, rhs)
    }

    pub fn index(self, idx: Expr) -> Self {
        Expr::Index(Box::new(self), Box::new(idx))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::LitU32(value) => write!(f, "{}u", value),
            Expr::LitF32(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{:.1}", value)
                } else {
                    write!(f, "{:e}", value)
                }
            }
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Index(base, idx) => write!(f, "{}[{}]", base, idx),
            Expr::Call(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str("    ");
    }
    out.push_str(text);
    out.push('\n');
}
