//! Abstract syntax tree for the notebook's imperative language.

#[derive(Debug, Clone, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    /// Attribute access `a.b`; only the root name of `a` contributes to `refs`.
    Attribute(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>),
    /// `[expr for var in iter if cond]`; `var` is scoped to the comprehension.
    Comprehension {
        expr: Box<Expr>,
        var: AssignTarget,
        iter: Box<Expr>,
        cond: Option<Box<Expr>>,
    },
}

/// An assignment target: a plain name or a tuple/list destructuring pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Tuple(Vec<AssignTarget>),
}

impl AssignTarget {
    /// Every name this target binds, in left-to-right order.
    pub fn names(&self) -> Vec<String> {
        match self {
            AssignTarget::Name(n) => vec![n.clone()],
            AssignTarget::Tuple(items) => items.iter().flat_map(AssignTarget::names).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AugOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign(AssignTarget, Expr),
    AugAssign(String, AugOp, Expr),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: AssignTarget,
        iter: Expr,
        body: Vec<Stmt>,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    ClassDef {
        name: String,
        methods: Vec<Stmt>,
    },
    Import {
        module: String,
        alias: Option<String>,
    },
    FromImport {
        module: String,
        names: Vec<(String, Option<String>)>,
    },
    Return(Option<Expr>),
}

pub type Module = Vec<Stmt>;
