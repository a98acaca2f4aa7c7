//! Tree-walking interpreter for the notebook's imperative language.
//!
//! Runs directly against the namespace: at module top level both globals and
//! locals are the same scope. Function bodies get their own local scope that
//! falls back to the enclosing scope for reads (assignment always binds
//! locally, matching the language's implicit-`global`-at-top-level,
//! local-in-functions binding rule, which is why the analyzer's defs/refs
//! split is a static approximation of this runtime behavior).

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::value::Value;

use super::ast::*;

#[derive(Debug, Clone)]
pub enum RuntimeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RuntimeValue>),
    Tuple(Vec<RuntimeValue>),
    Function(Rc<FunctionValue>),
    /// A builtin referenced as a bare name (used as an `isinstance` type tag).
    Builtin(&'static str),
    /// A class declaration; instances are not modeled, only the declaration itself.
    Class(Rc<ClassValue>),
}

#[derive(Debug)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ClassValue {
    pub name: String,
    pub methods: HashMap<String, Rc<FunctionValue>>,
}

impl RuntimeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::Null => "NoneType",
            RuntimeValue::Bool(_) => "bool",
            RuntimeValue::Int(_) => "int",
            RuntimeValue::Float(_) => "float",
            RuntimeValue::Str(_) => "str",
            RuntimeValue::List(_) => "list",
            RuntimeValue::Tuple(_) => "tuple",
            RuntimeValue::Function(_) => "function",
            RuntimeValue::Builtin(_) => "builtin_function_or_method",
            RuntimeValue::Class(_) => "type",
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            RuntimeValue::Null => false,
            RuntimeValue::Bool(b) => *b,
            RuntimeValue::Int(i) => *i != 0,
            RuntimeValue::Float(f) => *f != 0.0,
            RuntimeValue::Str(s) => !s.is_empty(),
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => !items.is_empty(),
            RuntimeValue::Function(_) | RuntimeValue::Class(_) | RuntimeValue::Builtin(_) => true,
        }
    }

    fn repr(&self) -> String {
        match self {
            RuntimeValue::Null => "None".to_string(),
            RuntimeValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            RuntimeValue::Int(i) => i.to_string(),
            RuntimeValue::Float(f) => f.to_string(),
            RuntimeValue::Str(s) => s.clone(),
            RuntimeValue::List(items) => {
                let inner: Vec<String> = items.iter().map(RuntimeValue::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            RuntimeValue::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(RuntimeValue::repr).collect();
                format!("({})", inner.join(", "))
            }
            RuntimeValue::Function(f) => format!("<function {}>", f.name),
            RuntimeValue::Builtin(name) => format!("<builtin {name}>"),
            RuntimeValue::Class(c) => format!("<class {}>", c.name),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RuntimeValue::Null => Value::Null,
            RuntimeValue::Bool(b) => Value::Bool(*b),
            RuntimeValue::Int(i) => Value::Int(*i),
            RuntimeValue::Float(f) => Value::Float(*f),
            RuntimeValue::Str(s) => Value::Str(s.clone()),
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => {
                Value::List(items.iter().map(RuntimeValue::to_value).collect())
            }
            other => Value::Other(other.repr()),
        }
    }

    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Null => RuntimeValue::Null,
            Value::Bool(b) => RuntimeValue::Bool(*b),
            Value::Int(i) => RuntimeValue::Int(*i),
            Value::Float(f) => RuntimeValue::Float(*f),
            Value::Str(s) => RuntimeValue::Str(s.clone()),
            Value::List(items) => RuntimeValue::List(items.iter().map(RuntimeValue::from_value).collect()),
            Value::Other(repr) => RuntimeValue::Str(repr.clone()),
        }
    }
}

const BUILTINS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "bool", "list", "tuple", "abs", "min", "max",
    "sum", "sorted", "enumerate", "zip", "type", "isinstance",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

enum Flow {
    Normal,
    Return(RuntimeValue),
}

/// A single call frame: local bindings plus a reference to the scope beneath it
/// for reads that miss locally (module globals, for function bodies).
struct Scope<'a> {
    locals: HashMap<String, RuntimeValue>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn get(&self, name: &str) -> Option<RuntimeValue> {
        if let Some(v) = self.locals.get(name) {
            return Some(v.clone());
        }
        self.parent.and_then(|p| p.get(name))
    }
}

pub struct Interpreter {
    pub globals: HashMap<String, RuntimeValue>,
    pub stdout: Vec<String>,
}

impl Interpreter {
    pub fn new(globals: HashMap<String, RuntimeValue>) -> Self {
        Self { globals, stdout: Vec::new() }
    }

    pub fn run(&mut self, module: &Module) -> Result<()> {
        let mut scope = Scope { locals: std::mem::take(&mut self.globals), parent: None };
        let flow = self.exec_block(module, &mut scope)?;
        self.globals = scope.locals;
        if let Flow::Return(_) = flow {
            // `return` at module top level is a no-op; nothing to propagate to.
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &mut Scope) -> Result<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut Scope) -> Result<Flow> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval(e, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign(target, expr) => {
                let value = self.eval(expr, scope)?;
                self.bind_target(target, value, scope)?;
                Ok(Flow::Normal)
            }
            Stmt::AugAssign(name, op, expr) => {
                let current = scope
                    .get(name)
                    .ok_or_else(|| Error::NameNotDefined(name.clone()))?;
                let rhs = self.eval(expr, scope)?;
                let op = match op {
                    AugOp::Add => BinOp::Add,
                    AugOp::Sub => BinOp::Sub,
                    AugOp::Mul => BinOp::Mul,
                    AugOp::Div => BinOp::Div,
                };
                let result = apply_binop(&op, &current, &rhs)?;
                scope.locals.insert(name.clone(), result);
                Ok(Flow::Normal)
            }
            Stmt::If { branches, else_body } => {
                for (cond, body) in branches {
                    if self.eval(cond, scope)?.is_truthy() {
                        return self.exec_block(body, scope);
                    }
                }
                self.exec_block(else_body, scope)
            }
            Stmt::While { cond, body } => {
                while self.eval(cond, scope)?.is_truthy() {
                    match self.exec_block(body, scope)? {
                        Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { var, iter, body } => {
                let items = self.eval_iterable(iter, scope)?;
                for item in items {
                    self.bind_target(var, item, scope)?;
                    match self.exec_block(body, scope)? {
                        Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDef { name, params, body } => {
                let f = RuntimeValue::Function(Rc::new(FunctionValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                }));
                scope.locals.insert(name.clone(), f);
                Ok(Flow::Normal)
            }
            Stmt::ClassDef { name, methods } => {
                let mut table = HashMap::new();
                for m in methods {
                    if let Stmt::FunctionDef { name: mname, params, body } = m {
                        table.insert(
                            mname.clone(),
                            Rc::new(FunctionValue { name: mname.clone(), params: params.clone(), body: body.clone() }),
                        );
                    }
                }
                scope
                    .locals
                    .insert(name.clone(), RuntimeValue::Class(Rc::new(ClassValue { name: name.clone(), methods: table })));
                Ok(Flow::Normal)
            }
            Stmt::Import { module, alias } => {
                let bound = alias.clone().unwrap_or_else(|| module.split('.').next().unwrap().to_string());
                scope.locals.insert(bound, RuntimeValue::Str(format!("<module {module}>")));
                Ok(Flow::Normal)
            }
            Stmt::FromImport { module, names } => {
                for (n, alias) in names {
                    let bound = alias.clone().unwrap_or_else(|| n.clone());
                    scope.locals.insert(bound, RuntimeValue::Str(format!("<from {module} import {n}>")));
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e, scope)?,
                    None => RuntimeValue::Null,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    fn bind_target(&mut self, target: &AssignTarget, value: RuntimeValue, scope: &mut Scope) -> Result<()> {
        match target {
            AssignTarget::Name(n) => {
                scope.locals.insert(n.clone(), value);
                Ok(())
            }
            AssignTarget::Tuple(items) => {
                let values = match value {
                    RuntimeValue::List(v) | RuntimeValue::Tuple(v) => v,
                    other => return Err(Error::AnalysisError(format!("cannot destructure {}", other.type_name()))),
                };
                if values.len() != items.len() {
                    return Err(Error::AnalysisError(format!(
                        "destructuring assignment mismatch: {} targets, {} values",
                        items.len(),
                        values.len()
                    )));
                }
                for (t, v) in items.iter().zip(values.into_iter()) {
                    self.bind_target(t, v, scope)?;
                }
                Ok(())
            }
        }
    }

    fn eval_iterable(&mut self, expr: &Expr, scope: &mut Scope) -> Result<Vec<RuntimeValue>> {
        match self.eval(expr, scope)? {
            RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items),
            RuntimeValue::Str(s) => Ok(s.chars().map(|c| RuntimeValue::Str(c.to_string())).collect()),
            other => Err(Error::AnalysisError(format!("'{}' object is not iterable", other.type_name()))),
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &mut Scope) -> Result<RuntimeValue> {
        match expr {
            Expr::Int(v) => Ok(RuntimeValue::Int(*v)),
            Expr::Float(v) => Ok(RuntimeValue::Float(*v)),
            Expr::Str(v) => Ok(RuntimeValue::Str(v.clone())),
            Expr::Bool(v) => Ok(RuntimeValue::Bool(*v)),
            Expr::None => Ok(RuntimeValue::Null),
            Expr::Name(n) => {
                if let Some(v) = scope.get(n) {
                    return Ok(v);
                }
                if is_builtin(n) {
                    return Ok(RuntimeValue::Builtin(BUILTINS.iter().find(|b| **b == n).unwrap()));
                }
                Err(Error::NameNotDefined(n.clone()))
            }
            Expr::List(items) => {
                let values = items.iter().map(|e| self.eval(e, scope)).collect::<Result<_>>()?;
                Ok(RuntimeValue::List(values))
            }
            Expr::Tuple(items) => {
                let values = items.iter().map(|e| self.eval(e, scope)).collect::<Result<_>>()?;
                Ok(RuntimeValue::Tuple(values))
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner, scope)?;
                match op {
                    UnaryOp::Not => Ok(RuntimeValue::Bool(!v.is_truthy())),
                    UnaryOp::Neg => match v {
                        RuntimeValue::Int(i) => Ok(RuntimeValue::Int(-i)),
                        RuntimeValue::Float(f) => Ok(RuntimeValue::Float(-f)),
                        other => Err(Error::AnalysisError(format!("bad operand for unary -: '{}'", other.type_name()))),
                    },
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                if matches!(op, BinOp::And) {
                    let l = self.eval(lhs, scope)?;
                    if !l.is_truthy() {
                        return Ok(l);
                    }
                    return self.eval(rhs, scope);
                }
                if matches!(op, BinOp::Or) {
                    let l = self.eval(lhs, scope)?;
                    if l.is_truthy() {
                        return Ok(l);
                    }
                    return self.eval(rhs, scope);
                }
                let l = self.eval(lhs, scope)?;
                let r = self.eval(rhs, scope)?;
                apply_binop(op, &l, &r)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base, scope)?;
                let index = self.eval(index, scope)?;
                match (&base, &index) {
                    (RuntimeValue::List(items) | RuntimeValue::Tuple(items), RuntimeValue::Int(i)) => {
                        let idx = normalize_index(*i, items.len())?;
                        Ok(items[idx].clone())
                    }
                    (RuntimeValue::Str(s), RuntimeValue::Int(i)) => {
                        let chars: Vec<char> = s.chars().collect();
                        let idx = normalize_index(*i, chars.len())?;
                        Ok(RuntimeValue::Str(chars[idx].to_string()))
                    }
                    _ => Err(Error::AnalysisError(format!(
                        "'{}' object is not subscriptable by '{}'",
                        base.type_name(),
                        index.type_name()
                    ))),
                }
            }
            Expr::Attribute(base, _name) => {
                // Only the root name contributes to refs; attribute values on
                // a minimal evaluator have no general object model, so the
                // base is evaluated for side effects/name resolution only.
                self.eval(base, scope)
            }
            Expr::Call(callee, args) => self.eval_call(callee, args, scope),
            Expr::Comprehension { expr, var, iter, cond } => {
                let items = self.eval_iterable(iter, scope)?;
                let mut result = Vec::new();
                let mut child = Scope { locals: HashMap::new(), parent: Some(scope) };
                for item in items {
                    // Re-borrow scope chain: bind in the child's own locals.
                    bind_in_scope(var, item, &mut child)?;
                    if let Some(cond) = cond {
                        if !self.eval(cond, &mut child)?.is_truthy() {
                            continue;
                        }
                    }
                    result.push(self.eval(expr, &mut child)?);
                }
                Ok(RuntimeValue::List(result))
            }
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &mut Scope) -> Result<RuntimeValue> {
        let arg_values = args.iter().map(|a| self.eval(a, scope)).collect::<Result<Vec<_>>>()?;

        if let Expr::Name(name) = callee {
            if is_builtin(name) && scope.get(name).is_none() {
                return self.call_builtin(name, arg_values);
            }
        }

        let callee_value = self.eval(callee, scope)?;
        match callee_value {
            RuntimeValue::Function(f) => self.call_function(&f, arg_values),
            RuntimeValue::Builtin(name) => self.call_builtin(name, arg_values),
            RuntimeValue::Class(c) => Ok(RuntimeValue::Str(format!("<{} instance>", c.name))),
            other => Err(Error::AnalysisError(format!("'{}' object is not callable", other.type_name()))),
        }
    }

    fn call_function(&mut self, f: &FunctionValue, args: Vec<RuntimeValue>) -> Result<RuntimeValue> {
        let mut locals = HashMap::new();
        for (param, value) in f.params.iter().zip(args.into_iter()) {
            locals.insert(param.clone(), value);
        }
        // Function bodies read through to module globals but write locally.
        let globals_snapshot = Scope { locals: self.globals.clone(), parent: None };
        let mut call_scope = Scope { locals, parent: Some(&globals_snapshot) };
        match self.exec_block(&f.body, &mut call_scope)? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(RuntimeValue::Null),
        }
    }

    fn call_builtin(&mut self, name: &str, args: Vec<RuntimeValue>) -> Result<RuntimeValue> {
        match name {
            "print" => {
                let mut line = String::new();
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    let _ = write!(line, "{}", a.repr());
                }
                self.stdout.push(line);
                Ok(RuntimeValue::Null)
            }
            "len" => match args.first() {
                Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => Ok(RuntimeValue::Int(items.len() as i64)),
                Some(RuntimeValue::Str(s)) => Ok(RuntimeValue::Int(s.chars().count() as i64)),
                _ => Err(Error::AnalysisError("len() expects a sized argument".into())),
            },
            "range" => {
                let (start, stop, step) = match args.as_slice() {
                    [RuntimeValue::Int(stop)] => (0, *stop, 1),
                    [RuntimeValue::Int(start), RuntimeValue::Int(stop)] => (*start, *stop, 1),
                    [RuntimeValue::Int(start), RuntimeValue::Int(stop), RuntimeValue::Int(step)] => (*start, *stop, *step),
                    _ => return Err(Error::AnalysisError("range() expects 1-3 integer arguments".into())),
                };
                if step == 0 {
                    return Err(Error::AnalysisError("range() step must not be zero".into()));
                }
                let mut out = Vec::new();
                let mut i = start;
                if step > 0 {
                    while i < stop {
                        out.push(RuntimeValue::Int(i));
                        i += step;
                    }
                } else {
                    while i > stop {
                        out.push(RuntimeValue::Int(i));
                        i += step;
                    }
                }
                Ok(RuntimeValue::List(out))
            }
            "str" => Ok(RuntimeValue::Str(args.first().map(RuntimeValue::repr).unwrap_or_default())),
            "int" => match args.first() {
                Some(RuntimeValue::Int(i)) => Ok(RuntimeValue::Int(*i)),
                Some(RuntimeValue::Float(f)) => Ok(RuntimeValue::Int(*f as i64)),
                Some(RuntimeValue::Bool(b)) => Ok(RuntimeValue::Int(*b as i64)),
                Some(RuntimeValue::Str(s)) => s
                    .trim()
                    .parse::<i64>()
                    .map(RuntimeValue::Int)
                    .map_err(|_| Error::AnalysisError(format!("invalid literal for int(): '{s}'"))),
                _ => Err(Error::AnalysisError("int() expects a numeric or string argument".into())),
            },
            "float" => match args.first() {
                Some(RuntimeValue::Int(i)) => Ok(RuntimeValue::Float(*i as f64)),
                Some(RuntimeValue::Float(f)) => Ok(RuntimeValue::Float(*f)),
                Some(RuntimeValue::Str(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map(RuntimeValue::Float)
                    .map_err(|_| Error::AnalysisError(format!("invalid literal for float(): '{s}'"))),
                _ => Err(Error::AnalysisError("float() expects a numeric or string argument".into())),
            },
            "bool" => Ok(RuntimeValue::Bool(args.first().map(RuntimeValue::is_truthy).unwrap_or(false))),
            "list" => match args.first() {
                Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => Ok(RuntimeValue::List(items.clone())),
                None => Ok(RuntimeValue::List(Vec::new())),
                _ => Err(Error::AnalysisError("list() expects an iterable argument".into())),
            },
            "tuple" => match args.first() {
                Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => Ok(RuntimeValue::Tuple(items.clone())),
                None => Ok(RuntimeValue::Tuple(Vec::new())),
                _ => Err(Error::AnalysisError("tuple() expects an iterable argument".into())),
            },
            "abs" => match args.first() {
                Some(RuntimeValue::Int(i)) => Ok(RuntimeValue::Int(i.abs())),
                Some(RuntimeValue::Float(f)) => Ok(RuntimeValue::Float(f.abs())),
                _ => Err(Error::AnalysisError("abs() expects a numeric argument".into())),
            },
            "min" | "max" => {
                let items = flatten_variadic(&args)?;
                if items.is_empty() {
                    return Err(Error::AnalysisError(format!("{name}() arg is an empty sequence")));
                }
                let mut best = items[0].clone();
                for item in &items[1..] {
                    let less = numeric_less_than(item, &best)?;
                    if (name == "min" && less) || (name == "max" && !less && !values_equal(item, &best)) {
                        best = item.clone();
                    }
                }
                Ok(best)
            }
            "sum" => {
                let items = match args.first() {
                    Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => items.clone(),
                    _ => return Err(Error::AnalysisError("sum() expects an iterable argument".into())),
                };
                let mut total = RuntimeValue::Int(0);
                for item in &items {
                    total = apply_binop(&BinOp::Add, &total, item)?;
                }
                Ok(total)
            }
            "sorted" => {
                let mut items = match args.first() {
                    Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => items.clone(),
                    _ => return Err(Error::AnalysisError("sorted() expects an iterable argument".into())),
                };
                items.sort_by(|a, b| {
                    numeric_less_than(a, b)
                        .map(|less| if less { std::cmp::Ordering::Less } else { std::cmp::Ordering::Greater })
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(RuntimeValue::List(items))
            }
            "enumerate" => {
                let items = match args.first() {
                    Some(RuntimeValue::List(items) | RuntimeValue::Tuple(items)) => items.clone(),
                    _ => return Err(Error::AnalysisError("enumerate() expects an iterable argument".into())),
                };
                let out = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| RuntimeValue::Tuple(vec![RuntimeValue::Int(i as i64), v]))
                    .collect();
                Ok(RuntimeValue::List(out))
            }
            "zip" => {
                let lists: Vec<Vec<RuntimeValue>> = args
                    .iter()
                    .map(|a| match a {
                        RuntimeValue::List(items) | RuntimeValue::Tuple(items) => Ok(items.clone()),
                        _ => Err(Error::AnalysisError("zip() expects iterable arguments".into())),
                    })
                    .collect::<Result<_>>()?;
                let len = lists.iter().map(Vec::len).min().unwrap_or(0);
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    out.push(RuntimeValue::Tuple(lists.iter().map(|l| l[i].clone()).collect()));
                }
                Ok(RuntimeValue::List(out))
            }
            "type" => Ok(RuntimeValue::Str(args.first().map(RuntimeValue::type_name).unwrap_or("NoneType").to_string())),
            "isinstance" => {
                let value = args.first().ok_or_else(|| Error::AnalysisError("isinstance() expects 2 arguments".into()))?;
                let type_name = match args.get(1) {
                    Some(RuntimeValue::Builtin(name)) => *name,
                    Some(RuntimeValue::Str(s)) => s.as_str(),
                    _ => return Err(Error::AnalysisError("isinstance() expects a type argument".into())),
                };
                Ok(RuntimeValue::Bool(value.type_name() == type_name))
            }
            other => Err(Error::NameNotDefined(other.to_string())),
        }
    }
}

fn bind_in_scope(target: &AssignTarget, value: RuntimeValue, scope: &mut Scope) -> Result<()> {
    match target {
        AssignTarget::Name(n) => {
            scope.locals.insert(n.clone(), value);
            Ok(())
        }
        AssignTarget::Tuple(items) => {
            let values = match value {
                RuntimeValue::List(v) | RuntimeValue::Tuple(v) => v,
                other => return Err(Error::AnalysisError(format!("cannot destructure {}", other.type_name()))),
            };
            for (t, v) in items.iter().zip(values.into_iter()) {
                bind_in_scope(t, v, scope)?;
            }
            Ok(())
        }
    }
}

fn normalize_index(i: i64, len: usize) -> Result<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 || idx as usize >= len {
        return Err(Error::AnalysisError("index out of range".into()));
    }
    Ok(idx as usize)
}

fn flatten_variadic(args: &[RuntimeValue]) -> Result<Vec<RuntimeValue>> {
    if args.len() == 1 {
        if let RuntimeValue::List(items) | RuntimeValue::Tuple(items) = &args[0] {
            return Ok(items.clone());
        }
    }
    Ok(args.to_vec())
}

fn as_f64(v: &RuntimeValue) -> Result<f64> {
    match v {
        RuntimeValue::Int(i) => Ok(*i as f64),
        RuntimeValue::Float(f) => Ok(*f),
        RuntimeValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(Error::AnalysisError(format!("expected a number, found '{}'", other.type_name()))),
    }
}

fn numeric_less_than(a: &RuntimeValue, b: &RuntimeValue) -> Result<bool> {
    match (a, b) {
        (RuntimeValue::Str(x), RuntimeValue::Str(y)) => Ok(x < y),
        _ => Ok(as_f64(a)? < as_f64(b)?),
    }
}

fn values_equal(a: &RuntimeValue, b: &RuntimeValue) -> bool {
    match (a, b) {
        (RuntimeValue::Str(x), RuntimeValue::Str(y)) => x == y,
        _ => as_f64(a).ok() == as_f64(b).ok(),
    }
}

fn apply_binop(op: &BinOp, l: &RuntimeValue, r: &RuntimeValue) -> Result<RuntimeValue> {
    use RuntimeValue::*;
    match op {
        BinOp::Add => match (l, r) {
            (Int(a), Int(b)) => Ok(Int(a + b)),
            (Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
            (List(a), List(b)) => Ok(List(a.iter().chain(b.iter()).cloned().collect())),
            _ => Ok(Float(as_f64(l)? + as_f64(r)?)),
        },
        BinOp::Sub => match (l, r) {
            (Int(a), Int(b)) => Ok(Int(a - b)),
            _ => Ok(Float(as_f64(l)? - as_f64(r)?)),
        },
        BinOp::Mul => match (l, r) {
            (Int(a), Int(b)) => Ok(Int(a * b)),
            (Str(a), Int(b)) | (Int(b), Str(a)) => Ok(Str(a.repeat((*b).max(0) as usize))),
            _ => Ok(Float(as_f64(l)? * as_f64(r)?)),
        },
        BinOp::Div => {
            let b = as_f64(r)?;
            if b == 0.0 {
                return Err(Error::AnalysisError("division by zero".into()));
            }
            Ok(Float(as_f64(l)? / b))
        }
        BinOp::Mod => match (l, r) {
            (Int(a), Int(b)) if *b != 0 => Ok(Int(a.rem_euclid(*b))),
            _ => Err(Error::AnalysisError("unsupported operand type(s) for %".into())),
        },
        BinOp::Eq => Ok(Bool(values_equal(l, r) || repr_eq(l, r))),
        BinOp::NotEq => Ok(Bool(!(values_equal(l, r) || repr_eq(l, r)))),
        BinOp::Lt => Ok(Bool(numeric_less_than(l, r)?)),
        BinOp::LtEq => Ok(Bool(numeric_less_than(l, r)? || values_equal(l, r))),
        BinOp::Gt => Ok(Bool(!numeric_less_than(l, r)? && !values_equal(l, r))),
        BinOp::GtEq => Ok(Bool(!numeric_less_than(l, r)?)),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled in eval"),
    }
}

fn repr_eq(l: &RuntimeValue, r: &RuntimeValue) -> bool {
    matches!((l, r), (RuntimeValue::Null, RuntimeValue::Null)) || l.repr() == r.repr() && l.type_name() == r.type_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::parser::parse;

    fn run_source(src: &str) -> Interpreter {
        let module = parse(src).unwrap();
        let mut interp = Interpreter::new(HashMap::new());
        interp.run(&module).unwrap();
        interp
    }

    #[test]
    fn simple_assignment_and_arithmetic() {
        let interp = run_source("x = 10\ny = x + 5\nz = y * 2\n");
        assert!(matches!(interp.globals.get("x"), Some(RuntimeValue::Int(10))));
        assert!(matches!(interp.globals.get("y"), Some(RuntimeValue::Int(15))));
        assert!(matches!(interp.globals.get("z"), Some(RuntimeValue::Int(30))));
    }

    #[test]
    fn print_writes_to_stdout_buffer() {
        let interp = run_source("print(\"hello\", 1)\n");
        assert_eq!(interp.stdout, vec!["hello 1".to_string()]);
    }

    #[test]
    fn name_not_defined_is_reported() {
        let module = parse("y = undefined_name\n").unwrap();
        let mut interp = Interpreter::new(HashMap::new());
        let err = interp.run(&module).unwrap_err();
        assert!(matches!(err, Error::NameNotDefined(n) if n == "undefined_name"));
    }

    #[test]
    fn function_call_and_return() {
        let interp = run_source("def add(a, b):\n    return a + b\nresult = add(2, 3)\n");
        assert!(matches!(interp.globals.get("result"), Some(RuntimeValue::Int(5))));
    }

    #[test]
    fn for_loop_accumulates() {
        let interp = run_source("total = 0\nfor i in range(5):\n    total += i\n");
        assert!(matches!(interp.globals.get("total"), Some(RuntimeValue::Int(10))));
    }

    #[test]
    fn list_comprehension_scopes_its_variable() {
        let interp = run_source("ys = [1, 2, 3]\nxs = [i * 2 for i in ys if i > 1]\n");
        match interp.globals.get("xs") {
            Some(RuntimeValue::List(items)) => assert_eq!(items.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(interp.globals.get("i").is_none());
    }

    #[test]
    fn destructuring_assignment() {
        let interp = run_source("x, y = 1, 2\n");
        assert!(matches!(interp.globals.get("x"), Some(RuntimeValue::Int(1))));
        assert!(matches!(interp.globals.get("y"), Some(RuntimeValue::Int(2))));
    }
}
