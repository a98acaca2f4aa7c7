//! The imperative analyzer: given cell source, returns `(defs, refs)`.
//!
//! Built as an AST walk over the same parser the executor uses — analysis
//! does not re-derive its own grammar. Parse failure yields `defs=∅, refs=∅`,
//! deferring the syntax error to execution time.

use std::collections::BTreeSet;

use crate::lang::ast::*;
use crate::lang::interpreter::is_builtin;
use crate::lang::parser::parse;

/// Returns `(defs, refs)` for an imperative cell body.
pub fn analyze(code: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let module = match parse(code) {
        Ok(m) => m,
        Err(_) => return (BTreeSet::new(), BTreeSet::new()),
    };
    let defs = collect_local_names(&module);
    let mut refs = BTreeSet::new();
    let mut stack = vec![defs.clone()];
    collect_refs_block(&module, &mut stack, &mut refs);
    (defs, refs)
}

/// Names bound at the top of `stmts`'s own scope: assignment/augmented-assignment
/// targets, for-loop variables, function/class names, and import bindings.
/// Recurses into `if`/`while`/`for` bodies (same scope) but stops at function/class
/// boundaries (those introduce their own nested scope).
fn collect_local_names(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for stmt in stmts {
        match stmt {
            Stmt::Expr(_) | Stmt::Return(_) => {}
            Stmt::Assign(target, _) => names.extend(target.names()),
            Stmt::AugAssign(name, _, _) => {
                names.insert(name.clone());
            }
            Stmt::If { branches, else_body } => {
                for (_, body) in branches {
                    names.extend(collect_local_names(body));
                }
                names.extend(collect_local_names(else_body));
            }
            Stmt::While { body, .. } => names.extend(collect_local_names(body)),
            Stmt::For { var, body, .. } => {
                names.extend(var.names());
                names.extend(collect_local_names(body));
            }
            Stmt::FunctionDef { name, .. } => {
                names.insert(name.clone());
            }
            Stmt::ClassDef { name, .. } => {
                names.insert(name.clone());
            }
            Stmt::Import { module, alias } => {
                let bound = alias.clone().unwrap_or_else(|| module.split('.').next().unwrap().to_string());
                names.insert(bound);
            }
            Stmt::FromImport { names: imports, .. } => {
                for (n, alias) in imports {
                    names.insert(alias.clone().unwrap_or_else(|| n.clone()));
                }
            }
        }
    }
    names
}

fn bound(stack: &[BTreeSet<String>], name: &str) -> bool {
    stack.iter().any(|scope| scope.contains(name))
}

fn collect_refs_block(stmts: &[Stmt], stack: &mut Vec<BTreeSet<String>>, refs: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Expr(e) => collect_refs_expr(e, stack, refs),
            Stmt::Assign(_, e) => collect_refs_expr(e, stack, refs),
            Stmt::AugAssign(_, _, e) => collect_refs_expr(e, stack, refs),
            Stmt::If { branches, else_body } => {
                for (cond, body) in branches {
                    collect_refs_expr(cond, stack, refs);
                    collect_refs_block(body, stack, refs);
                }
                collect_refs_block(else_body, stack, refs);
            }
            Stmt::While { cond, body } => {
                collect_refs_expr(cond, stack, refs);
                collect_refs_block(body, stack, refs);
            }
            Stmt::For { iter, body, .. } => {
                collect_refs_expr(iter, stack, refs);
                collect_refs_block(body, stack, refs);
            }
            Stmt::FunctionDef { params, body, .. } => {
                let mut scope = collect_local_names(body);
                scope.extend(params.iter().cloned());
                stack.push(scope);
                collect_refs_block(body, stack, refs);
                stack.pop();
            }
            Stmt::ClassDef { methods, .. } => {
                collect_refs_block(methods, stack, refs);
            }
            Stmt::Import { .. } | Stmt::FromImport { .. } => {}
            Stmt::Return(Some(e)) => collect_refs_expr(e, stack, refs),
            Stmt::Return(None) => {}
        }
    }
}

fn collect_refs_expr(expr: &Expr, stack: &mut Vec<BTreeSet<String>>, refs: &mut BTreeSet<String>) {
    match expr {
        Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Bool(_) | Expr::None => {}
        Expr::Name(n) => {
            if !bound(stack, n) && !is_builtin(n) {
                refs.insert(n.clone());
            }
        }
        Expr::List(items) | Expr::Tuple(items) => {
            for item in items {
                collect_refs_expr(item, stack, refs);
            }
        }
        Expr::Unary(_, inner) => collect_refs_expr(inner, stack, refs),
        Expr::Binary(_, l, r) => {
            collect_refs_expr(l, stack, refs);
            collect_refs_expr(r, stack, refs);
        }
        Expr::Index(base, idx) => {
            collect_refs_expr(base, stack, refs);
            collect_refs_expr(idx, stack, refs);
        }
        // Attribute access contributes only the root name, via `base`'s own walk.
        Expr::Attribute(base, _) => collect_refs_expr(base, stack, refs),
        Expr::Call(callee, args) => {
            collect_refs_expr(callee, stack, refs);
            for a in args {
                collect_refs_expr(a, stack, refs);
            }
        }
        Expr::Comprehension { expr, var, iter, cond } => {
            collect_refs_expr(iter, stack, refs);
            let mut scope = BTreeSet::new();
            scope.extend(var.names());
            stack.push(scope);
            collect_refs_expr(expr, stack, refs);
            if let Some(cond) = cond {
                collect_refs_expr(cond, stack, refs);
            }
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_assignment_defs_and_refs() {
        let (defs, refs) = analyze("y = x + 5\n");
        assert!(defs.contains("y"));
        assert!(refs.contains("x"));
        assert!(!refs.contains("y"));
    }

    #[test]
    fn parse_failure_yields_empty_sets() {
        let (defs, refs) = analyze("def (()\n");
        assert!(defs.is_empty());
        assert!(refs.is_empty());
    }

    #[test]
    fn function_params_are_not_free_refs() {
        let (defs, refs) = analyze("def add(a, b):\n    return a + b\nresult = add(1, 2)\n");
        assert!(defs.contains("add"));
        assert!(defs.contains("result"));
        assert!(!refs.contains("a"));
        assert!(!refs.contains("b"));
    }

    #[test]
    fn comprehension_variable_is_scoped() {
        let (_, refs) = analyze("xs = [i * 2 for i in ys]\n");
        assert!(refs.contains("ys"));
        assert!(!refs.contains("i"));
    }

    #[test]
    fn attribute_access_contributes_root_name_only() {
        let (_, refs) = analyze("y = conn.cursor\n");
        assert!(refs.contains("conn"));
        assert!(!refs.contains("cursor"));
    }

    #[test]
    fn builtins_never_appear_in_refs_or_defs() {
        let (defs, refs) = analyze("n = len(xs)\n");
        assert!(!refs.contains("len"));
        assert!(!defs.contains("len"));
    }

    #[test]
    fn import_binds_a_name() {
        let (defs, _) = analyze("import json as j\n");
        assert!(defs.contains("j"));
    }
}
