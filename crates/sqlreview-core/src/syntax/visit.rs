//! Expression walking that stops at query boundaries.
//!
//! Subqueries become their own `Query` nodes in the syntax tree, so a rule
//! inspecting a WHERE clause only sees the expressions of that clause.

use sqlparser::ast::*;

/// Visits `expr` and its children, without descending into subqueries.
pub fn walk_expr<'a, F: FnMut(&'a Expr)>(expr: &'a Expr, visitor: &mut F) {
    visitor(expr);
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::Cast { expr: inner, .. }
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::InSubquery { expr: inner, .. } => walk_expr(inner, visitor),
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            walk_expr(expr, visitor);
            walk_expr(pattern, visitor);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, visitor);
            walk_expr(low, visitor);
            walk_expr(high, visitor);
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(expr, visitor);
            for item in list {
                walk_expr(item, visitor);
            }
        }
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                walk_expr(operand, visitor);
            }
            for case_when in conditions {
                walk_expr(&case_when.condition, visitor);
                walk_expr(&case_when.result, visitor);
            }
            if let Some(else_result) = else_result {
                walk_expr(else_result, visitor);
            }
        }
        Expr::Function(func) => {
            if let FunctionArguments::List(arg_list) = &func.args {
                for arg in &arg_list.args {
                    match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
                        | FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(expr),
                            ..
                        } => walk_expr(expr, visitor),
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }
}

/// Returns the subqueries directly reachable from `expr`.
pub fn subqueries_in_expr(expr: &Expr) -> Vec<&Query> {
    let mut queries = Vec::new();
    walk_expr(expr, &mut |e| match e {
        Expr::Subquery(query)
        | Expr::InSubquery {
            subquery: query, ..
        }
        | Expr::Exists {
            subquery: query, ..
        } => queries.push(query.as_ref()),
        _ => {}
    });
    queries
}

/// Line of the first identifier in `expr`, if the parser recorded one.
pub fn expr_line(expr: &Expr) -> Option<usize> {
    let mut line = None;
    walk_expr(expr, &mut |e| {
        let found = match e {
            Expr::Identifier(ident) => ident.span.start.line,
            Expr::CompoundIdentifier(idents) => {
                idents.first().map_or(0, |ident| ident.span.start.line)
            }
            _ => 0,
        };
        if found > 0 {
            let found = found as usize;
            line = Some(line.map_or(found, |current: usize| current.min(found)));
        }
    });
    line
}
