//! The closed AST node family from spec.md §3.4.

use sisp_scope::{RibId, ScopeTree};
use sisp_util::{Span, Symbol};

/// The type lattice is closed — no subtyping, no inference (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int64,
    Float64,
    Bool,
    Void,
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Type::Int64 => "int",
            Type::Float64 => "float",
            Type::Bool => "bool",
            Type::Void => "void",
        };
        f.write_str(name)
    }
}

/// An expression node. `scope` fields are non-owning [`RibId`] back-refs
/// into the enclosing `Function`'s `ScopeTree`, captured at parse time
/// (spec.md §4.2's "scope installation").
#[derive(Debug, Clone)]
pub enum Expr {
    IntegerLiteral { value: i64, span: Span },
    FloatLiteral { value: f64, span: Span },
    Variable { name: Symbol, span: Span, scope: RibId },
    Var { name: Symbol, ty: Type, init: Option<Box<Expr>>, span: Span, scope: RibId },
    Binary { op: char, lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
    Unary { op: char, operand: Box<Expr>, span: Span },
    Call { callee: Symbol, args: Vec<Expr>, span: Span },
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr>, span: Span },
    For { var: Box<Expr>, end: Box<Expr>, step: Option<Box<Expr>>, body: Box<Expr>, span: Span },
    Compound { exprs: Vec<Expr>, scope: RibId, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntegerLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Var { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::If { span, .. }
            | Expr::For { span, .. }
            | Expr::Compound { span, .. } => *span,
        }
    }
}

/// Whether a prototype declares an overloaded operator, and if so which
/// character and (for binary operators) precedence it was given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorKind {
    Unary(char),
    Binary(char, i32),
}

/// A function's signature: name, parameters, return type, and (if this
/// is an operator overload) its precedence (spec.md §3.4, §3.7).
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: Symbol,
    pub params: Vec<(Symbol, Type)>,
    pub ret_type: Type,
    pub operator: Option<OperatorKind>,
    pub span: Span,
}

impl Prototype {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A top-level function definition: its signature plus a body whose
/// outermost scope's parent is the function's own scope (spec.md §3.4:
/// `body.scope.parent == function_scope`). The `scopes` arena is
/// exclusively owned here; every `RibId` on `body` indexes into it.
pub struct Function {
    pub proto: Prototype,
    pub body: Expr,
    pub scopes: ScopeTree,
}
