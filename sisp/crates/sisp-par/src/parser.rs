//! Recursive-descent parsing with precedence climbing for binary operators
//! (spec.md §4.2). One token of lookahead throughout — the parser never
//! backtracks; on the first error it reports a diagnostic and returns
//! `None`, leaving recovery (advancing one token and resuming at the next
//! top-level form) to the driver.

use rustc_hash::FxHashMap;
use sisp_lex::{Lexer, Token};
use sisp_util::diagnostic::{E_INVALID_PRECEDENCE, E_SYNTAX};
use sisp_util::{FileId, Handler, Span, Symbol};

use crate::ast::{Expr, Function, OperatorKind, Prototype, Type};
use crate::context::CompilationContext;
use sisp_scope::ScopeTree;

pub struct Parser<'src, 'ctx> {
    lexer: Lexer<'src>,
    ctx: &'ctx mut CompilationContext,
    handler: &'ctx mut Handler,
    scopes: ScopeTree,
    current_rib: sisp_scope::RibId,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    pub fn new(
        source: &'src str,
        file_id: FileId,
        ctx: &'ctx mut CompilationContext,
        handler: &'ctx mut Handler,
    ) -> Self {
        Self::with_lexer(Lexer::new(source, file_id), ctx, handler)
    }

    /// Resumes parsing from an already-advanced [`Lexer`] — the driver
    /// uses this to interleave parsing and lowering one top-level form at
    /// a time (spec.md §4.5) without holding `ctx`/`handler` borrowed for
    /// the whole file: each per-form `Parser` is constructed, used, and
    /// torn back down into its `Lexer` via [`Self::into_lexer`] before
    /// lowering needs `ctx` again.
    pub fn with_lexer(lexer: Lexer<'src>, ctx: &'ctx mut CompilationContext, handler: &'ctx mut Handler) -> Self {
        let scopes = ScopeTree::new();
        let root = scopes.root();
        Self { lexer, ctx, handler, scopes, current_rib: root }
    }

    /// Reclaims this parser's `Lexer`, preserving its position in the
    /// source for the next per-form `Parser` (see [`Self::with_lexer`]).
    pub fn into_lexer(self) -> Lexer<'src> {
        self.lexer
    }

    pub fn is_at_eof(&self) -> bool {
        self.lexer.peek().is_eof()
    }

    pub fn peek(&self) -> &Token {
        self.lexer.peek()
    }

    /// Consumes one token without interpreting it — the driver uses this
    /// to skip the `;` top-level statement separator (spec.md §4.5).
    pub fn skip_token(&mut self) {
        self.advance();
    }

    fn loc(&self) -> Span {
        self.lexer.loc()
    }

    fn advance(&mut self) -> Token {
        self.lexer.advance()
    }

    fn check_char(&self, c: char) -> bool {
        matches!(self.peek(), Token::Char(x) if *x == c)
    }

    fn expect_char(&mut self, c: char) -> Option<()> {
        if self.check_char(c) {
            self.advance();
            Some(())
        } else {
            self.error_syntax(format!("expected '{c}'"))
        }
    }

    fn expect_arrow(&mut self) -> Option<()> {
        self.expect_char('-')?;
        self.expect_char('>')
    }

    fn expect_token(&mut self, expected: &Token) -> Option<()> {
        if self.peek() == expected {
            self.advance();
            Some(())
        } else {
            self.error_syntax(format!("expected {expected:?}"))
        }
    }

    fn expect_identifier(&mut self) -> Option<String> {
        match self.peek().clone() {
            Token::Identifier(name) => {
                self.advance();
                Some(name)
            }
            _ => self.error_syntax("expected an identifier"),
        }
    }

    fn expect_operator_char(&mut self) -> Option<char> {
        match *self.peek() {
            Token::Char(c) => {
                self.advance();
                Some(c)
            }
            _ => self.error_syntax("expected an operator character"),
        }
    }

    fn error_syntax<T>(&mut self, message: impl Into<String>) -> Option<T> {
        self.handler.error(E_SYNTAX, message, self.loc());
        None
    }

    fn intern(&mut self, name: &str) -> Symbol {
        self.ctx.interner.intern(name)
    }

    fn mangle_operator(&mut self, prefix: &str, op: char) -> Symbol {
        self.intern(&format!("{prefix}{op}"))
    }

    /// Resets per-function scope state; called at the start of every
    /// `def`/top-level-expression (externs have no body, hence no scopes).
    fn begin_function_scopes(&mut self) {
        self.scopes = ScopeTree::new();
        self.current_rib = self.scopes.root();
    }

    fn take_scopes(&mut self) -> ScopeTree {
        std::mem::replace(&mut self.scopes, ScopeTree::new())
    }

    // ---- types -----------------------------------------------------

    fn parse_type(&mut self) -> Option<Type> {
        let ty = match self.peek() {
            Token::TyInt => Type::Int64,
            Token::TyFloat => Type::Float64,
            Token::TyBool => Type::Bool,
            Token::TyVoid => Type::Void,
            _ => return self.error_syntax("expected a type"),
        };
        self.advance();
        Some(ty)
    }

    fn parse_arg(&mut self) -> Option<(Symbol, Type)> {
        let name = self.expect_identifier()?;
        self.expect_char(':')?;
        let ty = self.parse_type()?;
        Some((self.intern(&name), ty))
    }

    // ---- prototypes --------------------------------------------------

    /// ```text
    /// proto := ident '(' (arg (',' arg)*)? ')' '->' type
    ///        | 'unary'  OP '(' arg ')' '->' type
    ///        | 'binary' OP number? '(' arg ',' arg ')' '->' type
    /// ```
    pub fn parse_prototype(&mut self) -> Option<Prototype> {
        let span = self.loc();
        match self.peek().clone() {
            Token::Unary => {
                self.advance();
                let op = self.expect_operator_char()?;
                self.expect_char('(')?;
                let arg = self.parse_arg()?;
                self.expect_char(')')?;
                self.expect_arrow()?;
                let ret_type = self.parse_type()?;
                let name = self.mangle_operator("unary", op);
                Some(Prototype {
                    name,
                    params: vec![arg],
                    ret_type,
                    operator: Some(OperatorKind::Unary(op)),
                    span,
                })
            }
            Token::Binary => {
                self.advance();
                let op = self.expect_operator_char()?;
                let precedence = self.parse_optional_precedence(span)?;
                self.expect_char('(')?;
                let lhs = self.parse_arg()?;
                self.expect_char(',')?;
                let rhs = self.parse_arg()?;
                self.expect_char(')')?;
                self.expect_arrow()?;
                let ret_type = self.parse_type()?;
                self.ctx.set_precedence(op, precedence);
                let name = self.mangle_operator("binary", op);
                Some(Prototype {
                    name,
                    params: vec![lhs, rhs],
                    ret_type,
                    operator: Some(OperatorKind::Binary(op, precedence)),
                    span,
                })
            }
            Token::Identifier(name) => {
                self.advance();
                let sym = self.intern(&name);
                self.expect_char('(')?;
                let mut params = Vec::new();
                if !self.check_char(')') {
                    loop {
                        params.push(self.parse_arg()?);
                        if self.check_char(',') {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect_char(')')?;
                self.expect_arrow()?;
                let ret_type = self.parse_type()?;
                Some(Prototype { name: sym, params, ret_type, operator: None, span })
            }
            _ => self.error_syntax("expected a function name, 'unary', or 'binary'"),
        }
    }

    /// The number literal after `binary OP` is optional; default is 30,
    /// and a declared value must fall in `1..=100` (spec.md §3.7, §4.2).
    fn parse_optional_precedence(&mut self, proto_span: Span) -> Option<i32> {
        if let Token::Number(lexeme) = self.peek().clone() {
            self.advance();
            let value: i32 = match lexeme.parse() {
                Ok(v) => v,
                Err(_) => return self.error_syntax("invalid precedence literal"),
            };
            if !(1..=100).contains(&value) {
                self.handler.error(
                    E_INVALID_PRECEDENCE,
                    "binary operator precedence must be in 1..=100",
                    proto_span,
                );
                return None;
            }
            Some(value)
        } else {
            Some(30)
        }
    }

    pub fn parse_extern(&mut self) -> Option<Prototype> {
        self.expect_token(&Token::Extern)?;
        self.parse_prototype()
    }

    pub fn parse_definition(&mut self) -> Option<Function> {
        self.expect_token(&Token::Def)?;
        let proto = self.parse_prototype()?;
        self.begin_function_scopes();
        let body = self.parse_compound()?;
        let scopes = self.take_scopes();
        Some(Function { proto, body, scopes })
    }

    /// Wraps a bare expression as the nullary `__anon_expr` function
    /// (spec.md §4.2). Its declared return type is derived from the
    /// expression's own already-typed structure (spec.md §8's scenario
    /// table expects `1 + 2 * 3` to yield the int `7`, not a double) —
    /// every operand's type is either a literal, a `var`'s own
    /// annotation, or another prototype's declared `ret_type`, so this
    /// walks the same propagation `Lowerer::emit` performs, without
    /// inferring anything the source didn't already declare.
    pub fn parse_top_level(&mut self) -> Option<Function> {
        let span = self.loc();
        self.begin_function_scopes();
        let function_scope = self.current_rib;
        let body_scope = self.scopes.child_of(function_scope);
        self.current_rib = body_scope;
        let expr = self.parse_expression()?;
        self.current_rib = function_scope;
        let ret_type = self.infer_type(&expr, &mut FxHashMap::default());
        let body = Expr::Compound { exprs: vec![expr], scope: body_scope, span };
        let scopes = self.take_scopes();
        let name = self.intern("__anon_expr");
        let proto = Prototype { name, params: Vec::new(), ret_type, operator: None, span };
        Some(Function { proto, body, scopes })
    }

    /// The declared return type of the `binary`/`unary` overload mangled
    /// as `mangled`, or `fallback` if no such overload is registered yet.
    fn operator_return_type(&self, mangled: &str, fallback: Type) -> Type {
        self.ctx
            .interner
            .get(mangled)
            .and_then(|sym| self.ctx.prototypes.get(&sym))
            .map(|proto| proto.ret_type)
            .unwrap_or(fallback)
    }

    /// Structural type propagation for a bare top-level expression, used
    /// only to pick `__anon_expr`'s return type (see [`Self::parse_top_level`]).
    /// `env` tracks each `var`'s declared type as it is bound, in the same
    /// order `Lowerer::emit` would bind it.
    fn infer_type(&self, expr: &Expr, env: &mut FxHashMap<Symbol, Type>) -> Type {
        match expr {
            Expr::IntegerLiteral { .. } => Type::Int64,
            Expr::FloatLiteral { .. } => Type::Float64,
            Expr::Variable { name, .. } => env.get(name).copied().unwrap_or(Type::Float64),
            Expr::Var { name, ty, init, .. } => {
                if let Some(init) = init {
                    self.infer_type(init, env);
                }
                env.insert(*name, *ty);
                *ty
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs_ty = self.infer_type(lhs, env);
                self.infer_type(rhs, env);
                match op {
                    '<' | '>' => Type::Bool,
                    '=' | '+' | '-' | '*' => lhs_ty,
                    _ => self.operator_return_type(&format!("binary{op}"), lhs_ty),
                }
            }
            Expr::Unary { op, operand, .. } => {
                let operand_ty = self.infer_type(operand, env);
                self.operator_return_type(&format!("unary{op}"), operand_ty)
            }
            Expr::Call { callee, .. } => self
                .ctx
                .prototypes
                .get(callee)
                .map(|proto| proto.ret_type)
                .unwrap_or(Type::Float64),
            Expr::If { then_branch, else_branch, .. } => {
                self.infer_type(else_branch, env);
                self.infer_type(then_branch, env)
            }
            Expr::For { var, body, .. } => {
                self.infer_type(var, env);
                self.infer_type(body, env);
                Type::Void
            }
            Expr::Compound { exprs, .. } => {
                let mut ty = Type::Void;
                for e in exprs {
                    ty = self.infer_type(e, env);
                }
                ty
            }
        }
    }

    // ---- expressions --------------------------------------------------

    /// `expr := '{' expr* '}' | unary (binop unary)*`
    pub fn parse_expression(&mut self) -> Option<Expr> {
        if self.check_char('{') {
            self.parse_compound()
        } else {
            let lhs = self.parse_unary()?;
            self.parse_binop_rhs(0, lhs)
        }
    }

    fn parse_compound(&mut self) -> Option<Expr> {
        let span = self.loc();
        self.expect_char('{')?;
        let parent = self.current_rib;
        let rib = self.scopes.child_of(parent);
        self.current_rib = rib;

        let mut exprs = Vec::new();
        while !self.check_char('}') && !self.is_at_eof() {
            exprs.push(self.parse_expression()?);
        }
        self.expect_char('}')?;
        self.current_rib = parent;
        Some(Expr::Compound { exprs, scope: rib, span })
    }

    /// `unary := OP unary | primary` — any punctuation other than the
    /// grouping `(` and the argument separator `,` starts a unary prefix.
    fn parse_unary(&mut self) -> Option<Expr> {
        if let Token::Char(c) = *self.peek() {
            if c != '(' && c != ',' {
                let span = self.loc();
                self.advance();
                let operand = self.parse_unary()?;
                return Some(Expr::Unary { op: c, operand: Box::new(operand), span });
            }
        }
        self.parse_primary()
    }

    /// Precedence climbing (spec.md §4.2): consume operators whose
    /// precedence is `>= min_prec`, recursing on the right-hand side at
    /// `prec + 1` so operators are left-associative.
    fn parse_binop_rhs(&mut self, min_prec: i32, mut lhs: Expr) -> Option<Expr> {
        loop {
            let op = match *self.peek() {
                Token::Char(c) => c,
                _ => return Some(lhs),
            };
            let prec = self.ctx.precedence_of(op);
            if prec < min_prec {
                return Some(lhs);
            }
            let op_span = self.loc();
            self.advance();

            let mut rhs = self.parse_unary()?;

            let next_prec = match *self.peek() {
                Token::Char(c) => self.ctx.precedence_of(c),
                _ => crate::context::NO_PRECEDENCE,
            };
            if prec < next_prec {
                rhs = self.parse_binop_rhs(prec + 1, rhs)?;
            }

            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: op_span };
        }
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.loc();
        match self.peek().clone() {
            Token::Number(lexeme) => {
                self.advance();
                self.parse_number_literal(&lexeme, span)
            }
            Token::Identifier(name) => self.parse_ident_or_call(name, span),
            Token::Char('(') => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_char(')')?;
                Some(inner)
            }
            Token::If => self.parse_if(span),
            Token::For => self.parse_for(span),
            Token::Var => self.parse_var(span),
            _ => self.error_syntax("expected an expression"),
        }
    }

    fn parse_number_literal(&mut self, lexeme: &str, span: Span) -> Option<Expr> {
        if lexeme.contains('.') {
            match lexeme.parse::<f64>() {
                Ok(value) => Some(Expr::FloatLiteral { value, span }),
                Err(_) => self.error_syntax("invalid float literal"),
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => Some(Expr::IntegerLiteral { value, span }),
                Err(_) => self.error_syntax("invalid integer literal"),
            }
        }
    }

    /// `call := ident '(' (expr (',' expr)*)? ')'` — a `Variable` if the
    /// identifier isn't followed by `(`.
    fn parse_ident_or_call(&mut self, name: String, span: Span) -> Option<Expr> {
        self.advance();
        let callee = self.intern(&name);
        if self.check_char('(') {
            self.advance();
            let mut args = Vec::new();
            if !self.check_char(')') {
                loop {
                    args.push(self.parse_expression()?);
                    if self.check_char(',') {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
            self.expect_char(')')?;
            Some(Expr::Call { callee, args, span })
        } else {
            Some(Expr::Variable { name: callee, span, scope: self.current_rib })
        }
    }

    /// `if := 'if' expr 'then' expr 'else' expr`
    fn parse_if(&mut self, span: Span) -> Option<Expr> {
        self.advance();
        let cond = self.parse_expression()?;
        self.expect_token(&Token::Then)?;
        let then_branch = self.parse_expression()?;
        self.expect_token(&Token::Else)?;
        let else_branch = self.parse_expression()?;
        Some(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            span,
        })
    }

    /// `var := 'var' ident ':' type ('=' expr)?`
    fn parse_var(&mut self, span: Span) -> Option<Expr> {
        self.expect_token(&Token::Var)?;
        let (name, ty, init) = self.parse_var_binding()?;
        Some(Expr::Var { name, ty, init, span, scope: self.current_rib })
    }

    /// The `ident ':' type ('=' expr)?` tail shared by `var` and the
    /// induction-variable binding inside `for` (the latter has no leading
    /// `var` keyword — spec.md §8 scenario 3: `for i: int = 0, ...`).
    fn parse_var_binding(&mut self) -> Option<(Symbol, Type, Option<Box<Expr>>)> {
        let name = self.expect_identifier()?;
        self.expect_char(':')?;
        let ty = self.parse_type()?;
        let init = if self.check_char('=') {
            self.advance();
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Some((self.intern(&name), ty, init))
    }

    /// `for := 'for' var ',' expr (',' expr)? 'in' expr`
    fn parse_for(&mut self, span: Span) -> Option<Expr> {
        self.advance();
        let parent = self.current_rib;
        let induction_scope = self.scopes.child_of(parent);
        self.current_rib = induction_scope;

        let var_span = self.loc();
        let (name, ty, init) = self.parse_var_binding()?;
        if init.is_none() {
            self.current_rib = parent;
            return self.error_syntax("a `for` induction variable must have an initializer");
        }
        let var = Expr::Var { name, ty, init, span: var_span, scope: induction_scope };

        self.expect_char(',')?;
        let end = self.parse_expression()?;
        let step =
            if self.check_char(',') { self.advance(); Some(Box::new(self.parse_expression()?)) } else { None };
        self.expect_token(&Token::In)?;
        let body = self.parse_expression()?;

        self.current_rib = parent;
        Some(Expr::For { var: Box::new(var), end: Box::new(end), step, body: Box::new(body), span })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_expr_str(source: &str) -> Expr {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new(source, FileId::DUMMY, &mut ctx, &mut handler);
        let expr = parser.parse_expression().unwrap_or_else(|| {
            panic!("parse failed: {:?}", handler.diagnostics())
        });
        assert!(!handler.has_errors());
        expr
    }

    #[test]
    fn precedence_climbing_respects_builtin_table() {
        // `1 + 2 * 3` must parse as `1 + (2 * 3)` since `*` binds tighter.
        match parse_expr_str("1 + 2 * 3") {
            Expr::Binary { op: '+', rhs, .. } => {
                assert!(matches!(*rhs, Expr::Binary { op: '*', .. }));
            }
            other => panic!("expected a `+` at the top, got {other:?}"),
        }
    }

    #[test]
    fn same_precedence_is_left_associative() {
        // `1 - 2 - 3` must parse as `(1 - 2) - 3`.
        match parse_expr_str("1 - 2 - 3") {
            Expr::Binary { op: '-', lhs, .. } => {
                assert!(matches!(*lhs, Expr::Binary { op: '-', .. }));
            }
            other => panic!("expected a `-` at the top, got {other:?}"),
        }
    }

    #[test]
    fn identifier_followed_by_paren_is_a_call() {
        match parse_expr_str("sq(4.0)") {
            Expr::Call { args, .. } => assert_eq!(args.len(), 1),
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn bare_identifier_is_a_variable() {
        assert!(matches!(parse_expr_str("x"), Expr::Variable { .. }));
    }

    #[test]
    fn inner_compound_gets_a_child_scope_of_the_outer() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new("{ { 1 } }", FileId::DUMMY, &mut ctx, &mut handler);
        let outer = parser.parse_expression().unwrap();
        match outer {
            Expr::Compound { exprs, scope: outer_scope, .. } => {
                match &exprs[0] {
                    Expr::Compound { scope: inner_scope, .. } => {
                        assert_ne!(*inner_scope, outer_scope);
                    }
                    other => panic!("expected nested compound, got {other:?}"),
                }
            }
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn binary_declaration_sets_precedence_and_is_visible_to_later_parses() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        {
            let mut parser =
                Parser::new("binary $ 25 (a: int, b: int) -> int", FileId::DUMMY, &mut ctx, &mut handler);
            let proto = parser.parse_prototype().unwrap();
            assert_eq!(proto.operator, Some(OperatorKind::Binary('$', 25)));
        }
        assert_eq!(ctx.precedence_of('$'), 25);
    }

    #[test]
    fn out_of_range_precedence_is_rejected() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser =
            Parser::new("binary $ 0 (a: int, b: int) -> int", FileId::DUMMY, &mut ctx, &mut handler);
        assert!(parser.parse_prototype().is_none());
        assert!(handler.has_errors());
    }

    #[test]
    fn top_level_int_expression_gets_an_int_anon_expr() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new("1 + 2 * 3", FileId::DUMMY, &mut ctx, &mut handler);
        let function = parser.parse_top_level().unwrap();
        assert_eq!(function.proto.ret_type, Type::Int64);
    }

    #[test]
    fn top_level_call_to_a_float_function_gets_a_float_anon_expr() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        {
            let mut parser = Parser::new(
                "sq(x: float) -> float",
                FileId::DUMMY,
                &mut ctx,
                &mut handler,
            );
            let proto = parser.parse_prototype().unwrap();
            ctx.prototypes.insert(proto.name, proto);
        }
        let mut parser = Parser::new("sq(4.0)", FileId::DUMMY, &mut ctx, &mut handler);
        let function = parser.parse_top_level().unwrap();
        assert_eq!(function.proto.ret_type, Type::Float64);
    }

    #[test]
    fn for_without_initializer_is_rejected() {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new("for i: int, i in i", FileId::DUMMY, &mut ctx, &mut handler);
        assert!(parser.parse_expression().is_none());
        assert!(handler.has_errors());
    }
}
