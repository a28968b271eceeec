//! Lowers the AST to IR by walking each node's `emit(builder, scope)`
//! contract (spec.md §4.4), grounded on `examples/original_source/sisp/
//! sisp11/Codegen.cpp`'s per-node `codegen()` methods and on the teacher's
//! `LlvmBackend` for how a builder/module/function triple is threaded
//! through instruction emission.
//!
//! `ScopeTree` is mutated here (`Var`'s binding insertion) even though
//! spec.md §5 generalizes scope mutation to "parsing only" — §4.4's
//! per-node contract is the more specific authority for `Var`, and a
//! storage handle cannot exist before lowering allocates it. See
//! DESIGN.md.

use sisp_par::{Expr, Prototype, Type};
use sisp_scope::{RibId, ScopeTree, StorageSlot};
use sisp_util::{IndexVec, Span};

use crate::error::{LowerError, Result};
use crate::ir::{IrBuilder, Typed};
use sisp_par::CompilationContext;

/// What an expression evaluates to: most nodes yield an ordinary rvalue,
/// but `Var` yields the slot it just allocated (spec.md §4.4: "the
/// expression's value is the slot, so assignments see an lvalue").
enum Emitted<B: IrBuilder> {
    Value(Typed<B::Value>),
    Slot { slot: B::Slot, ty: Type },
}

pub struct Lowerer<'a, B: IrBuilder> {
    builder: &'a mut B,
    ctx: &'a mut CompilationContext,
    scopes: &'a mut ScopeTree,
    slots: IndexVec<StorageSlot, (B::Slot, Type)>,
    entry_block: Option<B::Block>,
    current_function: Option<B::Function>,
}

impl<'a, B: IrBuilder> Lowerer<'a, B> {
    pub fn new(builder: &'a mut B, ctx: &'a mut CompilationContext, scopes: &'a mut ScopeTree) -> Self {
        Self {
            builder,
            ctx,
            scopes,
            slots: IndexVec::new(),
            entry_block: None,
            current_function: None,
        }
    }

    fn name_of(&self, proto: &Prototype) -> &str {
        self.ctx.interner.resolve(proto.name)
    }

    pub fn lower_extern(&mut self, proto: &Prototype) -> B::Function {
        let params: Vec<Type> = proto.params.iter().map(|(_, ty)| ty).copied().collect();
        let name = self.name_of(proto).to_string();
        let func = self.builder.declare_extern(&name, &params, proto.ret_type);
        self.ctx.prototypes.insert(proto.name, proto.clone());
        func
    }

    /// Implements the `Function` rule of spec.md §4.4: declare the symbol,
    /// open `entry`, bind parameters, lower the body, return its value,
    /// verify — erasing the function symbol on any lowering error.
    ///
    /// Takes `proto`/`body` rather than a whole `&Function` so that the
    /// `ScopeTree` — already borrowed by `self.scopes` — isn't borrowed a
    /// second time through the `Function` it came from.
    pub fn lower_function(&mut self, proto: &Prototype, body: &Expr) -> Result<B::Function> {
        let params: Vec<Type> = proto.params.iter().map(|(_, ty)| ty).copied().collect();
        let name = self.name_of(proto).to_string();
        let func = self.builder.declare_function(&name, &params, proto.ret_type);
        self.ctx.prototypes.insert(proto.name, proto.clone());

        let entry = self.builder.append_block(func, "entry");
        self.builder.position_at_end(entry);
        self.entry_block = Some(entry);
        self.current_function = Some(func);

        if let Err(e) = self.lower_function_body(func, proto, body) {
            self.builder.delete_function(func);
            return Err(e);
        }

        self.builder.verify_function(func).map_err(|msg| {
            self.builder.delete_function(func);
            LowerError::VerificationFailed(name.clone(), msg)
        })?;
        self.builder.run_function_passes(func);
        Ok(func)
    }

    /// Binds parameters and lowers `body`, returning its value. Factored
    /// out of `lower_function` so every fallible step here — including the
    /// parameter allocas, which previously ran before lowering could fail
    /// at all — shares the same delete-function cleanup on error.
    fn lower_function_body(&mut self, func: B::Function, proto: &Prototype, body: &Expr) -> Result<()> {
        let function_scope = self.scopes.root();
        for (i, (param_name, ty)) in proto.params.iter().enumerate() {
            let arg_value = self.builder.get_param(func, i);
            let slot = self.builder.alloca(self.ctx.interner.resolve(*param_name), *ty)?;
            self.builder.store(slot, arg_value)?;
            let storage = self.slots.push((slot, *ty));
            self.scopes.insert(function_scope, *param_name, storage);
        }

        let emitted = self.emit(body)?;
        let result = self.to_rvalue(emitted)?;
        self.builder.build_return(Some(result.value))?;
        Ok(())
    }

    fn to_rvalue(&mut self, emitted: Emitted<B>) -> Result<Typed<B::Value>> {
        match emitted {
            Emitted::Value(v) => Ok(v),
            Emitted::Slot { slot, ty } => {
                Ok(Typed::new(self.builder.load(slot, ty, "loadtmp")?, ty))
            }
        }
    }

    fn emit_rvalue(&mut self, expr: &Expr) -> Result<Typed<B::Value>> {
        let emitted = self.emit(expr)?;
        self.to_rvalue(emitted)
    }

    /// Sets the builder's current debug location before lowering `expr`
    /// (spec.md §4.4's closing paragraph); a no-op until a `-g` debug-info
    /// path is wired up in the driver.
    fn set_location(&mut self, span: Span) {
        if let Some(func) = self.current_function {
            self.builder.set_debug_location(span, func);
        }
    }

    fn emit(&mut self, expr: &Expr) -> Result<Emitted<B>> {
        self.set_location(expr.span());
        match expr {
            Expr::IntegerLiteral { value, .. } => {
                Ok(Emitted::Value(Typed::new(self.builder.const_int(*value), Type::Int64)))
            }
            Expr::FloatLiteral { value, .. } => {
                Ok(Emitted::Value(Typed::new(self.builder.const_float(*value), Type::Float64)))
            }
            Expr::Variable { name, scope, .. } => self.emit_variable(*name, *scope),
            Expr::Var { name, ty, init, scope, .. } => self.emit_var(*name, *ty, init.as_deref(), *scope),
            Expr::Binary { op, lhs, rhs, .. } => self.emit_binary(*op, lhs, rhs),
            Expr::Unary { op, operand, .. } => self.emit_unary(*op, operand),
            Expr::Call { callee, args, .. } => self.emit_call(*callee, args),
            Expr::If { cond, then_branch, else_branch, .. } => {
                self.emit_if(cond, then_branch, else_branch)
            }
            Expr::For { var, end, step, body, .. } => self.emit_for(var, end, step.as_deref(), body),
            Expr::Compound { exprs, .. } => self.emit_compound(exprs),
        }
    }

    fn lookup_slot(&self, scope: RibId, name: sisp_util::Symbol) -> Option<(B::Slot, Type)> {
        let storage = self.scopes.lookup(scope, name)?;
        self.slots.get(storage).copied()
    }

    fn emit_variable(&mut self, name: sisp_util::Symbol, scope: RibId) -> Result<Emitted<B>> {
        let (slot, ty) = self.lookup_slot(scope, name).ok_or_else(|| {
            LowerError::UnknownName(self.ctx.interner.resolve(name).to_string())
        })?;
        let value = self.builder.load(slot, ty, self.ctx.interner.resolve(name))?;
        Ok(Emitted::Value(Typed::new(value, ty)))
    }

    /// Allocates in the function's entry block regardless of the `var`'s
    /// textual position (spec.md §4.4), by temporarily repositioning the
    /// builder there and restoring the caller's insertion point after.
    fn emit_var(
        &mut self,
        name: sisp_util::Symbol,
        ty: Type,
        init: Option<&Expr>,
        scope: RibId,
    ) -> Result<Emitted<B>> {
        let init_value = match init {
            Some(expr) => self.emit_rvalue(expr)?,
            None => self.zero_value(ty),
        };
        if init_value.ty != ty {
            return Err(LowerError::TypeMismatch('v'));
        }

        let entry = self.entry_block.expect("emit_var called outside a function body");
        let current = self.builder.current_block();
        self.builder.position_at_end(entry);
        let slot = self.builder.alloca(self.ctx.interner.resolve(name), ty)?;
        self.builder.position_at_end(current);

        self.builder.store(slot, init_value.value)?;
        let storage = self.slots.push((slot, ty));
        self.scopes.insert(scope, name, storage);
        Ok(Emitted::Slot { slot, ty })
    }

    fn zero_value(&self, ty: Type) -> Typed<B::Value> {
        Typed::new(self.builder.const_zero(ty), ty)
    }

    fn emit_binary(&mut self, op: char, lhs: &Expr, rhs: &Expr) -> Result<Emitted<B>> {
        if op == '=' {
            let Expr::Variable { name, scope, .. } = lhs else {
                return Err(LowerError::TypeMismatch('='));
            };
            let (slot, ty) = self
                .lookup_slot(*scope, *name)
                .ok_or_else(|| LowerError::UnknownName(self.ctx.interner.resolve(*name).to_string()))?;
            let rhs_value = self.emit_rvalue(rhs)?;
            self.builder.store(slot, rhs_value.value)?;
            return Ok(Emitted::Value(Typed::new(rhs_value.value, ty)));
        }

        let lhs_value = self.emit_rvalue(lhs)?;
        let rhs_value = self.emit_rvalue(rhs)?;
        if lhs_value.ty != rhs_value.ty {
            return Err(LowerError::TypeMismatch(op));
        }
        let ty = lhs_value.ty;

        let value = match op {
            '+' => self.builder.add(lhs_value.value, rhs_value.value, ty)?,
            '-' => self.builder.sub(lhs_value.value, rhs_value.value, ty)?,
            '*' => self.builder.mul(lhs_value.value, rhs_value.value, ty)?,
            '<' => return Ok(Emitted::Value(Typed::new(
                self.builder.cmp_lt(lhs_value.value, rhs_value.value, ty)?,
                Type::Bool,
            ))),
            '>' => return Ok(Emitted::Value(Typed::new(
                self.builder.cmp_gt(lhs_value.value, rhs_value.value, ty)?,
                Type::Bool,
            ))),
            _ => {
                let mangled = format!("binary{op}");
                let callee = self
                    .ctx
                    .interner
                    .get(&mangled)
                    .ok_or(LowerError::OperatorNotFound(mangled))?;
                return self.emit_call(callee, &[lhs.clone(), rhs.clone()]);
            }
        };
        Ok(Emitted::Value(Typed::new(value, ty)))
    }

    fn emit_unary(&mut self, op: char, operand: &Expr) -> Result<Emitted<B>> {
        let operand_value = self.emit_rvalue(operand)?;
        let mangled = format!("unary{op}");
        let callee = self.ctx.interner.get(&mangled).ok_or(LowerError::OperatorNotFound(mangled))?;
        let proto = self
            .ctx
            .prototypes
            .get(&callee)
            .ok_or_else(|| LowerError::OperatorNotFound(format!("unary{op}")))?;
        let params: Vec<Type> = proto.params.iter().map(|(_, ty)| ty).copied().collect();
        let name = self.ctx.interner.resolve(callee).to_string();
        let func = self.builder.declare_function(&name, &params, proto.ret_type);
        let value = self.builder.call(func, &[operand_value.value])?;
        Ok(Emitted::Value(Typed::new(value, proto.ret_type)))
    }

    fn emit_call(&mut self, callee: sisp_util::Symbol, args: &[Expr]) -> Result<Emitted<B>> {
        let proto = self
            .ctx
            .prototypes
            .get(&callee)
            .ok_or_else(|| LowerError::UnknownName(self.ctx.interner.resolve(callee).to_string()))?
            .clone();
        if proto.arity() != args.len() {
            return Err(LowerError::ArityMismatch(
                self.ctx.interner.resolve(callee).to_string(),
                proto.arity(),
                args.len(),
            ));
        }

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.emit_rvalue(arg)?.value);
        }

        let params: Vec<Type> = proto.params.iter().map(|(_, ty)| ty).copied().collect();
        let name = self.ctx.interner.resolve(proto.name).to_string();
        let func = self.builder.declare_function(&name, &params, proto.ret_type);
        let value = self.builder.call(func, &arg_values)?;
        Ok(Emitted::Value(Typed::new(value, proto.ret_type)))
    }

    /// Both arms' "end" blocks are captured *after* lowering the arm, since
    /// an arm may itself branch into further blocks (spec.md §4.4).
    fn emit_if(&mut self, cond: &Expr, then_branch: &Expr, else_branch: &Expr) -> Result<Emitted<B>> {
        let cond_value = self.emit_rvalue(cond)?;
        let cond_bool = self.builder.cmp_ne_zero(cond_value.value, cond_value.ty)?;

        let func = self.current_function();
        let then_bb = self.builder.append_block(func, "then");
        let else_bb = self.builder.append_block(func, "else");
        let merge_bb = self.builder.append_block(func, "ifcont");

        self.builder.cond_br(cond_bool, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        let then_value = self.emit_rvalue(then_branch)?;
        self.builder.br(merge_bb)?;
        let then_end_bb = self.builder.current_block();

        self.builder.position_at_end(else_bb);
        let else_value = self.emit_rvalue(else_branch)?;
        self.builder.br(merge_bb)?;
        let else_end_bb = self.builder.current_block();

        if then_value.ty != else_value.ty {
            return Err(LowerError::TypeMismatch('?'));
        }

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.phi(
            then_value.ty,
            &[(then_value.value, then_end_bb), (else_value.value, else_end_bb)],
        )?;
        Ok(Emitted::Value(Typed::new(phi, then_value.ty)))
    }

    /// `var` lowers first, then `loop`'s body, then step/end in the order
    /// spec.md §9 fixes (compute step, update induction, re-check `end`) —
    /// the source's stale-condition bug is not reproduced.
    fn emit_for(&mut self, var: &Expr, end: &Expr, step: Option<&Expr>, body: &Expr) -> Result<Emitted<B>> {
        let Expr::Var { name, ty, scope, .. } = var else {
            return Err(LowerError::TypeMismatch('f'));
        };
        self.emit(var)?;
        let (slot, induction_ty) =
            self.lookup_slot(*scope, *name).expect("induction variable was just bound");

        let func = self.current_function();
        let loop_bb = self.builder.append_block(func, "loop");
        self.builder.br(loop_bb)?;
        self.builder.position_at_end(loop_bb);

        self.emit(body)?;

        let step_value = match step {
            Some(expr) => self.emit_rvalue(expr)?.value,
            // spec.md §9 fixes the source's "default to 0" quirk to the
            // induction type's 1.
            None => self.one_value(induction_ty),
        };

        let current = self.builder.load(slot, induction_ty, "curvar")?;
        let next = self.builder.add(current, step_value, induction_ty)?;
        self.builder.store(slot, next)?;

        let end_value = self.emit_rvalue(end)?;
        let end_cond = self.builder.cmp_ne_zero(end_value.value, end_value.ty)?;

        let after_bb = self.builder.append_block(func, "afterloop");
        self.builder.cond_br(end_cond, loop_bb, after_bb)?;
        self.builder.position_at_end(after_bb);

        let _ = ty;
        Ok(Emitted::Value(self.zero_value(Type::Void)))
    }

    fn one_value(&self, ty: Type) -> B::Value {
        match ty {
            Type::Float64 => self.builder.const_float(1.0),
            _ => self.builder.const_int(1),
        }
    }

    fn emit_compound(&mut self, exprs: &[Expr]) -> Result<Emitted<B>> {
        let mut last = None;
        for expr in exprs {
            last = Some(self.emit(expr)?);
        }
        Ok(last.unwrap_or(Emitted::Value(self.zero_value(Type::Void))))
    }

    fn current_function(&self) -> B::Function {
        self.current_function.expect("no function is being lowered")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sisp_par::{CompilationContext, Parser};
    use sisp_util::{FileId, Handler};

    fn lower_source(source: &str) -> String {
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new(source, FileId::DUMMY, &mut ctx, &mut handler);
        let function = parser.parse_top_level().unwrap_or_else(|| {
            panic!("parse failed: {:?}", handler.diagnostics())
        });
        assert!(!handler.has_errors());

        let llvm_ctx = Context::create();
        let mut builder = crate::llvm::LlvmIrBuilder::new(&llvm_ctx, "test").unwrap();
        let mut scopes = function.scopes;
        let mut lowerer = Lowerer::new(&mut builder, &mut ctx, &mut scopes);
        lowerer
            .lower_function(&function.proto, &function.body)
            .unwrap_or_else(|e| panic!("lowering failed: {e}"));
        builder.emit_ir()
    }

    fn lower_definitions(sources: &[&str]) -> String {
        let mut ctx = CompilationContext::new();
        let llvm_ctx = Context::create();
        let mut builder = crate::llvm::LlvmIrBuilder::new(&llvm_ctx, "test").unwrap();
        for source in sources {
            let mut handler = Handler::new();
            let mut parser = Parser::new(source, FileId::DUMMY, &mut ctx, &mut handler);
            let function = if source.trim_start().starts_with("def") {
                parser.parse_definition()
            } else {
                parser.parse_top_level()
            }
            .unwrap_or_else(|| panic!("parse failed for `{source}`: {:?}", handler.diagnostics()));
            assert!(!handler.has_errors());
            let mut scopes = function.scopes;
            let mut lowerer = Lowerer::new(&mut builder, &mut ctx, &mut scopes);
            lowerer
                .lower_function(&function.proto, &function.body)
                .unwrap_or_else(|e| panic!("lowering `{source}` failed: {e}"));
        }
        builder.emit_ir()
    }

    #[test]
    fn literal_addition_emits_fadd() {
        // Two literal operands would constant-fold at build time (LLVM's
        // own `IRBuilder` folds constant arithmetic), so route through a
        // variable to force a real `fadd` instruction.
        let ir = lower_source("{ var x: float = 1.0 x + 2.0 }");
        assert!(ir.contains("fadd"), "expected an fadd instruction, got:\n{ir}");
    }

    #[test]
    fn if_expression_emits_a_phi_merging_both_arms() {
        let ir = lower_source("if 1.0 < 2.0 then 3.0 else 4.0");
        assert!(ir.contains("phi"), "expected a phi instruction, got:\n{ir}");
        assert!(ir.contains("ifcont"));
    }

    #[test]
    fn for_loop_emits_loop_and_afterloop_blocks() {
        // The loop's own value is always the `void` sentinel (spec.md §9),
        // so give it a `void`-returning function rather than the top-level
        // wrapper's hardcoded `float` return.
        let ir = lower_definitions(&[
            "def f() -> void { for i: float = 0.0, i < 5.0 in i }",
        ]);
        assert!(ir.contains("loop:"), "expected a `loop` block, got:\n{ir}");
        assert!(ir.contains("afterloop:"), "expected an `afterloop` block, got:\n{ir}");
    }

    #[test]
    fn call_to_a_previously_defined_function_resolves_through_the_module() {
        let ir = lower_definitions(&["def sq(x: float) -> float { x * x }", "sq(3.0)"]);
        assert!(ir.contains("call"), "expected a call instruction, got:\n{ir}");
    }

    #[test]
    fn binary_operator_overload_lowers_to_a_call_to_its_mangled_name() {
        let ir = lower_definitions(&[
            "def binary | 5 (a: bool, b: bool) -> bool { a }",
            "def g(a: bool, b: bool) -> bool { a | b }",
        ]);
        assert!(ir.contains("@\"binary|\""), "expected a call to binary|, got:\n{ir}");
    }

    #[test]
    fn assignment_stores_into_the_variable_slot() {
        let ir = lower_source("{ var x: float = 1.0 x = 2.0 x }");
        assert!(ir.contains("store"), "expected a store instruction, got:\n{ir}");
    }

    #[test]
    fn var_with_mismatched_init_type_is_a_type_error() {
        let source = "var x: int = 1.0";
        let mut ctx = CompilationContext::new();
        let mut handler = Handler::new();
        let mut parser = Parser::new(source, FileId::DUMMY, &mut ctx, &mut handler);
        let function = parser.parse_top_level().unwrap_or_else(|| {
            panic!("parse failed: {:?}", handler.diagnostics())
        });
        assert!(!handler.has_errors());

        let llvm_ctx = Context::create();
        let mut builder = crate::llvm::LlvmIrBuilder::new(&llvm_ctx, "test").unwrap();
        let mut scopes = function.scopes;
        let mut lowerer = Lowerer::new(&mut builder, &mut ctx, &mut scopes);
        let err = lowerer
            .lower_function(&function.proto, &function.body)
            .expect_err("float init into an int-typed var should be rejected");
        assert!(matches!(err, LowerError::TypeMismatch('v')), "got: {err}");
    }
}
