//! The production `IrBuilder`, backed by `inkwell` (grounded on the
//! teacher's `LlvmBackend` in spirit: owns a `Context`/`Module`/`Builder`
//! triple and a target-machine, trimmed of the GC-runtime declarations and
//! LIR-specific instruction lowering that have no counterpart here).

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::{
    BasicMetadataValueEnum, BasicValue, BasicValueEnum, FunctionValue, PointerValue,
};
use inkwell::{FloatPredicate, IntPredicate, OptimizationLevel};
use std::path::Path;

use sisp_par::Type;
use sisp_util::Span;

use crate::error::{LowerError, Result};
use crate::ir::IrBuilder;

pub struct LlvmIrBuilder<'ctx> {
    context: &'ctx Context,
    pub module: Module<'ctx>,
    builder: Builder<'ctx>,
    target_machine: TargetMachine,
}

impl<'ctx> LlvmIrBuilder<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Result<Self> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to initialize native target: {e}")))?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("no target for host triple: {e}")))?;
        let target_machine = target
            .create_target_machine(
                &triple,
                &TargetMachine::get_host_cpu_name().to_string(),
                &TargetMachine::get_host_cpu_features().to_string(),
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| LowerError::LlvmOperationFailed("failed to create target machine".to_string()))?;

        let module = context.create_module(module_name);
        module.set_triple(&triple);
        module.set_data_layout(&target_machine.get_target_data().get_data_layout());

        Ok(Self { context, module, builder: context.create_builder(), target_machine })
    }

    pub fn target_triple(&self) -> TargetTriple {
        self.module.get_triple()
    }

    pub fn emit_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    pub fn write_object_file(&self, path: &Path) -> Result<()> {
        self.target_machine
            .write_to_file(&self.module, FileType::Object, path)
            .map_err(|e| LowerError::LlvmOperationFailed(e.to_string()))
    }

    fn llvm_type(&self, ty: Type) -> inkwell::types::BasicTypeEnum<'ctx> {
        match ty {
            Type::Int64 => self.context.i64_type().into(),
            Type::Float64 => self.context.f64_type().into(),
            Type::Bool => self.context.bool_type().into(),
            // The original C++ front end represents its nullary "no value"
            // result as an `i8` zero constant; kept here for the same
            // `For`/statement-without-a-value case (spec.md §4.4). Only
            // sisp-defined functions use this — they always lower a body
            // that returns the sentinel. `extern`s use `declare_extern`'s
            // real `void` instead, since they have no such body.
            Type::Void => self.context.i8_type().into(),
        }
    }
}

impl<'ctx> IrBuilder for LlvmIrBuilder<'ctx> {
    type Value = BasicValueEnum<'ctx>;
    type Slot = PointerValue<'ctx>;
    type Block = BasicBlock<'ctx>;
    type Function = FunctionValue<'ctx>;

    fn const_int(&self, v: i64) -> Self::Value {
        self.context.i64_type().const_int(v as u64, true).into()
    }

    fn const_float(&self, v: f64) -> Self::Value {
        self.context.f64_type().const_float(v).into()
    }

    fn const_bool(&self, v: bool) -> Self::Value {
        self.context.bool_type().const_int(v as u64, false).into()
    }

    fn const_zero(&self, ty: Type) -> Self::Value {
        self.llvm_type(ty).const_zero()
    }

    fn alloca(&mut self, name: &str, ty: Type) -> Result<Self::Slot> {
        self.builder
            .build_alloca(self.llvm_type(ty), name)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build alloca: {e}")))
    }

    fn load(&mut self, slot: Self::Slot, _ty: Type, name: &str) -> Result<Self::Value> {
        self.builder
            .build_load(slot, name)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build load: {e}")))
    }

    fn store(&mut self, slot: Self::Slot, value: Self::Value) -> Result<()> {
        self.builder
            .build_store(slot, value)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build store: {e}")))?;
        Ok(())
    }

    fn add(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => self
                .builder
                .build_float_add(lhs.into_float_value(), rhs.into_float_value(), "addtmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float add: {e}"))),
            _ => self
                .builder
                .build_int_add(lhs.into_int_value(), rhs.into_int_value(), "addtmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int add: {e}"))),
        }
    }

    fn sub(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => self
                .builder
                .build_float_sub(lhs.into_float_value(), rhs.into_float_value(), "subtmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float sub: {e}"))),
            _ => self
                .builder
                .build_int_sub(lhs.into_int_value(), rhs.into_int_value(), "subtmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int sub: {e}"))),
        }
    }

    fn mul(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => self
                .builder
                .build_float_mul(lhs.into_float_value(), rhs.into_float_value(), "multmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float mul: {e}"))),
            _ => self
                .builder
                .build_int_mul(lhs.into_int_value(), rhs.into_int_value(), "multmp")
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int mul: {e}"))),
        }
    }

    fn cmp_lt(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => self
                .builder
                .build_float_compare(
                    FloatPredicate::OLT,
                    lhs.into_float_value(),
                    rhs.into_float_value(),
                    "cmptmp",
                )
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float compare: {e}"))),
            _ => self
                .builder
                .build_int_compare(
                    IntPredicate::SLT,
                    lhs.into_int_value(),
                    rhs.into_int_value(),
                    "cmptmp",
                )
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int compare: {e}"))),
        }
    }

    fn cmp_gt(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => self
                .builder
                .build_float_compare(
                    FloatPredicate::OGT,
                    lhs.into_float_value(),
                    rhs.into_float_value(),
                    "cmptmp",
                )
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float compare: {e}"))),
            _ => self
                .builder
                .build_int_compare(
                    IntPredicate::SGT,
                    lhs.into_int_value(),
                    rhs.into_int_value(),
                    "cmptmp",
                )
                .map(Into::into)
                .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int compare: {e}"))),
        }
    }

    fn cmp_ne_zero(&mut self, value: Self::Value, ty: Type) -> Result<Self::Value> {
        match ty {
            Type::Float64 => {
                let zero = self.context.f64_type().const_float(0.0);
                self.builder
                    .build_float_compare(FloatPredicate::ONE, value.into_float_value(), zero, "ifcond")
                    .map(Into::into)
                    .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build float compare: {e}")))
            }
            _ => {
                let zero = value.into_int_value().get_type().const_int(0, false);
                self.builder
                    .build_int_compare(IntPredicate::NE, value.into_int_value(), zero, "ifcond")
                    .map(Into::into)
                    .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build int compare: {e}")))
            }
        }
    }

    fn append_block(&mut self, func: Self::Function, name: &str) -> Self::Block {
        self.context.append_basic_block(func, name)
    }

    fn position_at_end(&mut self, block: Self::Block) {
        self.builder.position_at_end(block);
    }

    fn current_block(&self) -> Self::Block {
        self.builder.get_insert_block().expect("builder has no insertion point")
    }

    fn br(&mut self, target: Self::Block) -> Result<()> {
        self.builder
            .build_unconditional_branch(target)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build br: {e}")))?;
        Ok(())
    }

    fn cond_br(&mut self, cond: Self::Value, then_bb: Self::Block, else_bb: Self::Block) -> Result<()> {
        self.builder
            .build_conditional_branch(cond.into_int_value(), then_bb, else_bb)
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build cond br: {e}")))?;
        Ok(())
    }

    fn phi(&mut self, ty: Type, incomings: &[(Self::Value, Self::Block)]) -> Result<Self::Value> {
        let phi = self
            .builder
            .build_phi(self.llvm_type(ty), "phitmp")
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build phi: {e}")))?;
        let pairs: Vec<(&dyn BasicValue<'ctx>, Self::Block)> =
            incomings.iter().map(|(v, b)| (v as &dyn BasicValue<'ctx>, *b)).collect();
        phi.add_incoming(&pairs);
        Ok(phi.as_basic_value())
    }

    fn declare_function(&mut self, name: &str, params: &[Type], ret: Type) -> Self::Function {
        if let Some(existing) = self.module.get_function(name) {
            return existing;
        }
        let param_types: Vec<BasicMetadataTypeEnum> =
            params.iter().map(|ty| self.llvm_type(*ty).into()).collect();
        let fn_type = self.llvm_type(ret).fn_type(&param_types, false);
        self.module.add_function(name, fn_type, None)
    }

    fn declare_extern(&mut self, name: &str, params: &[Type], ret: Type) -> Self::Function {
        if let Some(existing) = self.module.get_function(name) {
            return existing;
        }
        let param_types: Vec<BasicMetadataTypeEnum> =
            params.iter().map(|ty| self.llvm_type(*ty).into()).collect();
        let fn_type = match ret {
            Type::Void => self.context.void_type().fn_type(&param_types, false),
            _ => self.llvm_type(ret).fn_type(&param_types, false),
        };
        self.module.add_function(name, fn_type, None)
    }

    fn get_param(&self, func: Self::Function, index: usize) -> Self::Value {
        func.get_nth_param(index as u32).expect("parameter index out of range")
    }

    fn call(&mut self, func: Self::Function, args: &[Self::Value]) -> Result<Self::Value> {
        let args: Vec<BasicMetadataValueEnum> = args.iter().map(|v| (*v).into()).collect();
        let call_site = self
            .builder
            .build_call(func, &args, "calltmp")
            .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build call: {e}")))?;
        // A genuinely void-returning callee (a true-void `extern`) leaves
        // no basic value on `call_site`; its side effect, not its return
        // bits, is what the caller wants, so synthesize the sentinel here
        // instead of reading anything back out of the call instruction.
        Ok(call_site
            .try_as_basic_value()
            .left()
            .unwrap_or_else(|| self.context.i8_type().const_zero().into()))
    }

    fn build_return(&mut self, value: Option<Self::Value>) -> Result<()> {
        match value {
            Some(v) => self.builder.build_return(Some(&v as &dyn BasicValue<'ctx>)),
            None => self.builder.build_return(None),
        }
        .map_err(|e| LowerError::LlvmOperationFailed(format!("failed to build return: {e}")))?;
        Ok(())
    }

    fn verify_function(&self, func: Self::Function) -> std::result::Result<(), String> {
        if func.verify(true) {
            Ok(())
        } else {
            Err(format!("function '{}' failed LLVM verification", func.get_name().to_string_lossy()))
        }
    }

    fn run_function_passes(&self, _func: Self::Function) {
        // Per-function optimization passes are a backend concern spec.md
        // §1 explicitly scopes out of the core front end; left a no-op.
    }

    fn delete_function(&mut self, func: Self::Function) {
        unsafe { func.delete() };
    }

    fn set_debug_location(&mut self, _span: Span, _function: Self::Function) {
        // Source-level debug info (DIBuilder) is only wired up when the
        // driver requests `-g`; see sisp-drv's Session for that path. No
        // debug info requested here means this is a no-op.
    }
}
