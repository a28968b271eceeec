//! The abstract SSA builder lowering is written against (spec.md §6.1).
//!
//! Keeping this a trait rather than calling `inkwell` directly from AST
//! nodes is the one deliberate generalization beyond a single-backend
//! compiler: [`crate::lower::Lowerer`] never imports `inkwell`, so a second
//! `IrBuilder` implementation (a textual IR, an interpreter) could be
//! dropped in without touching the lowering contract.

use sisp_par::Type;

use crate::error::Result;

/// A value together with the sisp type it was computed as. IR backends
/// are untyped at the value level (an `i64` and a `double` are both "a
/// value"), so lowering carries the type alongside every value it
/// produces in order to dispatch `Binary`/`Unary`/zero-value rules.
#[derive(Clone, Copy)]
pub struct Typed<V> {
    pub value: V,
    pub ty: Type,
}

impl<V> Typed<V> {
    pub fn new(value: V, ty: Type) -> Self {
        Self { value, ty }
    }
}

pub trait IrBuilder {
    type Value: Copy;
    type Slot: Copy;
    type Block: Copy;
    type Function: Copy;

    fn const_int(&self, v: i64) -> Self::Value;
    fn const_float(&self, v: f64) -> Self::Value;
    fn const_bool(&self, v: bool) -> Self::Value;
    /// The zero/null value of `ty`, used for default initializers and the
    /// `for` loop's own "no value" result (spec.md §9).
    fn const_zero(&self, ty: Type) -> Self::Value;

    fn alloca(&mut self, name: &str, ty: Type) -> Result<Self::Slot>;
    fn load(&mut self, slot: Self::Slot, ty: Type, name: &str) -> Result<Self::Value>;
    fn store(&mut self, slot: Self::Slot, value: Self::Value) -> Result<()>;

    fn add(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value>;
    fn sub(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value>;
    fn mul(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value>;
    /// Signed-less-than (int) or ordered-less-than (float); result is `Bool`.
    fn cmp_lt(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value>;
    /// Signed-greater-than (int) or ordered-greater-than (float); result is `Bool`.
    fn cmp_gt(&mut self, lhs: Self::Value, rhs: Self::Value, ty: Type) -> Result<Self::Value>;
    /// Not-equal-to-zero, used to turn an `if`/`for` condition into `i1`.
    fn cmp_ne_zero(&mut self, value: Self::Value, ty: Type) -> Result<Self::Value>;

    fn append_block(&mut self, func: Self::Function, name: &str) -> Self::Block;
    fn position_at_end(&mut self, block: Self::Block);
    fn current_block(&self) -> Self::Block;
    fn br(&mut self, target: Self::Block) -> Result<()>;
    fn cond_br(&mut self, cond: Self::Value, then_bb: Self::Block, else_bb: Self::Block) -> Result<()>;
    fn phi(&mut self, ty: Type, incomings: &[(Self::Value, Self::Block)]) -> Result<Self::Value>;

    /// Declares a function whose `Void` return, if any, is the internal
    /// `i8` sentinel (spec.md §4.4) — used for sisp-defined `def`s, which
    /// always lower a body that `build_return`s some value.
    fn declare_function(&mut self, name: &str, params: &[Type], ret: Type) -> Self::Function;
    /// Declares a native `extern` function. Unlike [`Self::declare_function`],
    /// a `Void` return becomes a genuine LLVM `void` type, matching the
    /// native ABI the extern's symbol is actually compiled with — an
    /// `extern` has no sisp-lowered body to produce the `i8` sentinel from.
    fn declare_extern(&mut self, name: &str, params: &[Type], ret: Type) -> Self::Function;
    fn get_param(&self, func: Self::Function, index: usize) -> Self::Value;
    fn call(&mut self, func: Self::Function, args: &[Self::Value]) -> Result<Self::Value>;
    fn build_return(&mut self, value: Option<Self::Value>) -> Result<()>;

    fn verify_function(&self, func: Self::Function) -> std::result::Result<(), String>;
    fn run_function_passes(&self, func: Self::Function);
    fn delete_function(&mut self, func: Self::Function);

    fn set_debug_location(&mut self, span: sisp_util::Span, function: Self::Function);
}
