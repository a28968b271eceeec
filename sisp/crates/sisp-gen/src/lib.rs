//! sisp-gen — lowers the parsed AST to LLVM IR through the abstract
//! [`ir::IrBuilder`] contract (spec.md §4.4, §6.1).

pub mod error;
pub mod ir;
pub mod llvm;
pub mod lower;

pub use error::{LowerError, Result};
pub use ir::{IrBuilder, Typed};
pub use llvm::LlvmIrBuilder;
pub use lower::Lowerer;
