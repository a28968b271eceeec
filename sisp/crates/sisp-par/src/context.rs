//! State shared by every parse in one invocation: the string interner, the
//! prototype registry, and the operator precedence table (spec.md §3.6,
//! §3.7, §5). Collapsing these into one owned value is the "no
//! process-global mutable state" discipline spec.md §9 asks for instead of
//! the source's module-level globals.

use rustc_hash::FxHashMap;
use sisp_util::{Interner, Symbol};

use crate::ast::Prototype;

/// Sentinel returned for a character with no declared precedence
/// (spec.md §3.7).
pub const NO_PRECEDENCE: i32 = -1;

pub struct CompilationContext {
    pub interner: Interner,
    pub prototypes: FxHashMap<Symbol, Prototype>,
    precedence: FxHashMap<char, i32>,
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationContext {
    pub fn new() -> Self {
        let mut precedence = FxHashMap::default();
        precedence.insert('=', 2);
        precedence.insert('<', 10);
        precedence.insert('>', 10);
        precedence.insert('+', 20);
        precedence.insert('-', 20);
        precedence.insert('*', 40);

        Self { interner: Interner::new(), prototypes: FxHashMap::default(), precedence }
    }

    /// Precedence of `op`, or [`NO_PRECEDENCE`] if `op` has none declared.
    pub fn precedence_of(&self, op: char) -> i32 {
        self.precedence.get(&op).copied().unwrap_or(NO_PRECEDENCE)
    }

    /// Records a `binary` declaration's precedence for `op` (spec.md
    /// §3.7: "extended at `binary` definition parse time").
    pub fn set_precedence(&mut self, op: char, value: i32) {
        self.precedence.insert(op, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_operators_are_seeded() {
        let ctx = CompilationContext::new();
        assert_eq!(ctx.precedence_of('*'), 40);
        assert_eq!(ctx.precedence_of('+'), 20);
        assert_eq!(ctx.precedence_of('<'), 10);
    }

    #[test]
    fn unknown_operator_has_no_precedence() {
        let ctx = CompilationContext::new();
        assert_eq!(ctx.precedence_of('#'), NO_PRECEDENCE);
    }

    #[test]
    fn binary_declaration_extends_the_table() {
        let mut ctx = CompilationContext::new();
        ctx.set_precedence('#', 25);
        assert_eq!(ctx.precedence_of('#'), 25);
    }
}
