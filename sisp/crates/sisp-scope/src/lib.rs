//! The lexical scope tree: nested symbol tables mapping names to storage
//! handles (spec.md §3.5, §4.3).
//!
//! A scope tree is an arena: every `{...}` block and every function body
//! gets a fresh child rib, AST nodes hold only a non-owning [`RibId`] back
//! into the arena, and the arena itself is owned by the enclosing
//! `Function` for as long as any node might need to resolve a name in it
//! (spec.md §9's "give every function an arena ... back-pointers are
//! stable indices rather than ownership edges").
//!
//! [`StorageSlot`] is the "opaque IR handle" spec.md §3.5 describes: a
//! typed index, not an LLVM value. `sisp-gen` keeps its own table mapping
//! each `StorageSlot` to the `PointerValue` it allocated, so this crate
//! carries no codegen dependency.

use rustc_hash::FxHashMap;
use sisp_util::{define_idx, IndexVec, Symbol};

define_idx!(RibId);
define_idx!(StorageSlot);

struct Rib {
    bindings: FxHashMap<Symbol, StorageSlot>,
    parent: Option<RibId>,
}

/// The arena of ribs for one function's scope tree.
#[derive(Default)]
pub struct ScopeTree {
    ribs: IndexVec<RibId, Rib>,
}

impl ScopeTree {
    /// A tree with a single root rib (the function scope) and no parent.
    pub fn new() -> Self {
        let mut ribs = IndexVec::new();
        ribs.push(Rib { bindings: FxHashMap::default(), parent: None });
        Self { ribs }
    }

    pub fn root(&self) -> RibId {
        RibId(0)
    }

    /// Allocates a fresh child rib of `parent`. Used for every `{...}`
    /// compound block and for a `for` loop's induction-variable scope.
    pub fn child_of(&mut self, parent: RibId) -> RibId {
        self.ribs.push(Rib { bindings: FxHashMap::default(), parent: Some(parent) })
    }

    /// Inserts into `scope`'s local frame, shadowing any outer binding of
    /// the same name for the remainder of the scope (spec.md §4.3).
    pub fn insert(&mut self, scope: RibId, name: Symbol, storage: StorageSlot) {
        self.ribs[scope].bindings.insert(name, storage);
    }

    /// Walks `scope` and its ancestors looking for `name`. Returns `None`
    /// if unbound in any enclosing scope (the `UnknownName` error, spec.md
    /// §7).
    pub fn lookup(&self, scope: RibId, name: Symbol) -> Option<StorageSlot> {
        let mut current = scope;
        loop {
            let rib = &self.ribs[current];
            if let Some(&storage) = rib.bindings.get(&name) {
                return Some(storage);
            }
            current = rib.parent?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sisp_util::Interner;

    #[test]
    fn inner_binding_shadows_outer() {
        let mut interner = Interner::new();
        let x = interner.intern("x");

        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.insert(root, x, StorageSlot(1));

        let inner = tree.child_of(root);
        tree.insert(inner, x, StorageSlot(2));

        assert_eq!(tree.lookup(inner, x), Some(StorageSlot(2)));
        assert_eq!(tree.lookup(root, x), Some(StorageSlot(1)));
    }

    #[test]
    fn unbound_name_resolves_to_none() {
        let mut interner = Interner::new();
        let y = interner.intern("y");
        let tree = ScopeTree::new();
        assert_eq!(tree.lookup(tree.root(), y), None);
    }

    #[test]
    fn lookup_walks_multiple_levels_to_outermost() {
        let mut interner = Interner::new();
        let x = interner.intern("x");

        let mut tree = ScopeTree::new();
        let root = tree.root();
        tree.insert(root, x, StorageSlot(7));

        let child = tree.child_of(root);
        let grandchild = tree.child_of(child);

        assert_eq!(tree.lookup(grandchild, x), Some(StorageSlot(7)));
    }
}
