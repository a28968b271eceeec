use rustc_hash::FxHashMap;

use super::Symbol;

/// Owns the strings behind every [`Symbol`] issued during one compilation.
#[derive(Default)]
pub struct Interner {
    strings: Vec<String>,
    lookup: FxHashMap<String, Symbol>,
}

impl Interner {
    pub fn new() -> Self {
        Self { strings: Vec::new(), lookup: FxHashMap::default() }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.lookup.get(s) {
            return sym;
        }
        let sym = Symbol::from_index(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.index()]
    }

    /// Looks up an already-interned string without interning it. Used by
    /// lowering to find the `Symbol` for a mangled operator name (e.g.
    /// `binary#`) without needing a `&mut Interner`.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.lookup.get(s).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_interns_to_same_symbol() {
        let mut interner = Interner::new();
        let a = interner.intern("sq");
        let b = interner.intern("sq");
        let c = interner.intern("cube");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "sq");
    }

    #[test]
    fn get_finds_an_already_interned_string_without_mutating() {
        let mut interner = Interner::new();
        let sq = interner.intern("sq");
        assert_eq!(interner.get("sq"), Some(sq));
        assert_eq!(interner.get("unknown"), None);
    }
}
