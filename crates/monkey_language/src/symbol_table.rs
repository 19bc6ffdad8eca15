//! Lexical scope resolution for the compiler.
//!
//! A [`SymbolTable`] maps names to `(scope, index)` pairs. Tables nest: the
//! outermost one holds globals and builtins, and every function literal gets
//! an enclosed table whose locals are numbered from zero.
//!
//! Resolving a name that lives in an enclosing *function* scope captures it:
//! the current table records the outer symbol in its free list and rebinds
//! the name as [`SymbolScope::Free`]. Because the outer lookup itself goes
//! through `resolve`, every function boundary between definition and use
//! captures the variable in turn.
//!
//! Each enclosed table owns its outer table. The compiler swaps the chain in
//! and out as it enters and leaves function bodies, so there is never more
//! than one mutable path to any table.

use std::collections::HashMap;

/// The category a name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    /// Program-level binding, stored in the VM's globals array.
    Global,
    /// Function-level binding, stored in the frame's stack slots.
    Local,
    /// Entry in the builtin registry.
    Builtin,
    /// Variable captured from an enclosing function.
    Free,
    /// The function currently being compiled, referenced by its own name.
    Function,
}

/// A resolved name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// The name as written.
    pub name: String,
    /// Where the value lives.
    pub scope: SymbolScope,
    /// Slot within that scope.
    pub index: usize,
}

impl Symbol {
    /// Creates a symbol.
    #[must_use]
    pub fn new(name: impl Into<String>, scope: SymbolScope, index: usize) -> Self {
        Self {
            name: name.into(),
            scope,
            index,
        }
    }
}

/// One lexical scope and, through `outer`, every scope enclosing it.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    free_symbols: Vec<Symbol>,
    outer: Option<Box<SymbolTable>>,
}

impl SymbolTable {
    /// Creates an outermost (global) table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table for a function body nested inside `outer`.
    #[must_use]
    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Gives back the enclosing table, discarding this one.
    #[must_use]
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    /// Returns the enclosing table.
    pub fn outer_mut(&mut self) -> Option<&mut SymbolTable> {
        self.outer.as_deref_mut()
    }

    /// Returns true if this is the outermost table.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Number of globals or locals defined in this table.
    #[must_use]
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    /// Outer symbols this table captured, in capture order.
    #[must_use]
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    /// Names bound directly in this table, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.store.keys().map(String::as_str)
    }

    /// Defines `name` as the next global or local slot.
    ///
    /// Redefining a name rebinds it to a fresh slot.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol::new(name, scope, self.num_definitions);
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Registers a builtin at a fixed registry index.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Builtin, index);
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Binds the name of the function whose body this table describes.
    ///
    /// Parameters and locals with the same name shadow it.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol::new(name, SymbolScope::Function, 0);
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Captures `original` from an enclosing scope as a free variable.
    pub fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol::new(
            original.name.clone(),
            SymbolScope::Free,
            self.free_symbols.len(),
        );
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolves `name`, capturing it if it lives in an enclosing function.
    ///
    /// Returns `None` if no scope defines it.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.outer.as_deref_mut()?.resolve(name)?;
        match outer.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(outer),
            SymbolScope::Local | SymbolScope::Free | SymbolScope::Function => {
                Some(self.define_free(outer))
            }
        }
    }
}
