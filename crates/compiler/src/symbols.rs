//! Symbol table for the semantic phase
//!
//! Two-level lookup: a global scope, and at most one procedure scope
//! stacked on top while a procedure body is analyzed. The builtin type
//! names are pre-populated as symbols; `STRING` is defined lazily on
//! first use of a string literal.

use pas_core::Value;
use std::collections::HashMap;

/// A resolved source-level type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Integer,
    Real,
    Str,
}

impl Ty {
    pub fn name(self) -> &'static str {
        match self {
            Ty::Integer => "INTEGER",
            Ty::Real => "REAL",
            Ty::Str => "STRING",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarSymbol {
    pub name: String,
    pub ty: Ty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstSymbol {
    pub name: String,
    pub ty: Ty,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcSymbol {
    pub name: String,
    pub params: Vec<VarSymbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    BuiltinType(Ty),
    Var(VarSymbol),
    Const(ConstSymbol),
    Proc(ProcSymbol),
}

impl Symbol {
    /// The value type an expression naming this symbol has, if any.
    pub fn value_type(&self) -> Option<Ty> {
        match self {
            Symbol::Var(v) => Some(v.ty),
            Symbol::Const(c) => Some(c.ty),
            Symbol::BuiltinType(_) | Symbol::Proc(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    global: HashMap<String, Symbol>,
    /// Procedure scope while a procedure body is being analyzed.
    local: Option<HashMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = SymbolTable {
            global: HashMap::new(),
            local: None,
        };
        table
            .global
            .insert("INTEGER".to_string(), Symbol::BuiltinType(Ty::Integer));
        table
            .global
            .insert("REAL".to_string(), Symbol::BuiltinType(Ty::Real));
        table
    }

    /// Define in the innermost scope. Returns false when the name is
    /// already taken in that scope.
    pub fn define(&mut self, name: &str, symbol: Symbol) -> bool {
        let scope = self.local.as_mut().unwrap_or(&mut self.global);
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), symbol);
        true
    }

    /// Define in the global scope regardless of the active scope; used
    /// for the lazily created `STRING` type.
    pub fn define_global(&mut self, name: &str, symbol: Symbol) {
        self.global.entry(name.to_string()).or_insert(symbol);
    }

    /// Innermost-first lookup.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        if let Some(local) = &self.local
            && let Some(symbol) = local.get(name)
        {
            return Some(symbol);
        }
        self.global.get(name)
    }

    /// Lookup restricted to the innermost scope, for duplicate checks.
    pub fn lookup_current_scope(&self, name: &str) -> Option<&Symbol> {
        match &self.local {
            Some(local) => local.get(name),
            None => self.global.get(name),
        }
    }

    /// Lookup restricted to the global scope, for shadowing checks.
    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.global.get(name)
    }

    pub fn enter_procedure_scope(&mut self) {
        self.local = Some(HashMap::new());
    }

    pub fn leave_procedure_scope(&mut self) {
        self.local = None;
    }

    pub fn in_procedure_scope(&self) -> bool {
        self.local.is_some()
    }
}
