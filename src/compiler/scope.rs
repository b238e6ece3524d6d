//! Nested symbol scopes.
//!
//! A scope borrows its enclosing scope, so lookups chain outward while
//! declarations only ever touch the innermost table. Each scope owns a private
//! [`LayoutBuilder`] for structures materialized inside it.

use std::collections::HashMap;
use std::rc::Rc;

use super::expr::Literal;
use super::function::Function;
use super::layout::{LayoutBuilder, StructLayout};
use super::symbol::{Declaration, Register, Symbol};
use super::types::{Structure, TypeRegistry};
use crate::error::{ShaderResult, duplicate_error, unresolved_error};

/// What a symbol is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    Declaration(Declaration),
    Register(Register),
    Literal(Literal),
    Structure(Rc<Structure>),
    Function(Rc<Function>),
}

impl Binding {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Binding::Declaration(_) => Declaration::KIND,
            Binding::Register(_) => Register::KIND,
            Binding::Literal(_) => Literal::KIND,
            Binding::Structure(_) => Structure::KIND,
            Binding::Function(_) => Function::KIND,
        }
    }
}

impl From<Declaration> for Binding {
    fn from(d: Declaration) -> Self {
        Binding::Declaration(d)
    }
}

impl From<Register> for Binding {
    fn from(r: Register) -> Self {
        Binding::Register(r)
    }
}

impl From<Literal> for Binding {
    fn from(l: Literal) -> Self {
        Binding::Literal(l)
    }
}

impl From<Rc<Structure>> for Binding {
    fn from(s: Rc<Structure>) -> Self {
        Binding::Structure(s)
    }
}

impl From<Rc<Function>> for Binding {
    fn from(f: Rc<Function>) -> Self {
        Binding::Function(f)
    }
}

/// A binding variant that [`SymbolScope::resolve`] can ask for.
pub trait BindingKind {
    const KIND: &'static str;

    fn from_binding(binding: &Binding) -> Option<&Self>;
}

impl BindingKind for Declaration {
    const KIND: &'static str = "declaration";

    fn from_binding(binding: &Binding) -> Option<&Self> {
        match binding {
            Binding::Declaration(d) => Some(d),
            _ => None,
        }
    }
}

impl BindingKind for Register {
    const KIND: &'static str = "register";

    fn from_binding(binding: &Binding) -> Option<&Self> {
        match binding {
            Binding::Register(r) => Some(r),
            _ => None,
        }
    }
}

impl BindingKind for Literal {
    const KIND: &'static str = "literal";

    fn from_binding(binding: &Binding) -> Option<&Self> {
        match binding {
            Binding::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl BindingKind for Structure {
    const KIND: &'static str = "structure";

    fn from_binding(binding: &Binding) -> Option<&Self> {
        match binding {
            Binding::Structure(s) => Some(s.as_ref()),
            _ => None,
        }
    }
}

impl BindingKind for Function {
    const KIND: &'static str = "function";

    fn from_binding(binding: &Binding) -> Option<&Self> {
        match binding {
            Binding::Function(f) => Some(f.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SymbolScope<'p> {
    name: String,
    parent: Option<&'p SymbolScope<'p>>,
    symbols: HashMap<String, Binding>,
    layouts: LayoutBuilder,
}

impl SymbolScope<'static> {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            symbols: HashMap::new(),
            layouts: LayoutBuilder::new(),
        }
    }
}

impl<'p> SymbolScope<'p> {
    /// A nested scope whose lookups fall back to `self`.
    pub fn child(&self, name: impl Into<String>) -> SymbolScope<'_> {
        SymbolScope {
            name: name.into(),
            parent: Some(self),
            symbols: HashMap::new(),
            layouts: LayoutBuilder::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&SymbolScope<'p>> {
        self.parent
    }

    /// Whether `name` is declared here or in any enclosing scope.
    pub fn is_declared(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Whether `name` is declared in this scope itself.
    pub fn is_declared_locally(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Bind `symbol` in this scope. Shadowing an outer binding is allowed.
    pub fn declare(&mut self, symbol: &Symbol, binding: impl Into<Binding>) -> ShaderResult<()> {
        if self.symbols.contains_key(symbol.name()) {
            return Err(duplicate_error(symbol.name(), format!("scope `{}`", self.name)));
        }
        self.symbols
            .insert(symbol.name().to_string(), binding.into());
        Ok(())
    }

    /// Innermost binding of `name`, of any kind.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.symbols.get(name) {
                return Some(binding);
            }
            scope = current.parent;
        }
        None
    }

    /// Innermost binding of `name`, which must be of kind `K`.
    pub fn resolve<K: BindingKind>(&self, name: &str) -> ShaderResult<&K> {
        let binding = self
            .lookup(name)
            .ok_or_else(|| unresolved_error(name, format!("not declared in scope `{}`", self.name)))?;
        K::from_binding(binding).ok_or_else(|| {
            unresolved_error(
                name,
                format!("bound to a {}, not a {}", binding.kind_name(), K::KIND),
            )
        })
    }

    pub fn layouts(&self) -> &LayoutBuilder {
        &self.layouts
    }

    /// Lay out `structure` with this scope's builder.
    pub fn materialize(
        &self,
        structure: &Structure,
        types: &TypeRegistry,
    ) -> ShaderResult<Rc<StructLayout>> {
        structure.create_layout(types, &self.layouts)
    }

    /// Drop every declaration and tear down the layout builder.
    pub fn teardown(&mut self) {
        self.symbols.clear();
        self.layouts.teardown();
    }
}
