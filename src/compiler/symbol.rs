//! Named, typed bindings: symbols, declarations and hardware registers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{ComputationType, HostType, IntrinsicType, TypeRegistry};
use super::utils::validate_ident;
use crate::config::RegisterPolicy;
use crate::error::{ShaderResult, argument_error, range_error};

/// A validated identifier paired with its host value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    name: String,
    ty: HostType,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: HostType) -> ShaderResult<Self> {
        let name = name.into();
        validate_ident("symbol", &name)?;
        Ok(Self { name, ty })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host_type(&self) -> &HostType {
        &self.ty
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A parameter or field: symbol plus computation type.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    symbol: Symbol,
    ty: ComputationType,
    semantic: Option<String>,
}

impl Declaration {
    pub fn new(symbol: Symbol, ty: ComputationType) -> ShaderResult<Self> {
        if let ComputationType::Intrinsic(t) = &ty {
            let expected = IntrinsicType::from_host(symbol.host_type())?;
            if expected != *t {
                return Err(argument_error(
                    format!("declaration `{}`", symbol.name()),
                    format!("host type {} does not match {t}", symbol.host_type()),
                ));
            }
        }
        Ok(Self {
            symbol,
            ty,
            semantic: None,
        })
    }

    /// Declare `name` with the computation type the registry binds to `host`.
    pub fn resolve(
        name: impl Into<String>,
        host: HostType,
        types: &TypeRegistry,
    ) -> ShaderResult<Self> {
        let ty = types.resolve(&host)?.clone();
        Self::new(Symbol::new(name, host)?, ty)
    }

    /// Attach a system-value or user semantic such as `SV_DispatchThreadID`.
    pub fn with_semantic(mut self, semantic: impl Into<String>) -> ShaderResult<Self> {
        let semantic = semantic.into();
        validate_ident("semantic", &semantic)?;
        self.semantic = Some(semantic);
        Ok(self)
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        self.symbol.name()
    }

    pub fn computation_type(&self) -> &ComputationType {
        &self.ty
    }

    pub fn semantic(&self) -> Option<&str> {
        self.semantic.as_deref()
    }

    /// `type name` or `type name : SEMANTIC`, with the type checked against the allowlist.
    pub fn write(&self, types: &TypeRegistry) -> ShaderResult<String> {
        let ty = types.target_name(self.symbol.host_type())?;
        Ok(match &self.semantic {
            Some(semantic) => format!("{ty} {} : {semantic}", self.name()),
            None => format!("{ty} {}", self.name()),
        })
    }
}

/// Hardware binding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RegisterClass {
    ConstantBuffer,
    ReadOnlyResource,
    ReadWriteResource,
}

impl RegisterClass {
    pub fn prefix(self) -> char {
        match self {
            RegisterClass::ConstantBuffer => 'b',
            RegisterClass::ReadOnlyResource => 't',
            RegisterClass::ReadWriteResource => 'u',
        }
    }
}

/// A labelled binding slot such as `b0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Register {
    label: String,
    class: RegisterClass,
    index: u32,
}

impl Register {
    pub fn new(
        label: impl Into<String>,
        class: RegisterClass,
        index: u32,
        policy: &RegisterPolicy,
    ) -> ShaderResult<Self> {
        let label = label.into();
        validate_ident("register label", &label)?;
        let max = policy.max_index(class);
        if index > max {
            return Err(range_error(
                format!("register for `{label}`"),
                format!("{}{index} exceeds the maximum index {max}", class.prefix()),
            ));
        }
        Ok(Self {
            label,
            class,
            index,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn class(&self) -> RegisterClass {
        self.class
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// `<class><index>`, e.g. `u3`.
    pub fn key(&self) -> String {
        format!("{}{}", self.class.prefix(), self.index)
    }

    /// Binding point as written in source, e.g. `register(b0)`.
    pub fn binding(&self) -> String {
        format!("register({})", self.key())
    }
}
