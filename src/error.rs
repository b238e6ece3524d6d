//! Error kinds raised while compiling kernels and synthesizing layouts.
//!
//! Every failure is fatal to the unit being compiled: nothing is retried and no
//! partial output is returned.

use thiserror::Error;

use crate::compiler::validation::{Diagnostic, format_diagnostics};

/// Result alias used across the compiler.
pub type ShaderResult<T> = Result<T, ShaderError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShaderError {
    #[error("invalid {what}: {reason}")]
    Argument { what: String, reason: String },

    #[error("{what} out of range: {reason}")]
    Range { what: String, reason: String },

    #[error("duplicate declaration of `{name}` in {scope}")]
    DuplicateDeclaration { name: String, scope: String },

    #[error("unresolved symbol `{name}`: {reason}")]
    UnresolvedSymbol { name: String, reason: String },

    #[error("unsupported type `{ty}`")]
    UnsupportedType { ty: String },

    #[error("unsupported node `{kind}`: {detail}")]
    UnsupportedNode { kind: String, detail: String },

    #[error("native shader compilation failed:\n{}", format_diagnostics(.diagnostics))]
    CompileDiagnostics { diagnostics: Vec<Diagnostic> },

    #[error("field `{field}` of structure `{structure}`: {source}")]
    Field {
        structure: String,
        field: String,
        #[source]
        source: Box<ShaderError>,
    },
}

/// Category of a [`ShaderError`], for callers that branch on the kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Range,
    DuplicateDeclaration,
    UnresolvedSymbol,
    UnsupportedType,
    UnsupportedNode,
    CompileDiagnostic,
}

impl ShaderError {
    /// The category of this error. Field errors report the kind of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShaderError::Argument { .. } => ErrorKind::Argument,
            ShaderError::Range { .. } => ErrorKind::Range,
            ShaderError::DuplicateDeclaration { .. } => ErrorKind::DuplicateDeclaration,
            ShaderError::UnresolvedSymbol { .. } => ErrorKind::UnresolvedSymbol,
            ShaderError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            ShaderError::UnsupportedNode { .. } => ErrorKind::UnsupportedNode,
            ShaderError::CompileDiagnostics { .. } => ErrorKind::CompileDiagnostic,
            ShaderError::Field { source, .. } => source.kind(),
        }
    }
}

pub fn argument_error(what: impl Into<String>, reason: impl std::fmt::Display) -> ShaderError {
    ShaderError::Argument {
        what: what.into(),
        reason: reason.to_string(),
    }
}

pub fn range_error(what: impl Into<String>, reason: impl std::fmt::Display) -> ShaderError {
    ShaderError::Range {
        what: what.into(),
        reason: reason.to_string(),
    }
}

pub fn duplicate_error(name: impl Into<String>, scope: impl Into<String>) -> ShaderError {
    ShaderError::DuplicateDeclaration {
        name: name.into(),
        scope: scope.into(),
    }
}

pub fn unresolved_error(name: impl Into<String>, reason: impl std::fmt::Display) -> ShaderError {
    ShaderError::UnresolvedSymbol {
        name: name.into(),
        reason: reason.to_string(),
    }
}

pub fn unsupported_type(ty: impl std::fmt::Display) -> ShaderError {
    ShaderError::UnsupportedType { ty: ty.to_string() }
}

pub fn unsupported_node(kind: impl Into<String>, detail: impl std::fmt::Display) -> ShaderError {
    ShaderError::UnsupportedNode {
        kind: kind.into(),
        detail: detail.to_string(),
    }
}
