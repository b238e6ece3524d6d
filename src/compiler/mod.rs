//! Kernel compiler: lowers typed expression graphs or verbatim text into
//! compute-shader source and synthesizes the matching constant-buffer layouts.
//!
//! This module is organized into several submodules:
//! - `types`: computation types, the supported-type allowlist and the type resolver
//! - `symbol` / `scope`: named bindings, registers and nested symbol scopes
//! - `layout`: the dynamic layout builder and raw buffers
//! - `expr`: the expression graph and literals
//! - `node_compiler`: one lowering per expression node kind
//! - `function`: function bodies and signatures
//! - `kernel`: kernel unit assembly and the define/constant surrogates
//! - `validation`: the native shader compiler boundary
//!
//! The main entry point is [`KernelUnit::compile`].

pub mod expr;
pub mod function;
pub mod kernel;
pub mod layout;
pub mod node_compiler;
pub mod scope;
pub mod symbol;
pub mod types;
pub mod utils;
pub mod validation;

pub use expr::{BinaryOp, CallTarget, Constant, Expr, Literal, UnaryOp};
pub use function::{Function, FunctionBody};
pub use kernel::{Access, ConstantBuffer, KernelSource, KernelUnit, Resource, ResourceKind};
pub use layout::{DynamicBuffer, LayoutBuilder, StructLayout, Value};
pub use node_compiler::compile_expr;
pub use scope::SymbolScope;
pub use symbol::{Declaration, Register, RegisterClass, Symbol};
pub use types::{ComputationType, HostType, IntrinsicType, Structure, TypeRegistry};
pub use validation::{Diagnostic, NativeShaderCompiler, compile_native, scan_diagnostics};
