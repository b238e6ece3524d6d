//! Compiler for constant nodes.

use crate::compiler::expr::Constant;
use crate::compiler::utils::fmt_float;
use crate::error::{ShaderResult, unsupported_node};

/// Source form of a constant.
///
/// # Example
/// ```text
/// Int(2) -> 2    UInt(2) -> 2u    Float(0.5) -> 0.5    Bool(true) -> true
/// ```
pub fn compile_constant(value: &Constant) -> ShaderResult<String> {
    match value {
        Constant::Bool(v) => Ok(v.to_string()),
        Constant::Int(v) => Ok(v.to_string()),
        Constant::UInt(v) => Ok(format!("{v}u")),
        Constant::Float(v) => fmt_float(*v),
        // Doubles are narrowed to float precision first.
        Constant::Double(v) => fmt_float(*v as f32),
        other => Err(unsupported_node(
            "constant",
            format!("{} constants have no source form", other.kind_name()),
        )),
    }
}
