//! Utility functions shared by the code generators.

use crate::error::{ShaderResult, argument_error, range_error};

/// Indentation unit of emitted source.
pub const INDENT: &str = "\t";

/// Whether `s` matches `^[a-z_][a-z0-9_]*$`, ignoring ASCII case.
pub fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check an identifier against the symbol grammar, naming `what` on failure.
pub fn validate_ident<'a>(what: &str, s: &'a str) -> ShaderResult<&'a str> {
    if is_valid_ident(s) {
        Ok(s)
    } else {
        Err(argument_error(
            what,
            format!("`{s}` does not match ^[a-z_][a-z0-9_]*$"),
        ))
    }
}

/// Format a float for shader source.
///
/// Rust float formatting never depends on the process locale. The debug form
/// keeps a decimal point or exponent so the literal stays float-typed.
pub fn fmt_float(v: f32) -> ShaderResult<String> {
    if !v.is_finite() {
        return Err(range_error("float literal", format!("{v} has no source form")));
    }
    Ok(format!("{v:?}"))
}

/// Indent every non-empty line of `text` by `level` units.
pub fn indent_lines(text: &str, level: usize) -> String {
    let prefix = INDENT.repeat(level);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap already-terminated statement lines in an indented brace block.
pub fn brace_block(body: &str) -> String {
    if body.trim().is_empty() {
        return "{\n}".to_string();
    }
    format!("{{\n{}\n}}", indent_lines(body, 1))
}
