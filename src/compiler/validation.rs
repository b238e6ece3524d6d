//! Boundary to the native shader compiler.
//!
//! The native compiler is an external collaborator reached through
//! [`NativeShaderCompiler`]. Its log is never parsed beyond the fixed
//! `file(line,col[-col]): error|warning CODE: message` line form.

use std::fmt;

use log::warn;
use serde::Serialize;

use super::kernel::KernelSource;
use crate::error::{ShaderError, ShaderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// One diagnostic reported by the native compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub code: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{}): {} {}: {}",
            self.file, self.line, self.column, self.severity, self.code, self.message
        )
    }
}

pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Raw result of one native compilation.
#[derive(Debug, Clone, Default)]
pub struct NativeOutput {
    pub bytecode: Option<Vec<u8>>,
    pub log: String,
}

/// Accepts (source text, entry point, target profile).
pub trait NativeShaderCompiler {
    fn compile(&self, source: &str, entry_point: &str, profile: &str) -> NativeOutput;
}

/// Bytecode plus the warnings reported alongside it.
#[derive(Debug, Clone)]
pub struct CompiledKernel {
    pub bytecode: Vec<u8>,
    pub warnings: Vec<Diagnostic>,
}

/// Every diagnostic line in a native compiler log. Other lines are skipped.
pub fn scan_diagnostics(log: &str) -> Vec<Diagnostic> {
    log.lines().filter_map(scan_line).collect()
}

fn scan_line(line: &str) -> Option<Diagnostic> {
    let (head, rest) = line.trim().split_once("): ")?;
    let open = head.rfind('(')?;
    let file = head[..open].to_string();
    let (line_no, column) = head[open + 1..].split_once(',')?;
    let column = column.split('-').next()?;

    let (severity, rest) = rest.split_once(' ')?;
    let severity = match severity {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => return None,
    };
    let (code, message) = rest.split_once(": ")?;
    if code.is_empty() || code.contains(char::is_whitespace) {
        return None;
    }

    Some(Diagnostic {
        severity,
        file,
        line: line_no.trim().parse().ok()?,
        column: column.trim().parse().ok()?,
        code: code.to_string(),
        message: message.trim().to_string(),
    })
}

/// Run `compiler` over `source`; any error diagnostic fails the unit.
pub fn compile_native(
    compiler: &dyn NativeShaderCompiler,
    source: &KernelSource,
) -> ShaderResult<CompiledKernel> {
    let output = compiler.compile(&source.text, &source.entry_point, &source.profile);
    let diagnostics = scan_diagnostics(&output.log);
    let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
        .into_iter()
        .partition(|d| d.severity == Severity::Error);

    for w in &warnings {
        warn!("native compiler: {w}");
    }
    if !errors.is_empty() {
        return Err(ShaderError::CompileDiagnostics {
            diagnostics: errors,
        });
    }
    match output.bytecode {
        Some(bytecode) => Ok(CompiledKernel { bytecode, warnings }),
        None => Err(ShaderError::CompileDiagnostics {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                file: source.entry_point.clone(),
                line: 0,
                column: 0,
                code: "NOBYTECODE".to_string(),
                message: "native compiler produced no bytecode".to_string(),
            }],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Canned(NativeOutput);

    impl NativeShaderCompiler for Canned {
        fn compile(&self, _source: &str, _entry_point: &str, _profile: &str) -> NativeOutput {
            self.0.clone()
        }
    }

    fn source() -> KernelSource {
        KernelSource {
            text: "void main()\n{\n}\n".to_string(),
            entry_point: "main".to_string(),
            profile: "cs_5_0".to_string(),
        }
    }

    #[test]
    fn scans_fixed_form_lines_only() {
        let log = "\
kernel.hlsl(4,12-15): error X3004: undeclared identifier 'foo'
compilation failed; no code produced
kernel.hlsl(9,5): warning X3206: implicit truncation of vector type
";
        let found = scan_diagnostics(log);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].severity, Severity::Error);
        assert_eq!((found[0].line, found[0].column), (4, 12));
        assert_eq!(found[0].code, "X3004");
        assert_eq!(found[0].message, "undeclared identifier 'foo'");
        assert_eq!(found[1].severity, Severity::Warning);
        assert_eq!(found[1].to_string(), "kernel.hlsl(9,5): warning X3206: implicit truncation of vector type");
    }

    #[test]
    fn errors_fail_the_unit_and_keep_messages() {
        let compiler = Canned(NativeOutput {
            bytecode: None,
            log: "k.hlsl(1,1): error X3000: syntax error: unexpected token '}'".to_string(),
        });
        let err = compile_native(&compiler, &source()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileDiagnostic);
        assert!(err.to_string().contains("syntax error: unexpected token '}'"));
    }

    #[test]
    fn warnings_do_not_fail() {
        let compiler = Canned(NativeOutput {
            bytecode: Some(vec![0x44, 0x58, 0x42, 0x43]),
            log: "k.hlsl(2,3): warning X3557: loop only executes for 1 iteration".to_string(),
        });
        let compiled = compile_native(&compiler, &source()).unwrap();
        assert_eq!(compiled.bytecode, b"DXBC");
        assert_eq!(compiled.warnings.len(), 1);
    }

    #[test]
    fn missing_bytecode_without_errors_still_fails() {
        let compiler = Canned(NativeOutput::default());
        assert_eq!(
            compile_native(&compiler, &source()).unwrap_err().kind(),
            ErrorKind::CompileDiagnostic
        );
    }
}
