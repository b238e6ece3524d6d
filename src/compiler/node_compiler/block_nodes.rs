//! Compiler for block nodes.

use super::{NodeCompileContext, compile_expr};
use crate::compiler::expr::Expr;
use crate::compiler::utils::brace_block;
use crate::error::ShaderResult;

/// Brace-wrapped block, one terminated line per statement.
///
/// With `wrap_return`, the final statement is emitted as `return <expr>;`.
pub fn compile_block(
    statements: &[Expr],
    wrap_return: bool,
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    let mut lines = Vec::with_capacity(statements.len());
    for (i, statement) in statements.iter().enumerate() {
        let last = i + 1 == statements.len();
        lines.push(compile_statement(statement, wrap_return && last, ctx)?);
    }
    Ok(brace_block(&lines.join("\n")))
}

/// One statement line, or a nested block.
pub fn compile_statement(
    statement: &Expr,
    wrap_return: bool,
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    if let Expr::Block { statements } = statement {
        return compile_block(statements, wrap_return, ctx);
    }
    let text = compile_expr(statement, ctx)?;
    Ok(if wrap_return {
        format!("return {text};")
    } else {
        format!("{text};")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::expr::BinaryOp;
    use crate::compiler::node_compiler::test_utils::scope_with;
    use crate::compiler::types::{HostType, TypeRegistry};

    #[test]
    fn last_statement_returns() {
        let types = TypeRegistry::standard();
        let scope = scope_with(&[("a", HostType::FLOAT)], &types);
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        let a = || Expr::param("a", HostType::FLOAT);
        let statements = vec![
            Expr::binary(BinaryOp::MultiplyAssign, a(), Expr::float(2.0)),
            Expr::block(vec![Expr::binary(BinaryOp::AddAssign, a(), Expr::int(1))]),
            a(),
        ];
        let text = compile_block(&statements, true, &ctx).unwrap();
        assert_eq!(
            text,
            "{\n\ta *= 2.0;\n\t{\n\t\ta += 1;\n\t}\n\treturn a;\n}"
        );
        let text = compile_block(&statements[..1], false, &ctx).unwrap();
        assert_eq!(text, "{\n\ta *= 2.0;\n}");
    }
}
