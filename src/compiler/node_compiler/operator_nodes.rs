//! Compilers for unary and binary operator nodes.

use super::{NodeCompileContext, compile_expr};
use crate::compiler::expr::{BinaryOp, Expr, UnaryOp};
use crate::compiler::types::HostType;
use crate::error::{ShaderResult, argument_error};

/// Compile a binary node.
///
/// Infix operators are fully parenthesized, assignments are not. Power has no
/// operator in the target language and becomes a `pow` call.
///
/// # Example
/// ```text
/// (a + (b * 2))    pow(a, 2)    a = pow(a, b)    items[i]    a += b
/// ```
pub fn compile_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    let l = compile_expr(left, ctx)?;
    let r = compile_expr(right, ctx)?;
    Ok(match (op, op.symbol()) {
        (BinaryOp::Power, _) => format!("pow({l}, {r})"),
        (BinaryOp::PowerAssign, _) => format!("{l} = pow({l}, {r})"),
        (BinaryOp::Index, _) => format!("{l}[{r}]"),
        (op, Some(sym)) if op.is_assignment() => format!("{l} {sym} {r}"),
        (_, Some(sym)) => format!("({l} {sym} {r})"),
        (op, None) => {
            return Err(argument_error(
                "binary node",
                format!("{op:?} has no operator form"),
            ));
        }
    })
}

/// Compile a unary node.
///
/// Increment/decrement become `(x + 1)` / `(x - 1)` and is-true/is-false become
/// comparisons against boolean literals.
pub fn compile_unary(
    op: UnaryOp,
    operand: &Expr,
    ty: Option<&HostType>,
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    match op {
        UnaryOp::Increment => compile_binary(BinaryOp::Add, operand, &Expr::int(1), ctx),
        UnaryOp::Decrement => compile_binary(BinaryOp::Subtract, operand, &Expr::int(1), ctx),
        UnaryOp::IsTrue => compile_binary(BinaryOp::Equal, operand, &Expr::boolean(true), ctx),
        UnaryOp::IsFalse => compile_binary(BinaryOp::Equal, operand, &Expr::boolean(false), ctx),
        UnaryOp::Convert => {
            let ty = ty.ok_or_else(|| argument_error("convert node", "missing target type"))?;
            let name = ctx.types.target_name(ty)?;
            Ok(format!("({name}){}", compile_expr(operand, ctx)?))
        }
        UnaryOp::Negate => prefix("-", operand, ctx),
        UnaryOp::UnaryPlus => prefix("+", operand, ctx),
        UnaryOp::Not => prefix("!", operand, ctx),
        UnaryOp::OnesComplement => prefix("~", operand, ctx),
    }
}

fn prefix(sym: &str, operand: &Expr, ctx: &NodeCompileContext) -> ShaderResult<String> {
    let text = compile_expr(operand, ctx)?;
    // `-` before `-1` would read as a decrement.
    if text.starts_with(['-', '+']) {
        Ok(format!("{sym}({text})"))
    } else {
        Ok(format!("{sym}{text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::node_compiler::test_utils::scope_with;
    use crate::compiler::types::TypeRegistry;
    use crate::error::ErrorKind;

    fn compile(expr: &Expr) -> ShaderResult<String> {
        let types = TypeRegistry::standard();
        let scope = scope_with(
            &[
                ("a", HostType::FLOAT),
                ("b", HostType::FLOAT),
                ("i", HostType::INT),
                ("flag", HostType::BOOL),
            ],
            &types,
        );
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        compile_expr(expr, &ctx)
    }

    fn a() -> Expr {
        Expr::param("a", HostType::FLOAT)
    }

    fn b() -> Expr {
        Expr::param("b", HostType::FLOAT)
    }

    #[test]
    fn power_becomes_pow_call() {
        let e = Expr::binary(BinaryOp::Power, a(), Expr::int(2));
        let text = compile(&e).unwrap();
        assert_eq!(text, "pow(a, 2)");
        assert!(!text.contains('^'));

        let e = Expr::binary(BinaryOp::PowerAssign, a(), b());
        assert_eq!(compile(&e).unwrap(), "a = pow(a, b)");
    }

    #[test]
    fn infix_nesting_is_parenthesized() {
        let e = Expr::binary(
            BinaryOp::Add,
            a(),
            Expr::binary(BinaryOp::Multiply, b(), Expr::int(2)),
        );
        assert_eq!(compile(&e).unwrap(), "(a + (b * 2))");
        let e = Expr::binary(BinaryOp::ExclusiveOr, Expr::param("i", HostType::INT), Expr::int(3));
        assert_eq!(compile(&e).unwrap(), "(i ^ 3)");
    }

    #[test]
    fn assignments_and_index() {
        let e = Expr::binary(BinaryOp::AddAssign, a(), b());
        assert_eq!(compile(&e).unwrap(), "a += b");
        let e = Expr::binary(BinaryOp::Index, a(), Expr::param("i", HostType::INT));
        assert_eq!(compile(&e).unwrap(), "a[i]");
    }

    #[test]
    fn unary_rewrites() {
        let i = || Expr::param("i", HostType::INT);
        let flag = || Expr::param("flag", HostType::BOOL);
        assert_eq!(compile(&Expr::unary(UnaryOp::Increment, i())).unwrap(), "(i + 1)");
        assert_eq!(compile(&Expr::unary(UnaryOp::Decrement, i())).unwrap(), "(i - 1)");
        assert_eq!(compile(&Expr::unary(UnaryOp::IsTrue, flag())).unwrap(), "(flag == true)");
        assert_eq!(compile(&Expr::unary(UnaryOp::IsFalse, flag())).unwrap(), "(flag == false)");
        assert_eq!(compile(&Expr::unary(UnaryOp::Not, flag())).unwrap(), "!flag");
        assert_eq!(compile(&Expr::unary(UnaryOp::OnesComplement, i())).unwrap(), "~i");
        assert_eq!(compile(&Expr::unary(UnaryOp::Negate, Expr::int(-1))).unwrap(), "-(-1)");
        assert_eq!(compile(&Expr::unary(UnaryOp::UnaryPlus, a())).unwrap(), "+a");
    }

    #[test]
    fn casts_use_target_names() {
        assert_eq!(compile(&Expr::convert(a(), HostType::INT)).unwrap(), "(int)a");
        let err = compile(&Expr::convert(a(), HostType::DOUBLE)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        let missing = compile(&Expr::unary(UnaryOp::Convert, a())).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Argument);
    }
}
