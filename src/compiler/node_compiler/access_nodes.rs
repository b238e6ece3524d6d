//! Compilers for parameter references, member access and construction.

use super::{NodeCompileContext, compile_args, compile_expr};
use crate::compiler::expr::Expr;
use crate::compiler::symbol::Declaration;
use crate::compiler::types::HostType;
use crate::compiler::utils::validate_ident;
use crate::error::{ShaderResult, unresolved_error};

/// Bare identifier of a declared parameter.
///
/// The name must follow the symbol grammar, the type must be representable, and
/// the enclosing scope must declare the name with that same host type.
pub fn compile_parameter(
    name: &str,
    ty: &HostType,
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    validate_ident("parameter", name)?;
    ctx.types.target_name(ty)?;
    let declared = ctx.scope.resolve::<Declaration>(name)?;
    let declared_ty = declared.symbol().host_type();
    if declared_ty != ty {
        return Err(unresolved_error(
            name,
            format!("declared as {declared_ty}, referenced as {ty}"),
        ));
    }
    Ok(name.to_string())
}

/// `owner.member`
pub fn compile_member(owner: &Expr, member: &str, ctx: &NodeCompileContext) -> ShaderResult<String> {
    validate_ident("member", member)?;
    let owner = compile_expr(owner, ctx)?;
    Ok(format!("{owner}.{member}"))
}

/// `Type(arg0, arg1, ...)`
pub fn compile_construct(
    ty: &HostType,
    args: &[Expr],
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    let name = ctx.types.target_name(ty)?;
    let args = compile_args(args, ctx)?;
    Ok(format!("{name}({})", args.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::node_compiler::test_utils::scope_with;
    use crate::compiler::types::{ScalarType, TypeRegistry};
    use crate::error::ErrorKind;

    #[test]
    fn parameters_must_be_declared_with_matching_type() {
        let types = TypeRegistry::standard();
        let scope = scope_with(&[("a", HostType::FLOAT)], &types);
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        assert_eq!(compile_parameter("a", &HostType::FLOAT, &ctx).unwrap(), "a");
        assert_eq!(
            compile_parameter("a", &HostType::INT, &ctx).unwrap_err().kind(),
            ErrorKind::UnresolvedSymbol
        );
        assert_eq!(
            compile_parameter("b", &HostType::FLOAT, &ctx).unwrap_err().kind(),
            ErrorKind::UnresolvedSymbol
        );
        assert_eq!(
            compile_parameter("a-1", &HostType::FLOAT, &ctx).unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            compile_parameter("a", &HostType::DOUBLE, &ctx).unwrap_err().kind(),
            ErrorKind::UnsupportedType
        );
    }

    #[test]
    fn member_and_construct() {
        let types = TypeRegistry::standard();
        let v3 = HostType::Vector(ScalarType::Float, 3);
        let scope = scope_with(&[("p", v3.clone())], &types);
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        let swizzle = Expr::member(Expr::param("p", v3.clone()), "xy");
        assert_eq!(compile_expr(&swizzle, &ctx).unwrap(), "p.xy");

        let ctor = Expr::construct(
            HostType::Vector(ScalarType::Float, 4),
            vec![Expr::param("p", v3), Expr::float(1.0)],
        );
        assert_eq!(compile_expr(&ctor, &ctx).unwrap(), "float4(p, 1.0)");

        let bad = Expr::construct(HostType::named("Light"), vec![]);
        assert_eq!(
            compile_expr(&bad, &ctx).unwrap_err().kind(),
            ErrorKind::UnsupportedType
        );
    }
}
