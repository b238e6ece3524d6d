//! Compiler for call nodes.
//!
//! Static calls are first offered to the active [`CallResolver`]; otherwise
//! only a fixed set of host math functions is lowered, to the matching target
//! intrinsics. Calls with a receiver are never lowered.

use super::{NodeCompileContext, compile_args};
use crate::compiler::expr::{CallTarget, Expr};
use crate::compiler::types::HostType;
use crate::error::{ShaderResult, unsupported_node};

/// Host classes whose static methods map onto target intrinsics.
const MATH_OWNERS: &[&str] = &["Math", "MathF"];

/// Host method name -> target intrinsic name.
const MATH_INTRINSICS: &[(&str, &str)] = &[
    ("Abs", "abs"),
    ("Acos", "acos"),
    ("Asin", "asin"),
    ("Atan", "atan"),
    ("Atan2", "atan2"),
    ("Ceiling", "ceil"),
    ("Cos", "cos"),
    ("Cosh", "cosh"),
    ("Exp", "exp"),
    ("Floor", "floor"),
    ("Log", "log"),
    ("Log10", "log10"),
    ("Max", "max"),
    ("Min", "min"),
    ("Pow", "pow"),
    ("Round", "round"),
    ("Sign", "sign"),
    ("Sin", "sin"),
    ("Sinh", "sinh"),
    ("Sqrt", "sqrt"),
    ("Tan", "tan"),
    ("Tanh", "tanh"),
    ("Truncate", "trunc"),
];

pub fn math_intrinsic(owner: &str, method: &str) -> Option<&'static str> {
    if !MATH_OWNERS.contains(&owner) {
        return None;
    }
    MATH_INTRINSICS
        .iter()
        .find(|(host, _)| *host == method)
        .map(|(_, target)| *target)
}

pub fn compile_call(
    target: &CallTarget,
    ty: &HostType,
    args: &[Expr],
    ctx: &NodeCompileContext,
) -> ShaderResult<String> {
    let (owner, method) = match target {
        CallTarget::Static { owner, method } => (owner.as_str(), method.as_str()),
        CallTarget::Instance { method, .. } => {
            return Err(unsupported_node(
                "call",
                format!("instance call `{method}` has a receiver"),
            ));
        }
    };

    if let Some(resolver) = ctx.resolver {
        if let Some(ident) = resolver.resolve_call(owner, method, args, ty, ctx.types)? {
            return Ok(ident);
        }
    }

    let Some(intrinsic) = math_intrinsic(owner, method) else {
        return Err(unsupported_node(
            "call",
            format!("no lowering for static call `{owner}.{method}`"),
        ));
    };
    let args = compile_args(args, ctx)?;
    Ok(format!("{intrinsic}({})", args.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::node_compiler::{CallResolver, compile_expr, test_utils::scope_with};
    use crate::compiler::types::TypeRegistry;
    use crate::error::ErrorKind;

    struct FixedResolver;

    impl CallResolver for FixedResolver {
        fn resolve_call(
            &self,
            owner: &str,
            method: &str,
            _args: &[Expr],
            _ty: &HostType,
            _types: &TypeRegistry,
        ) -> ShaderResult<Option<String>> {
            Ok((owner == "Math" && method == "Sqrt").then(|| "custom_sqrt".to_string()))
        }
    }

    fn x() -> Expr {
        Expr::param("x", HostType::FLOAT)
    }

    #[test]
    fn math_allowlist_with_renames() {
        let types = TypeRegistry::standard();
        let scope = scope_with(&[("x", HostType::FLOAT)], &types);
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        let call = Expr::static_call("MathF", "Truncate", HostType::FLOAT, vec![x()]);
        assert_eq!(compile_expr(&call, &ctx).unwrap(), "trunc(x)");
        let call = Expr::static_call("Math", "Max", HostType::FLOAT, vec![x(), Expr::float(0.5)]);
        assert_eq!(compile_expr(&call, &ctx).unwrap(), "max(x, 0.5)");
        let call = Expr::static_call("Console", "Sin", HostType::FLOAT, vec![x()]);
        assert_eq!(
            compile_expr(&call, &ctx).unwrap_err().kind(),
            ErrorKind::UnsupportedNode
        );
    }

    #[test]
    fn resolver_gets_first_refusal() {
        let types = TypeRegistry::standard();
        let scope = scope_with(&[("x", HostType::FLOAT)], &types);
        let resolver = FixedResolver;
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: Some(&resolver),
        };
        let call = Expr::static_call("Math", "Sqrt", HostType::FLOAT, vec![x()]);
        assert_eq!(compile_expr(&call, &ctx).unwrap(), "custom_sqrt");
        let call = Expr::static_call("Math", "Sin", HostType::FLOAT, vec![x()]);
        assert_eq!(compile_expr(&call, &ctx).unwrap(), "sin(x)");
    }

    #[test]
    fn instance_calls_are_declined() {
        let types = TypeRegistry::standard();
        let scope = scope_with(&[("x", HostType::FLOAT)], &types);
        let ctx = NodeCompileContext {
            types: &types,
            scope: &scope,
            resolver: None,
        };
        let call = Expr::Call {
            target: CallTarget::Instance {
                receiver: Box::new(x()),
                method: "Abs".to_string(),
            },
            ty: HostType::FLOAT,
            args: vec![],
        };
        assert_eq!(
            compile_expr(&call, &ctx).unwrap_err().kind(),
            ErrorKind::UnsupportedNode
        );
    }
}
