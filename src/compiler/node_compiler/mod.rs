//! Node compiler infrastructure.
//!
//! Every expression node kind has exactly one lowering; the dispatch below is
//! an exhaustive match, so adding a node kind without a lowering does not
//! compile.

pub mod access_nodes;
pub mod block_nodes;
pub mod call_nodes;
pub mod constant_nodes;
pub mod operator_nodes;

use super::expr::Expr;
use super::scope::SymbolScope;
use super::types::{HostType, TypeRegistry};
use crate::error::{ShaderResult, unsupported_node};

/// Hook that may claim a static call before the math allowlist sees it.
pub trait CallResolver {
    /// `Ok(Some(ident))` claims the call and emits `ident` verbatim;
    /// `Ok(None)` declines it.
    fn resolve_call(
        &self,
        owner: &str,
        method: &str,
        args: &[Expr],
        ty: &HostType,
        types: &TypeRegistry,
    ) -> ShaderResult<Option<String>>;
}

/// Everything a node lowering may consult.
pub struct NodeCompileContext<'a> {
    pub types: &'a TypeRegistry,
    /// Scope holding the parameters of the function being compiled.
    pub scope: &'a SymbolScope<'a>,
    pub resolver: Option<&'a dyn CallResolver>,
}

/// Lower one expression node to source text.
pub fn compile_expr(expr: &Expr, ctx: &NodeCompileContext) -> ShaderResult<String> {
    match expr {
        Expr::Block { statements } => block_nodes::compile_block(statements, false, ctx),
        Expr::Constant { value } => constant_nodes::compile_constant(value),
        Expr::Parameter { name, ty } => access_nodes::compile_parameter(name, ty, ctx),
        Expr::Member { owner, member } => access_nodes::compile_member(owner, member, ctx),
        Expr::Unary { op, operand, ty } => {
            operator_nodes::compile_unary(*op, operand, ty.as_ref(), ctx)
        }
        Expr::Binary { op, left, right } => operator_nodes::compile_binary(*op, left, right, ctx),
        Expr::Construct { ty, args } => access_nodes::compile_construct(ty, args, ctx),
        Expr::Call { target, ty, args } => call_nodes::compile_call(target, ty, args, ctx),
        Expr::Opaque { node } => Err(unsupported_node(
            node.as_str(),
            "no lowering exists for this node kind",
        )),
    }
}

pub(crate) fn compile_args(args: &[Expr], ctx: &NodeCompileContext) -> ShaderResult<Vec<String>> {
    args.iter().map(|a| compile_expr(a, ctx)).collect()
}

#[cfg(test)]
pub mod test_utils {
    use crate::compiler::scope::SymbolScope;
    use crate::compiler::symbol::Declaration;
    use crate::compiler::types::{HostType, TypeRegistry};

    /// Root scope with the given parameters declared.
    pub fn scope_with(params: &[(&str, HostType)], types: &TypeRegistry) -> SymbolScope<'static> {
        let mut scope = SymbolScope::root("test");
        for (name, ty) in params {
            let decl = Declaration::resolve(*name, ty.clone(), types).unwrap();
            let symbol = decl.symbol().clone();
            scope.declare(&symbol, decl).unwrap();
        }
        scope
    }
}
