//! Function bodies and their emission as target source.

use log::debug;

use super::expr::Expr;
use super::node_compiler::block_nodes::compile_statement;
use super::node_compiler::{CallResolver, NodeCompileContext};
use super::scope::SymbolScope;
use super::symbol::Declaration;
use super::types::{HostType, TypeRegistry};
use super::utils::{brace_block, validate_ident};
use crate::error::{ShaderResult, argument_error, duplicate_error, range_error};

/// Upper bounds of a `[numthreads(x, y, z)]` annotation.
pub const MAX_THREADS_XY: u32 = 1024;
pub const MAX_THREADS_Z: u32 = 64;
pub const MAX_THREADS_PER_GROUP: u32 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum BodyKind {
    /// Target source emitted line by line, re-indented into the body block.
    Verbatim { text: String, auto_return: bool },
    /// Expression graph lowered node by node.
    Tree(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    parameters: Vec<Declaration>,
    returns: Option<HostType>,
    kind: BodyKind,
}

impl FunctionBody {
    /// A body of target source. Lines are kept in order and otherwise
    /// untouched, but each is re-indented one level inside the braces and
    /// whitespace-only lines come out empty.
    pub fn verbatim(
        parameters: Vec<Declaration>,
        returns: Option<HostType>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            parameters,
            returns,
            kind: BodyKind::Verbatim {
                text: text.into(),
                auto_return: false,
            },
        }
    }

    pub fn tree(parameters: Vec<Declaration>, returns: Option<HostType>, body: Expr) -> Self {
        Self {
            parameters,
            returns,
            kind: BodyKind::Tree(body),
        }
    }

    /// Emit a verbatim body as `return <text>;`. Needs a return type.
    pub fn with_auto_return(mut self) -> ShaderResult<Self> {
        if self.returns.is_none() {
            return Err(argument_error(
                "function body",
                "auto-return requires a declared return type",
            ));
        }
        match &mut self.kind {
            BodyKind::Verbatim { auto_return, .. } => *auto_return = true,
            BodyKind::Tree(_) => {
                return Err(argument_error(
                    "function body",
                    "auto-return applies to verbatim bodies only",
                ));
            }
        }
        Ok(self)
    }

    pub fn parameters(&self) -> &[Declaration] {
        &self.parameters
    }

    pub fn returns(&self) -> Option<&HostType> {
        self.returns.as_ref()
    }

    pub fn kind(&self) -> &BodyKind {
        &self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    body: FunctionBody,
    thread_groups: Option<[u32; 3]>,
}

impl Function {
    pub fn new(name: impl Into<String>, body: FunctionBody) -> ShaderResult<Self> {
        let name = name.into();
        validate_ident("function name", &name)?;
        Ok(Self {
            name,
            body,
            thread_groups: None,
        })
    }

    /// Attach a `[numthreads(x, y, z)]` annotation.
    pub fn with_thread_groups(mut self, groups: [u32; 3]) -> ShaderResult<Self> {
        let [x, y, z] = groups;
        let what = format!("numthreads of `{}`", self.name);
        if groups.contains(&0) {
            return Err(range_error(what, "every thread count must be at least 1"));
        }
        if x > MAX_THREADS_XY || y > MAX_THREADS_XY || z > MAX_THREADS_Z {
            return Err(range_error(
                what,
                format!("({x}, {y}, {z}) exceeds ({MAX_THREADS_XY}, {MAX_THREADS_XY}, {MAX_THREADS_Z})"),
            ));
        }
        let total = u64::from(x) * u64::from(y) * u64::from(z);
        if total > u64::from(MAX_THREADS_PER_GROUP) {
            return Err(range_error(
                what,
                format!("{total} threads per group exceeds {MAX_THREADS_PER_GROUP}"),
            ));
        }
        self.thread_groups = Some(groups);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    pub fn thread_groups(&self) -> Option<[u32; 3]> {
        self.thread_groups
    }

    /// `<ret|void> name(params)` plus the brace-wrapped body.
    ///
    /// Parameters are declared in a child of `scope`, so the body may refer to
    /// them and to anything `scope` declares. A parameter may not reuse a name
    /// `scope` already binds, since it would hide that binding in the output.
    pub fn write(
        &self,
        types: &TypeRegistry,
        scope: &SymbolScope,
        resolver: Option<&dyn CallResolver>,
    ) -> ShaderResult<String> {
        let mut locals = scope.child(self.name.as_str());
        let mut params = Vec::with_capacity(self.body.parameters.len());
        for param in &self.body.parameters {
            let name = param.name();
            if scope.is_declared(name) {
                return Err(duplicate_error(
                    name,
                    format!("parameters of `{}` (bound in scope `{}`)", self.name, scope.name()),
                ));
            }
            params.push(param.write(types)?);
            locals.declare(param.symbol(), param.clone())?;
        }
        let returns = match &self.body.returns {
            Some(ty) => types.target_name(ty)?,
            None => "void".to_string(),
        };

        let body = match &self.body.kind {
            BodyKind::Verbatim { text, auto_return } => {
                if *auto_return {
                    let expr = text.trim().trim_end_matches(';').trim_end();
                    brace_block(&format!("return {expr};"))
                } else {
                    brace_block(text)
                }
            }
            BodyKind::Tree(expr) => {
                let ctx = NodeCompileContext {
                    types,
                    scope: &locals,
                    resolver,
                };
                let wrap_return = self.body.returns.is_some();
                match expr {
                    Expr::Block { .. } => compile_statement(expr, wrap_return, &ctx)?,
                    _ => brace_block(&compile_statement(expr, wrap_return, &ctx)?),
                }
            }
        };

        let mut text = String::new();
        if let Some([x, y, z]) = self.thread_groups {
            text.push_str(&format!("[numthreads({x}, {y}, {z})]\n"));
        }
        text.push_str(&format!("{returns} {}({})\n{body}", self.name, params.join(", ")));
        debug!(
            "compiled function `{}` ({} parameters, {} bytes)",
            self.name,
            params.len(),
            text.len()
        );
        Ok(text)
    }
}
