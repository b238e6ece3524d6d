//! Kernel unit assembly.
//!
//! A [`KernelUnit`] collects defines, constant buffers, resources and functions
//! in insertion order. Compiling it declares all of them in one root scope
//! (so names are unique kernel-wide), writes the header and then each function.
//! Expression trees reach defines and constant-buffer fields through two
//! surrogate calls, `Kernel.Define("NAME")` and `Kernel.Constant("name")`,
//! which [`KernelWriterContext`] rewrites into bare identifiers.

use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::expr::{Constant, Expr, Literal};
use super::function::Function;
use super::layout::{DynamicBuffer, LayoutBuilder};
use super::node_compiler::CallResolver;
use super::node_compiler::constant_nodes::compile_constant;
use super::scope::SymbolScope;
use super::symbol::{Declaration, Register, RegisterClass, Symbol};
use super::types::{HostType, ScalarType, Structure, TypeRegistry};
use super::utils::{INDENT, validate_ident};
use crate::config::CompilerConfig;
use crate::error::{ShaderResult, argument_error, unresolved_error, unsupported_node};

/// Owner name of the surrogate calls.
pub const SURROGATE_OWNER: &str = "Kernel";
pub const DEFINE_SURROGATE: &str = "Define";
pub const CONSTANT_SURROGATE: &str = "Constant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Buffer,
    StructuredBuffer,
    Texture2D,
}

impl ResourceKind {
    fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "Buffer",
            ResourceKind::StructuredBuffer => "StructuredBuffer",
            ResourceKind::Texture2D => "Texture2D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl Access {
    pub fn register_class(self) -> RegisterClass {
        match self {
            Access::ReadOnly => RegisterClass::ReadOnlyResource,
            Access::ReadWrite => RegisterClass::ReadWriteResource,
        }
    }
}

/// A buffer or texture bound to a `t` or `u` register.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    name: String,
    kind: ResourceKind,
    access: Access,
    element: HostType,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        access: Access,
        element: HostType,
    ) -> ShaderResult<Self> {
        let name = name.into();
        validate_ident("resource name", &name)?;
        Ok(Self {
            name,
            kind,
            access,
            element,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// `RWStructuredBuffer<float4>` and friends.
    pub fn type_text(&self, types: &TypeRegistry) -> ShaderResult<String> {
        let element = types.target_name(&self.element)?;
        let prefix = match self.access {
            Access::ReadOnly => "",
            Access::ReadWrite => "RW",
        };
        Ok(format!("{prefix}{}<{element}>", self.kind.type_name()))
    }
}

/// Named field block bound to a `b` register.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBuffer {
    name: String,
    fields: Vec<Declaration>,
}

impl ConstantBuffer {
    pub fn new(name: impl Into<String>, fields: Vec<Declaration>) -> ShaderResult<Self> {
        let name = name.into();
        validate_ident("constant buffer name", &name)?;
        if fields.is_empty() {
            return Err(argument_error(
                "constant buffer",
                format!("`{name}` declares no fields"),
            ));
        }
        Ok(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Declaration] {
        &self.fields
    }
}

/// Emitted source plus what the native compiler needs to consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSource {
    pub text: String,
    pub entry_point: String,
    pub profile: String,
}

#[derive(Debug, Clone, Default)]
pub struct KernelUnit {
    name: String,
    defines: Vec<(Symbol, Literal)>,
    constant_buffers: Vec<ConstantBuffer>,
    resources: Vec<Resource>,
    functions: Vec<Function>,
}

impl KernelUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `#define NAME value`; the symbol takes the literal's host type.
    pub fn add_define(&mut self, name: &str, value: Constant) -> ShaderResult<&mut Self> {
        let literal = Literal::new(value)?;
        let symbol = Symbol::new(name, literal.host_type().clone())?;
        self.defines.push((symbol, literal));
        Ok(self)
    }

    pub fn add_constant_buffer(&mut self, buffer: ConstantBuffer) -> &mut Self {
        self.constant_buffers.push(buffer);
        self
    }

    pub fn add_resource(&mut self, resource: Resource) -> &mut Self {
        self.resources.push(resource);
        self
    }

    pub fn add_function(&mut self, function: Function) -> &mut Self {
        self.functions.push(function);
        self
    }

    pub fn defines(&self) -> &[(Symbol, Literal)] {
        &self.defines
    }

    pub fn constant_buffers(&self) -> &[ConstantBuffer] {
        &self.constant_buffers
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Header followed by every function, separated by blank lines.
    pub fn compile(&self, types: &TypeRegistry, config: &CompilerConfig) -> ShaderResult<KernelSource> {
        let mut ctx = KernelWriterContext::new(self, types, config)?;

        let entry = ctx
            .scope
            .resolve::<Function>(&config.entry_point)
            .map_err(|_| {
                unresolved_error(
                    config.entry_point.as_str(),
                    format!("kernel `{}` has no entry function", self.name),
                )
            })?;
        debug!("[kernel] {}: entry `{}`", self.name, entry.name());

        let mut sections = ctx.header(self, types)?;
        for function in &self.functions {
            if function.thread_groups().is_some() && function.name() != config.entry_point {
                return Err(argument_error(
                    format!("function `{}`", function.name()),
                    format!(
                        "only the entry function `{}` may declare numthreads",
                        config.entry_point
                    ),
                ));
            }
            sections.push(function.write(types, &ctx.scope, Some(&ctx))?);
        }
        ctx.teardown();

        let mut text = sections.join("\n\n");
        text.push('\n');
        debug!("[kernel] {}: {} section(s), {} byte(s)", self.name, sections.len(), text.len());
        Ok(KernelSource {
            text,
            entry_point: config.entry_point.clone(),
            profile: config.target_profile.clone(),
        })
    }

    /// One zeroed buffer per constant buffer, packed in header field order.
    pub fn constant_buffer_layouts(
        &self,
        types: &TypeRegistry,
        builder: &LayoutBuilder,
    ) -> ShaderResult<Vec<DynamicBuffer>> {
        self.constant_buffers
            .iter()
            .map(|cb| {
                let fields = cb
                    .fields
                    .iter()
                    .map(|d| (d.name().to_string(), d.computation_type().clone()))
                    .collect();
                Structure::new(cb.name.as_str(), fields)?.instantiate(types, builder)
            })
            .collect()
    }
}

/// Per-compilation state of one [`KernelUnit`].
#[derive(Debug)]
pub struct KernelWriterContext {
    scope: SymbolScope<'static>,
    allow_double_narrowing: bool,
}

impl KernelWriterContext {
    /// Declare every kernel-level name in a fresh root scope and assign registers.
    pub fn new(unit: &KernelUnit, types: &TypeRegistry, config: &CompilerConfig) -> ShaderResult<Self> {
        let mut scope = SymbolScope::root(unit.name.as_str());
        let policy = &config.registers;

        for (symbol, literal) in &unit.defines {
            scope.declare(symbol, literal.clone())?;
        }

        for (index, cb) in (0_u32..).zip(&unit.constant_buffers) {
            let register = Register::new(cb.name.as_str(), RegisterClass::ConstantBuffer, index, policy)?;
            scope.declare(&Symbol::new(cb.name.as_str(), HostType::named(cb.name.as_str()))?, register)?;
            for field in &cb.fields {
                types.target_name(field.symbol().host_type())?;
                scope.declare(field.symbol(), field.clone())?;
            }
        }

        let (mut read_only, mut read_write) = (0_u32, 0_u32);
        for resource in &unit.resources {
            let next = match resource.access {
                Access::ReadOnly => &mut read_only,
                Access::ReadWrite => &mut read_write,
            };
            let register = Register::new(
                resource.name.as_str(),
                resource.access.register_class(),
                *next,
                policy,
            )?;
            *next += 1;
            scope.declare(
                &Symbol::new(resource.name.as_str(), resource.element.clone())?,
                register,
            )?;
        }

        for function in &unit.functions {
            let symbol = Symbol::new(function.name(), HostType::named("function"))?;
            scope.declare(&symbol, Rc::new(function.clone()))?;
        }

        Ok(Self {
            scope,
            allow_double_narrowing: config.allow_double_narrowing,
        })
    }

    pub fn scope(&self) -> &SymbolScope<'static> {
        &self.scope
    }

    fn header(&self, unit: &KernelUnit, types: &TypeRegistry) -> ShaderResult<Vec<String>> {
        let mut sections = Vec::new();

        if !unit.defines.is_empty() {
            let lines = unit
                .defines
                .iter()
                .map(|(symbol, literal)| {
                    Ok(format!("#define {} {}", symbol.name(), compile_constant(literal.value())?))
                })
                .collect::<ShaderResult<Vec<_>>>()?;
            sections.push(lines.join("\n"));
        }

        for cb in &unit.constant_buffers {
            let register = self.scope.resolve::<Register>(&cb.name)?;
            let mut block = format!("cbuffer {} : {}\n{{\n", cb.name, register.binding());
            for field in &cb.fields {
                block.push_str(&format!("{INDENT}{};\n", field.write(types)?));
            }
            block.push_str("};");
            sections.push(block);
        }

        if !unit.resources.is_empty() {
            let lines = unit
                .resources
                .iter()
                .map(|r| {
                    let register = self.scope.resolve::<Register>(&r.name)?;
                    Ok(format!("{} {} : {};", r.type_text(types)?, r.name, register.binding()))
                })
                .collect::<ShaderResult<Vec<_>>>()?;
            sections.push(lines.join("\n"));
        }

        Ok(sections)
    }

    /// Whether a binding of host type `bound` satisfies a request for `requested`.
    fn accepts(&self, bound: &HostType, requested: &HostType) -> bool {
        if bound == requested {
            return true;
        }
        self.allow_double_narrowing
            && bound.scalar_type() == Some(ScalarType::Double)
            && bound.with_scalar(ScalarType::Float).as_ref() == Some(requested)
    }

    fn check_type(&self, name: &str, bound: &HostType, requested: &HostType) -> ShaderResult<()> {
        if self.accepts(bound, requested) {
            Ok(())
        } else {
            Err(argument_error(
                format!("reference to `{name}`"),
                format!("bound as {bound}, requested as {requested}"),
            ))
        }
    }

    pub fn teardown(&mut self) {
        self.scope.teardown();
    }
}

impl CallResolver for KernelWriterContext {
    fn resolve_call(
        &self,
        owner: &str,
        method: &str,
        args: &[Expr],
        ty: &HostType,
        types: &TypeRegistry,
    ) -> ShaderResult<Option<String>> {
        if owner != SURROGATE_OWNER {
            return Ok(None);
        }
        let name = match args {
            [Expr::Constant { value: Constant::Text(name) }] => name.as_str(),
            _ => {
                return Err(argument_error(
                    format!("{owner}.{method}"),
                    "expects a single string naming the symbol",
                ));
            }
        };
        validate_ident("symbol", name)?;
        types.target_name(ty)?;

        match method {
            DEFINE_SURROGATE => {
                let literal = self.scope.resolve::<Literal>(name)?;
                self.check_type(name, literal.host_type(), ty)?;
            }
            CONSTANT_SURROGATE => {
                let field = self.scope.resolve::<Declaration>(name)?;
                self.check_type(name, field.symbol().host_type(), ty)?;
            }
            _ => {
                return Err(unsupported_node(
                    "call",
                    format!("`{owner}.{method}` is not a kernel surrogate"),
                ));
            }
        }
        Ok(Some(name.to_string()))
    }
}
