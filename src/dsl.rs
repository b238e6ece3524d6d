//! JSON kernel description.
//!
//! A description lists defines, structures, constant buffers (optionally with
//! initial field values), resources and functions. Function bodies are either
//! verbatim target text or an expression tree in the [`Expr`] JSON shape.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use crate::compiler::expr::{Constant, Expr};
use crate::compiler::function::{Function, FunctionBody};
use crate::compiler::kernel::{Access, ConstantBuffer, KernelUnit, Resource, ResourceKind};
use crate::compiler::layout::{DynamicBuffer, FieldType, Scalar, StructLayout, Value};
use crate::compiler::scope::SymbolScope;
use crate::compiler::symbol::Declaration;
use crate::compiler::types::{ComputationType, HostType, Primitive, Structure, TypeRegistry};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct KernelDSL {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub defines: Vec<DefineDecl>,
    #[serde(default)]
    pub structures: Vec<StructureDecl>,
    #[serde(default)]
    pub constant_buffers: Vec<ConstantBufferDecl>,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    pub functions: Vec<FunctionDecl>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DefineDecl {
    pub name: String,
    pub value: Constant,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: HostType,
    /// Initial value written into the layout report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StructureDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConstantBufferDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResourceDecl {
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub access: Access,
    pub element: HostType,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: HostType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    #[serde(default)]
    pub returns: Option<HostType>,
    #[serde(default)]
    pub numthreads: Option<[u32; 3]>,
    pub body: BodyDecl,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BodyDecl {
    Verbatim {
        text: String,
        #[serde(default, rename = "autoReturn")]
        auto_return: bool,
    },
    Tree {
        expr: Expr,
    },
}

pub fn load_kernel_from_path(path: impl AsRef<std::path::Path>) -> Result<KernelDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read kernel json at {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse kernel json {}", path.display()))
}

/// A lowered description: the unit plus the registry its structures live in.
#[derive(Debug)]
pub struct BuiltKernel {
    pub unit: KernelUnit,
    pub types: TypeRegistry,
    pub structures: Vec<Rc<Structure>>,
}

pub fn build_kernel_unit(kernel: &KernelDSL) -> Result<BuiltKernel> {
    let mut types = TypeRegistry::standard();

    let mut structures = Vec::with_capacity(kernel.structures.len());
    for decl in &kernel.structures {
        let fields = decl
            .fields
            .iter()
            .map(|f| (f.name.clone(), ComputationType::Host(f.ty.clone())))
            .collect();
        let structure = Rc::new(
            Structure::new(decl.name.as_str(), fields)
                .with_context(|| format!("structure {}", decl.name))?,
        );
        types
            .register(HostType::named(decl.name.as_str()), Rc::clone(&structure).into())
            .with_context(|| format!("structure {}", decl.name))?;
        structures.push(structure);
    }

    let mut unit = KernelUnit::new(kernel.name.as_str());
    for define in &kernel.defines {
        unit.add_define(&define.name, define.value.clone())
            .with_context(|| format!("define {}", define.name))?;
    }

    for decl in &kernel.constant_buffers {
        let fields = decl
            .fields
            .iter()
            .map(|f| Declaration::resolve(f.name.as_str(), f.ty.clone(), &types))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("constant buffer {}", decl.name))?;
        unit.add_constant_buffer(
            ConstantBuffer::new(decl.name.as_str(), fields)
                .with_context(|| format!("constant buffer {}", decl.name))?,
        );
    }

    for decl in &kernel.resources {
        unit.add_resource(
            Resource::new(decl.name.as_str(), decl.kind, decl.access, decl.element.clone())
                .with_context(|| format!("resource {}", decl.name))?,
        );
    }

    for decl in &kernel.functions {
        let function =
            build_function(decl, &types).with_context(|| format!("function {}", decl.name))?;
        unit.add_function(function);
    }

    Ok(BuiltKernel {
        unit,
        types,
        structures,
    })
}

fn build_function(decl: &FunctionDecl, types: &TypeRegistry) -> Result<Function> {
    let mut params = Vec::with_capacity(decl.params.len());
    for p in &decl.params {
        let mut param = Declaration::resolve(p.name.as_str(), p.ty.clone(), types)?;
        if let Some(semantic) = &p.semantic {
            param = param.with_semantic(semantic.as_str())?;
        }
        params.push(param);
    }

    let body = match &decl.body {
        BodyDecl::Verbatim { text, auto_return } => {
            let body = FunctionBody::verbatim(params, decl.returns.clone(), text.as_str());
            if *auto_return {
                body.with_auto_return()?
            } else {
                body
            }
        }
        BodyDecl::Tree { expr } => FunctionBody::tree(params, decl.returns.clone(), expr.clone()),
    };

    let mut function = Function::new(decl.name.as_str(), body)?;
    if let Some(groups) = decl.numthreads {
        function = function.with_thread_groups(groups)?;
    }
    Ok(function)
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    pub kernel: String,
    pub layouts: Vec<LayoutEntry>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub name: String,
    /// `constantBuffer` or `structure`.
    pub role: String,
    pub size: usize,
    pub fields: Vec<FieldEntry>,
    /// Initial buffer contents, standard base64.
    pub bytes: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: usize,
    pub size: usize,
}

/// Layouts of every constant buffer and structure, with initial values applied.
///
/// Everything is materialized in one kernel scope, so layout names are unique
/// across the report. The scope is torn down once the entries are encoded.
pub fn build_layout_report(kernel: &KernelDSL, built: &BuiltKernel) -> Result<LayoutReport> {
    let mut scope = SymbolScope::root(kernel.name.as_str());
    let mut layouts = Vec::new();

    let buffers = built
        .unit
        .constant_buffer_layouts(&built.types, scope.layouts())
        .context("constant buffer layouts")?;
    for (decl, mut buffer) in kernel.constant_buffers.iter().zip(buffers) {
        apply_initial_values(&mut buffer, &decl.fields)
            .with_context(|| format!("constant buffer {}", decl.name))?;
        layouts.push(layout_entry(&buffer, "constantBuffer"));
    }

    let declared: HashMap<&str, &StructureDecl> =
        kernel.structures.iter().map(|s| (s.name.as_str(), s)).collect();
    for structure in &built.structures {
        let layout = scope
            .materialize(structure, &built.types)
            .with_context(|| format!("structure {}", structure.name()))?;
        let mut buffer = StructLayout::instantiate(&layout);
        if let Some(decl) = declared.get(structure.name()) {
            apply_initial_values(&mut buffer, &decl.fields)
                .with_context(|| format!("structure {}", decl.name))?;
        }
        layouts.push(layout_entry(&buffer, "structure"));
    }
    scope.teardown();

    Ok(LayoutReport {
        kernel: kernel.name.clone(),
        layouts,
    })
}

fn apply_initial_values(buffer: &mut DynamicBuffer, fields: &[FieldDecl]) -> Result<()> {
    for field in fields {
        let Some(json) = &field.value else {
            continue;
        };
        let ty = buffer
            .layout()
            .field(&field.name)
            .map(|f| f.field_type().clone())
            .ok_or_else(|| anyhow!("no field {} in layout", field.name))?;
        let value = json_to_value(json, &ty).with_context(|| format!("value of {}", field.name))?;
        buffer.set_value(&field.name, Some(&value))?;
    }
    Ok(())
}

/// Interpret JSON as a value of `ty`: numbers and booleans for scalars, arrays
/// for vector or matrix components, objects for structures.
pub fn json_to_value(json: &serde_json::Value, ty: &FieldType) -> Result<Value> {
    match ty {
        FieldType::Intrinsic(t) => match json {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| json_to_scalar(item, t.primitive()))
                .collect::<Result<Vec<_>>>()
                .map(Value::Components),
            other => json_to_scalar(other, t.primitive()).map(Value::Scalar),
        },
        FieldType::Structure(layout) => {
            let serde_json::Value::Object(entries) = json else {
                bail!("expected an object for structure {}", layout.name());
            };
            let mut values = Vec::with_capacity(entries.len());
            for (name, item) in entries {
                let inner = layout
                    .field(name)
                    .ok_or_else(|| anyhow!("no field {name} in structure {}", layout.name()))?;
                values.push((name.clone(), json_to_value(item, inner.field_type())?));
            }
            Ok(Value::Struct(values))
        }
    }
}

fn json_to_scalar(json: &serde_json::Value, primitive: Primitive) -> Result<Scalar> {
    let scalar = match primitive {
        Primitive::Float => json.as_f64().map(|v| Scalar::Float(v as f32)),
        Primitive::Integer => json
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Scalar::Int),
        Primitive::UnsignedInteger => json
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Scalar::UInt),
        Primitive::Boolean => json.as_bool().map(Scalar::Bool),
        Primitive::Undefined => None,
    };
    scalar.ok_or_else(|| anyhow!("{json} is not a valid {primitive:?} component"))
}

fn layout_entry(buffer: &DynamicBuffer, role: &str) -> LayoutEntry {
    let layout: &StructLayout = buffer.layout();
    LayoutEntry {
        name: layout.name().to_string(),
        role: role.to_string(),
        size: layout.size(),
        fields: layout
            .fields()
            .iter()
            .map(|f| FieldEntry {
                name: f.name().to_string(),
                ty: match f.field_type() {
                    FieldType::Intrinsic(t) => t.key(),
                    FieldType::Structure(s) => s.name().to_string(),
                },
                offset: f.offset(),
                size: f.size(),
            })
            .collect(),
        bytes: general_purpose::STANDARD.encode(buffer.as_bytes()),
    }
}
