//! Computation type system: primitives, affinities, intrinsic and aggregate
//! types, and the registry that maps host value types onto them.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::layout::{DynamicBuffer, FieldType, LayoutBuilder, StructLayout};
use super::utils::validate_ident;
use crate::error::{
    ShaderError, ShaderResult, argument_error, duplicate_error, range_error, unresolved_error,
    unsupported_type,
};

/// Largest row or column count of any affinity.
pub const MAX_DIMENSION: u8 = 4;

/// Byte size of one scalar component in a constant buffer.
pub const COMPONENT_SIZE: usize = 4;

/// Scalar element of a host value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    pub const ALL: [ScalarType; 5] = [
        ScalarType::Bool,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Float,
        ScalarType::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
}

/// A value type as the host describes it.
///
/// Parses from and prints to target-like spellings: `float`, `int3`,
/// `float4x4`, `vector<uint, 2>`, `matrix<int, 2, 3>`. Any other non-empty
/// name is a [`HostType::Named`] type, usually a user structure.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HostType {
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix(ScalarType, u8, u8),
    Named(String),
}

impl HostType {
    pub const BOOL: HostType = HostType::Scalar(ScalarType::Bool);
    pub const INT: HostType = HostType::Scalar(ScalarType::Int);
    pub const UINT: HostType = HostType::Scalar(ScalarType::UInt);
    pub const FLOAT: HostType = HostType::Scalar(ScalarType::Float);
    pub const DOUBLE: HostType = HostType::Scalar(ScalarType::Double);

    pub fn named(name: impl Into<String>) -> Self {
        HostType::Named(name.into())
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            HostType::Scalar(s) | HostType::Vector(s, _) | HostType::Matrix(s, _, _) => Some(*s),
            HostType::Named(_) => None,
        }
    }

    /// The same shape with a different scalar element.
    pub fn with_scalar(&self, scalar: ScalarType) -> Option<HostType> {
        match self {
            HostType::Scalar(_) => Some(HostType::Scalar(scalar)),
            HostType::Vector(_, n) => Some(HostType::Vector(scalar, *n)),
            HostType::Matrix(_, r, c) => Some(HostType::Matrix(scalar, *r, *c)),
            HostType::Named(_) => None,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Scalar(s) => f.write_str(s.name()),
            HostType::Vector(s, n) => write!(f, "{}{n}", s.name()),
            HostType::Matrix(s, r, c) => write!(f, "{}{r}x{c}", s.name()),
            HostType::Named(name) => f.write_str(name),
        }
    }
}

fn parse_dimension(s: &str) -> Option<u8> {
    let n: u8 = s.trim().parse().ok()?;
    (1..=MAX_DIMENSION).contains(&n).then_some(n)
}

fn parse_scalar(s: &str) -> Option<ScalarType> {
    ScalarType::ALL.into_iter().find(|t| t.name() == s.trim())
}

fn parse_template(s: &str) -> Option<HostType> {
    if let Some(args) = s.strip_prefix("vector<").and_then(|r| r.strip_suffix('>')) {
        let mut parts = args.split(',');
        let scalar = parse_scalar(parts.next()?)?;
        let n = parse_dimension(parts.next()?)?;
        return parts.next().is_none().then_some(HostType::Vector(scalar, n));
    }
    if let Some(args) = s.strip_prefix("matrix<").and_then(|r| r.strip_suffix('>')) {
        let mut parts = args.split(',');
        let scalar = parse_scalar(parts.next()?)?;
        let rows = parse_dimension(parts.next()?)?;
        let cols = parse_dimension(parts.next()?)?;
        return parts
            .next()
            .is_none()
            .then_some(HostType::Matrix(scalar, rows, cols));
    }
    None
}

fn parse_shorthand(s: &str) -> Option<HostType> {
    for scalar in ScalarType::ALL {
        let Some(rest) = s.strip_prefix(scalar.name()) else {
            continue;
        };
        if rest.is_empty() {
            return Some(HostType::Scalar(scalar));
        }
        if let Some((r, c)) = rest.split_once('x') {
            if r.bytes().all(|b| b.is_ascii_digit()) && c.bytes().all(|b| b.is_ascii_digit()) {
                return Some(HostType::Matrix(scalar, parse_dimension(r)?, parse_dimension(c)?));
            }
            return None;
        }
        if rest.bytes().all(|b| b.is_ascii_digit()) {
            return Some(HostType::Vector(scalar, parse_dimension(rest)?));
        }
    }
    None
}

impl FromStr for HostType {
    type Err = ShaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(argument_error("host type", "empty type name"));
        }
        Ok(parse_template(s)
            .or_else(|| parse_shorthand(s))
            .unwrap_or_else(|| HostType::Named(s.to_string())))
    }
}

impl TryFrom<String> for HostType {
    type Error = ShaderError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HostType> for String {
    fn from(t: HostType) -> Self {
        t.to_string()
    }
}

/// Element kind of a computation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Undefined,
    Float,
    Integer,
    UnsignedInteger,
    Boolean,
}

impl Primitive {
    /// Short code used in canonical type keys.
    pub fn short_code(self) -> Option<&'static str> {
        match self {
            Primitive::Undefined => None,
            Primitive::Float => Some("float"),
            Primitive::Integer => Some("int"),
            Primitive::UnsignedInteger => Some("uint"),
            Primitive::Boolean => Some("bool"),
        }
    }

    pub fn scalar_type(self) -> Option<ScalarType> {
        match self {
            Primitive::Undefined => None,
            Primitive::Float => Some(ScalarType::Float),
            Primitive::Integer => Some(ScalarType::Int),
            Primitive::UnsignedInteger => Some(ScalarType::UInt),
            Primitive::Boolean => Some(ScalarType::Bool),
        }
    }

    /// Doubles are carried as floats on the device.
    pub fn from_scalar(scalar: ScalarType) -> Primitive {
        match scalar {
            ScalarType::Bool => Primitive::Boolean,
            ScalarType::Int => Primitive::Integer,
            ScalarType::UInt => Primitive::UnsignedInteger,
            ScalarType::Float | ScalarType::Double => Primitive::Float,
        }
    }
}

struct ExpansionTable {
    vectors: &'static [u8],
    matrices: &'static [u8],
}

const FLOAT_EXPANSION: ExpansionTable = ExpansionTable {
    vectors: &[2, 3, 4],
    matrices: &[2, 3, 4],
};
const INTEGER_EXPANSION: ExpansionTable = ExpansionTable {
    vectors: &[2, 3, 4],
    matrices: &[],
};
const UNSIGNED_EXPANSION: ExpansionTable = ExpansionTable {
    vectors: &[2, 3, 4],
    matrices: &[],
};
const BOOLEAN_EXPANSION: ExpansionTable = ExpansionTable {
    vectors: &[2, 3, 4],
    matrices: &[],
};

fn expansion_table(primitive: Primitive) -> Option<&'static ExpansionTable> {
    match primitive {
        Primitive::Undefined => None,
        Primitive::Float => Some(&FLOAT_EXPANSION),
        Primitive::Integer => Some(&INTEGER_EXPANSION),
        Primitive::UnsignedInteger => Some(&UNSIGNED_EXPANSION),
        Primitive::Boolean => Some(&BOOLEAN_EXPANSION),
    }
}

/// Row/column shape: scalar, vector, or square matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Affinity {
    rows: u8,
    columns: u8,
}

impl Affinity {
    pub fn single() -> Self {
        Self {
            rows: 1,
            columns: 1,
        }
    }

    pub fn vector(n: u8) -> ShaderResult<Self> {
        if !(2..=MAX_DIMENSION).contains(&n) {
            return Err(range_error("vector dimension", format!("{n} not in 2..=4")));
        }
        Ok(Self {
            rows: n,
            columns: 1,
        })
    }

    pub fn matrix(n: u8) -> ShaderResult<Self> {
        if !(2..=MAX_DIMENSION).contains(&n) {
            return Err(range_error("matrix dimension", format!("{n} not in 2..=4")));
        }
        Ok(Self {
            rows: n,
            columns: n,
        })
    }

    pub fn rows(self) -> u8 {
        self.rows
    }

    pub fn columns(self) -> u8 {
        self.columns
    }

    pub fn components(self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn is_single(self) -> bool {
        self.rows == 1
    }

    pub fn is_vector(self) -> bool {
        self.rows > 1 && self.columns == 1
    }

    pub fn is_matrix(self) -> bool {
        self.rows > 1 && self.columns > 1
    }

    fn suffix(self) -> String {
        if self.is_single() {
            String::new()
        } else if self.is_vector() {
            self.rows.to_string()
        } else {
            format!("{}x{}", self.rows, self.columns)
        }
    }

    /// Concrete host value type for `primitive` in this shape.
    pub fn expand_type(self, primitive: Primitive) -> ShaderResult<HostType> {
        let (Some(table), Some(scalar)) = (expansion_table(primitive), primitive.scalar_type())
        else {
            return Err(argument_error("primitive", "undefined has no concrete type"));
        };
        if self.is_single() {
            return Ok(HostType::Scalar(scalar));
        }
        let (candidates, ty) = if self.is_vector() {
            (table.vectors, HostType::Vector(scalar, self.rows))
        } else {
            (table.matrices, HostType::Matrix(scalar, self.rows, self.columns))
        };
        if candidates.contains(&self.rows) {
            Ok(ty)
        } else {
            Err(unsupported_type(ty))
        }
    }
}

/// A primitive in a concrete shape, e.g. `float3x3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntrinsicType {
    primitive: Primitive,
    affinity: Affinity,
}

impl IntrinsicType {
    pub fn new(primitive: Primitive, affinity: Affinity) -> ShaderResult<Self> {
        if primitive == Primitive::Undefined {
            return Err(argument_error(
                "intrinsic primitive",
                "undefined cannot be attached to an intrinsic type",
            ));
        }
        affinity.expand_type(primitive)?;
        Ok(Self {
            primitive,
            affinity,
        })
    }

    pub fn scalar(primitive: Primitive) -> ShaderResult<Self> {
        Self::new(primitive, Affinity::single())
    }

    /// Intrinsic type backing a host value type. Double narrows to float.
    pub fn from_host(host: &HostType) -> ShaderResult<Self> {
        let affinity = match host {
            HostType::Scalar(_) => Affinity::single(),
            HostType::Vector(_, n) => Affinity::vector(*n)?,
            HostType::Matrix(_, r, c) if r == c => Affinity::matrix(*r)?,
            _ => return Err(unsupported_type(host)),
        };
        let scalar = host.scalar_type().ok_or_else(|| unsupported_type(host))?;
        Self::new(Primitive::from_scalar(scalar), affinity)
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Canonical key such as `float3x3`.
    pub fn key(&self) -> String {
        let code = self.primitive.short_code().unwrap_or("undefined");
        format!("{code}{}", self.affinity.suffix())
    }

    pub fn host_type(&self) -> ShaderResult<HostType> {
        self.affinity.expand_type(self.primitive)
    }

    pub fn size_bytes(&self) -> usize {
        COMPONENT_SIZE * self.affinity.components()
    }
}

impl fmt::Display for IntrinsicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Type of a computation value.
#[derive(Clone, Debug)]
pub enum ComputationType {
    Intrinsic(IntrinsicType),
    Structure(Rc<Structure>),
    /// A host type resolved through the [`TypeRegistry`] when a layout is built.
    Host(HostType),
}

impl ComputationType {
    pub fn name(&self) -> String {
        match self {
            ComputationType::Intrinsic(t) => t.key(),
            ComputationType::Structure(s) => s.name().to_string(),
            ComputationType::Host(h) => h.to_string(),
        }
    }

    pub fn as_intrinsic(&self) -> Option<&IntrinsicType> {
        match self {
            ComputationType::Intrinsic(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for ComputationType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ComputationType::Intrinsic(a), ComputationType::Intrinsic(b)) => a == b,
            (ComputationType::Structure(a), ComputationType::Structure(b)) => Rc::ptr_eq(a, b),
            (ComputationType::Host(a), ComputationType::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl From<IntrinsicType> for ComputationType {
    fn from(t: IntrinsicType) -> Self {
        ComputationType::Intrinsic(t)
    }
}

impl From<Rc<Structure>> for ComputationType {
    fn from(s: Rc<Structure>) -> Self {
        ComputationType::Structure(s)
    }
}

/// User aggregate type. Its layout is built on first request and cached.
#[derive(Debug)]
pub struct Structure {
    name: String,
    fields: Vec<(String, ComputationType)>,
    layout: OnceCell<Rc<StructLayout>>,
}

impl Structure {
    pub fn new(
        name: impl Into<String>,
        fields: Vec<(String, ComputationType)>,
    ) -> ShaderResult<Self> {
        let name = name.into();
        validate_ident("structure name", &name)?;
        if fields.is_empty() {
            return Err(argument_error(
                "structure",
                format!("`{name}` declares no fields"),
            ));
        }
        for (i, (field, _)) in fields.iter().enumerate() {
            validate_ident("structure field", field)?;
            if fields[..i].iter().any(|(other, _)| other == field) {
                return Err(duplicate_error(field.as_str(), format!("structure `{name}`")));
            }
        }
        Ok(Self {
            name,
            fields,
            layout: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[(String, ComputationType)] {
        &self.fields
    }

    /// The cached layout, if one has been created.
    pub fn layout(&self) -> Option<&Rc<StructLayout>> {
        self.layout.get()
    }

    /// Build the sequential layout on first call; later calls return the cache.
    pub fn create_layout(
        &self,
        types: &TypeRegistry,
        builder: &LayoutBuilder,
    ) -> ShaderResult<Rc<StructLayout>> {
        if let Some(layout) = self.layout.get() {
            return Ok(Rc::clone(layout));
        }

        let mut definition = builder.create_buffer(&self.name)?;
        for (field, ty) in &self.fields {
            let field_type =
                resolve_field_type(ty, types, builder).map_err(|e| ShaderError::Field {
                    structure: self.name.clone(),
                    field: field.clone(),
                    source: Box::new(e),
                })?;
            definition.field(field, field_type)?;
        }
        let layout = definition.finish()?;
        Ok(Rc::clone(self.layout.get_or_init(|| layout)))
    }

    /// Layout plus a zeroed byte buffer for it.
    pub fn instantiate(
        &self,
        types: &TypeRegistry,
        builder: &LayoutBuilder,
    ) -> ShaderResult<DynamicBuffer> {
        Ok(StructLayout::instantiate(&self.create_layout(types, builder)?))
    }
}

fn resolve_field_type(
    ty: &ComputationType,
    types: &TypeRegistry,
    builder: &LayoutBuilder,
) -> ShaderResult<FieldType> {
    match ty {
        ComputationType::Intrinsic(t) => Ok(FieldType::Intrinsic(*t)),
        ComputationType::Structure(s) => Ok(FieldType::Structure(s.create_layout(types, builder)?)),
        ComputationType::Host(host) => resolve_field_type(types.resolve(host)?, types, builder),
    }
}

/// Host types with a fixed target spelling.
fn intrinsic_names() -> Vec<(HostType, &'static str)> {
    use ScalarType::*;
    vec![
        (HostType::Scalar(Bool), "bool"),
        (HostType::Vector(Bool, 2), "bool2"),
        (HostType::Vector(Bool, 3), "bool3"),
        (HostType::Vector(Bool, 4), "bool4"),
        (HostType::Scalar(Float), "float"),
        (HostType::Vector(Float, 2), "float2"),
        (HostType::Vector(Float, 3), "float3"),
        (HostType::Vector(Float, 4), "float4"),
        (HostType::Scalar(Int), "int"),
        (HostType::Vector(Int, 2), "int2"),
        (HostType::Vector(Int, 3), "int3"),
        (HostType::Vector(Int, 4), "int4"),
        (HostType::Scalar(UInt), "uint"),
        (HostType::Vector(UInt, 2), "uint2"),
        (HostType::Vector(UInt, 3), "uint3"),
        (HostType::Vector(UInt, 4), "uint4"),
        (HostType::Matrix(Float, 2, 2), "float2x2"),
        (HostType::Matrix(Float, 3, 3), "float3x3"),
        (HostType::Matrix(Float, 4, 4), "float4x4"),
    ]
}

/// Elements accepted by the generic `vector<T, N>` and `matrix<T, R, C>` templates.
const TEMPLATE_ELEMENTS: [ScalarType; 4] = [
    ScalarType::Bool,
    ScalarType::Int,
    ScalarType::UInt,
    ScalarType::Float,
];

/// Supported-type allowlist plus the host type resolver.
///
/// Constructed explicitly and passed to every compilation; nothing here is
/// process-wide.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    names: HashMap<HostType, &'static str>,
    bindings: HashMap<HostType, ComputationType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeRegistry {
    /// Allowlist only; the resolver starts empty.
    pub fn new() -> Self {
        Self {
            names: intrinsic_names().into_iter().collect(),
            bindings: HashMap::new(),
        }
    }

    /// Allowlist with every fixed-name intrinsic already bound in the resolver.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (host, _) in intrinsic_names() {
            if let Ok(t) = IntrinsicType::from_host(&host) {
                registry
                    .bindings
                    .insert(host, ComputationType::Intrinsic(t));
            }
        }
        registry
    }

    /// Target spelling of a host type, or an unsupported-type error.
    pub fn target_name(&self, ty: &HostType) -> ShaderResult<String> {
        if let Some(name) = self.names.get(ty) {
            return Ok((*name).to_string());
        }
        match ty {
            HostType::Vector(s, n) if TEMPLATE_ELEMENTS.contains(s) => {
                Ok(format!("vector<{}, {n}>", s.name()))
            }
            HostType::Matrix(s, r, c) if TEMPLATE_ELEMENTS.contains(s) => {
                Ok(format!("matrix<{}, {r}, {c}>", s.name()))
            }
            _ => Err(unsupported_type(ty)),
        }
    }

    pub fn is_supported(&self, ty: &HostType) -> bool {
        self.target_name(ty).is_ok()
    }

    /// Bind a host type to a computation type. Each host type binds once.
    pub fn register(&mut self, host: HostType, ty: ComputationType) -> ShaderResult<()> {
        if let ComputationType::Host(target) = &ty {
            return Err(argument_error(
                "type binding",
                format!("`{host}` cannot be bound to another host type `{target}`"),
            ));
        }
        if self.bindings.contains_key(&host) {
            return Err(duplicate_error(host.to_string(), "type resolver"));
        }
        self.bindings.insert(host, ty);
        Ok(())
    }

    pub fn resolve(&self, host: &HostType) -> ShaderResult<&ComputationType> {
        self.bindings
            .get(host)
            .ok_or_else(|| unresolved_error(host.to_string(), "no computation type registered"))
    }

    pub fn is_registered(&self, host: &HostType) -> bool {
        self.bindings.contains_key(host)
    }
}
