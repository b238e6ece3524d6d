//! Dynamic layout builder.
//!
//! Synthesizes sequential byte layouts for aggregate field lists and owns the
//! raw buffers that are uploaded unchanged next to the generated source.
//!
//! Packing is plain sequential: each field starts where the previous one ends,
//! with no alignment padding. Native constant-buffer packing additionally
//! keeps a field from straddling a 16-byte register, so such fields are
//! reported with a warning.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use super::types::{COMPONENT_SIZE, IntrinsicType, Primitive};
use super::utils::validate_ident;
use crate::error::{ShaderResult, argument_error, duplicate_error, range_error, unresolved_error};

const REGISTER_BYTES: usize = 16;

#[derive(Debug, Default)]
struct Registry {
    names: HashSet<String>,
    torn_down: bool,
}

/// Keeps a structure name registered until the last layout using it is dropped.
#[derive(Debug)]
struct NameLease {
    name: String,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for NameLease {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().names.remove(&self.name);
        }
    }
}

/// Allocates uniquely named buffer definitions.
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    registry: Rc<RefCell<Registry>>,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new definition. Fails if `name` is live in this builder or the
    /// builder has been torn down.
    pub fn create_buffer(&self, name: &str) -> ShaderResult<BufferDefinition> {
        validate_ident("buffer name", name)?;
        let mut registry = self.registry.borrow_mut();
        if registry.torn_down {
            return Err(argument_error(
                "layout builder",
                format!("cannot define `{name}` after teardown"),
            ));
        }
        if !registry.names.insert(name.to_string()) {
            return Err(duplicate_error(name, "layout builder"));
        }
        Ok(BufferDefinition {
            name: name.to_string(),
            fields: Vec::new(),
            size: 0,
            lease: NameLease {
                name: name.to_string(),
                registry: Rc::downgrade(&self.registry),
            },
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.borrow().names.contains(name)
    }

    pub fn is_torn_down(&self) -> bool {
        self.registry.borrow().torn_down
    }

    /// Release every registered name and refuse further definitions.
    pub fn teardown(&self) {
        let mut registry = self.registry.borrow_mut();
        registry.names.clear();
        registry.torn_down = true;
    }
}

/// Value kind a field may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Intrinsic(IntrinsicType),
    Structure(Rc<StructLayout>),
}

impl FieldType {
    pub fn size(&self) -> usize {
        match self {
            FieldType::Intrinsic(t) => t.size_bytes(),
            FieldType::Structure(layout) => layout.size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    name: String,
    offset: usize,
    ty: FieldType,
}

impl FieldLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.ty.size()
    }

    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }
}

/// A field list that is still open for appends.
#[derive(Debug)]
pub struct BufferDefinition {
    name: String,
    fields: Vec<FieldLayout>,
    size: usize,
    lease: NameLease,
}

impl BufferDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a field at the running end of the buffer.
    pub fn field(&mut self, name: &str, ty: FieldType) -> ShaderResult<&mut Self> {
        validate_ident("field name", name)?;
        if self.fields.iter().any(|f| f.name == name) {
            return Err(duplicate_error(name, format!("buffer `{}`", self.name)));
        }
        let offset = self.size;
        let size = ty.size();
        if size <= REGISTER_BYTES && offset / REGISTER_BYTES != (offset + size - 1) / REGISTER_BYTES
        {
            warn!(
                "[layout] {}.{name} at offset {offset} straddles a 16-byte register; native packing would move it",
                self.name
            );
        }
        self.fields.push(FieldLayout {
            name: name.to_string(),
            offset,
            ty,
        });
        self.size += size;
        Ok(self)
    }

    /// Close the field list.
    pub fn finish(self) -> ShaderResult<Rc<StructLayout>> {
        if self.fields.is_empty() {
            return Err(argument_error(
                "buffer definition",
                format!("`{}` has no fields", self.name),
            ));
        }
        debug!(
            "[layout] {}: {} field(s), {} byte(s)",
            self.name,
            self.fields.len(),
            self.size
        );
        Ok(Rc::new(StructLayout {
            name: self.name,
            fields: self.fields,
            size: self.size,
            _lease: self.lease,
        }))
    }

    /// Close the field list and allocate a zeroed buffer for it.
    pub fn commit(self) -> ShaderResult<DynamicBuffer> {
        Ok(StructLayout::instantiate(&self.finish()?))
    }
}

/// Finalized (name, offset, size) table of an aggregate.
#[derive(Debug)]
pub struct StructLayout {
    name: String,
    fields: Vec<FieldLayout>,
    size: usize,
    _lease: NameLease,
}

impl PartialEq for StructLayout {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size == other.size && self.fields == other.fields
    }
}

impl StructLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn instantiate(layout: &Rc<StructLayout>) -> DynamicBuffer {
        DynamicBuffer {
            layout: Rc::clone(layout),
            bytes: vec![0_u8; layout.size],
        }
    }
}

/// One scalar component of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
}

/// Host value written into a buffer field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    /// Vector components, or matrix components in row-major order.
    Components(Vec<Scalar>),
    Struct(Vec<(String, Value)>),
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Scalar(Scalar::UInt(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Double(v))
    }
}

impl<const N: usize> From<[f32; N]> for Value {
    fn from(v: [f32; N]) -> Self {
        Value::Components(v.into_iter().map(Scalar::Float).collect())
    }
}

impl<const N: usize> From<[i32; N]> for Value {
    fn from(v: [i32; N]) -> Self {
        Value::Components(v.into_iter().map(Scalar::Int).collect())
    }
}

impl<const N: usize> From<[u32; N]> for Value {
    fn from(v: [u32; N]) -> Self {
        Value::Components(v.into_iter().map(Scalar::UInt).collect())
    }
}

/// A committed layout together with its raw bytes.
///
/// The bytes are handed unchanged to the device upload call.
#[derive(Debug)]
pub struct DynamicBuffer {
    layout: Rc<StructLayout>,
    bytes: Vec<u8>,
}

impl DynamicBuffer {
    pub fn layout(&self) -> &StructLayout {
        &self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write `value` into `field`; `None` zeroes the field.
    pub fn set_value(&mut self, field: &str, value: Option<&Value>) -> ShaderResult<()> {
        let layout = Rc::clone(&self.layout);
        let target = layout
            .field(field)
            .ok_or_else(|| unresolved_error(field, format!("no field in `{}`", layout.name())))?;
        let end = target.offset + target.size();
        write_field(&target.ty, field, value, &mut self.bytes[target.offset..end])
    }

    pub fn field_bytes(&self, field: &str) -> ShaderResult<&[u8]> {
        let target = self.layout.field(field).ok_or_else(|| {
            unresolved_error(field, format!("no field in `{}`", self.layout.name()))
        })?;
        Ok(&self.bytes[target.offset..target.offset + target.size()])
    }
}

fn write_field(
    ty: &FieldType,
    field: &str,
    value: Option<&Value>,
    dst: &mut [u8],
) -> ShaderResult<()> {
    let Some(value) = value else {
        dst.fill(0);
        return Ok(());
    };
    match (ty, value) {
        (FieldType::Intrinsic(t), Value::Scalar(s)) => write_components(t, field, &[*s], dst),
        (FieldType::Intrinsic(t), Value::Components(c)) => write_components(t, field, c, dst),
        (FieldType::Structure(layout), Value::Struct(entries)) => {
            // Entries land in a scratch copy so a failing entry leaves `dst` as it was.
            let mut scratch = vec![0_u8; dst.len()];
            for (name, v) in entries {
                let inner = layout.field(name).ok_or_else(|| {
                    unresolved_error(name.as_str(), format!("no field in `{}`", layout.name()))
                })?;
                let end = inner.offset + inner.size();
                write_field(&inner.ty, name, Some(v), &mut scratch[inner.offset..end])?;
            }
            dst.copy_from_slice(&scratch);
            Ok(())
        }
        (FieldType::Intrinsic(t), Value::Struct(_)) => Err(argument_error(
            format!("value for `{field}`"),
            format!("expected {t}, got a structure"),
        )),
        (FieldType::Structure(layout), _) => Err(argument_error(
            format!("value for `{field}`"),
            format!("expected structure `{}`", layout.name()),
        )),
    }
}

fn write_components(
    ty: &IntrinsicType,
    field: &str,
    components: &[Scalar],
    dst: &mut [u8],
) -> ShaderResult<()> {
    let expected = ty.affinity().components();
    if components.len() != expected {
        return Err(range_error(
            format!("value for `{field}`"),
            format!("{ty} takes {expected} component(s), got {}", components.len()),
        ));
    }
    let words = components
        .iter()
        .map(|s| component_bits(ty.primitive(), *s, field))
        .collect::<ShaderResult<Vec<u32>>>()?;
    debug_assert_eq!(words.len() * COMPONENT_SIZE, dst.len());
    dst.copy_from_slice(bytemuck::cast_slice(&words));
    Ok(())
}

fn component_bits(primitive: Primitive, s: Scalar, field: &str) -> ShaderResult<u32> {
    match (primitive, s) {
        (Primitive::Float, Scalar::Float(v)) => Ok(v.to_bits()),
        (Primitive::Float, Scalar::Double(v)) => Ok((v as f32).to_bits()),
        (Primitive::Integer, Scalar::Int(v)) => Ok(v as u32),
        (Primitive::UnsignedInteger, Scalar::UInt(v)) => Ok(v),
        (Primitive::Boolean, Scalar::Bool(v)) => Ok(u32::from(v)),
        (p, s) => Err(argument_error(
            format!("value for `{field}`"),
            format!("{s:?} does not fit a {} component", p.short_code().unwrap_or("undefined")),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::Affinity;
    use crate::error::ErrorKind;

    fn scalar(p: Primitive) -> FieldType {
        FieldType::Intrinsic(IntrinsicType::scalar(p).unwrap())
    }

    fn xyz(builder: &LayoutBuilder) -> DynamicBuffer {
        let mut def = builder.create_buffer("Params").unwrap();
        def.field("x", scalar(Primitive::Float))
            .unwrap()
            .field("y", scalar(Primitive::Float))
            .unwrap()
            .field("z", scalar(Primitive::Integer))
            .unwrap();
        def.commit().unwrap()
    }

    #[test]
    fn sequential_offsets_without_padding() {
        let builder = LayoutBuilder::new();
        let buf = xyz(&builder);
        let offsets: Vec<usize> = buf.layout().fields().iter().map(|f| f.offset()).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(buf.len(), 2 * size_of::<f32>() + size_of::<i32>());
        assert!(buf.as_bytes().iter().all(|b| *b == 0));
    }

    #[test]
    fn set_value_writes_at_field_offset() {
        let builder = LayoutBuilder::new();
        let mut buf = xyz(&builder);
        buf.set_value("y", Some(&Value::from(3.5_f32))).unwrap();
        let bytes = &buf.as_bytes()[4..8];
        assert_eq!(bytes, 3.5_f32.to_ne_bytes());
        buf.set_value("z", Some(&Value::from(-2))).unwrap();
        assert_eq!(i32::from_ne_bytes(buf.as_bytes()[8..12].try_into().unwrap()), -2);

        buf.set_value("y", None).unwrap();
        assert_eq!(buf.field_bytes("y").unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn set_value_rejects_unknown_field_and_mismatch() {
        let builder = LayoutBuilder::new();
        let mut buf = xyz(&builder);
        let err = buf.set_value("w", Some(&Value::from(1.0_f32))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
        let err = buf.set_value("z", Some(&Value::from(1.0_f32))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = buf.set_value("x", Some(&Value::from([1.0_f32, 2.0]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn doubles_narrow_and_bools_widen() {
        let builder = LayoutBuilder::new();
        let mut def = builder.create_buffer("Mixed").unwrap();
        def.field("d", scalar(Primitive::Float))
            .unwrap()
            .field("flag", scalar(Primitive::Boolean))
            .unwrap();
        let mut buf = def.commit().unwrap();
        buf.set_value("d", Some(&Value::from(0.1_f64))).unwrap();
        buf.set_value("flag", Some(&Value::from(true))).unwrap();
        assert_eq!(buf.field_bytes("d").unwrap(), 0.1_f32.to_ne_bytes());
        assert_eq!(buf.field_bytes("flag").unwrap(), 1_u32.to_ne_bytes());
    }

    #[test]
    fn vector_components_in_order() {
        let builder = LayoutBuilder::new();
        let v3 = IntrinsicType::new(Primitive::Float, Affinity::vector(3).unwrap()).unwrap();
        let mut def = builder.create_buffer("V").unwrap();
        def.field("pos", FieldType::Intrinsic(v3)).unwrap();
        let mut buf = def.commit().unwrap();
        buf.set_value("pos", Some(&Value::from([1.0_f32, 2.0, 3.0])))
            .unwrap();
        let floats: Vec<f32> = buf
            .as_bytes()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn nested_structure_values() {
        let builder = LayoutBuilder::new();
        let mut inner = builder.create_buffer("Inner").unwrap();
        inner
            .field("a", scalar(Primitive::UnsignedInteger))
            .unwrap()
            .field("b", scalar(Primitive::Float))
            .unwrap();
        let inner = inner.finish().unwrap();
        let mut outer = builder.create_buffer("Outer").unwrap();
        outer
            .field("head", scalar(Primitive::Float))
            .unwrap()
            .field("inner", FieldType::Structure(inner))
            .unwrap();
        let mut buf = outer.commit().unwrap();
        assert_eq!(buf.len(), 12);
        let v = Value::Struct(vec![("b".to_string(), Value::from(2.0_f32))]);
        buf.set_value("inner", Some(&v)).unwrap();
        assert_eq!(&buf.as_bytes()[8..12], 2.0_f32.to_ne_bytes());
    }

    #[test]
    fn failed_structure_write_keeps_previous_bytes() {
        let builder = LayoutBuilder::new();
        let mut inner = builder.create_buffer("Pair").unwrap();
        inner
            .field("a", scalar(Primitive::Float))
            .unwrap()
            .field("b", scalar(Primitive::Integer))
            .unwrap();
        let inner = inner.finish().unwrap();
        let mut outer = builder.create_buffer("Holder").unwrap();
        outer.field("s", FieldType::Structure(inner)).unwrap();
        let mut buf = outer.commit().unwrap();

        let good = Value::Struct(vec![
            ("a".to_string(), Value::from(1.5_f32)),
            ("b".to_string(), Value::from(7)),
        ]);
        buf.set_value("s", Some(&good)).unwrap();
        let before = buf.as_bytes().to_vec();

        let wrong_kind = Value::Struct(vec![
            ("a".to_string(), Value::from(9.0_f32)),
            ("b".to_string(), Value::from(1.0_f32)),
        ]);
        let err = buf.set_value("s", Some(&wrong_kind)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(buf.as_bytes(), before.as_slice());

        let unknown = Value::Struct(vec![
            ("a".to_string(), Value::from(9.0_f32)),
            ("c".to_string(), Value::from(1)),
        ]);
        let err = buf.set_value("s", Some(&unknown)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
        assert_eq!(buf.as_bytes(), before.as_slice());
    }

    #[test]
    fn names_are_unique_until_released() {
        let builder = LayoutBuilder::new();
        let buf = xyz(&builder);
        let err = builder.create_buffer("Params").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateDeclaration);
        assert!(builder.is_registered("Params"));
        drop(buf);
        assert!(!builder.is_registered("Params"));
        assert!(builder.create_buffer("Params").is_ok());
    }

    #[test]
    fn teardown_refuses_new_definitions() {
        let builder = LayoutBuilder::new();
        let _buf = xyz(&builder);
        builder.teardown();
        assert!(builder.is_torn_down());
        assert!(!builder.is_registered("Params"));
        let err = builder.create_buffer("Other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn fields_must_be_unique_and_present() {
        let builder = LayoutBuilder::new();
        let mut def = builder.create_buffer("Dup").unwrap();
        def.field("x", scalar(Primitive::Float)).unwrap();
        assert!(def.field("x", scalar(Primitive::Float)).is_err());
        let empty = builder.create_buffer("Empty").unwrap();
        assert_eq!(empty.finish().unwrap_err().kind(), ErrorKind::Argument);
    }
}
