//! Typed expression graph lowered by the node compiler, and literal values.

use serde::{Deserialize, Serialize};

use super::types::{HostType, IntrinsicType};
use crate::error::{ShaderResult, argument_error, unsupported_type};

/// Constant carried by a constant node or a define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constant {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
    /// Host constant kinds without a source form.
    Long(i64),
    Char(char),
    Text(String),
}

impl Constant {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Bool(_) => "bool",
            Constant::Int(_) => "int",
            Constant::UInt(_) => "uint",
            Constant::Float(_) => "float",
            Constant::Double(_) => "double",
            Constant::Long(_) => "long",
            Constant::Char(_) => "char",
            Constant::Text(_) => "string",
        }
    }

    /// Host value type of this constant.
    pub fn host_type(&self) -> ShaderResult<HostType> {
        match self {
            Constant::Bool(_) => Ok(HostType::BOOL),
            Constant::Int(_) => Ok(HostType::INT),
            Constant::UInt(_) => Ok(HostType::UINT),
            Constant::Float(_) => Ok(HostType::FLOAT),
            Constant::Double(_) => Ok(HostType::DOUBLE),
            other => Err(unsupported_type(other.kind_name())),
        }
    }
}

/// Immutable constant value with its resolved computation type.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    value: Constant,
    host: HostType,
    ty: IntrinsicType,
}

impl Literal {
    /// Infer the type from the value.
    pub fn new(value: Constant) -> ShaderResult<Self> {
        let host = value.host_type()?;
        let ty = IntrinsicType::from_host(&host)?;
        Ok(Self { value, host, ty })
    }

    /// Build a literal whose inferred type must equal `requested`.
    pub fn with_type(value: Constant, requested: &HostType) -> ShaderResult<Self> {
        let literal = Self::new(value)?;
        if literal.host != *requested {
            return Err(argument_error(
                "literal",
                format!(
                    "{} value cannot be typed as {requested}",
                    literal.value.kind_name()
                ),
            ));
        }
        Ok(literal)
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }

    pub fn host_type(&self) -> &HostType {
        &self.host
    }

    pub fn intrinsic_type(&self) -> &IntrinsicType {
        &self.ty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOp {
    /// Prefix cast to the node's type.
    Convert,
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    Increment,
    Decrement,
    IsTrue,
    IsFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    AndAlso,
    OrElse,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,
    PowerAssign,
    AndAssign,
    OrAssign,
    ExclusiveOrAssign,
    LeftShiftAssign,
    RightShiftAssign,
    Index,
}

impl BinaryOp {
    /// Operator text, or `None` for forms that are not infix operators.
    pub fn symbol(self) -> Option<&'static str> {
        use BinaryOp::*;
        Some(match self {
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            And => "&",
            Or => "|",
            ExclusiveOr => "^",
            LeftShift => "<<",
            RightShift => ">>",
            AndAlso => "&&",
            OrElse => "||",
            Equal => "==",
            NotEqual => "!=",
            LessThan => "<",
            LessThanOrEqual => "<=",
            GreaterThan => ">",
            GreaterThanOrEqual => ">=",
            Assign => "=",
            AddAssign => "+=",
            SubtractAssign => "-=",
            MultiplyAssign => "*=",
            DivideAssign => "/=",
            ModuloAssign => "%=",
            AndAssign => "&=",
            OrAssign => "|=",
            ExclusiveOrAssign => "^=",
            LeftShiftAssign => "<<=",
            RightShiftAssign => ">>=",
            Power | PowerAssign | Index => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            Assign
                | AddAssign
                | SubtractAssign
                | MultiplyAssign
                | DivideAssign
                | ModuloAssign
                | PowerAssign
                | AndAssign
                | OrAssign
                | ExclusiveOrAssign
                | LeftShiftAssign
                | RightShiftAssign
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "camelCase")]
pub enum CallTarget {
    /// `Owner.Method(args)` with no receiver.
    Static { owner: String, method: String },
    /// `receiver.Method(args)`; never lowered.
    Instance { receiver: Box<Expr>, method: String },
}

/// One node of the host expression graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Block {
        statements: Vec<Expr>,
    },
    Constant {
        value: Constant,
    },
    Parameter {
        name: String,
        #[serde(rename = "type")]
        ty: HostType,
    },
    Member {
        owner: Box<Expr>,
        member: String,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        /// Target of a `convert`.
        #[serde(default, rename = "type")]
        ty: Option<HostType>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Construct {
        #[serde(rename = "type")]
        ty: HostType,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Call {
        target: CallTarget,
        #[serde(rename = "type")]
        ty: HostType,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// A host node kind with no lowering (lambda, conditional, loop, ...).
    Opaque {
        node: String,
    },
}

impl Expr {
    pub fn kind_name(&self) -> &str {
        match self {
            Expr::Block { .. } => "block",
            Expr::Constant { .. } => "constant",
            Expr::Parameter { .. } => "parameter",
            Expr::Member { .. } => "member",
            Expr::Unary { .. } => "unary",
            Expr::Binary { .. } => "binary",
            Expr::Construct { .. } => "construct",
            Expr::Call { .. } => "call",
            Expr::Opaque { node } => node,
        }
    }

    pub fn block(statements: Vec<Expr>) -> Self {
        Expr::Block { statements }
    }

    pub fn constant(value: Constant) -> Self {
        Expr::Constant { value }
    }

    pub fn int(v: i32) -> Self {
        Expr::constant(Constant::Int(v))
    }

    pub fn float(v: f32) -> Self {
        Expr::constant(Constant::Float(v))
    }

    pub fn boolean(v: bool) -> Self {
        Expr::constant(Constant::Bool(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Expr::constant(Constant::Text(v.into()))
    }

    pub fn param(name: impl Into<String>, ty: HostType) -> Self {
        Expr::Parameter {
            name: name.into(),
            ty,
        }
    }

    pub fn member(owner: Expr, member: impl Into<String>) -> Self {
        Expr::Member {
            owner: Box::new(owner),
            member: member.into(),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            ty: None,
        }
    }

    pub fn convert(operand: Expr, ty: HostType) -> Self {
        Expr::Unary {
            op: UnaryOp::Convert,
            operand: Box::new(operand),
            ty: Some(ty),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn construct(ty: HostType, args: Vec<Expr>) -> Self {
        Expr::Construct { ty, args }
    }

    pub fn static_call(
        owner: impl Into<String>,
        method: impl Into<String>,
        ty: HostType,
        args: Vec<Expr>,
    ) -> Self {
        Expr::Call {
            target: CallTarget::Static {
                owner: owner.into(),
                method: method.into(),
            },
            ty,
            args,
        }
    }
}
