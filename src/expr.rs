//! Expressions.
//!
//! Anything implementing [`Expression`] can define a property or act as a behavior condition or
//! action. Dependency tracking is transparent: every property read issued through the
//! [`Evaluator`] while a property is being computed is recorded as a dependency of that property.
//!
//! The [`Expr`] tree covers the common cases and composes with the usual operators:
//!
//! ```
//! use tern::Expr;
//!
//! // right edge of the first child plus some padding
//! let width = Expr::child(0, "right") + Expr::this("h_pad");
//! ```

use crate::error::PropertyError;
use crate::scene::{Evaluator, NodeId};
use crate::value::Value;
use cgmath::EuclideanSpace;
use core::fmt;
use std::ops;
use std::sync::Arc;

/// Something that can be evaluated in the context of an element.
pub trait Expression: Send + Sync {
    fn evaluate(&self, cx: &mut Evaluator<'_>) -> Result<Value, PropertyError>;
}

/// Wraps a closure as an expression.
pub fn from_fn<F>(f: F) -> Arc<dyn Expression>
where
    F: Fn(&mut Evaluator<'_>) -> Result<Value, PropertyError> + Send + Sync + 'static,
{
    Arc::new(FnExpression(f))
}

struct FnExpression<F>(F);

impl<F> Expression for FnExpression<F>
where
    F: Fn(&mut Evaluator<'_>) -> Result<Value, PropertyError> + Send + Sync,
{
    fn evaluate(&self, cx: &mut Evaluator<'_>) -> Result<Value, PropertyError> {
        (self.0)(cx)
    }
}

/// The element an [`Expr::Get`] reads from, relative to the evaluation context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    This,
    Parent,
    Child(usize),
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// A small expression tree.
#[derive(Clone)]
pub enum Expr {
    Const(Value),
    Get(Target, Arc<str>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Largest value of the named property across the context’s children; zero without children.
    MaxOfChildren(Arc<str>),
    Func(Arc<dyn Expression>),
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{:?}", value),
            Expr::Get(target, name) => write!(f, "{:?}.{}", target, name),
            Expr::Unary(op, a) => write!(f, "({:?} {:?})", op, a),
            Expr::Binary(op, a, b) => write!(f, "({:?} {:?} {:?})", a, op, b),
            Expr::If(c, a, b) => write!(f, "(if {:?} then {:?} else {:?})", c, a, b),
            Expr::MaxOfChildren(name) => write!(f, "(max children.{})", name),
            Expr::Func(_) => write!(f, "(fn ..)"),
        }
    }
}

impl Expr {
    pub fn this(name: &str) -> Expr {
        Expr::Get(Target::This, name.into())
    }

    pub fn parent(name: &str) -> Expr {
        Expr::Get(Target::Parent, name.into())
    }

    pub fn child(index: usize, name: &str) -> Expr {
        Expr::Get(Target::Child(index), name.into())
    }

    pub fn of(node: NodeId, name: &str) -> Expr {
        Expr::Get(Target::Node(node), name.into())
    }

    pub fn max_of_children(name: &str) -> Expr {
        Expr::MaxOfChildren(name.into())
    }

    pub fn if_else(cond: impl Into<Expr>, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
        Expr::If(
            Box::new(cond.into()),
            Box::new(then.into()),
            Box::new(otherwise.into()),
        )
    }

    fn binary(self, op: BinaryOp, rhs: impl Into<Expr>) -> Expr {
        Expr::Binary(op, Box::new(self), Box::new(rhs.into()))
    }

    pub fn min(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Min, rhs)
    }

    pub fn max(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Max, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ge, rhs)
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equals(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, rhs)
    }

    fn resolve(target: Target, cx: &mut Evaluator<'_>) -> Result<NodeId, PropertyError> {
        let this = cx.this();
        match target {
            Target::This => Ok(this),
            Target::Node(node) => Ok(node),
            Target::Parent => cx
                .parent(this)?
                .ok_or_else(|| PropertyError::expression(format!("{} has no parent", this))),
            Target::Child(index) => cx.children(this)?.get(index).copied().ok_or_else(|| {
                PropertyError::expression(format!("{} has no child at index {}", this, index))
            }),
        }
    }
}

fn apply_binary(op: BinaryOp, a: Value, b: Value) -> Result<Value, PropertyError> {
    use BinaryOp::*;
    Ok(match op {
        Add => match (&a, &b) {
            (Value::Point(p), Value::Point(q)) => Value::Point(*p + q.to_vec()),
            (Value::Text(s), Value::Text(t)) => Value::Text(format!("{}{}", s, t).into()),
            _ => Value::Number(a.number()? + b.number()?),
        },
        Sub => Value::Number(a.number()? - b.number()?),
        Mul => Value::Number(a.number()? * b.number()?),
        Div => {
            let divisor = b.number()?;
            if divisor == 0. {
                return Err(PropertyError::expression("division by zero"));
            }
            Value::Number(a.number()? / divisor)
        }
        Min => Value::Number(a.number()?.min(b.number()?)),
        Max => Value::Number(a.number()?.max(b.number()?)),
        Lt => Value::Bool(a.number()? < b.number()?),
        Le => Value::Bool(a.number()? <= b.number()?),
        Gt => Value::Bool(a.number()? > b.number()?),
        Ge => Value::Bool(a.number()? >= b.number()?),
        Eq => Value::Bool(a == b),
        Ne => Value::Bool(a != b),
        And | Or => unreachable!("short-circuit operators are handled by the caller"),
    })
}

impl Expression for Expr {
    fn evaluate(&self, cx: &mut Evaluator<'_>) -> Result<Value, PropertyError> {
        match self {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Get(target, name) => {
                let node = Expr::resolve(*target, cx)?;
                cx.get(node, name)
            }
            Expr::Unary(UnaryOp::Neg, a) => Ok(Value::Number(-a.evaluate(cx)?.number()?)),
            Expr::Unary(UnaryOp::Not, a) => Ok(Value::Bool(!a.evaluate(cx)?.is_truthy())),
            Expr::Binary(BinaryOp::And, a, b) => {
                if !a.evaluate(cx)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(b.evaluate(cx)?.is_truthy()))
            }
            Expr::Binary(BinaryOp::Or, a, b) => {
                if a.evaluate(cx)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(b.evaluate(cx)?.is_truthy()))
            }
            Expr::Binary(op, a, b) => {
                let a = a.evaluate(cx)?;
                let b = b.evaluate(cx)?;
                apply_binary(*op, a, b)
            }
            Expr::If(cond, then, otherwise) => {
                if cond.evaluate(cx)?.is_truthy() {
                    then.evaluate(cx)
                } else {
                    otherwise.evaluate(cx)
                }
            }
            Expr::MaxOfChildren(name) => {
                let this = cx.this();
                let mut max = 0_f64;
                for child in cx.children(this)? {
                    max = max.max(cx.get(child, name)?.number()?);
                }
                Ok(Value::Number(max))
            }
            Expr::Func(f) => f.evaluate(cx),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Const(value)
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Const(Value::Number(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Const(Value::Bool(b))
    }
}

impl From<Arc<dyn Expression>> for Expr {
    fn from(f: Arc<dyn Expression>) -> Self {
        Expr::Func(f)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<R: Into<Expr>> ops::$trait<R> for Expr {
            type Output = Expr;
            fn $method(self, rhs: R) -> Expr {
                self.binary(BinaryOp::$op, rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);
impl_binary_op!(Div, div, Div);

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;
    fn not(self) -> Expr {
        Expr::Unary(UnaryOp::Not, Box::new(self))
    }
}
