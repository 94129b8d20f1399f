//! Property values.

use crate::color::Color;
use crate::error::PropertyError;
use crate::events::Event;
use crate::rect::Rect;
use crate::scene::NodeId;
use cgmath::Point2;
use std::sync::Arc;

/// A dynamically typed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    Point(Point2<f64>),
    Rect(Rect),
    Color(Color),
    Element(NodeId),
    List(Arc<[Value]>),
    /// An event pattern; used as the condition of a behavior.
    Event(Box<Event>),
}

/// The type of a [`Value`]. `Any` accepts everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Nil,
    Bool,
    Number,
    Text,
    Point,
    Rect,
    Color,
    Element,
    List,
    Event,
}

impl ValueType {
    /// Returns true if a value of type `ty` may be stored in a slot of this type.
    ///
    /// Nil is accepted everywhere so that element and list slots can be cleared.
    pub fn accepts(self, ty: ValueType) -> bool {
        self == ValueType::Any || ty == ValueType::Nil || self == ty
    }
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Bool(_) => ValueType::Bool,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::Text,
            Value::Point(_) => ValueType::Point,
            Value::Rect(_) => ValueType::Rect,
            Value::Color(_) => ValueType::Color,
            Value::Element(_) => ValueType::Element,
            Value::List(_) => ValueType::List,
            Value::Event(_) => ValueType::Event,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<NodeId> {
        match self {
            Value::Element(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Truthiness for conditions: nil, false and zero are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.,
            _ => true,
        }
    }

    pub fn number(&self) -> Result<f64, PropertyError> {
        self.as_number().ok_or_else(|| {
            PropertyError::expression(format!("expected a number, found {:?}", self.ty()))
        })
    }

    pub fn element(&self) -> Result<NodeId, PropertyError> {
        self.as_element()
            .ok_or_else(|| PropertyError::NotAnElement(self.ty()))
    }

    /// A list of elements; nil reads as the empty list.
    pub fn elements(&self) -> Result<Vec<NodeId>, PropertyError> {
        match self {
            Value::Nil => Ok(Vec::new()),
            Value::List(items) => items.iter().map(Value::element).collect(),
            other => Err(PropertyError::expression(format!(
                "expected a list, found {:?}",
                other.ty()
            ))),
        }
    }

    pub fn element_list(ids: impl IntoIterator<Item = NodeId>) -> Value {
        Value::List(ids.into_iter().map(Value::Element).collect())
    }

    /// Interpolates between two values at `t` in 0..=1.
    ///
    /// Values that can’t be interpolated (text, elements, mismatched types) hold the start value
    /// until the end.
    pub fn interpolate(&self, to: &Value, t: f64) -> Value {
        if t >= 1. {
            return to.clone();
        }
        let t = t.max(0.);
        match (self, to) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + (b - a) * t),
            (Value::Point(a), Value::Point(b)) => Value::Point(*a + (*b - *a) * t),
            (Value::Rect(a), Value::Rect(b)) => Value::Rect(a.lerp(*b, t)),
            (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(*b, t)),
            _ => self.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.into())
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

impl From<Rect> for Value {
    fn from(r: Rect) -> Self {
        Value::Rect(r)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Value::Element(id)
    }
}

impl From<Event> for Value {
    fn from(e: Event) -> Self {
        Value::Event(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_interpolate_linearly() {
        let a = Value::Number(10.);
        let b = Value::Number(20.);
        assert_eq!(a.interpolate(&b, 0.), Value::Number(10.));
        assert_eq!(a.interpolate(&b, 0.5), Value::Number(15.));
        assert_eq!(a.interpolate(&b, 1.5), Value::Number(20.));
    }

    #[test]
    fn text_snaps_at_the_end() {
        let a = Value::from("a");
        let b = Value::from("b");
        assert_eq!(a.interpolate(&b, 0.9), a);
        assert_eq!(a.interpolate(&b, 1.), b);
    }

    #[test]
    fn nil_fits_any_slot() {
        assert!(ValueType::Element.accepts(ValueType::Nil));
        assert!(ValueType::Any.accepts(ValueType::Number));
        assert!(!ValueType::Number.accepts(ValueType::Text));
    }
}
