//! The dynamic value tree walked by the codec.
//!
//! # Overview
//!
//! [`Value`] is what the codec encodes and decodes. Primitives and
//! collections are represented directly; anything else is an [`Object`]:
//! a type-erased handle around an arbitrary Rust value.
//!
//! Objects come in two flavours:
//!
//! - **Capable** objects implement [`Jsonable`] and know how to turn
//!   themselves into a jsonable representation and back.
//! - **Foreign** objects are any `Debug + PartialEq` value tagged by the
//!   caller (e.g. a `chrono::NaiveDate` tagged `"date"`). They carry no
//!   encoding capability, so a cast-map entry must handle them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::CodecError;
use crate::tag::TypeTag;

// ============================================================================
// VALUE
// ============================================================================

/// A dynamically-shaped value.
///
/// `Map` keeps its entries in insertion order; keys are arbitrary values and
/// are turned into JSON object keys during encoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Object(Object),
}

impl Value {
    /// Wrap a [`Jsonable`] value as a capable object.
    pub fn object<T: Jsonable>(value: T) -> Self {
        Value::Object(Object::new(value))
    }

    /// Wrap an arbitrary value as a foreign object with the given tag.
    pub fn foreign<T>(tag: impl Into<TypeTag>, value: T) -> Self
    where
        T: fmt::Debug + PartialEq + Send + Sync + 'static,
    {
        Value::Object(Object::foreign(tag, value))
    }

    /// The runtime tag used for cast-map lookup during encoding.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::NULL,
            Value::Bool(_) => TypeTag::BOOL,
            Value::Int(_) => TypeTag::INT,
            Value::Float(_) => TypeTag::FLOAT,
            Value::Str(_) => TypeTag::STR,
            Value::List(_) => TypeTag::LIST,
            Value::Tuple(_) => TypeTag::TUPLE,
            Value::Set(_) => TypeTag::SET,
            Value::Map(_) => TypeTag::MAP,
            Value::Object(object) => object.type_tag(),
        }
    }

    /// Convert untyped JSON into a Value.
    ///
    /// Arrays become lists and objects become string-keyed maps. Integers
    /// that fit in `i64` stay integers; any other number becomes a float.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::Str(s.clone()),
            JsonValue::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (Value::Str(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Look up a map entry by string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ============================================================================
// JSONABLE CAPABILITY
// ============================================================================

/// Capability of an opaque type to convert itself to and from JSON.
///
/// The codec uses it only when no cast-map entry and no built-in handling
/// applies. `to_jsonable` may return any Value the codec can encode further,
/// including nested objects.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Point { x: i64, y: i64 }
///
/// impl Jsonable for Point {
///     const TYPE_TAG: &'static str = "point";
///
///     fn to_jsonable(&self) -> Result<Value, CodecError> {
///         Ok(Value::Tuple(vec![Value::Int(self.x), Value::Int(self.y)]))
///     }
///
///     fn from_jsonable(json: &JsonValue) -> Result<Self, CodecError> {
///         let shape = TypeDescriptor::tuple(vec![TypeDescriptor::int(), TypeDescriptor::int()]);
///         let value = from_jsonable(json, &shape, &CastMap::new())?;
///         let (x, y) = <(i64, i64)>::from_value(value)?;
///         Ok(Point { x, y })
///     }
/// }
/// ```
pub trait Jsonable: fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Tag under which cast maps can override this type.
    const TYPE_TAG: &'static str;

    /// Produce a jsonable representation of `self`.
    fn to_jsonable(&self) -> Result<Value, CodecError>;

    /// Construct `Self` from its jsonable representation.
    fn from_jsonable(json: &JsonValue) -> Result<Self, CodecError>
    where
        Self: Sized;
}

// ============================================================================
// OBJECT
// ============================================================================

/// A type-erased opaque value.
///
/// Cloning is cheap: the inner value is shared.
#[derive(Clone)]
pub struct Object(Arc<dyn ErasedObject>);

impl Object {
    /// Wrap a value that implements [`Jsonable`].
    pub fn new<T: Jsonable>(value: T) -> Self {
        Object(Arc::new(Capable(value)))
    }

    /// Wrap a value that has no encoding capability of its own.
    pub fn foreign<T>(tag: impl Into<TypeTag>, value: T) -> Self
    where
        T: fmt::Debug + PartialEq + Send + Sync + 'static,
    {
        Object(Arc::new(Foreign {
            tag: tag.into(),
            value,
        }))
    }

    pub fn type_tag(&self) -> TypeTag {
        self.0.type_tag()
    }

    /// Borrow the inner value if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Whether the object can encode itself without a cast-map entry.
    pub fn is_capable(&self) -> bool {
        self.0.is_capable()
    }

    /// Invoke the self-encode capability. `None` for foreign objects.
    pub(crate) fn to_jsonable(&self) -> Option<Result<Value, CodecError>> {
        self.0.to_jsonable()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.eq_object(other.0.as_ref())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_object(f)
    }
}

trait ErasedObject: Send + Sync {
    fn type_tag(&self) -> TypeTag;
    fn is_capable(&self) -> bool;
    fn to_jsonable(&self) -> Option<Result<Value, CodecError>>;
    fn as_any(&self) -> &dyn Any;
    fn eq_object(&self, other: &dyn ErasedObject) -> bool;
    fn fmt_object(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

struct Capable<T>(T);

impl<T: Jsonable> ErasedObject for Capable<T> {
    fn type_tag(&self) -> TypeTag {
        TypeTag::from_static(T::TYPE_TAG)
    }

    fn is_capable(&self) -> bool {
        true
    }

    fn to_jsonable(&self) -> Option<Result<Value, CodecError>> {
        Some(self.0.to_jsonable())
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn eq_object(&self, other: &dyn ErasedObject) -> bool {
        other.is_capable()
            && other
                .as_any()
                .downcast_ref::<T>()
                .map_or(false, |other| &self.0 == other)
    }

    fn fmt_object(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

struct Foreign<T> {
    tag: TypeTag,
    value: T,
}

impl<T> ErasedObject for Foreign<T>
where
    T: fmt::Debug + PartialEq + Send + Sync + 'static,
{
    fn type_tag(&self) -> TypeTag {
        self.tag.clone()
    }

    fn is_capable(&self) -> bool {
        false
    }

    fn to_jsonable(&self) -> Option<Result<Value, CodecError>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }

    fn eq_object(&self, other: &dyn ErasedObject) -> bool {
        !other.is_capable()
            && self.tag == other.type_tag()
            && other
                .as_any()
                .downcast_ref::<T>()
                .map_or(false, |other| &self.value == other)
    }

    fn fmt_object(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.tag, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Marker(u8);

    impl Jsonable for Marker {
        const TYPE_TAG: &'static str = "marker";

        fn to_jsonable(&self) -> Result<Value, CodecError> {
            Ok(Value::Int(self.0 as i64))
        }

        fn from_jsonable(json: &JsonValue) -> Result<Self, CodecError> {
            json.as_u64()
                .map(|n| Marker(n as u8))
                .ok_or_else(|| CodecError::malformed("number", json.to_string()))
        }
    }

    #[test]
    fn type_tags() {
        assert_eq!(Value::Null.type_tag(), TypeTag::NULL);
        assert_eq!(Value::Set(vec![]).type_tag(), TypeTag::SET);
        assert_eq!(Value::object(Marker(1)).type_tag().as_str(), "marker");
        assert_eq!(Value::foreign("date", 5u32).type_tag().as_str(), "date");
    }

    #[test]
    fn objects_compare_by_inner_value() {
        assert_eq!(Value::object(Marker(1)), Value::object(Marker(1)));
        assert_ne!(Value::object(Marker(1)), Value::object(Marker(2)));
        // same inner type, different tags
        assert_ne!(Value::foreign("a", 1u8), Value::foreign("b", 1u8));
        // same tag, different inner types
        assert_ne!(Value::foreign("a", 1u8), Value::foreign("a", 1u16));
    }

    #[test]
    fn downcast_and_capability() {
        let capable = Object::new(Marker(7));
        assert!(capable.is_capable());
        assert_eq!(capable.downcast_ref::<Marker>(), Some(&Marker(7)));
        assert!(capable.downcast_ref::<u8>().is_none());

        let foreign = Object::foreign("n", 3u8);
        assert!(!foreign.is_capable());
        assert!(foreign.is::<u8>());
        assert_eq!(format!("{:?}", foreign), "n(3)");
    }

    #[test]
    fn from_json_builds_untyped_tree() {
        let value = Value::from_json(&json!({"a": [1, 2.5, "x"], "b": null}));
        assert_eq!(
            value.get("a"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Str("x".into())
            ]))
        );
        assert_eq!(value.get("b"), Some(&Value::Null));
        assert_eq!(value.get("c"), None);
    }

    #[test]
    fn from_json_large_unsigned_becomes_float() {
        let value = Value::from_json(&json!(u64::MAX));
        assert!(matches!(value, Value::Float(_)));
    }
}
