//! Conversions between ordinary Rust types and [`Value`].
//!
//! A [`PersistentObject<T>`](crate::PersistentObject) stores a plain `T`.
//! Before encoding, `T` is turned into a Value with
//! [`Persistable::to_value`]; after decoding, the Value is turned back with
//! [`Persistable::from_value`].
//!
//! | Rust type                            | Value                       |
//! |--------------------------------------|-----------------------------|
//! | `String`, `bool`, ints, floats       | `Str`, `Bool`, `Int`, `Float` |
//! | `Option<T>`                          | `Null` or `T`               |
//! | `Vec<T>`                             | `List`                      |
//! | `BTreeSet<T>`, `HashSet<T>`          | `Set`                       |
//! | `(A, B)`, `(A, B, C)`                | `Tuple`                     |
//! | `BTreeMap<K, V>`, `HashMap<K, V>`    | `Map`                       |
//! | `chrono::NaiveDate`                  | foreign object `date`       |
//! | `chrono::DateTime<Utc>`              | foreign object `datetime`   |
//! | any `Jsonable + Clone` type          | capable object              |
//!
//! `HashSet` and `HashMap` iterate in no particular order, so their encoded
//! order is not stable across runs. Use the B-tree collections when the file
//! contents should be reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, Utc};

use crate::cast::{DATETIME_TAG, DATE_TAG};
use crate::error::CodecError;
use crate::value::{Jsonable, Value};

/// A Rust type that can be stored in a [`Value`].
pub trait Persistable: Sized {
    /// # Errors
    ///
    /// `TypeMismatch` when `self` has no faithful Value, e.g. an unsigned
    /// integer beyond `i64::MAX`.
    fn to_value(&self) -> Result<Value, CodecError>;

    /// # Errors
    ///
    /// `TypeMismatch` when the value's shape does not fit `Self`.
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

fn mismatch(expected: &str, found: &Value) -> CodecError {
    CodecError::mismatch(expected, found.type_tag().as_str())
}

impl Persistable for Value {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        Ok(value)
    }
}

// ============================================================================
// PRIMITIVES
// ============================================================================

impl Persistable for String {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Str(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("str", &other)),
        }
    }
}

impl Persistable for bool {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl Persistable for i64 {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Int(*self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch("int", &other)),
        }
    }
}

macro_rules! persistable_int {
    ($($ty:ty),*) => {$(
        impl Persistable for $ty {
            fn to_value(&self) -> Result<Value, CodecError> {
                i64::try_from(*self).map(Value::Int).map_err(|_| {
                    CodecError::mismatch("int", format!("{} {}", stringify!($ty), self))
                })
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                let i = i64::from_value(value)?;
                <$ty>::try_from(i).map_err(|_| {
                    CodecError::mismatch(stringify!($ty), format!("int {i}"))
                })
            }
        }
    )*};
}

persistable_int!(i32, u32, u64, usize);

impl Persistable for f64 {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Float(f) => Ok(f),
            // integral JSON numbers decode as floats only under a float
            // descriptor, but a Value built by hand may carry an int
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl Persistable for f32 {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Float(f64::from(*self)))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

// ============================================================================
// COLLECTIONS
// ============================================================================

impl<T: Persistable> Persistable for Option<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn to_values<'a, T: Persistable + 'a>(
    items: impl IntoIterator<Item = &'a T>,
) -> Result<Vec<Value>, CodecError> {
    items.into_iter().map(Persistable::to_value).collect()
}

fn items(value: Value, expected: &str) -> Result<Vec<Value>, CodecError> {
    match value {
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => Ok(items),
        other => Err(mismatch(expected, &other)),
    }
}

impl<T: Persistable> Persistable for Vec<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        to_values(self).map(Value::List)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        items(value, "list")?.into_iter().map(T::from_value).collect()
    }
}

impl<T: Persistable + Ord> Persistable for BTreeSet<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        to_values(self).map(Value::Set)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        items(value, "set")?.into_iter().map(T::from_value).collect()
    }
}

impl<T: Persistable + Eq + Hash> Persistable for HashSet<T> {
    fn to_value(&self) -> Result<Value, CodecError> {
        to_values(self).map(Value::Set)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        items(value, "set")?.into_iter().map(T::from_value).collect()
    }
}

fn tuple_items(value: Value, arity: usize) -> Result<Vec<Value>, CodecError> {
    let items = items(value, "tuple")?;
    if items.len() != arity {
        return Err(CodecError::ArityMismatch {
            expected: arity,
            found: items.len(),
        });
    }
    Ok(items)
}

impl<A: Persistable, B: Persistable> Persistable for (A, B) {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Tuple(vec![self.0.to_value()?, self.1.to_value()?]))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        let mut items = tuple_items(value, 2)?.into_iter();
        match (items.next(), items.next()) {
            (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
            _ => Err(CodecError::ArityMismatch {
                expected: 2,
                found: 0,
            }),
        }
    }
}

impl<A: Persistable, B: Persistable, C: Persistable> Persistable for (A, B, C) {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::Tuple(vec![
            self.0.to_value()?,
            self.1.to_value()?,
            self.2.to_value()?,
        ]))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        let mut items = tuple_items(value, 3)?.into_iter();
        match (items.next(), items.next(), items.next()) {
            (Some(a), Some(b), Some(c)) => {
                Ok((A::from_value(a)?, B::from_value(b)?, C::from_value(c)?))
            }
            _ => Err(CodecError::ArityMismatch {
                expected: 3,
                found: 0,
            }),
        }
    }
}

fn entries(value: Value) -> Result<Vec<(Value, Value)>, CodecError> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(mismatch("map", &other)),
    }
}

impl<K: Persistable + Ord, V: Persistable> Persistable for BTreeMap<K, V> {
    fn to_value(&self) -> Result<Value, CodecError> {
        self.iter()
            .map(|(k, v)| Ok((k.to_value()?, v.to_value()?)))
            .collect::<Result<Vec<_>, CodecError>>()
            .map(Value::Map)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: Persistable + Eq + Hash, V: Persistable> Persistable for HashMap<K, V> {
    fn to_value(&self) -> Result<Value, CodecError> {
        self.iter()
            .map(|(k, v)| Ok((k.to_value()?, v.to_value()?)))
            .collect::<Result<Vec<_>, CodecError>>()
            .map(Value::Map)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

// ============================================================================
// OPAQUE TYPES
// ============================================================================

impl<T: Jsonable + Clone> Persistable for T {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::object(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        value
            .as_object()
            .and_then(|object| object.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| mismatch(T::TYPE_TAG, &value))
    }
}

impl Persistable for NaiveDate {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::foreign(DATE_TAG, *self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        value
            .as_object()
            .and_then(|object| object.downcast_ref::<NaiveDate>())
            .copied()
            .ok_or_else(|| mismatch(DATE_TAG, &value))
    }
}

impl Persistable for DateTime<Utc> {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::foreign(DATETIME_TAG, *self))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        value
            .as_object()
            .and_then(|object| object.downcast_ref::<DateTime<Utc>>())
            .copied()
            .ok_or_else(|| mismatch(DATETIME_TAG, &value))
    }
}
