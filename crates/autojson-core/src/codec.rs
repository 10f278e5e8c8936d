//! Recursive, type-guided JSON encoding and decoding.
//!
//! # Overview
//!
//! - [`to_jsonable`] walks a [`Value`] and produces JSON. The value carries
//!   its own runtime shape, so no descriptor is needed.
//! - [`from_jsonable`] walks JSON guided by a [`TypeDescriptor`], since JSON
//!   alone cannot tell a tuple from a list or a date from a string.
//!
//! Both functions are pure: they allocate a fresh result, never touch the
//! file system, and abort on the first error without a partial result.
//!
//! # Precedence
//!
//! A cast-map entry for a tag always wins. After that come built-in
//! primitives and collections, and finally the opaque type's own
//! [`Jsonable`](crate::Jsonable) capability.
//!
//! # Map Keys
//!
//! JSON object keys are strings. A key that encodes to a string is used
//! verbatim; integer, float, and boolean keys are written as their JSON
//! text. Any other key fails with `UnsupportedType` unless a cast turns it
//! into a scalar, and so does a key whose text repeats an earlier one. On
//! the way back, the key string is decoded against the key descriptor, so
//! `map<int,...>` coerces `"3"` back into `3`.

use serde_json::{Map, Number, Value as JsonValue};

use crate::cast::CastMap;
use crate::descriptor::{Primitive, TypeDescriptor};
use crate::error::CodecError;
use crate::tag::TypeTag;
use crate::value::Value;

// ============================================================================
// ENCODING
// ============================================================================

/// Encode a value into JSON.
///
/// # Errors
///
/// `UnsupportedType` for non-finite floats, non-scalar map keys, and opaque
/// objects with neither a cast-map entry nor an encoding capability. Errors
/// returned by cast functions or `Jsonable::to_jsonable` propagate as-is.
pub fn to_jsonable(value: &Value, casts: &CastMap) -> Result<JsonValue, CodecError> {
    encode(value, casts, None)
}

/// `cast_applied` is the tag whose cast produced `value`, if any; that cast
/// is not applied a second time.
fn encode(
    value: &Value,
    casts: &CastMap,
    cast_applied: Option<&TypeTag>,
) -> Result<JsonValue, CodecError> {
    let tag = value.type_tag();
    if cast_applied != Some(&tag) {
        if let Some(cast) = casts.get(tag.as_str()) {
            let replaced = cast.encode(value)?;
            return encode(&replaced, casts, Some(&tag));
        }
    }

    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(JsonValue::Number((*i).into())),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| CodecError::unsupported(format!("non-finite float {f}"))),
        Value::Str(s) => Ok(JsonValue::String(s.clone())),
        Value::List(items) | Value::Tuple(items) | Value::Set(items) => items
            .iter()
            .map(|item| encode(item, casts, None))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        Value::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, entry) in entries {
                let name = encode_key(key, casts)?;
                if object.contains_key(&name) {
                    return Err(CodecError::unsupported(format!(
                        "map key {key:?} collides with another key as {name:?}"
                    )));
                }
                object.insert(name, encode(entry, casts, None)?);
            }
            Ok(JsonValue::Object(object))
        }
        Value::Object(object) => match object.to_jsonable() {
            Some(representation) => encode(&representation?, casts, None),
            None => Err(CodecError::unsupported(tag.as_str())),
        },
    }
}

fn encode_key(key: &Value, casts: &CastMap) -> Result<String, CodecError> {
    match encode(key, casts, None)? {
        JsonValue::String(s) => Ok(s),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        _ => Err(CodecError::unsupported(format!(
            "map key of type {}",
            key.type_tag()
        ))),
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode JSON into a value shaped by `descriptor`.
///
/// # Errors
///
/// - `MalformedDocument` when the JSON shape does not fit the descriptor
/// - `ArityMismatch` when a tuple array has the wrong length
/// - `UnsupportedType` for an opaque descriptor with no decoder and no
///   cast-map entry
pub fn from_jsonable(
    json: &JsonValue,
    descriptor: &TypeDescriptor,
    casts: &CastMap,
) -> Result<Value, CodecError> {
    if let TypeDescriptor::OptionOf(inner) = descriptor {
        return match json {
            JsonValue::Null => Ok(Value::Null),
            _ => from_jsonable(json, inner, casts),
        };
    }

    if let Some(cast) = casts.get(descriptor.type_tag().as_str()) {
        return cast.decode(json);
    }

    match descriptor {
        TypeDescriptor::Primitive(kind) => coerce(json, *kind),
        TypeDescriptor::TupleOf(elements) => {
            let items = expect_array(json, descriptor)?;
            if items.len() != elements.len() {
                return Err(CodecError::ArityMismatch {
                    expected: elements.len(),
                    found: items.len(),
                });
            }
            items
                .iter()
                .zip(elements)
                .map(|(item, element)| from_jsonable(item, element, casts))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple)
        }
        TypeDescriptor::ListOf(element) => {
            decode_items(expect_array(json, descriptor)?, element, casts).map(Value::List)
        }
        TypeDescriptor::SetOf(element) => {
            decode_items(expect_array(json, descriptor)?, element, casts).map(Value::Set)
        }
        TypeDescriptor::MapOf(key, value) => {
            let JsonValue::Object(entries) = json else {
                return Err(CodecError::malformed(descriptor.to_string(), json_kind(json)));
            };
            let mut decoded = Vec::with_capacity(entries.len());
            for (name, entry) in entries {
                let k = from_jsonable(&JsonValue::String(name.clone()), key, casts)?;
                let v = from_jsonable(entry, value, casts)?;
                decoded.push((k, v));
            }
            Ok(Value::Map(decoded))
        }
        TypeDescriptor::Opaque(opaque) => match opaque.decoder() {
            Some(decoder) => decoder(json),
            None => Err(CodecError::unsupported(opaque.tag().as_str())),
        },
        TypeDescriptor::OptionOf(inner) => from_jsonable(json, inner, casts),
    }
}

fn decode_items(
    items: &[JsonValue],
    element: &TypeDescriptor,
    casts: &CastMap,
) -> Result<Vec<Value>, CodecError> {
    items
        .iter()
        .map(|item| from_jsonable(item, element, casts))
        .collect()
}

fn expect_array<'j>(
    json: &'j JsonValue,
    descriptor: &TypeDescriptor,
) -> Result<&'j [JsonValue], CodecError> {
    match json {
        JsonValue::Array(items) => Ok(items),
        _ => Err(CodecError::malformed(descriptor.to_string(), json_kind(json))),
    }
}

/// Permissive primitive coercion: converts rather than type-checks.
fn coerce(json: &JsonValue, kind: Primitive) -> Result<Value, CodecError> {
    let fail = || CodecError::malformed(kind.type_tag().as_str(), json_kind(json));
    match kind {
        Primitive::Str => match json {
            JsonValue::String(s) => Ok(Value::Str(s.clone())),
            JsonValue::Number(n) => Ok(Value::Str(n.to_string())),
            JsonValue::Bool(b) => Ok(Value::Str(b.to_string())),
            _ => Err(fail()),
        },
        Primitive::Int => match json {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                        .map(|f| Value::Int(f.trunc() as i64))
                        .ok_or_else(fail)
                }
            }
            JsonValue::String(s) => s.trim().parse().map(Value::Int).map_err(|_| fail()),
            JsonValue::Bool(b) => Ok(Value::Int(i64::from(*b))),
            _ => Err(fail()),
        },
        Primitive::Float => match json {
            JsonValue::Number(n) => n.as_f64().map(Value::Float).ok_or_else(fail),
            JsonValue::String(s) => s.trim().parse().map(Value::Float).map_err(|_| fail()),
            JsonValue::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
            _ => Err(fail()),
        },
        Primitive::Bool => match json {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            JsonValue::Number(n) => Ok(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
            _ => Err(fail()),
        },
    }
}

fn json_kind(json: &JsonValue) -> String {
    match json {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(_) => "boolean".to_string(),
        JsonValue::Number(n) => format!("number {n}"),
        JsonValue::String(s) => format!("string {s:?}"),
        JsonValue::Array(items) => format!("array of {}", items.len()),
        JsonValue::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Jsonable;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl Jsonable for Point {
        const TYPE_TAG: &'static str = "point";

        fn to_jsonable(&self) -> Result<Value, CodecError> {
            Ok(Value::Map(vec![
                (Value::from("x"), Value::Int(self.x)),
                (Value::from("y"), Value::Int(self.y)),
            ]))
        }

        fn from_jsonable(json: &JsonValue) -> Result<Self, CodecError> {
            let field = |name: &str| {
                json.get(name)
                    .and_then(JsonValue::as_i64)
                    .ok_or_else(|| CodecError::malformed(format!("field {name}"), json.to_string()))
            };
            Ok(Point {
                x: field("x")?,
                y: field("y")?,
            })
        }
    }

    fn no_casts() -> CastMap {
        CastMap::new()
    }

    fn round_trip(value: &Value, descriptor: &TypeDescriptor, casts: &CastMap) -> Value {
        let json = to_jsonable(value, casts).unwrap();
        from_jsonable(&json, descriptor, casts).unwrap()
    }

    // ------------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------------

    #[test]
    fn encodes_primitives_and_collections() {
        let value = Value::Map(vec![
            (Value::from("name"), Value::from("pong")),
            (
                Value::from("scores"),
                Value::List(vec![Value::Int(1), Value::Float(2.5)]),
            ),
            (
                Value::from("pair"),
                Value::Tuple(vec![Value::Bool(true), Value::Null]),
            ),
        ]);
        let json = to_jsonable(&value, &no_casts()).unwrap();
        assert_eq!(
            json,
            json!({"name": "pong", "scores": [1, 2.5], "pair": [true, null]})
        );
    }

    #[test]
    fn encoding_preserves_map_order() {
        let value = Value::Map(vec![
            (Value::from("z"), Value::Int(1)),
            (Value::from("a"), Value::Int(2)),
        ]);
        let text = serde_json::to_string(&to_jsonable(&value, &no_casts()).unwrap()).unwrap();
        assert_eq!(text, r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = Value::List(vec![Value::object(Point { x: 1, y: 2 }), Value::Int(3)]);
        let first = to_jsonable(&value, &no_casts()).unwrap();
        let second = to_jsonable(&value, &no_casts()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn scalar_keys_are_stringified() {
        let value = Value::Map(vec![
            (Value::Int(3), Value::from("three")),
            (Value::Bool(false), Value::from("no")),
            (Value::Float(1.5), Value::from("one and a half")),
        ]);
        let json = to_jsonable(&value, &no_casts()).unwrap();
        assert_eq!(
            json,
            json!({"3": "three", "false": "no", "1.5": "one and a half"})
        );
    }

    #[test]
    fn colliding_keys_are_rejected() {
        let value = Value::Map(vec![
            (Value::Int(1), Value::from("int one")),
            (Value::Str("1".into()), Value::from("str one")),
        ]);
        let err = to_jsonable(&value, &no_casts()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { ref type_name }
            if type_name.contains("\"1\"")));

        let duplicated = Value::Map(vec![
            (Value::from("a"), Value::Int(1)),
            (Value::from("a"), Value::Int(2)),
        ]);
        assert!(to_jsonable(&duplicated, &no_casts()).is_err());
    }

    #[test]
    fn composite_keys_are_rejected() {
        let value = Value::Map(vec![(
            Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
            Value::Null,
        )]);
        let err = to_jsonable(&value, &no_casts()).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedType {
                type_name: "map key of type tuple".to_string()
            }
        );
    }

    #[test]
    fn composite_keys_accepted_when_cast_to_string() {
        let casts = CastMap::new().with(
            "tuple",
            |_| Ok(Value::Null),
            |v| match v {
                Value::Tuple(items) => Ok(Value::Str(format!("{:?}", items.len()))),
                _ => Ok(v.clone()),
            },
        );
        let value = Value::Map(vec![(
            Value::Tuple(vec![Value::Int(1), Value::Int(2)]),
            Value::Null,
        )]);
        assert_eq!(to_jsonable(&value, &casts).unwrap(), json!({"2": null}));
    }

    #[test]
    fn non_finite_float_is_unsupported() {
        let err = to_jsonable(&Value::Float(f64::NAN), &no_casts()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
    }

    #[test]
    fn foreign_object_without_cast_is_unsupported() {
        let value = Value::foreign("date", 20240301u32);
        let err = to_jsonable(&value, &no_casts()).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedType {
                type_name: "date".to_string()
            }
        );
    }

    #[test]
    fn capable_object_encodes_itself() {
        let value = Value::object(Point { x: 4, y: -1 });
        assert_eq!(
            to_jsonable(&value, &no_casts()).unwrap(),
            json!({"x": 4, "y": -1})
        );
    }

    #[test]
    fn cast_output_is_encoded_recursively() {
        // point -> [x, y] tuple -> array
        let casts = CastMap::new().with(
            "point",
            |_| Ok(Value::Null),
            |v| {
                let p = v.as_object().and_then(|o| o.downcast_ref::<Point>()).unwrap();
                Ok(Value::Tuple(vec![Value::Int(p.x), Value::Int(p.y)]))
            },
        );
        let value = Value::object(Point { x: 4, y: -1 });
        assert_eq!(to_jsonable(&value, &casts).unwrap(), json!([4, -1]));
    }

    #[test]
    fn cast_returning_own_type_does_not_loop() {
        let casts = CastMap::new().with(
            "str",
            |json| Ok(Value::Str(json.as_str().unwrap_or_default().to_lowercase())),
            |v| Ok(Value::Str(v.as_str().unwrap_or_default().to_uppercase())),
        );
        assert_eq!(to_jsonable(&Value::from("abc"), &casts).unwrap(), json!("ABC"));
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    #[test]
    fn permissive_primitive_coercion() {
        let casts = no_casts();
        let int = TypeDescriptor::int();
        let float = TypeDescriptor::float();
        let string = TypeDescriptor::string();
        let boolean = TypeDescriptor::boolean();

        assert_eq!(from_jsonable(&json!(" 42 "), &int, &casts).unwrap(), Value::Int(42));
        assert_eq!(from_jsonable(&json!(2.9), &int, &casts).unwrap(), Value::Int(2));
        assert_eq!(from_jsonable(&json!(-2.9), &int, &casts).unwrap(), Value::Int(-2));
        assert_eq!(from_jsonable(&json!(true), &int, &casts).unwrap(), Value::Int(1));
        assert_eq!(from_jsonable(&json!(3), &float, &casts).unwrap(), Value::Float(3.0));
        assert_eq!(from_jsonable(&json!("0.5"), &float, &casts).unwrap(), Value::Float(0.5));
        assert_eq!(from_jsonable(&json!(7), &string, &casts).unwrap(), Value::from("7"));
        assert_eq!(from_jsonable(&json!("true"), &boolean, &casts).unwrap(), Value::Bool(true));
        assert_eq!(from_jsonable(&json!(0), &boolean, &casts).unwrap(), Value::Bool(false));
    }

    #[test]
    fn uncoercible_primitives_are_malformed() {
        let casts = no_casts();
        for (json, descriptor) in [
            (json!("abc"), TypeDescriptor::int()),
            (json!([1]), TypeDescriptor::string()),
            (json!(null), TypeDescriptor::float()),
            (json!("yes"), TypeDescriptor::boolean()),
            (json!(1e300), TypeDescriptor::int()),
        ] {
            let err = from_jsonable(&json, &descriptor, &casts).unwrap_err();
            assert!(
                matches!(err, CodecError::MalformedDocument { .. }),
                "{json} as {descriptor}: {err:?}"
            );
        }
    }

    #[test]
    fn tuple_arity_mismatch() {
        let descriptor = TypeDescriptor::tuple(vec![TypeDescriptor::int(), TypeDescriptor::int()]);
        let err = from_jsonable(&json!([1, 2, 3]), &descriptor, &no_casts()).unwrap_err();
        assert_eq!(
            err,
            CodecError::ArityMismatch {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn wrong_container_is_malformed() {
        let descriptor = TypeDescriptor::list(TypeDescriptor::int());
        let err = from_jsonable(&json!({"a": 1}), &descriptor, &no_casts()).unwrap_err();
        assert_eq!(
            err,
            CodecError::MalformedDocument {
                expected: "list<int>".to_string(),
                found: "object".to_string()
            }
        );

        let descriptor = TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::int());
        let err = from_jsonable(&json!([1]), &descriptor, &no_casts()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedDocument { .. }));
    }

    #[test]
    fn nested_error_aborts_whole_decode() {
        let descriptor = TypeDescriptor::list(TypeDescriptor::int());
        let err = from_jsonable(&json!([1, 2, "x"]), &descriptor, &no_casts()).unwrap_err();
        assert!(matches!(err, CodecError::MalformedDocument { .. }));
    }

    #[test]
    fn opaque_without_decoder_is_unsupported() {
        let err = from_jsonable(&json!("2024-01-01"), &TypeDescriptor::foreign("date"), &no_casts())
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedType {
                type_name: "date".to_string()
            }
        );
    }

    #[test]
    fn option_accepts_null_or_inner() {
        let descriptor = TypeDescriptor::option(TypeDescriptor::int());
        assert_eq!(from_jsonable(&json!(null), &descriptor, &no_casts()).unwrap(), Value::Null);
        assert_eq!(from_jsonable(&json!(5), &descriptor, &no_casts()).unwrap(), Value::Int(5));
    }

    #[test]
    fn int_keys_are_coerced_back() {
        let descriptor = TypeDescriptor::map(TypeDescriptor::int(), TypeDescriptor::string());
        let value = Value::Map(vec![
            (Value::Int(10), Value::from("ten")),
            (Value::Int(-1), Value::from("minus one")),
        ]);
        assert_eq!(round_trip(&value, &descriptor, &no_casts()), value);
    }

    // ------------------------------------------------------------------------
    // Round trips and precedence
    // ------------------------------------------------------------------------

    #[test]
    fn nested_round_trip() {
        let descriptor = TypeDescriptor::map(
            TypeDescriptor::string(),
            TypeDescriptor::list(TypeDescriptor::tuple(vec![
                TypeDescriptor::int(),
                TypeDescriptor::object::<Point>(),
                TypeDescriptor::set(TypeDescriptor::boolean()),
            ])),
        );
        let value = Value::Map(vec![
            (
                Value::from("a"),
                Value::List(vec![Value::Tuple(vec![
                    Value::Int(1),
                    Value::object(Point { x: 0, y: 9 }),
                    Value::Set(vec![Value::Bool(true)]),
                ])]),
            ),
            (Value::from("b"), Value::List(vec![])),
        ]);
        assert_eq!(round_trip(&value, &descriptor, &no_casts()), value);
    }

    #[test]
    fn cast_map_wins_over_primitive_handling() {
        // ints are stored as hex strings
        let casts = CastMap::new().with(
            "int",
            |json| {
                let text = json.as_str().unwrap_or_default();
                i64::from_str_radix(text.trim_start_matches("0x"), 16)
                    .map(Value::Int)
                    .map_err(|e| CodecError::Cast {
                        tag: "int".into(),
                        reason: e.to_string(),
                    })
            },
            |v| Ok(Value::Str(format!("0x{:x}", v.as_i64().unwrap_or_default()))),
        );
        let value = Value::List(vec![Value::Int(255), Value::Int(16)]);
        assert_eq!(to_jsonable(&value, &casts).unwrap(), json!(["0xff", "0x10"]));

        let descriptor = TypeDescriptor::list(TypeDescriptor::int());
        assert_eq!(round_trip(&value, &descriptor, &casts), value);
    }

    #[test]
    fn cast_map_wins_over_collection_handling() {
        // a list stored as a comma-joined string
        let casts = CastMap::new().with(
            "list",
            |json| {
                Ok(Value::List(
                    json.as_str()
                        .unwrap_or_default()
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(Value::from)
                        .collect(),
                ))
            },
            |v| match v {
                Value::List(items) => Ok(Value::Str(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(","),
                )),
                _ => Ok(v.clone()),
            },
        );
        let value = Value::List(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(to_jsonable(&value, &casts).unwrap(), json!("a,b"));
        let descriptor = TypeDescriptor::list(TypeDescriptor::string());
        assert_eq!(round_trip(&value, &descriptor, &casts), value);
    }

    #[test]
    fn cast_map_wins_over_capability() {
        let casts = CastMap::new().with(
            "point",
            |json| {
                let items = json.as_array().cloned().unwrap_or_default();
                let coord = |i: usize| items.get(i).and_then(JsonValue::as_i64).unwrap_or_default();
                Ok(Value::object(Point {
                    x: coord(0),
                    y: coord(1),
                }))
            },
            |v| {
                let p = v.as_object().and_then(|o| o.downcast_ref::<Point>()).unwrap();
                Ok(Value::List(vec![Value::Int(p.x), Value::Int(p.y)]))
            },
        );
        let value = Value::object(Point { x: 2, y: 3 });
        let json = to_jsonable(&value, &casts).unwrap();
        assert_eq!(json, json!([2, 3]));
        assert_eq!(
            from_jsonable(&json, &TypeDescriptor::object::<Point>(), &casts).unwrap(),
            value
        );
    }

    #[test]
    fn foreign_dates_round_trip_through_stock_casts() {
        let casts = CastMap::iso_dates();
        let date = chrono::NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let value = Value::Map(vec![(Value::foreign("date", date), Value::Int(1))]);
        let json = to_jsonable(&value, &casts).unwrap();
        assert_eq!(json, json!({"2023-12-31": 1}));

        let descriptor = TypeDescriptor::map(TypeDescriptor::foreign("date"), TypeDescriptor::int());
        assert_eq!(from_jsonable(&json, &descriptor, &casts).unwrap(), value);
    }
}
