//! Cast maps: per-type encode/decode overrides.
//!
//! # Overview
//!
//! A [`CastMap`] maps a [`TypeTag`] to a [`Cast`], a pair of conversion
//! functions. Whenever the codec meets a value (encoding) or a descriptor
//! (decoding) whose tag has an entry, the entry wins over every built-in
//! rule, including primitives and collections.
//!
//! A persistent object keeps one map for decoding and one for encoding. They
//! are independent, but should agree for a value to survive a round trip.
//!
//! # Stock Casts
//!
//! [`CastMap::iso_dates`] marshals chrono dates as strings:
//!
//! | tag        | Rust type       | JSON                     |
//! |------------|-----------------|--------------------------|
//! | `date`     | `NaiveDate`     | `"2024-03-01"`           |
//! | `datetime` | `DateTime<Utc>` | `"2024-03-01T12:00:00Z"` |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use crate::error::CodecError;
use crate::tag::TypeTag;
use crate::value::Value;

/// Tag used for `chrono::NaiveDate` values.
pub const DATE_TAG: &str = "date";

/// Tag used for `chrono::DateTime<Utc>` values.
pub const DATETIME_TAG: &str = "datetime";

type DecodeFn = dyn Fn(&JsonValue) -> Result<Value, CodecError> + Send + Sync;
type EncodeFn = dyn Fn(&Value) -> Result<Value, CodecError> + Send + Sync;

/// A decode/encode override pair for one type.
#[derive(Clone)]
pub struct Cast {
    decode: Arc<DecodeFn>,
    encode: Arc<EncodeFn>,
}

impl Cast {
    /// Build a cast from its decode and encode halves.
    ///
    /// `decode` is fully responsible for its result: the codec does not
    /// recurse into it. The output of `encode` is encoded further, so it may
    /// be any encodable value (typically a string).
    pub fn new<D, E>(decode: D, encode: E) -> Self
    where
        D: Fn(&JsonValue) -> Result<Value, CodecError> + Send + Sync + 'static,
        E: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        Cast {
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    pub fn decode(&self, json: &JsonValue) -> Result<Value, CodecError> {
        (self.decode)(json)
    }

    pub fn encode(&self, value: &Value) -> Result<Value, CodecError> {
        (self.encode)(value)
    }
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cast")
    }
}

/// Mapping from type tag to cast.
#[derive(Clone, Default)]
pub struct CastMap {
    entries: HashMap<TypeTag, Cast>,
}

impl CastMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    pub fn with<D, E>(mut self, tag: impl Into<TypeTag>, decode: D, encode: E) -> Self
    where
        D: Fn(&JsonValue) -> Result<Value, CodecError> + Send + Sync + 'static,
        E: Fn(&Value) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        self.insert(tag, Cast::new(decode, encode));
        self
    }

    /// Add or replace the entry for `tag`.
    pub fn insert(&mut self, tag: impl Into<TypeTag>, cast: Cast) -> Option<Cast> {
        self.entries.insert(tag.into(), cast)
    }

    pub fn remove(&mut self, tag: &str) -> Option<Cast> {
        self.entries.remove(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&Cast> {
        self.entries.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` into `self`; entries in `other` win.
    pub fn extend(&mut self, other: CastMap) {
        self.entries.extend(other.entries);
    }

    /// Stock casts for chrono dates (`date` and `datetime`).
    pub fn iso_dates() -> Self {
        let mut casts = CastMap::new();
        casts.insert(DATE_TAG, iso_date());
        casts.insert(DATETIME_TAG, rfc3339_datetime());
        casts
    }
}

impl fmt::Debug for CastMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.entries.keys().map(TypeTag::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("CastMap").field("tags", &tags).finish()
    }
}

// ============================================================================
// STOCK CASTS
// ============================================================================

/// `NaiveDate` <-> `"YYYY-MM-DD"`.
pub fn iso_date() -> Cast {
    Cast::new(
        |json| {
            let text = json
                .as_str()
                .ok_or_else(|| CodecError::malformed("ISO date string", json.to_string()))?;
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| CodecError::Cast {
                tag: DATE_TAG.to_string(),
                reason: format!("{text:?}: {e}"),
            })?;
            Ok(Value::foreign(DATE_TAG, date))
        },
        |value| {
            let date = downcast::<NaiveDate>(value, DATE_TAG)?;
            Ok(Value::Str(date.format("%Y-%m-%d").to_string()))
        },
    )
}

/// `DateTime<Utc>` <-> RFC 3339 string.
pub fn rfc3339_datetime() -> Cast {
    Cast::new(
        |json| {
            let text = json
                .as_str()
                .ok_or_else(|| CodecError::malformed("RFC 3339 string", json.to_string()))?;
            let datetime = DateTime::parse_from_rfc3339(text).map_err(|e| CodecError::Cast {
                tag: DATETIME_TAG.to_string(),
                reason: format!("{text:?}: {e}"),
            })?;
            Ok(Value::foreign(DATETIME_TAG, datetime.with_timezone(&Utc)))
        },
        |value| {
            let datetime = downcast::<DateTime<Utc>>(value, DATETIME_TAG)?;
            Ok(Value::Str(
                datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ))
        },
    )
}

fn downcast<'v, T: 'static>(value: &'v Value, tag: &str) -> Result<&'v T, CodecError> {
    value
        .as_object()
        .and_then(|object| object.downcast_ref::<T>())
        .ok_or_else(|| CodecError::Cast {
            tag: tag.to_string(),
            reason: format!("cannot encode {} value", value.type_tag()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn lookup_and_replace() {
        let mut casts = CastMap::new().with(
            "int",
            |_| Ok(Value::Int(0)),
            |v| Ok(v.clone()),
        );
        assert!(casts.contains("int"));
        assert!(!casts.contains("str"));
        assert_eq!(casts.len(), 1);

        let previous = casts.insert("int", Cast::new(|_| Ok(Value::Int(1)), |v| Ok(v.clone())));
        assert!(previous.is_some());
        assert_eq!(casts.get("int").unwrap().decode(&json!(5)).unwrap(), Value::Int(1));

        casts.remove("int");
        assert!(casts.is_empty());
    }

    #[test]
    fn iso_date_cast() {
        let cast = iso_date();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let encoded = cast.encode(&Value::foreign(DATE_TAG, date)).unwrap();
        assert_eq!(encoded, Value::Str("2024-03-01".into()));

        let decoded = cast.decode(&json!("2024-03-01")).unwrap();
        assert_eq!(decoded.as_object().unwrap().downcast_ref::<NaiveDate>(), Some(&date));
    }

    #[test]
    fn iso_date_rejects_bad_input() {
        let cast = iso_date();
        assert!(matches!(
            cast.decode(&json!(12)),
            Err(CodecError::MalformedDocument { .. })
        ));
        assert!(matches!(
            cast.decode(&json!("March 1st")),
            Err(CodecError::Cast { .. })
        ));
        assert!(matches!(
            cast.encode(&Value::Int(3)),
            Err(CodecError::Cast { .. })
        ));
    }

    #[test]
    fn datetime_cast_normalises_to_utc() {
        let cast = rfc3339_datetime();
        let decoded = cast.decode(&json!("2024-03-01T14:00:00+02:00")).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            decoded.as_object().unwrap().downcast_ref::<DateTime<Utc>>(),
            Some(&expected)
        );
        assert_eq!(
            cast.encode(&decoded).unwrap(),
            Value::Str("2024-03-01T12:00:00Z".into())
        );
    }

    #[test]
    fn debug_lists_tags() {
        let casts = CastMap::iso_dates();
        assert_eq!(format!("{casts:?}"), r#"CastMap { tags: ["date", "datetime"] }"#);
    }
}
