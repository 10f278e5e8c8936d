//! Type descriptors.
//!
//! # Overview
//!
//! JSON carries no type information, so decoding is driven by an explicit
//! [`TypeDescriptor`] built by the caller:
//!
//! ```ignore
//! // map<date, list<tuple<int, item>>>
//! let descriptor = TypeDescriptor::map(
//!     TypeDescriptor::foreign("date"),
//!     TypeDescriptor::list(TypeDescriptor::tuple(vec![
//!         TypeDescriptor::int(),
//!         TypeDescriptor::object::<Item>(),
//!     ])),
//! );
//! ```
//!
//! # Textual Form
//!
//! Descriptors print and parse as `str`, `int`, `float`, `bool`, `list<T>`,
//! `set<T>`, `option<T>`, `tuple<A,B,...>` and `map<K,V>`. Any other
//! identifier is an opaque tag with no decoder, so it can only be decoded
//! through a cast map.

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::error::CodecError;
use crate::tag::TypeTag;
use crate::value::{Jsonable, Value};

/// Primitive kinds understood natively by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Str,
    Int,
    Float,
    Bool,
}

impl Primitive {
    pub fn type_tag(self) -> TypeTag {
        match self {
            Primitive::Str => TypeTag::STR,
            Primitive::Int => TypeTag::INT,
            Primitive::Float => TypeTag::FLOAT,
            Primitive::Bool => TypeTag::BOOL,
        }
    }
}

/// Constructor invoked for an opaque type during decoding.
pub type ObjectDecoder = fn(&JsonValue) -> Result<Value, CodecError>;

/// An opaque type: a tag plus, optionally, the capability to construct the
/// type from its jsonable representation.
#[derive(Clone)]
pub struct OpaqueType {
    tag: TypeTag,
    decoder: Option<ObjectDecoder>,
}

impl OpaqueType {
    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn decoder(&self) -> Option<ObjectDecoder> {
        self.decoder
    }
}

// Decoders are not comparable; two opaque types are the same type when
// their tags match.
impl PartialEq for OpaqueType {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl fmt::Debug for OpaqueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueType")
            .field("tag", &self.tag)
            .field("decodable", &self.decoder.is_some())
            .finish()
    }
}

/// The shape of a persisted value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    ListOf(Box<TypeDescriptor>),
    SetOf(Box<TypeDescriptor>),
    TupleOf(Vec<TypeDescriptor>),
    MapOf(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// `null` or the inner shape.
    OptionOf(Box<TypeDescriptor>),
    Opaque(OpaqueType),
}

impl TypeDescriptor {
    pub fn string() -> Self {
        TypeDescriptor::Primitive(Primitive::Str)
    }

    pub fn int() -> Self {
        TypeDescriptor::Primitive(Primitive::Int)
    }

    pub fn float() -> Self {
        TypeDescriptor::Primitive(Primitive::Float)
    }

    pub fn boolean() -> Self {
        TypeDescriptor::Primitive(Primitive::Bool)
    }

    pub fn list(element: TypeDescriptor) -> Self {
        TypeDescriptor::ListOf(Box::new(element))
    }

    pub fn set(element: TypeDescriptor) -> Self {
        TypeDescriptor::SetOf(Box::new(element))
    }

    pub fn tuple(elements: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::TupleOf(elements)
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::MapOf(Box::new(key), Box::new(value))
    }

    pub fn option(inner: TypeDescriptor) -> Self {
        TypeDescriptor::OptionOf(Box::new(inner))
    }

    /// Opaque type decoded through its [`Jsonable`] implementation.
    pub fn object<T: Jsonable>() -> Self {
        TypeDescriptor::Opaque(OpaqueType {
            tag: TypeTag::from_static(T::TYPE_TAG),
            decoder: Some(decode_object::<T> as ObjectDecoder),
        })
    }

    /// Opaque type with no decode capability; a cast-map entry for `tag`
    /// must handle it.
    pub fn foreign(tag: impl Into<TypeTag>) -> Self {
        TypeDescriptor::Opaque(OpaqueType {
            tag: tag.into(),
            decoder: None,
        })
    }

    /// The tag consulted in the decode cast map.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            TypeDescriptor::Primitive(kind) => kind.type_tag(),
            TypeDescriptor::ListOf(_) => TypeTag::LIST,
            TypeDescriptor::SetOf(_) => TypeTag::SET,
            TypeDescriptor::TupleOf(_) => TypeTag::TUPLE,
            TypeDescriptor::MapOf(..) => TypeTag::MAP,
            TypeDescriptor::OptionOf(_) => TypeTag::OPTION,
            TypeDescriptor::Opaque(opaque) => opaque.tag.clone(),
        }
    }
}

fn decode_object<T: Jsonable>(json: &JsonValue) -> Result<Value, CodecError> {
    T::from_jsonable(json).map(Value::object)
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(kind) => write!(f, "{}", kind.type_tag()),
            TypeDescriptor::ListOf(element) => write!(f, "list<{element}>"),
            TypeDescriptor::SetOf(element) => write!(f, "set<{element}>"),
            TypeDescriptor::OptionOf(inner) => write!(f, "option<{inner}>"),
            TypeDescriptor::MapOf(key, value) => write!(f, "map<{key},{value}>"),
            TypeDescriptor::TupleOf(elements) => {
                f.write_str("tuple<")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(">")
            }
            TypeDescriptor::Opaque(opaque) => write!(f, "{}", opaque.tag),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Error returned when a textual descriptor cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid type descriptor at position {position}: {message}")]
pub struct DescriptorParseError {
    pub position: usize,
    pub message: String,
}

impl FromStr for TypeDescriptor {
    type Err = DescriptorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { input: s, pos: 0 };
        let descriptor = parser.descriptor()?;
        parser.skip_whitespace();
        if parser.pos < s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(descriptor)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn descriptor(&mut self) -> Result<TypeDescriptor, DescriptorParseError> {
        let start = self.pos;
        let name = self.identifier()?;
        let descriptor = match name {
            "str" => TypeDescriptor::string(),
            "int" => TypeDescriptor::int(),
            "float" => TypeDescriptor::float(),
            "bool" => TypeDescriptor::boolean(),
            "list" => TypeDescriptor::list(self.single_argument()?),
            "set" => TypeDescriptor::set(self.single_argument()?),
            "option" => TypeDescriptor::option(self.single_argument()?),
            "tuple" => TypeDescriptor::tuple(self.arguments()?),
            "map" => {
                let mut arguments = self.arguments()?;
                if arguments.len() != 2 {
                    self.pos = start;
                    return Err(self.error("map takes exactly two arguments"));
                }
                let value = arguments.pop();
                let key = arguments.pop();
                match (key, value) {
                    (Some(key), Some(value)) => TypeDescriptor::map(key, value),
                    _ => return Err(self.error("map takes exactly two arguments")),
                }
            }
            other => TypeDescriptor::foreign(other.to_string()),
        };
        Ok(descriptor)
    }

    fn single_argument(&mut self) -> Result<TypeDescriptor, DescriptorParseError> {
        let start = self.pos;
        let mut arguments = self.arguments()?;
        if arguments.len() != 1 {
            self.pos = start;
            return Err(self.error("expected exactly one type argument"));
        }
        Ok(arguments.remove(0))
    }

    fn arguments(&mut self) -> Result<Vec<TypeDescriptor>, DescriptorParseError> {
        self.expect('<')?;
        let mut arguments = vec![self.descriptor()?];
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    arguments.push(self.descriptor()?);
                }
                Some('>') => {
                    self.pos += 1;
                    return Ok(arguments);
                }
                _ => return Err(self.error("expected ',' or '>'")),
            }
        }
    }

    fn identifier(&mut self) -> Result<&'a str, DescriptorParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let rest = &self.input[start..];
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                let allowed = if i == 0 {
                    c.is_ascii_alphabetic() || c == '_'
                } else {
                    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
                };
                !allowed
            })
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return Err(self.error("expected a type name"));
        }
        self.pos += len;
        Ok(&self.input[start..start + len])
    }

    fn expect(&mut self, c: char) -> Result<(), DescriptorParseError> {
        self.skip_whitespace();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, message: &str) -> DescriptorParseError {
        DescriptorParseError {
            position: self.pos,
            message: message.to_string(),
        }
    }
}
