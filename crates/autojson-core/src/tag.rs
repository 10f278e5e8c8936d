//! Type tags.
//!
//! A [`TypeTag`] names a runtime type for cast-map lookup. Built-in shapes
//! use the fixed tags below; opaque types choose their own (e.g. `"date"`).

use std::borrow::{Borrow, Cow};
use std::fmt;

/// Identifier of a runtime type, used as the cast-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const NULL: TypeTag = TypeTag::from_static("null");
    pub const BOOL: TypeTag = TypeTag::from_static("bool");
    pub const INT: TypeTag = TypeTag::from_static("int");
    pub const FLOAT: TypeTag = TypeTag::from_static("float");
    pub const STR: TypeTag = TypeTag::from_static("str");
    pub const LIST: TypeTag = TypeTag::from_static("list");
    pub const TUPLE: TypeTag = TypeTag::from_static("tuple");
    pub const SET: TypeTag = TypeTag::from_static("set");
    pub const MAP: TypeTag = TypeTag::from_static("map");
    pub const OPTION: TypeTag = TypeTag::from_static("option");

    /// Tag backed by a static string.
    pub const fn from_static(name: &'static str) -> Self {
        TypeTag(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        TypeTag::from_static(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        TypeTag(Cow::Owned(name))
    }
}
