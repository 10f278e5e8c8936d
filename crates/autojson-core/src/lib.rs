//! # autojson-core
//!
//! Type-driven JSON persistence for typed Rust values.
//!
//! A value is described by an explicit [`TypeDescriptor`], encoded into JSON by
//! the [`codec`], and kept in sync with a file on disk by a
//! [`PersistentObject`]. Writes go through an [`AccessScope`] that flushes on
//! exit when the value was handed out mutably.
//!
//! ## Key Concepts
//!
//! - **Value**: the dynamic tree the codec walks (primitives, collections,
//!   opaque objects)
//! - **TypeDescriptor**: the shape used to decode JSON back into a Value
//! - **CastMap**: per-type overrides that win over built-in handling
//! - **Persistable**: the bridge between ordinary Rust types and Value
//!
//! ## Usage
//!
//! ```ignore
//! use autojson_core::{PersistentObject, TypeDescriptor};
//!
//! let descriptor = TypeDescriptor::list(TypeDescriptor::int());
//! let mut counts = PersistentObject::open("data/counts", descriptor, Vec::<i64>::new())?;
//!
//! {
//!     let mut scope = counts.enter();
//!     scope.write().push(42);
//! } // data/counts.json is rewritten here
//! ```

pub mod cast;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod paths;
pub mod persistable;
pub mod persistent;
pub mod scope;
pub mod tag;
pub mod value;

// Re-export commonly used types
pub use cast::{Cast, CastMap};
pub use codec::{from_jsonable, to_jsonable};
pub use descriptor::{DescriptorParseError, OpaqueType, Primitive, TypeDescriptor};
pub use error::{CodecError, PersistError};
pub use persistable::Persistable;
pub use persistent::{read_document, write_atomic, PersistentObject, PersistentObjectBuilder};
pub use scope::AccessScope;
pub use tag::TypeTag;
pub use value::{Jsonable, Object, Value};

/// Re-export of the JSON value type used at the codec boundary.
pub use serde_json::Value as JsonValue;
