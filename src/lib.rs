//! OData CSDL/EDMX metadata compiler
//!
//! Consumes a service's `$metadata` document and produces an immutable,
//! queryable type graph: entity types with inheritance, enum types,
//! navigation edges, entity-set names, and bound/unbound operations.
//!
//! ```no_run
//! use odata_metadata::{HttpConnection, Metadata};
//!
//! # async fn run() -> Result<(), odata_metadata::MetadataError> {
//! let connection = HttpConnection::new();
//! let compiled = Metadata::new("https://example.org/api/data/v9.2/")
//!     .load(&connection)
//!     .await?;
//! let order = compiled.entity_by_collection("Orders");
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod error;
pub mod metadata;
pub mod schema;
pub mod types;
pub mod xml;

pub use compiler::{compile, compile_with_root, CompiledSchema};
pub use error::MetadataError;
pub use metadata::{Connection, HttpConnection, Metadata};
pub use schema::OperationKind;
pub use types::{
    resolve_scalar_kind, BaseEntity, EntityType, EnumType, NavigationProperty, Operation,
    Property, PropertyKind, ResolvedType, ScalarKind, TypeRef, TypeTable,
};
