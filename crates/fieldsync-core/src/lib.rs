//! fieldsync-core: Custom field resolution and incremental update diffing.
//!
//! This crate provides:
//! - `FieldCatalog`: Async source of custom field definitions, with a
//!   single-flight `CachedCatalog`
//! - `FieldResolver`: Name to id resolution scoped by project and issue type
//! - `ValueCodec`: Per-field wire serialization strategies
//! - `FieldValueSet`: The editable custom fields of an issue
//! - `compute_changed_entries` / `build_update_payload`: Partial update diffing

pub mod catalog;
pub mod codec;
pub mod definition;
pub mod diff;
pub mod entry;
pub mod error;
pub mod field_set;
pub mod issue;
pub mod resolver;
pub mod snapshot;

pub use catalog::{CachedCatalog, FieldCatalog, FieldIndex, InMemoryCatalog, IssueType};
pub use codec::{CodecKind, CodecRegistry, FieldCodec, ValueCodec};
pub use definition::{CatalogScope, FieldDefinition, IssueTypeRef};
pub use diff::{build_update_payload, classify, compute_changed_entries, ChangeReason};
pub use entry::{FieldValueEntry, COMPONENTS_FIELD};
pub use error::{CoreError, Result};
pub use field_set::{CascadingSelection, FieldValueSet};
pub use issue::Issue;
pub use resolver::{FieldResolver, IssueContext};
pub use snapshot::{RemoteSnapshot, SnapshotValue};
pub use tokio_util::sync::CancellationToken;
