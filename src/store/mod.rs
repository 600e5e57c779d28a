pub mod client;
pub mod records;
pub mod source;

pub use client::{StoreClient, StoreClientError};
pub use records::{DocStore, EntityKind, EntityRecord, OwnerScope, RecordKey, RecordStore, UserKey};
pub use source::{DocStoreSource, PagedRecordSource};
