//! Data-subject erasure engine: given a user key, back up and delete every
//! record the user owns across the entity hierarchy, and track the request's
//! lifecycle through a persisted, retrying workflow.

pub mod backup;
pub mod cascade;
pub mod core;
pub mod store;
pub mod workflow;

pub use self::core::config::LetheConfig;
pub use self::core::error::{DataFailure, LetheError, Result};
pub use store::{StoreClient, StoreClientError, UserKey};

pub const DEFAULT_STORE_PORT: u16 = 8083;

pub const DEFAULT_PAGE_SIZE: usize = 100;

pub const DEFAULT_STEP_MAX_ATTEMPTS: u32 = 10;

pub const DEFAULT_STEP_RETRY_DELAY_SECS: u64 = 5;
