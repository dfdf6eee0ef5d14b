//! Visitor cart management.
//!
//! - [`manager`] - restore, mutate and persist one visitor's cart
//! - [`storage`] - where the persisted copy lives (session, files, memory)

pub mod manager;
pub mod storage;

pub use manager::{CartManager, CartOutcome};
pub use storage::{CartStorage, FileStorage, MemoryStorage, SessionStorage, StorageError, keys};
