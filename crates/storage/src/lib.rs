pub mod db;

pub use db::{create_db, in_memory_db, DbPool, LedgerStore, StorageError};
