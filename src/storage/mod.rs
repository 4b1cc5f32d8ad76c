pub mod duckdb;
pub mod traits;

pub use traits::{NewRunRecord, RunRecord, RunStatus, RunType, Store, StorageError, NO_WATERMARK};
