//! Dataset adapters for Tanya.
//!
//! Loads the embedded Q&A table from a file or URL and keeps it as an
//! immutable in-memory snapshot with an explicit reload lifecycle.

pub mod loader;
pub mod store;

pub use loader::{load_dataset, parse_entries, parse_records, read_entries_from_path, write_records};
pub use store::DatasetStore;
