//! Storage layer (activity and user stores).
//!
//! Persistence engine design is out of scope for this service; the stores
//! are in-memory and exist to honor the collaborator contract the tracking
//! engine depends on (materialize finished sessions, increment lifetime
//! totals, serve profile lookups).

pub mod memory;

pub use memory::Db;
