// Local stand-ins for the remote store

pub mod in_memory;

pub use in_memory::{DuplicatePolicy, InMemoryStore};
