//! Object-file parsing.

pub mod loader;

pub use loader::{find_symbol, load, read_function_bytes};
