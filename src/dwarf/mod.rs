//! Debug-information walker.
//!
//! The DWARF in an image is parsed once into an explicit [`DebugTree`];
//! compile-unit, structure and member lookups then run over that tree.

mod parse;
pub mod tree;

pub use parse::MAX_DEPTH;
pub use tree::{
    find_compile_unit, find_member, find_structure, DebugEntry, DebugTree, DebugValue, FieldOffset,
};
