//! Scheduler thread-identifier field offset.
//!
//! Tracers read the identifier of the running goroutine straight out of the
//! runtime's `g` structure, so they need the byte offset of its `goid`
//! member for the exact binary being traced.

use crate::dwarf::{find_compile_unit, find_member, find_structure, DebugTree, FieldOffset};
use crate::error::Result;

/// Structure describing one scheduler-managed execution unit.
pub const SCHEDULER_STRUCT: &str = "runtime.g";
/// Thread-identifier member of [`SCHEDULER_STRUCT`].
pub const THREAD_ID_FIELD: &str = "goid";

/// Offset of `field` inside `structure`.
pub fn locate_field(tree: &DebugTree, structure: &str, field: &str) -> Result<FieldOffset> {
    find_compile_unit(tree)?;
    let entry = find_structure(tree, structure)?;
    find_member(entry, field)
}

/// Offset of `goid` inside `runtime.g`.
pub fn locate_thread_id_field(tree: &DebugTree) -> Result<FieldOffset> {
    locate_field(tree, SCHEDULER_STRUCT, THREAD_ID_FIELD)
}
