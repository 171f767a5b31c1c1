//! The three structural questions asked of a target binary.
//!
//! Each analysis is an independent consumer of the loader, decoder and
//! debug-info walker; none of them calls another.

pub mod abi;
pub mod goid;
pub mod returns;

pub use abi::{detect_from_helper, detect_from_producer, CallingConvention};
pub use goid::locate_thread_id_field;
pub use returns::{find_return_offsets, symbol_return_offsets, ReturnOffsetSet};
