//! low level async helpers shared by the connection-handling crates.
//!
//! kept intentionally small: everything here is a mechanical building block
//! (race two futures, run an unordered set of futures to completion) and
//! carries no protocol knowledge.

pub mod futures;
