//! Canonical pipeline spec model and the pure half of the sync engine.
//!
//! The front end is: parse YAML -> canonical model -> normalize (function
//! names, read aliases, receiver wiring) -> resolve references -> project to
//! a flow graph. Merging and importing incoming partial specs also live here.
//! Nothing in this crate performs I/O.

pub mod diagnostics;
pub mod errors;
pub mod function;
pub mod import;
pub mod lint;
pub mod merge;
pub mod model;
pub mod parse;
pub mod projection;
pub mod refs;
pub mod transforms;

pub use diagnostics::*;
pub use errors::*;
pub use function::*;
pub use import::*;
pub use lint::*;
pub use merge::*;
pub use model::*;
pub use parse::*;
pub use projection::*;
pub use refs::*;
pub use transforms::*;
