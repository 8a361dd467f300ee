// relocate-marshal/src/lib.rs

//! Lossless CPython marshal codec for module-cache (`.pyc`) files
//!
//! Decodes a cache file into an arena-backed object graph, allows the origin
//! path of every code object to be replaced, and encodes the graph back.
//! Anything not edited is reproduced byte for byte, including back-reference
//! placement, so an unmodified container round-trips to identical bytes.
//!
//! ```ignore
//! use relocate_marshal::Container;
//!
//! let mut container = Container::parse(&std::fs::read("mod.pyc")?)?;
//! if container.graph_mut().set_filenames("/opt/python/lib/python3.11/mod.py") > 0 {
//!     std::fs::write("mod.pyc", container.to_bytes()?)?;
//! }
//! ```

mod container;
mod error;
mod object;
mod reader;
mod writer;

pub use container::{Container, FormatVersion};
pub use error::{MarshalError, Result};
pub use object::{CodeLayout, CodeUnit, Node, Object, ObjectGraph, ObjectId, StrKind};
pub use reader::{read_graph, MAX_DEPTH};
pub use writer::write_graph;
