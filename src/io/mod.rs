//! Input/output helpers.
//!
//! - raw series + metadata ingest (`ingest`)
//! - per-indicator forecast table read/write (`table`)
//! - history export used as AI context (`history`)

pub mod history;
pub mod ingest;
pub mod table;

pub use history::*;
pub use ingest::*;
pub use table::*;
