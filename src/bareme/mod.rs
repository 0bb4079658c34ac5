//! Rubrics ("barèmes"): weighted criteria grouped into derived categories.
//!
//! - **Types**: serde shapes shared with rubric and project files
//! - **Parsing**: lenient import of rubric JSON plus the embedded official rubric
//! - **Library**: the set of available rubrics and the active one

mod library;
mod parse;
mod types;

pub use library::BaremeLibrary;
pub use parse::{official_bareme, parse_bareme};
pub use types::*;
