//! Project state and persistence.
//!
//! - **Types**: the camelCase project file (clips, settings, notes, imported judges)
//! - **Store**: clips, selection, dirty flag with edit generations
//! - **IO**: atomic JSON save behind the [`ProjectSink`] trait, and loading
//! - **Import**: matching another judge's notes onto the current clips

mod import;
mod io;
mod store;
mod types;

pub use import::{normalize_imported_judge, DEFAULT_IMPORTED_JUDGE_NAME};
pub use io::{load_project_file, load_project_value, write_project_atomic, JsonFileSink, ProjectSink};
pub use store::{sorted_clip_indices, sorted_clip_position, ProjectStore};
pub use types::*;
