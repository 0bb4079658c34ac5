//! Scoring state: notes, validation, category distribution and undo.
//!
//! [`NotationStore`] is the only writer of notes. Grids stage raw text in a
//! [`crate::draft::DraftCellLedger`] and commit through the store, which
//! snapshots the previous mapping into its [`UndoHistory`].

mod distribution;
mod history;
mod store;
mod types;
mod validation;

pub use distribution::{distribute_category_score, group_step};
pub use history::UndoHistory;
pub use store::{imported_scope, CategoryEditMode, JudgeScope, NotationStore, CURRENT_SCOPE, IMPORTED_SCOPE_PREFIX};
pub use types::*;
pub use validation::{
    calculate_score, category_score, criterion_numeric_score, is_note_complete, normalize_value, note_total,
    round2, validate_criterion_value, ValidationResult,
};
