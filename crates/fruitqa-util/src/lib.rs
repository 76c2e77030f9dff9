//! fruitqa-util - Cell value helpers for submission documents.
//!
//! Submission cells hold numbers, strings, booleans or the empty-string
//! sentinel meaning "no data entered". The helpers here coerce, compare,
//! round and build such cells consistently.

pub mod ids;
pub mod json_equal;
pub mod number;

pub use ids::{RandomRowIds, RowIdSource, SequentialRowIds};
pub use json_equal::deep_equal;
pub use number::{as_number, cell_from, empty_cell, is_blank, number_cell, round_to};
