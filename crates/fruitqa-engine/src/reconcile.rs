//! Unit↔percentage reconciliation.
//!
//! Percentage tables accept raw unit counts but store percentages of a
//! denominator (a sample size, or a per-column fruit count). Each cell is
//! resolved independently, in strict priority order:
//!
//! 1. The cell changed since the snapshot: the value is fresh units. Store
//!    `units / denominator * 100`, or the raw value when the denominator is
//!    missing or zero.
//! 2. Only the denominator changed, and both old and new are positive: the
//!    value is a percentage of the old denominator. Recover the implied unit
//!    count and re-express it against the new denominator.
//! 3. Otherwise the stored value stands.
//!
//! ```
//! use fruitqa_engine::reconcile::reconcile_cell;
//! use serde_json::json;
//!
//! // sample size 50 -> 25, cell untouched: 10% of 50 is 5 fruits, 20% of 25
//! let stored = reconcile_cell("danos.0.l1", &json!(10), Some(&json!(10)), Some(25.0), Some(50.0), 1);
//! assert_eq!(stored, json!(20));
//! ```

use fruitqa_util::{as_number, deep_equal, is_blank, number_cell, round_to};
use log::trace;
use serde_json::Value;

/// A denominator usable for conversion: finite and strictly positive.
pub fn valid_denominator(denominator: Option<f64>) -> Option<f64> {
    denominator.filter(|d| d.is_finite() && *d > 0.0)
}

/// `units` as a percentage of `denominator`, rounded to `precision` places.
pub fn to_percent(units: f64, denominator: f64, precision: u32) -> f64 {
    round_to(units / denominator * 100.0, precision)
}

/// Whole units implied by a stored percentage of `denominator`.
pub fn implied_units(percent: f64, denominator: f64) -> f64 {
    (percent * denominator / 100.0).round()
}

/// Resolve the stored value of one percentage cell.
///
/// `prev` is the cell's value in the snapshot, `None` when the row did not
/// exist there. Blank cells stay blank and non-numeric cells are left as
/// typed; nothing here fails or produces `NaN`.
pub fn reconcile_cell(
    cell_key: &str,
    current: &Value,
    prev: Option<&Value>,
    current_denominator: Option<f64>,
    prev_denominator: Option<f64>,
    precision: u32,
) -> Value {
    if is_blank(Some(current)) {
        return current.clone();
    }
    let Some(value) = as_number(current) else {
        return current.clone();
    };

    let edited = prev.map_or(true, |prev| !deep_equal(prev, current));
    if edited {
        return match valid_denominator(current_denominator) {
            Some(den) => {
                let stored = to_percent(value, den, precision);
                trace!("{cell_key}: {value} units -> {stored}% of {den}");
                number_cell(stored)
            }
            None => current.clone(),
        };
    }

    match (valid_denominator(current_denominator), valid_denominator(prev_denominator)) {
        (Some(den), Some(prev_den)) if den != prev_den => {
            let units = implied_units(value, prev_den);
            let stored = to_percent(units, den, precision);
            trace!("{cell_key}: {value}% of {prev_den} rebased to {stored}% of {den}");
            number_cell(stored)
        }
        _ => current.clone(),
    }
}

/// Unit count represented by a stored cell, for totals over reconciled tables.
///
/// With a valid denominator the cell is a percentage; without one it still
/// holds the raw units it was typed as.
pub fn stored_units(stored: &Value, denominator: Option<f64>) -> Option<f64> {
    let value = as_number(stored)?;
    Some(match valid_denominator(denominator) {
        Some(den) => implied_units(value, den),
        None => value,
    })
}
