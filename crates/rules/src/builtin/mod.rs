//! Built-in rule types: `in-list` and `in-range`.

mod in_list;
mod in_range;

pub use in_list::InListRule;
pub use in_range::InRangeRule;

/// Registered name of [`InListRule`].
pub const IN_LIST: &str = "in-list";
/// Registered name of [`InRangeRule`].
pub const IN_RANGE: &str = "in-range";
