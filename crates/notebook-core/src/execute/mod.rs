//! The two executors: the imperative interpreter runner and the query
//! executor with placeholder interpolation and result shaping.

pub mod imperative;
pub mod query;

pub use imperative::{execute as execute_imperative, ImperativeOutcome, DEFAULT_TIMEOUT};
pub use query::{execute as execute_query, interpolate, ROW_CAP};
