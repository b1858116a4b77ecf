//! `statetrace-model` holds the decoded-call data model shared between the
//! trace decoder and the state-sorting analyzer.
//!
//! A trace decoder (external to this workspace) turns a recorded API stream
//! into a sequence of [`Call`]s, each carrying positional [`Value`] arguments
//! and a return value. The analyzer in the `statetrace` crate consumes these
//! through a small coercing accessor surface that degrades gracefully on
//! malformed arguments instead of aborting the analysis.

mod call;
mod value;

pub use call::Call;
pub use value::Value;
