//! `statetrace` reconstructs per-draw pipeline state from recorded graphics
//! API call traces (OpenGL and Direct3D 10/11).
//!
//! The analyzer runs two passes over a decoded trace. Pass 1 learns which
//! pipeline slot (*bin*) every resource handle belongs to. Pass 2 replays the
//! calls, tracks each bin's current value identity (content-hashed, mapped to
//! dense per-bin ids), and emits a record stream: one call record per
//! classified call, one draw record summarizing all 25 bins at each draw, and
//! one frame record at each present. The stream feeds offline analyses of
//! state-change overhead.
//!
//! This crate provides:
//! - The bin taxonomy and per-bin state table (see [`bins`]).
//! - Call classification into state-sort operations (see [`classify`]).
//! - Content-addressed value identity (see [`hash`] and [`registry`]).
//! - Byte-exact binary and textual record encodings (see [`record`] and
//!   [`output`]).
//! - The two-pass driver and retracer hook (see [`analyzer`]).
//!
//! Trace decoding and replay are external; calls arrive as
//! [`statetrace_model::Call`] values.

pub mod analyzer;
pub mod bins;
pub mod classify;
pub mod config;
pub mod error;
pub mod hash;
pub mod output;
pub mod record;
pub mod registry;

pub use analyzer::{Analyzer, Pass, TraceSource};
pub use bins::{Bin, BinTable, ChangeKind, Slot, StateBin, NUM_BINS, UNDEF_ID};
pub use classify::{Classifier, SortOp};
pub use config::Config;
pub use error::{Result, SortError};
pub use hash::compute_hash;
pub use output::StateWriter;
pub use record::{
    parse_records, BinState, Record, RecordParseError, CALL_RECORD_LEN, DRAW_RECORD_LEN,
    FRAME_RECORD_LEN, HEADER_LEN,
};
