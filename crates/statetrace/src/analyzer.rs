//! The two-pass state-sorting analyzer.
//!
//! Pass 1 walks the trace and records which pipeline slot every resource
//! handle belongs to. Pass 2 walks the same trace again, tracks each slot's
//! current value identity, and emits one call record per classified call,
//! one draw record per draw, and one frame record per present.
//!
//! All analyzer state lives in [`Analyzer`]; construct one per trace, run
//! both passes, drop it. Processing is synchronous and single-threaded; the
//! retracer drives the hook in trace order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use statetrace_model::Call;

use crate::bins::{Bin, BinTable, ChangeKind, Slot, NUM_BINS, UNDEF_ID};
use crate::classify::{Classifier, SortOp};
use crate::config::Config;
use crate::error::Result;
use crate::hash::compute_hash;
use crate::output::StateWriter;
use crate::record::{BinState, Record};
use crate::registry::{HandleIds, ResourceMap};

/// A replayable stream of decoded calls.
///
/// The driver consumes the source once per pass, so implementations must be
/// restartable (a seekable trace file, or calls held in memory).
pub trait TraceSource {
    fn replay<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a Call> + 'a>;
}

impl TraceSource for Vec<Call> {
    fn replay<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a Call> + 'a> {
        Box::new(self.iter())
    }
}

impl TraceSource for [Call] {
    fn replay<'a>(&'a mut self) -> Box<dyn Iterator<Item = &'a Call> + 'a> {
        Box::new(self.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Pass 1: populate the resource map. No output.
    Discover,
    /// Pass 2: sort state changes and emit records.
    Emit,
}

fn is_present(name: &str) -> bool {
    matches!(name, "wglSwapBuffers" | "IDXGISwapChain::Present")
}

pub struct Analyzer<W: Write = BufWriter<File>> {
    config: Config,
    pass: Pass,
    /// Replay frame counter; advances on every present, gates `start_frame`.
    frame: i32,
    classifier: Classifier,
    bins: BinTable,
    resources: ResourceMap,
    handle_ids: HandleIds,
    writer: StateWriter<W>,
    /// Frame number written into the next frame record.
    out_frame: i32,
    /// Bytes uploaded since the last frame record.
    frame_bytes: i64,
}

impl Analyzer<BufWriter<File>> {
    /// File-backed analyzer honoring the config's encoding toggles.
    pub fn create(config: Config, raw_path: &Path, txt_path: &Path) -> Result<Self> {
        let writer = StateWriter::create(
            config.raw.then_some(raw_path),
            config.txt.then_some(txt_path),
        )?;
        Ok(Self::new(config, writer))
    }
}

impl<W: Write> Analyzer<W> {
    pub fn new(config: Config, writer: StateWriter<W>) -> Self {
        Self {
            config,
            pass: Pass::Discover,
            frame: 0,
            classifier: Classifier::new(),
            bins: BinTable::new(),
            resources: ResourceMap::new(),
            handle_ids: HandleIds::new(),
            writer,
            out_frame: 0,
            frame_bytes: 0,
        }
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn bins(&self) -> &BinTable {
        &self.bins
    }

    pub fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    /// Snapshot of each bin's current value id, in bin-index order.
    pub fn state_ids(&self) -> [i32; NUM_BINS] {
        self.bins.state_ids()
    }

    /// Consume the analyzer and hand back its writer, so callers owning
    /// in-memory sinks can recover the emitted streams.
    pub fn into_writer(self) -> StateWriter<W> {
        self.writer
    }

    /// Run both passes over the trace and flush the outputs.
    pub fn run<S: TraceSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        self.begin_pass(Pass::Discover);
        for call in source.replay() {
            self.state_call(call)?;
        }
        self.begin_pass(Pass::Emit);
        for call in source.replay() {
            self.state_call(call)?;
        }
        self.finish()
    }

    /// Start a pass. Exposed for hosts that drive the hook themselves
    /// instead of using [`Analyzer::run`].
    pub fn begin_pass(&mut self, pass: Pass) {
        self.pass = pass;
        self.frame = 0;
    }

    /// The retracer hook: invoked once per decoded call, per pass.
    pub fn state_call(&mut self, call: &Call) -> Result<()> {
        if self.writer.enabled() && self.frame >= self.config.start_frame {
            let mut ops = Vec::new();
            self.classifier.classify(call, |op| ops.push(op));
            for op in &ops {
                self.state_sort(op)?;
            }
        }
        // The frame counter advances on presents even while gated; that is
        // what eventually un-gates a start_frame > 0 run.
        if is_present(call.name()) {
            self.frame += 1;
        }
        Ok(())
    }

    /// Flush the output sinks. [`Analyzer::run`] calls this; hosts driving
    /// the hook directly call it after the second pass.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.finish()?;
        Ok(())
    }

    fn state_sort(&mut self, op: &SortOp<'_>) -> Result<()> {
        match self.pass {
            Pass::Discover => {
                if let Slot::Bin(bin) = op.slot {
                    self.resources.assign(op.object, bin);
                }
                Ok(())
            }
            Pass::Emit => self.sort_and_emit(op),
        }
    }

    fn sort_and_emit(&mut self, op: &SortOp<'_>) -> Result<()> {
        if op.slot == Slot::Present {
            self.writer.write(
                &Record::Frame {
                    frame: self.out_frame,
                    bytes: self.frame_bytes as i32,
                },
                op.name,
            )?;
            self.out_frame += 1;
            self.frame_bytes = 0;
            return Ok(());
        }

        if op.slot == Slot::Draw {
            // The draw itself gets a call record; the sentinel has no stored
            // bin, so the value id is undefined.
            self.writer.write(
                &Record::Call {
                    name_id: op.name_id,
                    bin: Slot::Draw.index(),
                    size: op.size,
                    valid: UNDEF_ID,
                    object: op.object,
                },
                op.name,
            )?;

            let draw_bytes = self.bins.draw_bytes();
            let bins: [BinState; NUM_BINS] = std::array::from_fn(|n| {
                let state = self.bins.bin(Bin::ALL[n]);
                BinState {
                    id: state.current_id,
                    change: state.last_change,
                    bytes: state.bytes,
                }
            });
            self.writer.write(
                &Record::Draw {
                    name_id: op.name_id,
                    bins,
                    prim_count: op.size,
                    draw_bytes,
                },
                op.name,
            )?;

            self.frame_bytes += draw_bytes as i64;
            self.bins.reset_change_state();
            return Ok(());
        }

        // Effective bin: the classifier's when it knows one, else whatever
        // pass 1 learned about either handle.
        let bin = match op.slot {
            Slot::Bin(bin) => Some(bin),
            _ => self
                .resources
                .lookup(op.object)
                .or_else(|| self.resources.lookup(op.data)),
        };
        let Some(bin) = bin else {
            debug!(call = op.name, object = op.object, "no bin for handle, dropping");
            return Ok(());
        };

        match op.change {
            ChangeKind::Create | ChangeKind::Update => {
                if op.change.overrides(self.bins.bin(bin).last_change) {
                    let hash = compute_hash(op.object, op.payload.as_deref());
                    let state = self.bins.bin_mut(bin);
                    let id = state.assign_id(hash);
                    state.current_id = id;
                    state.last_change = op.change;
                    state.bytes = if op.change == ChangeKind::Update {
                        op.size
                    } else {
                        0
                    };
                    self.handle_ids.set(op.object, id);
                }
            }
            ChangeKind::Switch => {
                // A handle never created or updated has no identity yet;
                // leave the bin as it was.
                if let Some(id) = self.handle_ids.get(op.object) {
                    let state = self.bins.bin_mut(bin);
                    if ChangeKind::Switch.overrides(state.last_change) {
                        state.current_id = id;
                        state.last_change = ChangeKind::Switch;
                        state.bytes = 0;
                    }
                }
            }
            ChangeKind::Undef | ChangeKind::NoChange => {}
        }

        self.writer.write(
            &Record::Call {
                name_id: op.name_id,
                bin: bin.index() as i32,
                size: op.size,
                valid: self.bins.bin(bin).current_id,
                object: op.object,
            },
            op.name,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use statetrace_model::Value;

    fn memory_analyzer() -> Analyzer<Vec<u8>> {
        Analyzer::new(
            Config::default(),
            StateWriter::new(Some(Vec::new()), Some(Vec::new())),
        )
    }

    fn bind_texture(no: u32, name: u64) -> Call {
        Call::new(
            no,
            "glBindTexture",
            vec![Value::UInt(0x0DE1), Value::UInt(name)],
        )
    }

    #[test]
    fn pass_one_populates_the_resource_map() {
        let mut analyzer = memory_analyzer();
        analyzer.begin_pass(Pass::Discover);
        analyzer.state_call(&bind_texture(1, 42)).unwrap();
        assert_eq!(analyzer.resources().lookup(10_042), Some(Bin::Texture));
        assert_eq!(analyzer.resources().len(), 1);
    }

    #[test]
    fn frame_counter_advances_even_when_gated() {
        let mut analyzer = Analyzer::new(
            Config {
                start_frame: 2,
                ..Config::default()
            },
            StateWriter::new(Some(Vec::new()), None),
        );
        analyzer.begin_pass(Pass::Emit);
        let present = Call::new(1, "wglSwapBuffers", vec![]);
        analyzer.state_call(&present).unwrap();
        analyzer.state_call(&present).unwrap();
        assert_eq!(analyzer.frame, 2);
        // First two presents were below the gate: no frame records yet.
        let (raw, _) = analyzer.writer.into_parts();
        assert!(raw.unwrap().is_empty());
    }

    #[test]
    fn disabled_outputs_skip_classification() {
        let mut analyzer: Analyzer<Vec<u8>> =
            Analyzer::new(Config::default(), StateWriter::disabled());
        analyzer.begin_pass(Pass::Discover);
        analyzer.state_call(&bind_texture(1, 42)).unwrap();
        assert!(analyzer.resources().is_empty());
    }

    #[test]
    fn switch_on_unknown_handle_leaves_bin_untouched() {
        let mut analyzer = memory_analyzer();
        analyzer.begin_pass(Pass::Emit);
        analyzer.state_call(&bind_texture(1, 99)).unwrap();
        let texture = analyzer.bins().bin(Bin::Texture);
        assert_eq!(texture.current_id, UNDEF_ID);
        assert_eq!(texture.last_change, ChangeKind::Undef);
        assert_eq!(analyzer.state_ids(), [UNDEF_ID; NUM_BINS]);
    }
}
