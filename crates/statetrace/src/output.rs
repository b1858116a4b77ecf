//! Record sinks.
//!
//! The analyzer emits the same record stream in up to two encodings, each
//! independently toggleable: the byte-exact binary form consumed by offline
//! tooling, and a line-oriented textual form for eyeballing. Generic over
//! [`Write`] so tests capture into byte buffers and production writes
//! buffered files.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::record::Record;

pub struct StateWriter<W: Write = BufWriter<File>> {
    raw: Option<W>,
    txt: Option<W>,
    scratch: Vec<u8>,
}

impl StateWriter<BufWriter<File>> {
    /// Open file-backed sinks for whichever encodings have a path.
    pub fn create(raw_path: Option<&Path>, txt_path: Option<&Path>) -> io::Result<Self> {
        let open = |path: &Path| File::create(path).map(BufWriter::new);
        Ok(Self::new(
            raw_path.map(open).transpose()?,
            txt_path.map(open).transpose()?,
        ))
    }
}

impl<W: Write> StateWriter<W> {
    pub fn new(raw: Option<W>, txt: Option<W>) -> Self {
        Self {
            raw,
            txt,
            scratch: Vec::new(),
        }
    }

    /// A writer with no sinks: the analyzer skips classification entirely.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn enabled(&self) -> bool {
        self.raw.is_some() || self.txt.is_some()
    }

    /// Emit one record to every enabled sink. `name` is the display name of
    /// the originating call; only the textual encoding carries it.
    pub fn write(&mut self, record: &Record, name: &str) -> io::Result<()> {
        if let Some(txt) = &mut self.txt {
            match record {
                Record::Call {
                    bin,
                    size,
                    valid,
                    object,
                    ..
                } => writeln!(txt, "C: {bin:02} {size} {object} {valid} {name}")?,
                Record::Draw {
                    bins,
                    prim_count,
                    draw_bytes,
                    ..
                } => {
                    write!(txt, "{name}: ")?;
                    for bin in bins {
                        write!(txt, "{}{}[{}] ", bin.id, bin.change.glyph(), bin.bytes)?;
                    }
                    writeln!(txt, " {prim_count}D[{draw_bytes}]")?;
                }
                Record::Frame { frame, bytes } => writeln!(txt, "FRAME: {frame}  ({bytes})")?,
            }
        }
        if let Some(raw) = &mut self.raw {
            self.scratch.clear();
            record.encode_into(&mut self.scratch);
            raw.write_all(&self.scratch)?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(raw) = &mut self.raw {
            raw.flush()?;
        }
        if let Some(txt) = &mut self.txt {
            txt.flush()?;
        }
        Ok(())
    }

    /// Hand back the underlying sinks (binary, text).
    pub fn into_parts(self) -> (Option<W>, Option<W>) {
        (self.raw, self.txt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::{ChangeKind, NUM_BINS};
    use crate::record::BinState;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_lines_match_the_documented_format() {
        let mut writer = StateWriter::new(None, Some(Vec::new()));
        writer
            .write(
                &Record::Call {
                    name_id: 111,
                    bin: 8,
                    size: 0,
                    valid: 0,
                    object: 10_042,
                },
                "BindTexture",
            )
            .unwrap();
        writer
            .write(&Record::Frame { frame: 0, bytes: 64 }, "SwapBuffers")
            .unwrap();
        let (_, txt) = writer.into_parts();
        assert_eq!(
            String::from_utf8(txt.unwrap()).unwrap(),
            "C: 08 0 10042 0 BindTexture\nFRAME: 0  (64)\n"
        );
    }

    #[test]
    fn draw_line_lists_every_bin() {
        let mut writer = StateWriter::new(None, Some(Vec::new()));
        let mut bins = [BinState {
            id: -1,
            change: ChangeKind::Undef,
            bytes: 0,
        }; NUM_BINS];
        bins[0] = BinState {
            id: 2,
            change: ChangeKind::Switch,
            bytes: 0,
        };
        writer
            .write(
                &Record::Draw {
                    name_id: 101,
                    bins,
                    prim_count: 6,
                    draw_bytes: 64,
                },
                "DrawArrays",
            )
            .unwrap();
        let (_, txt) = writer.into_parts();
        let line = String::from_utf8(txt.unwrap()).unwrap();
        assert!(line.starts_with("DrawArrays: 2s[0] -1x[0] "));
        assert!(line.ends_with(" 6D[64]\n"));
        assert_eq!(line.matches("[").count(), NUM_BINS + 1);
    }

    #[test]
    fn binary_sink_receives_exact_record_bytes() {
        let mut writer = StateWriter::new(Some(Vec::new()), None);
        let record = Record::Frame { frame: 1, bytes: 2 };
        writer.write(&record, "SwapBuffers").unwrap();
        writer.write(&record, "SwapBuffers").unwrap();
        let (raw, _) = writer.into_parts();
        let raw = raw.unwrap();
        assert_eq!(raw.len(), record.encoded_len() * 2);
        assert_eq!(&raw[..record.encoded_len()], record.encode().as_slice());
    }

    #[test]
    fn disabled_writer_reports_disabled() {
        assert!(!StateWriter::<Vec<u8>>::disabled().enabled());
        assert!(StateWriter::new(Some(Vec::new()), None).enabled());
    }
}
