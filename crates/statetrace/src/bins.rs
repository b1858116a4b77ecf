//! Pipeline state bins.
//!
//! A bin is one logical pipeline slot: the bound shader program, a vertex
//! buffer slot, a constant buffer slot, and so on. The set is closed and the
//! indices are fixed: the binary draw-record layout serializes the table in
//! index order, so reordering variants here is a wire format change.

use std::collections::HashMap;

/// `current_id` before the first assignment.
pub const UNDEF_ID: i32 = -1;

/// Number of real (storable) bins.
pub const NUM_BINS: usize = 25;

/// One pipeline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Bin {
    Shader = 0,
    RenderTarget = 1,
    Viewport = 2,
    Rasterizer = 3,
    Depth = 4,
    Blend = 5,
    Sampler = 6,
    InputLayout = 7,
    Texture = 8,
    Vertex0 = 9,
    Vertex1 = 10,
    Vertex2 = 11,
    Vertex3 = 12,
    Vertex4 = 13,
    VsConst0 = 14,
    VsConst1 = 15,
    VsConst2 = 16,
    VsConst3 = 17,
    VsConst4 = 18,
    PsConst0 = 19,
    PsConst1 = 20,
    PsConst2 = 21,
    PsConst3 = 22,
    PsConst4 = 23,
    Index = 24,
}

impl Bin {
    pub const ALL: [Bin; NUM_BINS] = [
        Bin::Shader,
        Bin::RenderTarget,
        Bin::Viewport,
        Bin::Rasterizer,
        Bin::Depth,
        Bin::Blend,
        Bin::Sampler,
        Bin::InputLayout,
        Bin::Texture,
        Bin::Vertex0,
        Bin::Vertex1,
        Bin::Vertex2,
        Bin::Vertex3,
        Bin::Vertex4,
        Bin::VsConst0,
        Bin::VsConst1,
        Bin::VsConst2,
        Bin::VsConst3,
        Bin::VsConst4,
        Bin::PsConst0,
        Bin::PsConst1,
        Bin::PsConst2,
        Bin::PsConst3,
        Bin::PsConst4,
        Bin::Index,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Bin> {
        Bin::ALL.get(index).copied()
    }

    /// Input-assembler vertex buffer slot `n`. Callers clamp `n` to the five
    /// modelled slots before fanning out.
    pub fn vertex_slot(n: usize) -> Bin {
        debug_assert!(n < 5);
        Bin::ALL[Bin::Vertex0.index() + n]
    }

    pub fn vs_const_slot(n: usize) -> Bin {
        debug_assert!(n < 5);
        Bin::ALL[Bin::VsConst0.index() + n]
    }

    pub fn ps_const_slot(n: usize) -> Bin {
        debug_assert!(n < 5);
        Bin::ALL[Bin::PsConst0.index() + n]
    }
}

/// Dispatch target of a classified call.
///
/// `Draw` and `Present` are sentinels consumed by the driver; they never
/// reach the bin table. `Unknown` defers bin resolution to the resource map
/// built in pass 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Bin(Bin),
    Draw,
    Present,
    Unknown,
}

impl Slot {
    /// Numeric index as serialized in call records.
    pub fn index(self) -> i32 {
        match self {
            Slot::Bin(bin) => bin.index() as i32,
            Slot::Draw => NUM_BINS as i32,
            Slot::Present => NUM_BINS as i32 + 1,
            Slot::Unknown => 250,
        }
    }
}

/// Which operation last touched a bin within the current draw window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChangeKind {
    #[default]
    Undef = 0,
    Create = 1,
    Update = 2,
    Switch = 3,
    NoChange = 4,
}

impl ChangeKind {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<ChangeKind> {
        match value {
            0 => Some(ChangeKind::Undef),
            1 => Some(ChangeKind::Create),
            2 => Some(ChangeKind::Update),
            3 => Some(ChangeKind::Switch),
            4 => Some(ChangeKind::NoChange),
            _ => None,
        }
    }

    /// Glyph used by the textual draw record.
    pub fn glyph(self) -> char {
        match self {
            ChangeKind::Undef => 'x',
            ChangeKind::Create => 'c',
            ChangeKind::Update => 'u',
            ChangeKind::Switch => 's',
            ChangeKind::NoChange => '-',
        }
    }

    /// Whether a change of this kind may overwrite `recorded` within one draw
    /// window.
    ///
    /// Data changes (create, update) always take effect; the latest data
    /// wins. A switch only lands on a bin that has not been created or
    /// updated this window; rebinding after an upload must not mask the
    /// upload in the draw record.
    pub fn overrides(self, recorded: ChangeKind) -> bool {
        match (self, recorded) {
            (_, ChangeKind::Undef) => true,
            (ChangeKind::Update, ChangeKind::Create) => true,
            (new, recorded) => new <= recorded,
        }
    }
}

/// Per-bin state tracked through pass 2.
#[derive(Debug, Default)]
pub struct StateBin {
    /// Dense id of the value currently bound; [`UNDEF_ID`] before first use.
    pub current_id: i32,
    pub last_change: ChangeKind,
    /// Bytes uploaded into this bin since the last draw boundary.
    pub bytes: i32,
    ids: HashMap<u64, i32>,
    next_id: i32,
}

impl StateBin {
    fn new() -> Self {
        Self {
            current_id: UNDEF_ID,
            ..Self::default()
        }
    }

    /// Dense id for a content hash: existing id on a repeat, else the next
    /// unused id (bin-local, starting at 0).
    pub fn assign_id(&mut self, hash: u64) -> i32 {
        let next = &mut self.next_id;
        *self.ids.entry(hash).or_insert_with(|| {
            let id = *next;
            *next += 1;
            id
        })
    }

    /// Number of distinct values observed in this bin.
    pub fn distinct_values(&self) -> usize {
        self.ids.len()
    }
}

/// The fixed table of all 25 pipeline slots.
#[derive(Debug)]
pub struct BinTable {
    bins: [StateBin; NUM_BINS],
}

impl Default for BinTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BinTable {
    pub fn new() -> Self {
        Self {
            bins: std::array::from_fn(|_| StateBin::new()),
        }
    }

    pub fn bin(&self, bin: Bin) -> &StateBin {
        &self.bins[bin.index()]
    }

    pub fn bin_mut(&mut self, bin: Bin) -> &mut StateBin {
        &mut self.bins[bin.index()]
    }

    /// Sum of bytes uploaded across all bins in the current draw window.
    pub fn draw_bytes(&self) -> i32 {
        self.bins.iter().map(|b| b.bytes).sum()
    }

    /// Snapshot of `current_id` per bin in index order.
    pub fn state_ids(&self) -> [i32; NUM_BINS] {
        std::array::from_fn(|n| self.bins[n].current_id)
    }

    /// Draw-boundary reset: clear byte counters and mark every touched bin
    /// unchanged for the next window. Bins never assigned stay undefined.
    pub fn reset_change_state(&mut self) {
        for bin in &mut self.bins {
            bin.bytes = 0;
            if bin.last_change != ChangeKind::Undef {
                bin.last_change = ChangeKind::NoChange;
            }
        }
    }
}
