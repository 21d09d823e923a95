//! Bounded object color palette.
//!
//! Each trackable object is painted in one of six fixed colors. The
//! allocator hands out the lowest free slot on creation and reclaims it on
//! deletion; exhausting the palette is the hard cap on simultaneous objects.

use crate::foundation::core::Rgba8;

/// One palette entry: display hex plus the parsed color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteColor {
    pub hex: &'static str,
    pub rgba: Rgba8,
}

/// The fixed object palette. At most `PALETTE.len()` objects can exist at
/// once.
pub const PALETTE: [PaletteColor; 6] = [
    PaletteColor {
        hex: "#4B7EEB",
        rgba: Rgba8::new(0x4B, 0x7E, 0xEB, 0xFF),
    },
    PaletteColor {
        hex: "#E6AD41",
        rgba: Rgba8::new(0xE6, 0xAD, 0x41, 0xFF),
    },
    PaletteColor {
        hex: "#5FCFBE",
        rgba: Rgba8::new(0x5F, 0xCF, 0xBE, 0xFF),
    },
    PaletteColor {
        hex: "#F05A7E",
        rgba: Rgba8::new(0xF0, 0x5A, 0x7E, 0xFF),
    },
    PaletteColor {
        hex: "#AD49E1",
        rgba: Rgba8::new(0xAD, 0x49, 0xE1, 0xFF),
    },
    PaletteColor {
        hex: "#387F39",
        rgba: Rgba8::new(0x38, 0x7F, 0x39, 0xFF),
    },
];

/// A claim on one palette entry, held by an object for its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorSlot(usize);

impl ColorSlot {
    pub fn color(self) -> PaletteColor {
        PALETTE[self.0]
    }

    pub fn hex(self) -> &'static str {
        self.color().hex
    }

    pub fn rgba(self) -> Rgba8 {
        self.color().rgba
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColorAllocator {
    taken: [bool; PALETTE.len()],
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        PALETTE.len()
    }

    pub fn available(&self) -> usize {
        self.taken.iter().filter(|&&t| !t).count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.available() == 0
    }

    /// Claim the lowest free slot, or `None` when the palette is exhausted.
    pub fn allocate(&mut self) -> Option<ColorSlot> {
        let idx = self.taken.iter().position(|&t| !t)?;
        self.taken[idx] = true;
        Some(ColorSlot(idx))
    }

    /// Return a slot to the pool. Releasing an already-free slot is a no-op.
    pub fn release(&mut self, slot: ColorSlot) {
        self.taken[slot.0] = false;
    }
}
