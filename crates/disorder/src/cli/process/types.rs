//! CLI enum types for the process command: colour space and persistence mode.

use clap::ValueEnum;
use disorder_core::config::{ColorSpace, PersistMode};

/// Colour space images are converted to before scoring.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ColorArg {
    /// Plain RGB (default)
    Rgb,
    /// Hue, saturation, brightness
    Hsb,
    /// Luma and chroma
    Ycbcr,
}

impl From<ColorArg> for ColorSpace {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Rgb => ColorSpace::Rgb,
            ColorArg::Hsb => ColorSpace::Hsb,
            ColorArg::Ycbcr => ColorSpace::Ycbcr,
        }
    }
}

/// How records are written to the destination.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PersistArg {
    /// Write the whole array once at the end
    Bulk,
    /// Splice each flush into the array in place (default)
    Append,
    /// Append JSON lines, compact into the array at the end
    Journal,
}

impl From<PersistArg> for PersistMode {
    fn from(arg: PersistArg) -> Self {
        match arg {
            PersistArg::Bulk => PersistMode::Bulk,
            PersistArg::Append => PersistMode::Append,
            PersistArg::Journal => PersistMode::Journal,
        }
    }
}

impl std::fmt::Display for PersistArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistArg::Bulk => write!(f, "bulk"),
            PersistArg::Append => write!(f, "append"),
            PersistArg::Journal => write!(f, "journal"),
        }
    }
}
