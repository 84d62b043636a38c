pub mod align;
pub mod grid;
pub mod settings;
pub mod shift;

pub use align::{AlignCommand, AlignDialog, AlignError, AlignOutcome, HostImage, HostPixels};
pub use grid::{GridError, PixelGrid};
pub use settings::{AlignSettings, ParseSettingsError};
pub use shift::{ShiftDirection, shift};
