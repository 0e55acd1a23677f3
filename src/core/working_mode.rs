use comfy_table::Color;
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, derive_more::Display)]
pub enum WorkingMode {
    /// Nothing worth doing.
    Idle,

    /// Charge from the solar surplus.
    Harvest,

    /// Charge from the grid at a low price.
    Charge,

    /// Discharge at a high price.
    Discharge,

    /// Discharge postponed in favour of a higher price later on.
    Preserve,

    /// Daily cycle budget is used up.
    Exhausted,

    /// Malformed period.
    Skipped,
}

impl WorkingMode {
    pub const fn color(self) -> Color {
        match self {
            Self::Charge => Color::Green,
            Self::Discharge => Color::Blue,
            Self::Harvest => Color::Cyan,
            Self::Preserve => Color::DarkYellow,
            Self::Exhausted | Self::Skipped => Color::DarkGrey,
            Self::Idle => Color::Reset,
        }
    }
}
