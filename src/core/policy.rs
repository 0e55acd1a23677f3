use bon::Builder;
use enumset::EnumSet;

/// Optional variations of the scheduling heuristic.
#[derive(Debug, Hash, clap::ValueEnum, enumset::EnumSetType)]
pub enum PolicyFlag {
    /// Enforce the configured per-day charge and discharge event caps.
    EventCaps,

    /// Also trade on valleys and peaks of the look-ahead window.
    QuantileDetection,

    /// Store solar surplus before considering the prices.
    PvPriority,

    /// Skip a discharge when a notably higher price is coming.
    PreservePeak,
}

#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct Policy {
    #[builder(default = EnumSet::only(PolicyFlag::PvPriority))]
    pub flags: EnumSet<PolicyFlag>,

    /// Relative price increase that is worth waiting for.
    #[builder(default = 0.05)]
    pub peak_margin: f64,

    #[builder(default = 0.10)]
    pub valley_quantile: f64,

    #[builder(default = 0.95)]
    pub peak_quantile: f64,
}

impl Default for Policy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Policy {
    #[must_use]
    pub fn has(&self, flag: PolicyFlag) -> bool {
        self.flags.contains(flag)
    }
}
