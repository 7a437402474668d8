use crate::tissue::RoiCoverage;

/// Default tissue fraction for relaxed acceptance
pub const DEFAULT_RELAXED_COVERAGE: f64 = 0.95;

/// Decides whether a tile is kept from the mask pixels under it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AcceptancePolicy {
    /// Every mask pixel under the tile is tissue.
    #[default]
    Strict,
    /// At least `min_coverage` of the mask pixels under the tile are tissue.
    Relaxed { min_coverage: f64 },
}

impl AcceptancePolicy {
    pub fn relaxed() -> Self {
        AcceptancePolicy::Relaxed {
            min_coverage: DEFAULT_RELAXED_COVERAGE,
        }
    }

    /// An empty rectangle is always rejected.
    pub fn accepts(&self, coverage: &RoiCoverage) -> bool {
        if coverage.is_empty() {
            return false;
        }
        match self {
            AcceptancePolicy::Strict => coverage.is_full(),
            AcceptancePolicy::Relaxed { min_coverage } => coverage.fraction() >= *min_coverage,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AcceptancePolicy::Strict => "strict",
            AcceptancePolicy::Relaxed { .. } => "relaxed",
        }
    }
}
