use tessera_core::Cancelled;

/// Ranking failure. Degraded inputs (no repository, no imports, empty
/// seeds) produce empty results, so cancellation is the only error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl RankError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
