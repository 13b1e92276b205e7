//! Compaction tuning knobs.

use serde::{Deserialize, Serialize};

/// Compaction collapses old conversation history into a summary so the
/// context window doesn't overflow after many turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Message count above which compaction always triggers.
    #[serde(default = "d_20")]
    pub hard_ceiling: usize,

    /// Message count above which compaction triggers when the token
    /// estimate also exceeds `token_budget`.
    #[serde(default = "d_15")]
    pub threshold: usize,

    /// Estimated-token budget paired with `threshold`.
    #[serde(default = "d_8000")]
    pub token_budget: usize,

    /// Number of recent messages kept verbatim after compaction.
    #[serde(default = "d_10")]
    pub keep_recent: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            hard_ceiling: 20,
            threshold: 15,
            token_budget: 8000,
            keep_recent: 10,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_20() -> usize {
    20
}
fn d_15() -> usize {
    15
}
fn d_8000() -> usize {
    8000
}
fn d_10() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let cfg: CompactionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.hard_ceiling, 20);
        assert_eq!(cfg.threshold, 15);
        assert_eq!(cfg.token_budget, 8000);
        assert_eq!(cfg.keep_recent, 10);
    }
}
