use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tuning knobs for aggregation and settlement. The defaults mirror the
/// production policy: 60% approval, quorum of one vote, 70/30
/// contributor/maintainer split.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Approval percentage at or above which a project is approved.
    pub approval_threshold: Decimal,
    /// Minimum vote count before a project leaves `pending`.
    pub quorum: u64,
    /// Percentage of total_funding that goes to the contributor account.
    /// The maintainer share is the remainder.
    pub contributor_split: Decimal,
    /// Shards for the wallet and vote actor registries.
    pub num_shards: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_threshold: dec!(60),
            quorum: 1,
            contributor_split: dec!(70),
            num_shards: 16,
        }
    }
}

impl EngineConfig {
    /// Split a funding total into (contributor, maintainer) shares.
    /// The maintainer share is computed by subtraction so the two always
    /// sum to exactly `total`.
    pub fn shares(&self, total: Decimal) -> (Decimal, Decimal) {
        let contributor = total * self.contributor_split / dec!(100);
        (contributor, total - contributor)
    }
}
