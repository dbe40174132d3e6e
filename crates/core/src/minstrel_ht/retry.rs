//! Multi-rate retry chain.
//!
//! A frame that keeps failing walks down an ordered list of tiers. Each tier
//! names a rate and how many attempts it gets; the thresholds are cumulative,
//! so with budgets (2, 3, 4) the first tier covers long retry counts 0-1, the
//! second 2-4 and the third 5-8.
//!
//! | Situation    | Tier 1      | Tier 2        | Tier 3           |
//! |--------------|-------------|---------------|------------------|
//! | Normal       | best tp     | second tp     | best probability |
//! | Sampling     | sample rate | best tp       | best probability |

/// One step of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTier<R> {
    pub rate: R,
    /// Attempts granted to this tier (the rate's adjusted retry count).
    pub budget: u32,
}

impl<R> RetryTier<R> {
    pub fn new(rate: R, budget: u32) -> Self {
        Self { rate, budget }
    }
}

/// Ordered fallback tiers for the frame currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryChain<R> {
    tiers: [RetryTier<R>; 3],
}

impl<R: Copy> RetryChain<R> {
    pub fn new(tiers: [RetryTier<R>; 3]) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[RetryTier<R>; 3] {
        &self.tiers
    }

    /// Attempts the whole chain grants one frame.
    pub fn total_budget(&self) -> u32 {
        self.tiers.iter().map(|t| t.budget).sum()
    }

    /// Rate for the attempt made after `long_retry` failures, or `None` once
    /// the chain is exhausted.
    pub fn rate_for(&self, long_retry: u32) -> Option<R> {
        let mut threshold = 0;
        for tier in &self.tiers {
            threshold += tier.budget;
            if long_retry < threshold {
                return Some(tier.rate);
            }
        }
        None
    }

    /// Whether another attempt of the current frame is permitted.
    pub fn allows_retransmission(&self, long_retry: u32) -> bool {
        long_retry < self.total_budget()
    }
}
