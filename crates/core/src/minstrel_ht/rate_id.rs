use std::fmt;

use serde::Serialize;

use super::config::{MAX_GROUP_RATES, N_GROUPS};

/// Identifies one rate of the HT rate space: a modulation index inside a group.
///
/// Encoded as `group * MAX_GROUP_RATES + rate`, so the two halves can always be
/// recovered with integer division and remainder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RateId(u32);

impl RateId {
    pub fn new(group: usize, rate: usize) -> Self {
        debug_assert!(group < N_GROUPS, "group {group} out of range");
        debug_assert!(rate < MAX_GROUP_RATES, "rate {rate} out of range");
        RateId((group * MAX_GROUP_RATES + rate) as u32)
    }

    pub fn from_index(index: u32) -> Self {
        RateId(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn group(&self) -> usize {
        self.0 as usize / MAX_GROUP_RATES
    }

    pub fn rate(&self) -> usize {
        self.0 as usize % MAX_GROUP_RATES
    }
}

impl fmt::Display for RateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group(), self.rate())
    }
}
