//! Adaptive pacing

use std::time::Duration;

/// Rest periods applied between messages to stay under relay rate limits.
///
/// Before each attempt the cumulative attempted count is checked against
/// every tier; when it is a positive multiple of a tier's period the
/// dispatcher rests for that tier's length. The longest matching rest wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    tiers: Vec<(usize, u32)>,
    unit: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(vec![(260, 50), (130, 30), (10, 10)], Duration::from_secs(1))
    }
}

impl PacingPolicy {
    /// Create a policy from `(period, rest units)` tiers
    pub fn new(tiers: Vec<(usize, u32)>, unit: Duration) -> Self {
        Self { tiers, unit }
    }

    /// A policy that never rests
    pub fn none() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    /// How long to rest before the next attempt, given how many messages
    /// have been attempted so far
    pub fn rest_after(&self, attempted: usize) -> Option<Duration> {
        if attempted == 0 {
            return None;
        }

        self.tiers
            .iter()
            .filter(|(period, _)| *period > 0 && attempted % period == 0)
            .map(|(_, units)| self.unit * *units)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rest_before_first_message() {
        assert_eq!(PacingPolicy::default().rest_after(0), None);
    }

    #[test]
    fn test_largest_tier_wins() {
        let policy = PacingPolicy::default();

        assert_eq!(policy.rest_after(10), Some(Duration::from_secs(10)));
        assert_eq!(policy.rest_after(130), Some(Duration::from_secs(30)));
        assert_eq!(policy.rest_after(260), Some(Duration::from_secs(50)));
        assert_eq!(policy.rest_after(11), None);
    }

    #[test]
    fn test_rests_over_300_messages() {
        let policy = PacingPolicy::default();

        let rests: Vec<_> = (1..=300)
            .filter_map(|attempted| policy.rest_after(attempted).map(|rest| (attempted, rest.as_secs())))
            .collect();

        let thirty: Vec<_> = rests.iter().filter(|(_, s)| *s == 30).map(|(n, _)| *n).collect();
        let fifty: Vec<_> = rests.iter().filter(|(_, s)| *s == 50).map(|(n, _)| *n).collect();

        assert_eq!(rests.len(), 30);
        assert!(rests.iter().all(|(n, _)| n % 10 == 0));
        assert_eq!(thirty, vec![130]);
        assert_eq!(fifty, vec![260]);
        assert_eq!(rests.iter().map(|(_, s)| s).sum::<u64>(), 10 * 28 + 30 + 50);
    }
}
