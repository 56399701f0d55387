//! Counts manual relabels and decides when the model should be retrained.

/// Successful manual label updates between two retraining requests.
pub const RETRAIN_THRESHOLD: u32 = 10;

/// Counter in `[0, RETRAIN_THRESHOLD)`.
#[derive(Debug, Default, Clone)]
pub struct EditTrigger {
    count: u32,
}

impl EditTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Record one successful edit. Returns `true` when the threshold was
    /// reached, in which case the counter is back at zero.
    pub fn record(&mut self) -> bool {
        self.count += 1;
        if self.count >= RETRAIN_THRESHOLD {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_every_tenth_edit() {
        let mut trigger = EditTrigger::new();
        let fired: Vec<u32> = (1..=30).filter(|_| trigger.record()).collect();
        assert_eq!(fired, vec![10, 20, 30]);
        assert_eq!(trigger.count(), 0);
    }

    #[test]
    fn count_stays_below_threshold() {
        let mut trigger = EditTrigger::new();
        for _ in 0..9 {
            assert!(!trigger.record());
        }
        assert_eq!(trigger.count(), 9);
        assert!(trigger.record());
        assert_eq!(trigger.count(), 0);
    }
}
