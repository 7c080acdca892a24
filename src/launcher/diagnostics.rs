/// Named counter of failed raise-to-front attempts.
///
/// Hits accumulate until [`commit`](Self::commit) hands them to the periodic
/// reporter. [`count`](Self::count) never goes down between commits.
#[derive(Debug, Clone)]
pub struct RaiseFailureCounter {
    name: String,
    hits: u64,
    total: u64,
}

impl RaiseFailureCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), hits: 0, total: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
        self.total += 1;
    }

    /// Hits since the last commit.
    pub fn count(&self) -> u64 {
        self.hits
    }

    /// Hits over the whole process lifetime.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the hits since the last commit and starts a new period.
    pub fn commit(&mut self) -> u64 {
        let hits = self.hits;
        if hits > 0 {
            log::debug!("{}: committing {hits} hit(s)", self.name);
        }
        self.hits = 0;
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_resets_period_but_not_total() {
        let mut counter = RaiseFailureCounter::new("Launcher.RaiseToFrontFailed");
        counter.record_hit();
        counter.record_hit();
        assert_eq!(counter.count(), 2);

        assert_eq!(counter.commit(), 2);
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.commit(), 0);

        counter.record_hit();
        assert_eq!(counter.total(), 3);
    }
}
