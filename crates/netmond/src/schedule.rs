//! Which targets a sampling round covers.

/// Targets due in one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundPlan {
    pub upstream: bool,
    pub downstream: bool,
}

/// Downstream is sampled every round, upstream every `upstream_every`
/// rounds starting with the first.
#[derive(Debug, Clone)]
pub struct SampleSchedule {
    upstream_every: u32,
    round: u64,
}

impl SampleSchedule {
    pub fn new(upstream_every: u32) -> Self {
        Self {
            upstream_every: upstream_every.max(1),
            round: 0,
        }
    }

    pub fn next_round(&mut self) -> RoundPlan {
        let plan = RoundPlan {
            upstream: self.round % u64::from(self.upstream_every) == 0,
            downstream: true,
        };
        self.round += 1;
        plan
    }
}
