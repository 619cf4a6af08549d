//! Uniform round-robin scheduling with a cold-start bias: every artifact is
//! equally likely to be picked, except that one which has never been
//! scheduled before is picked essentially immediately.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::{cold_start_weight, Decision, EngineView, Scheduler};

/// Uniform, cold-start-biased scheduling policy.
///
/// Admission picks among waiting artifacts with probability proportional to
/// [`cold_start_weight`]; eviction prefers a sampler that has already
/// drained or terminated, falling back to the most-scheduled loaded
/// artifact when every sampler is still streaming.
///
/// Eviction preferring a drained/terminated sampler over a uniform-random
/// pick among all loaded artifacts is a deliberate deviation; see
/// `SPEC_FULL.md`'s scheduler section.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScheduler;

impl DefaultScheduler {
    /// Creates a new uniform, cold-start-biased scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl<Id> Scheduler<Id> for DefaultScheduler
where
    Id: Clone + Eq,
{
    fn initial_schedule(&self, candidates: &[Id], capacity: usize) -> Vec<Id> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let mut rng = rand::thread_rng();
        (0..capacity).map(|_| candidates[rng.gen_range(0..candidates.len())].clone()).collect()
    }

    fn schedule(&self, view: &dyn EngineView<Id>) -> Decision<Id> {
        let waiting = view.waiting();
        if waiting.is_empty() {
            return Decision::Skip;
        }

        let weights: Vec<f64> = waiting.iter().map(|id| cold_start_weight(view.sched_count(id))).collect();
        let admit = match WeightedIndex::new(&weights) {
            Ok(dist) => waiting[dist.sample(&mut rand::thread_rng())].clone(),
            Err(_) => waiting[0].clone(),
        };

        let loaded = view.loaded();
        if loaded.is_empty() {
            return Decision::Skip;
        }

        let evict = loaded
            .iter()
            .find(|id| view.status(id).is_some_and(|status| status.is_eviction_candidate()))
            .or_else(|| loaded.iter().max_by_key(|id| view.sched_count(id)))
            .cloned();

        match evict {
            Some(evict) => Decision::Reschedule { evict, admit },
            None => Decision::Skip,
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::SamplerStatus;

    struct View {
        loaded: Vec<u64>,
        waiting: Vec<u64>,
        sched_counts: HashMap<u64, u64>,
        statuses: HashMap<u64, SamplerStatus>,
    }

    impl EngineView<u64> for View {
        fn loaded(&self) -> &[u64] {
            &self.loaded
        }

        fn waiting(&self) -> &[u64] {
            &self.waiting
        }

        fn sched_count(&self, id: &u64) -> u64 {
            self.sched_counts.get(id).copied().unwrap_or(0)
        }

        fn status(&self, id: &u64) -> Option<SamplerStatus> {
            self.statuses.get(id).copied()
        }
    }

    #[test]
    fn skips_when_nothing_is_waiting() {
        let view = View {
            loaded: vec![1],
            waiting: vec![],
            sched_counts: HashMap::new(),
            statuses: HashMap::from([(1, SamplerStatus::Streaming)]),
        };
        assert_eq!(DefaultScheduler::new().schedule(&view), Decision::Skip);
    }

    #[test]
    fn prefers_evicting_a_drained_sampler() {
        let view = View {
            loaded: vec![1, 2],
            waiting: vec![3],
            sched_counts: HashMap::new(),
            statuses: HashMap::from([(1, SamplerStatus::Streaming), (2, SamplerStatus::Drained)]),
        };
        assert_eq!(
            DefaultScheduler::new().schedule(&view),
            Decision::Reschedule { evict: 2, admit: 3 }
        );
    }

    #[test]
    fn initial_schedule_never_exceeds_capacity() {
        let picked = DefaultScheduler::new().initial_schedule(&[1, 2, 3, 4, 5], 2);
        assert_eq!(picked.len(), 2);
    }
}
