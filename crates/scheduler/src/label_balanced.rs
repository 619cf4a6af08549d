//! Minority-first scheduling: keep the working set's label distribution as
//! even as possible by always admitting next from whichever label is
//! currently under-represented among loaded artifacts.

use std::collections::HashMap;
use std::hash::Hash;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::{cold_start_weight, Decision, EngineView, Scheduler};

/// Minority-first scheduling policy.
///
/// Requires a precomputed `Id -> label` map (labels are looked up once at
/// construction time rather than on every tick, since `Scheduler::schedule`
/// only has access to ids through [`EngineView`]). Ties between labels with
/// equal frequency are broken by the label's own `Ord`, mirroring how the
/// source domain breaks ties on `(frequency, label)` tuples.
#[derive(Debug, Clone)]
pub struct LabelBalancedScheduler<Id, L> {
    labels: HashMap<Id, L>,
}

impl<Id, L> LabelBalancedScheduler<Id, L>
where
    Id: Eq + Hash,
{
    /// Creates a scheduler from a precomputed `id -> label` map.
    pub fn new(labels: HashMap<Id, L>) -> Self {
        Self { labels }
    }

    fn label_of(&self, id: &Id) -> Option<&L> {
        self.labels.get(id)
    }
}

impl<Id, L> Scheduler<Id> for LabelBalancedScheduler<Id, L>
where
    Id: Clone + Eq + Hash + Send + Sync,
    L: Clone + Eq + Ord + Send + Sync,
{
    fn initial_schedule(&self, candidates: &[Id], capacity: usize) -> Vec<Id> {
        if candidates.is_empty() || capacity == 0 {
            return Vec::new();
        }

        let mut by_label: HashMap<L, Vec<Id>> = HashMap::new();
        for id in candidates {
            if let Some(label) = self.label_of(id) {
                by_label.entry(label.clone()).or_default().push(id.clone());
            }
        }

        let mut rng = rand::thread_rng();

        if by_label.is_empty() {
            return (0..capacity).map(|_| candidates[rng.gen_range(0..candidates.len())].clone()).collect();
        }

        // Distribute `capacity` equally across labels; the first
        // `capacity mod labels.len()` labels (by label order, for
        // determinism) get one extra slot.
        let mut labels: Vec<L> = by_label.keys().cloned().collect();
        labels.sort();
        let label_count = labels.len();
        let base = capacity / label_count;
        let remainder = capacity % label_count;

        let mut picked = Vec::with_capacity(capacity);
        for (index, label) in labels.iter().enumerate() {
            let budget = base + usize::from(index < remainder);
            let bucket = &by_label[label];
            if bucket.is_empty() {
                continue;
            }
            for _ in 0..budget {
                picked.push(bucket[rng.gen_range(0..bucket.len())].clone());
            }
        }
        picked
    }

    fn schedule(&self, view: &dyn EngineView<Id>) -> Decision<Id> {
        let waiting = view.waiting();
        if waiting.is_empty() {
            return Decision::Skip;
        }
        let loaded = view.loaded();
        if loaded.is_empty() {
            return Decision::Skip;
        }

        let mut label_freq: HashMap<L, u64> = HashMap::new();
        for id in loaded {
            if let Some(label) = self.label_of(id) {
                *label_freq.entry(label.clone()).or_insert(0) += 1;
            }
        }

        let admit_pool: Vec<&Id> = match minority_label(&label_freq) {
            Some(minority) => {
                let matching: Vec<&Id> = waiting.iter().filter(|id| self.label_of(id) == Some(&minority)).collect();
                if matching.is_empty() {
                    waiting.iter().collect()
                } else {
                    matching
                }
            }
            None => waiting.iter().collect(),
        };

        let weights: Vec<f64> = admit_pool.iter().map(|id| cold_start_weight(view.sched_count(id))).collect();
        let admit = match WeightedIndex::new(&weights) {
            Ok(dist) => admit_pool[dist.sample(&mut rand::thread_rng())].clone(),
            Err(_) => admit_pool[0].clone(),
        };

        let majority = majority_label(&label_freq);
        let evict = loaded
            .iter()
            .filter(|id| match &majority {
                Some(label) => self.label_of(id) == Some(label),
                None => true,
            })
            .find(|id| view.status(id).is_some_and(|status| status.is_eviction_candidate()))
            .or_else(|| loaded.iter().find(|id| view.status(id).is_some_and(|status| status.is_eviction_candidate())))
            .or_else(|| loaded.iter().max_by_key(|id| view.sched_count(id)))
            .cloned();

        match evict {
            Some(evict) => Decision::Reschedule { evict, admit },
            None => Decision::Skip,
        }
    }
}

/// The label with the lowest `(frequency, label)` tuple, i.e. the most
/// under-represented label among the inputs.
fn minority_label<L: Clone + Ord>(freq: &HashMap<L, u64>) -> Option<L> {
    freq.iter().map(|(label, count)| (*count, label.clone())).min().map(|(_, label)| label)
}

/// The label with the highest `(frequency, label)` tuple, i.e. the most
/// over-represented label among the inputs.
fn majority_label<L: Clone + Ord>(freq: &HashMap<L, u64>) -> Option<L> {
    freq.iter().map(|(label, count)| (*count, label.clone())).max().map(|(_, label)| label)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::SamplerStatus;

    struct View {
        loaded: Vec<u64>,
        waiting: Vec<u64>,
        statuses: HashMap<u64, SamplerStatus>,
    }

    impl EngineView<u64> for View {
        fn loaded(&self) -> &[u64] {
            &self.loaded
        }

        fn waiting(&self) -> &[u64] {
            &self.waiting
        }

        fn sched_count(&self, _id: &u64) -> u64 {
            0
        }

        fn status(&self, id: &u64) -> Option<SamplerStatus> {
            self.statuses.get(id).copied()
        }
    }

    #[test]
    fn admits_from_the_minority_label() {
        let labels = HashMap::from([(1, "A"), (2, "A"), (3, "B"), (4, "B")]);
        let scheduler = LabelBalancedScheduler::new(labels);
        let view = View {
            loaded: vec![1, 2],
            waiting: vec![3, 4],
            statuses: HashMap::from([(1, SamplerStatus::Drained), (2, SamplerStatus::Streaming)]),
        };

        match scheduler.schedule(&view) {
            Decision::Reschedule { admit, .. } => assert!(admit == 3 || admit == 4),
            other => panic!("expected Reschedule, got {other:?}"),
        }
    }
}
