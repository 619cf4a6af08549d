//! Definition of `Dataset`, a named, immutable set of artifacts with unique
//! ids, and the pure data transforms (splitting, label-balanced splitting,
//! repeat-to-balance) the source domain expects it to support.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use rand::seq::SliceRandom;

use crate::{Artifact, ArtifactId};

/// Errors raised by `Dataset` construction or its transforms. These are all
/// `ConfigInvalid`-class: they happen before any worker starts.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Two artifacts in the same dataset share an id.
    #[error("duplicate artifact id {id} in dataset '{dataset}'")]
    DuplicateArtifactId {
        /// The dataset name.
        dataset: String,
        /// The duplicated id.
        id: ArtifactId,
    },

    /// A split was requested on an empty dataset.
    #[error("dataset '{dataset}' is empty")]
    EmptyDataset {
        /// The dataset name.
        dataset: String,
    },

    /// The split percentages do not sum to 100.
    #[error("split percentages must sum to 100, got {sum}")]
    PercentagesInvalid {
        /// The observed sum.
        sum: u32,
    },
}

/// A named, immutable set of [`Artifact`]s with unique ids.
#[derive(Debug, Clone)]
pub struct Dataset<R> {
    name: String,
    artifacts: Vec<Artifact<R>>,
}

impl<R> Dataset<R> {
    /// Creates a new dataset, failing if two artifacts share an id.
    pub fn new(name: impl Into<String>, artifacts: Vec<Artifact<R>>) -> Result<Self, Error> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(artifacts.len());
        for artifact in &artifacts {
            if !seen.insert(artifact.id()) {
                return Err(Error::DuplicateArtifactId {
                    dataset: name,
                    id: artifact.id(),
                });
            }
        }
        Ok(Self { name, artifacts })
    }

    /// Returns the name of this dataset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of artifacts in this dataset.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if this dataset has no artifacts.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Returns the ids of every artifact in this dataset.
    pub fn ids(&self) -> Vec<ArtifactId> {
        self.artifacts.iter().map(Artifact::id).collect()
    }

    /// Returns the artifact with the given id, if present.
    pub fn get(&self, id: ArtifactId) -> Option<&Artifact<R>> {
        self.artifacts.iter().find(|artifact| artifact.id() == id)
    }

    /// Iterates over the artifacts of this dataset.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact<R>> {
        self.artifacts.iter()
    }

    /// Splits this dataset into partitions sized by `percentages` (which
    /// must sum to 100). Partitions are pairwise disjoint and their union is
    /// the whole dataset: the last partition absorbs whatever rounding left
    /// over, so no artifact is ever silently dropped.
    pub fn splits_from(&self, percentages: &[u32]) -> Result<Vec<Dataset<R>>, Error>
    where
        R: Clone,
    {
        validate_percentages(percentages)?;

        let mut shuffled: Vec<&Artifact<R>> = self.artifacts.iter().collect();
        shuffled.shuffle(&mut rand::thread_rng());

        let slices = proportional_slices(shuffled.len(), percentages);
        let mut partitions = Vec::with_capacity(percentages.len());
        let mut cursor = 0;
        for size in slices {
            let chunk = shuffled[cursor..cursor + size].iter().map(|a| (*a).clone()).collect();
            partitions.push(Dataset::new(self.name.clone(), chunk)?);
            cursor += size;
        }
        Ok(partitions)
    }

    /// Splits this dataset the same way as [`Dataset::splits_from`], except
    /// every partition gets (as close as rounding allows) the same share of
    /// each label, per `label_of`.
    pub fn labelbalanced_splits_from<L>(
        &self,
        percentages: &[u32],
        label_of: impl Fn(&R) -> L,
    ) -> Result<Vec<Dataset<R>>, Error>
    where
        R: Clone,
        L: Eq + Hash,
    {
        validate_percentages(percentages)?;

        let mut by_label: HashMap<L, Vec<&Artifact<R>>> = HashMap::new();
        for artifact in &self.artifacts {
            by_label.entry(label_of(&artifact.record)).or_default().push(artifact);
        }

        let mut partitions: Vec<Vec<Artifact<R>>> = vec![Vec::new(); percentages.len()];
        for mut bucket in by_label.into_values() {
            bucket.shuffle(&mut rand::thread_rng());
            let slices = proportional_slices(bucket.len(), percentages);
            let mut cursor = 0;
            for (partition, size) in partitions.iter_mut().zip(slices) {
                partition.extend(bucket[cursor..cursor + size].iter().map(|a| (*a).clone()));
                cursor += size;
            }
        }

        partitions
            .into_iter()
            .map(|artifacts| Dataset::new(self.name.clone(), artifacts))
            .collect()
    }

    /// Repeats artifacts so that every label has the same count: either
    /// `newlen_each_class`, or (when unset) the least common multiple of the
    /// observed per-label frequencies. Repeated copies get a fresh id
    /// derived from the copy index and the original id, so the result
    /// remains a valid (unique-id) dataset.
    pub fn balance_by_repeat<L>(&self, label_of: impl Fn(&R) -> L, newlen_each_class: Option<usize>) -> Result<Dataset<R>, Error>
    where
        R: Clone,
        L: Eq + Hash,
    {
        if self.is_empty() {
            return Err(Error::EmptyDataset {
                dataset: self.name.clone(),
            });
        }

        let mut by_label: HashMap<L, Vec<&Artifact<R>>> = HashMap::new();
        for artifact in &self.artifacts {
            by_label.entry(label_of(&artifact.record)).or_default().push(artifact);
        }

        let target = match newlen_each_class {
            Some(n) => n,
            None => {
                let freqs: HashSet<usize> = by_label.values().map(Vec::len).collect();
                lcm_of(freqs.into_iter())
            }
        };

        let max_id = self.artifacts.iter().map(|a| a.id().0).max().unwrap_or(0);
        let id_offset = 10u64.pow(digit_count(max_id));

        let mut repeated = Vec::with_capacity(target * by_label.len());
        for bucket in by_label.into_values() {
            let freq = bucket.len();
            let repeat_count = target / freq;
            for copy_index in 0..repeat_count {
                for artifact in &bucket {
                    let new_id = ArtifactId((copy_index as u64) * id_offset + artifact.id().0);
                    repeated.push(Artifact::new(new_id, artifact.record.clone()));
                }
            }
        }

        Dataset::new(self.name.clone(), repeated)
    }
}

fn validate_percentages(percentages: &[u32]) -> Result<(), Error> {
    let sum: u32 = percentages.iter().sum();
    if sum != 100 {
        return Err(Error::PercentagesInvalid { sum });
    }
    Ok(())
}

/// Computes, for each percentage, how many of `total` items that partition
/// gets. The last partition always absorbs whatever rounding left over, so
/// `sum(slices) == total` always holds.
fn proportional_slices(total: usize, percentages: &[u32]) -> Vec<usize> {
    let mut slices = Vec::with_capacity(percentages.len());
    let mut picked = 0;
    for (idx, &percentage) in percentages.iter().enumerate() {
        let size = if idx == percentages.len() - 1 {
            total - picked
        } else {
            let size = (percentage as usize * total) / 100;
            picked += size;
            size
        };
        slices.push(size);
    }
    slices
}

fn digit_count(value: u64) -> u32 {
    value.to_string().len() as u32
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm_of(mut values: impl Iterator<Item = usize>) -> usize {
    let first = values.next().unwrap_or(0);
    values.fold(first, |acc, value| acc * value / gcd(acc, value))
}

#[cfg(test)]
mod test {
    use super::*;

    fn ds(ids: &[u64]) -> Dataset<()> {
        Dataset::new(
            "test",
            ids.iter().map(|&id| Artifact::new(ArtifactId(id), ())).collect(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_ids() {
        let artifacts = vec![Artifact::new(ArtifactId(1), ()), Artifact::new(ArtifactId(1), ())];
        assert!(matches!(
            Dataset::new("dup", artifacts),
            Err(Error::DuplicateArtifactId { .. })
        ));
    }

    #[test]
    fn splits_cover_and_partition_the_dataset() {
        let dataset = ds(&(0..10).collect::<Vec<_>>());
        let splits = dataset.splits_from(&[60, 20, 20]).unwrap();

        let total: usize = splits.iter().map(Dataset::len).sum();
        assert_eq!(total, dataset.len());

        let mut seen = HashSet::new();
        for split in &splits {
            for id in split.ids() {
                assert!(seen.insert(id), "id {id} appeared in more than one split");
            }
        }
        assert_eq!(seen, dataset.ids().into_iter().collect());
    }

    #[test]
    fn rejects_percentages_not_summing_to_100() {
        let dataset = ds(&[0, 1, 2]);
        assert!(matches!(
            dataset.splits_from(&[50, 40]),
            Err(Error::PercentagesInvalid { sum: 90 })
        ));
    }

    #[test]
    fn balance_by_repeat_equalizes_label_counts() {
        let artifacts = vec![
            Artifact::new(ArtifactId(1), "A"),
            Artifact::new(ArtifactId(2), "A"),
            Artifact::new(ArtifactId(3), "A"),
            Artifact::new(ArtifactId(4), "B"),
        ];
        let dataset = Dataset::new("ds", artifacts).unwrap();
        let balanced = dataset.balance_by_repeat(|label| *label, None).unwrap();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for artifact in balanced.iter() {
            *counts.entry(artifact.record).or_default() += 1;
        }
        assert_eq!(counts["A"], counts["B"]);
    }
}
