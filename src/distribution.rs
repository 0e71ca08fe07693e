//! Deterministic batch distribution across workers.

use crate::batch::Batch;

/// Strategy for assigning batches to worker slots.
pub trait DistributionStrategy {
    fn name(&self) -> &'static str;

    /// Partition `batches` into `workers` buckets. Implementations are
    /// deterministic: the same input always lands in the same buckets.
    fn distribute(&self, batches: Vec<Batch>, workers: usize) -> Vec<Vec<Batch>>;
}

/// `batch[i]` goes to `worker[i % W]`. Cheap, ignores cost skew.
pub struct RoundRobinDistribution;

impl DistributionStrategy for RoundRobinDistribution {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn distribute(&self, batches: Vec<Batch>, workers: usize) -> Vec<Vec<Batch>> {
        let workers = workers.max(1);
        let mut buckets: Vec<Vec<Batch>> = (0..workers).map(|_| Vec::new()).collect();
        for (i, batch) in batches.into_iter().enumerate() {
            buckets[i % workers].push(batch);
        }
        buckets
    }
}

/// Greedy least-loaded assignment weighted by selected-test counts.
///
/// Heaviest batches place first so expensive work spreads out instead of
/// piling onto whichever worker round-robin happened to pick. Ties break on
/// the first gremlin id, then on the lowest worker index, keeping the
/// assignment reproducible.
pub struct WeightedDistribution;

impl DistributionStrategy for WeightedDistribution {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn distribute(&self, batches: Vec<Batch>, workers: usize) -> Vec<Vec<Batch>> {
        let workers = workers.max(1);
        let mut buckets: Vec<Vec<Batch>> = (0..workers).map(|_| Vec::new()).collect();
        let mut loads = vec![0usize; workers];

        let mut ordered = batches;
        ordered.sort_by(|a, b| {
            b.weight().cmp(&a.weight()).then_with(|| {
                let a_id = a.units.first().map(|u| u.gremlin_id.as_str()).unwrap_or("");
                let b_id = b.units.first().map(|u| u.gremlin_id.as_str()).unwrap_or("");
                a_id.cmp(b_id)
            })
        });

        for batch in ordered {
            let lightest = (0..workers).min_by_key(|w| (loads[*w], *w)).unwrap_or(0);
            loads[lightest] += batch.weight();
            buckets[lightest].push(batch);
        }
        buckets
    }
}
