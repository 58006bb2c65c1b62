//! Leave-one-out few-shot splits for offline evaluation.

use crate::formatter::Example;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::Serialize;

/// Default number of shots per split.
pub const DEFAULT_SHOTS: usize = 4;

/// Default sampling seed.
pub const DEFAULT_SEED: u64 = 42;

/// One evaluation case: a query built from a held-out record and the shots
/// sampled from the remaining records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split {
    /// The held-out record restricted to the query fields.
    pub query: Example,
    /// Other records, in sampled order.
    pub shots: Vec<Example>,
}

/// Deterministic leave-one-out splitter over a list of records.
///
/// For every record, in order, yields that record's query fields as the
/// query and a seeded random sample of up to `shots` other records. Each
/// call to [`iter`](Self::iter) restarts from the seed, so iterating twice
/// gives the same splits.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shotmaker_core::{Example, FewShotSplits};
///
/// let records: Vec<Example> = (0..5)
///     .map(|i| json!({"q": format!("q{i}"), "a": format!("a{i}")}))
///     .map(|v| v.as_object().unwrap().clone())
///     .collect();
///
/// let splits = FewShotSplits::new(records, ["q"], 2, 7);
/// for (i, split) in splits.iter().enumerate() {
///     assert_eq!(split.query["q"], format!("q{i}"));
///     assert_eq!(split.shots.len(), 2);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FewShotSplits {
    records: Vec<Example>,
    query_fields: Vec<String>,
    shots: usize,
    seed: u64,
}

impl FewShotSplits {
    /// Creates a splitter.
    ///
    /// # Arguments
    ///
    /// * `records` - Complete examples to split.
    /// * `query_fields` - Fields copied into each query, in this order.
    /// * `shots` - Maximum number of shots per split.
    /// * `seed` - Sampling seed.
    pub fn new<I, S>(records: Vec<Example>, query_fields: I, shots: usize, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records,
            query_fields: query_fields.into_iter().map(Into::into).collect(),
            shots,
            seed,
        }
    }

    /// Number of splits, one per record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates the splits from the start of the seeded sequence.
    pub fn iter(&self) -> Splits<'_> {
        Splits {
            source: self,
            index: 0,
            rng: StdRng::seed_from_u64(self.seed),
        }
    }

    fn query_for(&self, record: &Example) -> Example {
        self.query_fields
            .iter()
            .filter_map(|field| Some((field.clone(), record.get(field)?.clone())))
            .collect()
    }
}

impl<'a> IntoIterator for &'a FewShotSplits {
    type Item = Split;
    type IntoIter = Splits<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the splits of a [`FewShotSplits`].
#[derive(Debug)]
pub struct Splits<'a> {
    source: &'a FewShotSplits,
    index: usize,
    rng: StdRng,
}

impl Iterator for Splits<'_> {
    type Item = Split;

    fn next(&mut self) -> Option<Split> {
        let records = &self.source.records;
        let held_out = self.index;
        let record = records.get(held_out)?;
        self.index += 1;

        let others = records.len() - 1;
        let amount = self.source.shots.min(others);
        let shots = index::sample(&mut self.rng, others, amount)
            .into_iter()
            // Skip over the held-out position.
            .map(|i| if i < held_out { i } else { i + 1 })
            .map(|i| records[i].clone())
            .collect();

        Some(Split {
            query: self.source.query_for(record),
            shots,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.source.records.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Splits<'_> {}
