//! Grouping helpers shared by the report services.

use crate::{Breakdown, DECIMALS};
use std::collections::HashMap;
use std::hash::Hash;
use storefront_insights_core::coerce::{count_f64, percentage};

/// Accumulators keyed by group, iterated in first-seen order.
///
/// Ranking a tally with [`rank_desc`] therefore breaks ties by the order in
/// which groups first appeared in the input rows.
#[derive(Debug)]
pub(crate) struct Tally<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<(K, V)>,
}

impl<K: Eq + Hash + Clone, V: Default> Tally<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// The accumulator for `key`, created on first use.
    pub(crate) fn entry(&mut self, key: K) -> &mut V {
        let slot = match self.index.get(&key) {
            Some(slot) => *slot,
            None => {
                self.entries.push((key.clone(), V::default()));
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            },
        };
        &mut self.entries[slot].1
    }

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|slot| &self.entries[*slot].1)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn into_vec(self) -> Vec<(K, V)> {
        self.entries
    }
}

impl<K: Eq + Hash + Clone, V: Default> Default for Tally<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable descending sort by `key`, then keep the first `limit` rows.
pub(crate) fn rank_desc<T>(rows: &mut Vec<T>, limit: usize, key: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| key(b).total_cmp(&key(a)));
    rows.truncate(limit);
}

/// Shares of a label tally, largest first.
pub(crate) fn breakdown(tally: Tally<String, u64>) -> Vec<Breakdown> {
    let total: u64 = tally.entries.iter().map(|(_, count)| count).sum();
    let mut rows: Vec<Breakdown> = tally
        .into_vec()
        .into_iter()
        .map(|(name, count)| Breakdown {
            name,
            count,
            percentage: percentage(count_f64(count), count_f64(total), DECIMALS),
        })
        .collect();
    rank_desc(&mut rows, usize::MAX, |row| count_f64(row.count));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_keeps_first_seen_order() {
        let mut tally: Tally<&str, u64> = Tally::new();
        for key in ["b", "a", "b", "c", "a"] {
            *tally.entry(key) += 1;
        }
        assert_eq!(tally.len(), 3);
        assert_eq!(tally.get(&"a"), Some(&2));
        assert_eq!(tally.into_vec(), vec![("b", 2), ("a", 2), ("c", 1)]);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut rows = vec![("x", 1.0), ("y", 3.0), ("z", 1.0), ("w", 3.0)];
        rank_desc(&mut rows, 3, |r| r.1);
        assert_eq!(rows, vec![("y", 3.0), ("w", 3.0), ("x", 1.0)]);
    }

    #[test]
    fn breakdown_shares_sum_to_total() {
        let mut tally: Tally<String, u64> = Tally::new();
        *tally.entry("Mobile".to_string()) += 1;
        *tally.entry("Desktop".to_string()) += 3;

        let rows = breakdown(tally);
        assert_eq!(rows[0].name, "Desktop");
        assert!((rows[0].percentage - 75.0).abs() < f64::EPSILON);
        assert!((rows[1].percentage - 25.0).abs() < f64::EPSILON);
    }
}
