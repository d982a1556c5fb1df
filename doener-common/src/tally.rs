//! Attribute tallies and majority resolution
//!
//! A [`Tally`] counts attribute values over an ordered review set and keeps
//! the values in first-seen order. Plurality resolution walks that order, so
//! ties go to the value that appeared first. Boolean attributes use a strict
//! majority instead: more than half of all reviews.

/// Occurrence counts of attribute values, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally<K> {
    entries: Vec<(K, usize)>,
}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Tally { entries: Vec::new() }
    }
}

impl<K: PartialEq> Tally<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `value`
    pub fn record(&mut self, value: K) {
        match self.entries.iter_mut().find(|(k, _)| *k == value) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((value, 1)),
        }
    }

    /// Occurrences of `value` (0 when never seen)
    pub fn count(&self, value: &K) -> usize {
        self.entries
            .iter()
            .find(|(k, _)| k == value)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Values with their counts, in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.entries.iter().map(|(k, count)| (k, *count))
    }

    /// Plurality value; the first-seen value wins a tie
    ///
    /// Returns `None` for an empty tally.
    pub fn most_common(&self) -> Option<&K> {
        let mut best: Option<(&K, usize)> = None;
        for (value, count) in self.iter() {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }
        best.map(|(value, _)| value)
    }
}

impl<K: PartialEq> FromIterator<K> for Tally<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for value in iter {
            tally.record(value);
        }
        tally
    }
}

/// Tally a categorical attribute; items where `select` yields `None` are skipped
pub fn tally_by<T, K, F>(items: &[T], select: F) -> Tally<K>
where
    K: PartialEq,
    F: Fn(&T) -> Option<K>,
{
    items.iter().filter_map(select).collect()
}

/// Count items for which a boolean attribute is true
pub fn count_true<T, F>(items: &[T], flag: F) -> usize
where
    F: Fn(&T) -> bool,
{
    items.iter().filter(|item| flag(*item)).count()
}

/// Strict majority: `count` exceeds half of `total`
///
/// Exactly half is not a majority, and nothing is a majority of zero.
pub fn is_majority(count: usize, total: usize) -> bool {
    count * 2 > total
}

/// True when more than half of `items` have the flag set
pub fn majority_flag<T, F>(items: &[T], flag: F) -> bool
where
    F: Fn(&T) -> bool,
{
    is_majority(count_true(items, flag), items.len())
}
