//! Categorical encoding helpers

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// Compound label used when no lap carries a compound
pub const UNKNOWN_COMPOUND: &str = "UNKNOWN";

/// Most frequent value; ties go to the value encountered first.
/// Returns `None` for an empty input.
pub fn mode<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order: Vec<T> = Vec::new();

    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut best: Option<(&T, usize)> = None;
    for value in &order {
        let count = counts[value];
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value.clone())
}

/// Maps compound labels to integer codes in sorted label order
#[derive(Debug, Clone, Default)]
pub struct CompoundEncoder {
    labels: Vec<String>,
}

impl CompoundEncoder {
    /// Fit on the labels seen in the training data
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sorted: BTreeSet<String> = labels.into_iter().map(|l| l.to_uppercase()).collect();
        CompoundEncoder {
            labels: sorted.into_iter().collect(),
        }
    }

    /// Integer code for a label, or `None` if it was not seen during fitting
    pub fn encode(&self, label: &str) -> Option<usize> {
        let label = label.to_uppercase();
        self.labels.binary_search(&label).ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.labels.get(code).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ties_take_first_encountered() {
        assert_eq!(mode(vec!["HARD", "SOFT", "SOFT", "HARD"]), Some("HARD"));
        assert_eq!(mode(vec!["MEDIUM", "HARD", "HARD"]), Some("HARD"));
    }

    #[test]
    fn test_mode_empty() {
        assert_eq!(mode(Vec::<u32>::new()), None);
    }

    #[test]
    fn test_compound_encoder_sorted() {
        let encoder = CompoundEncoder::fit(["SOFT", "hard", "MEDIUM", "HARD", UNKNOWN_COMPOUND]);

        assert_eq!(encoder.len(), 4);
        assert_eq!(encoder.encode("HARD"), Some(0));
        assert_eq!(encoder.encode("medium"), Some(1));
        assert_eq!(encoder.encode("SOFT"), Some(2));
        assert_eq!(encoder.encode(UNKNOWN_COMPOUND), Some(3));
        assert_eq!(encoder.encode("WET"), None);
        assert_eq!(encoder.decode(2), Some("SOFT"));
    }
}
