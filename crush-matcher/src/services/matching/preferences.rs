//! Per-user ranked candidate lists

use super::scoring::DistanceMatrix;

/// Preference lists for every user in a batch, plus the inverse rank lookup.
///
/// `rank(i, j)` is the position of `j` in `i`'s list; lower is more preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceLists {
    lists: Vec<Vec<usize>>,
    /// Flat n×n rank table; `usize::MAX` marks "not on the list"
    ranks: Vec<usize>,
}

impl PreferenceLists {
    /// Build ascending-distance lists. Ties keep enumeration order, so the
    /// same input always produces the same lists.
    pub fn build(distances: &DistanceMatrix) -> Self {
        let n = distances.len();
        let mut lists = Vec::with_capacity(n);
        let mut ranks = vec![usize::MAX; n * n];

        for i in 0..n {
            let mut candidates: Vec<usize> =
                (0..n).filter(|&j| distances.is_feasible(i, j)).collect();
            // sort_by_key is stable
            candidates.sort_by_key(|&j| distances.distance(i, j));

            for (pos, &j) in candidates.iter().enumerate() {
                ranks[i * n + j] = pos;
            }
            lists.push(candidates);
        }

        Self { lists, ranks }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Ranked candidates for user `i`
    pub fn list(&self, i: usize) -> &[usize] {
        &self.lists[i]
    }

    /// Position of `j` in `i`'s list, `None` if `j` is not a candidate
    pub fn rank(&self, i: usize, j: usize) -> Option<usize> {
        match self.ranks[i * self.lists.len() + j] {
            usize::MAX => None,
            pos => Some(pos),
        }
    }

    /// Whether `i` strictly prefers `a` over `b`
    pub fn prefers(&self, i: usize, a: usize, b: usize) -> bool {
        match (self.rank(i, a), self.rank(i, b)) {
            (Some(ra), Some(rb)) => ra < rb,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::models::{ANSWER_COUNT, AnswerWeights, UserProfile};

    fn all_compatible(answers: &[i64]) -> Vec<UserProfile> {
        answers
            .iter()
            .enumerate()
            .map(|(idx, &a)| UserProfile::answered(format!("u{}", idx), 1, 1, [a; ANSWER_COUNT]))
            .collect()
    }

    fn prefs_for(profiles: &[UserProfile]) -> PreferenceLists {
        PreferenceLists::build(&DistanceMatrix::build(profiles, &AnswerWeights::default()))
    }

    #[test]
    fn test_lists_sorted_by_distance() {
        let profiles = all_compatible(&[0, 5, 1, 3]);
        let prefs = prefs_for(&profiles);

        assert_eq!(prefs.list(0), &[2, 3, 1]);
        assert_eq!(prefs.list(1), &[3, 2, 0]);
        assert_eq!(prefs.rank(0, 2), Some(0));
        assert_eq!(prefs.rank(0, 1), Some(2));
        assert_eq!(prefs.rank(0, 0), None);
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        // u0 is equidistant from everybody else
        let profiles = all_compatible(&[2, 1, 3, 1, 3]);
        let prefs = prefs_for(&profiles);
        assert_eq!(prefs.list(0), &[1, 2, 3, 4]);

        let again = prefs_for(&profiles);
        assert_eq!(prefs, again);
    }

    #[test]
    fn test_ranks_unique_within_list() {
        let profiles = all_compatible(&[0, 0, 0, 0, 0, 0]);
        let prefs = prefs_for(&profiles);

        for i in 0..prefs.len() {
            let mut seen: Vec<usize> =
                prefs.list(i).iter().filter_map(|&j| prefs.rank(i, j)).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..prefs.list(i).len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_prefers() {
        let profiles = all_compatible(&[0, 1, 4]);
        let prefs = prefs_for(&profiles);
        assert!(prefs.prefers(0, 1, 2));
        assert!(!prefs.prefers(0, 2, 1));
        assert!(prefs.prefers(0, 1, 0));
    }
}
