//! Compatibility scoring between users
//!
//! Produces a dense n×n matrix of weighted Manhattan distances over the
//! questionnaire answers. A cell is `None` when the pair is infeasible
//! (self pair or incompatible gender bitmasks).

use std::collections::HashSet;
use std::fmt;

use super::models::{ANSWER_COUNT, AnswerWeights, MissingAnswerPolicy, UserProfile};

/// Why a profile was left out of the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingAnswers(usize),
    AnswerOutOfRange,
    DuplicateIdentity,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingAnswers(n) => write!(f, "{} missing answer(s)", n),
            SkipReason::AnswerOutOfRange => write!(f, "answer outside 0..=5"),
            SkipReason::DuplicateIdentity => write!(f, "duplicate identity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProfile {
    pub email: String,
    pub reason: SkipReason,
}

/// Apply the missing-answer policy and drop malformed profiles.
/// Order of the surviving profiles is preserved.
pub fn prepare_profiles(
    profiles: Vec<UserProfile>,
    policy: MissingAnswerPolicy,
) -> (Vec<UserProfile>, Vec<SkippedProfile>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(profiles.len());
    let mut skipped = Vec::new();

    for mut profile in profiles {
        if !seen.insert(profile.email.clone()) {
            skipped.push(SkippedProfile {
                email: profile.email,
                reason: SkipReason::DuplicateIdentity,
            });
            continue;
        }

        if profile.has_out_of_range_answer() {
            skipped.push(SkippedProfile {
                email: profile.email,
                reason: SkipReason::AnswerOutOfRange,
            });
            continue;
        }

        let missing = profile.missing_answers();
        if missing > 0 {
            match policy {
                MissingAnswerPolicy::Exclude => {
                    skipped.push(SkippedProfile {
                        email: profile.email,
                        reason: SkipReason::MissingAnswers(missing),
                    });
                    continue;
                }
                MissingAnswerPolicy::ZeroFill => {
                    for answer in profile.answers.iter_mut().filter(|a| a.is_none()) {
                        *answer = Some(0);
                    }
                }
            }
        }

        kept.push(profile);
    }

    for skip in &skipped {
        log::warn!("Skipping profile {}: {}", skip.email, skip.reason);
    }

    (kept, skipped)
}

/// Weighted Manhattan distance between two answer vectors.
/// Missing answers count as 0; callers normally run `prepare_profiles` first.
pub fn answer_distance(a: &UserProfile, b: &UserProfile, weights: &AnswerWeights) -> u64 {
    (0..ANSWER_COUNT)
        .map(|k| {
            let x = a.answers[k].unwrap_or(0);
            let y = b.answers[k].unwrap_or(0);
            weights.multiplier[k] as u64 * x.abs_diff(y) + weights.additive[k] as u64
        })
        .sum()
}

/// Symmetric distance matrix over dense user indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    size: usize,
    cells: Vec<Option<u64>>,
}

impl DistanceMatrix {
    /// Score every unordered pair of `profiles`
    pub fn build(profiles: &[UserProfile], weights: &AnswerWeights) -> Self {
        let size = profiles.len();
        let mut cells = vec![None; size * size];

        for i in 0..size {
            for j in (i + 1)..size {
                if !profiles[i].is_compatible_with(&profiles[j]) {
                    continue;
                }
                let dist = answer_distance(&profiles[i], &profiles[j], weights);
                cells[i * size + j] = Some(dist);
                cells[j * size + i] = Some(dist);
            }
        }

        Self { size, cells }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance from `i` to `j`, `None` if infeasible
    pub fn distance(&self, i: usize, j: usize) -> Option<u64> {
        self.cells[i * self.size + j]
    }

    pub fn is_feasible(&self, i: usize, j: usize) -> bool {
        self.distance(i, j).is_some()
    }

    /// All feasible unordered pairs with `a < b`
    pub fn candidate_pairs(&self) -> impl Iterator<Item = CandidatePair> + '_ {
        (0..self.size).flat_map(move |a| {
            ((a + 1)..self.size).filter_map(move |b| {
                self.distance(a, b).map(|distance| CandidatePair { a, b, distance })
            })
        })
    }
}

/// A feasible unordered pair of dense indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePair {
    pub a: usize,
    pub b: usize,
    pub distance: u64,
}
