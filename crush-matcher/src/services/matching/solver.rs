//! Capacitated deferred acceptance
//!
//! Every user both proposes and accepts. A user with free capacity proposes to
//! the next candidate on its own list; the receiver accepts while it has room,
//! otherwise it keeps the proposer only if the proposer outranks its current
//! worst partner, who is then evicted. Passes repeat until nothing changes.

use super::preferences::PreferenceLists;

/// Counters collected while solving, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub passes: usize,
    pub proposals: usize,
    pub accepted: usize,
    pub evictions: usize,
    pub rejections: usize,
}

/// Final partner sets over dense user indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAssignment {
    capacity: usize,
    partners: Vec<Vec<usize>>,
}

impl MatchAssignment {
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// Partners of `i`, sorted ascending by index
    pub fn partners(&self, i: usize) -> Vec<usize> {
        let mut p = self.partners[i].clone();
        p.sort_unstable();
        p
    }

    pub fn is_matched(&self, i: usize, j: usize) -> bool {
        self.partners[i].contains(&j)
    }

    /// Every matched edge once, as `(low, high)` index pairs in ascending order
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .partners
            .iter()
            .enumerate()
            .flat_map(|(i, ps)| ps.iter().filter(move |&&p| i < p).map(move |&p| (i, p)))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Unmatched feasible pairs that would both rather be together.
    ///
    /// A side "wants" the other when it has free capacity or when it prefers
    /// the other over its current worst partner.
    pub fn blocking_pairs(&self, prefs: &PreferenceLists) -> Vec<(usize, usize)> {
        let wants = |i: usize, j: usize| -> bool {
            self.partners[i].len() < self.capacity
                || worst_partner(prefs, i, &self.partners[i])
                    .is_some_and(|(worst, _)| prefs.prefers(i, j, worst))
        };

        let mut blocking = Vec::new();
        for i in 0..self.partners.len() {
            for &j in prefs.list(i) {
                if i < j && !self.is_matched(i, j) && wants(i, j) && wants(j, i) {
                    blocking.push((i, j));
                }
            }
        }
        blocking
    }
}

/// Partner of `user` with the highest (least preferred) rank, and that rank
fn worst_partner(
    prefs: &PreferenceLists,
    user: usize,
    partners: &[usize],
) -> Option<(usize, usize)> {
    partners
        .iter()
        .filter_map(|&p| prefs.rank(user, p).map(|r| (p, r)))
        .max_by_key(|&(_, r)| r)
}

fn unlink(partners: &mut [Vec<usize>], a: usize, b: usize) {
    if let Some(pos) = partners[a].iter().position(|&p| p == b) {
        partners[a].swap_remove(pos);
    }
    if let Some(pos) = partners[b].iter().position(|&p| p == a) {
        partners[b].swap_remove(pos);
    }
}

fn link(partners: &mut [Vec<usize>], a: usize, b: usize) {
    partners[a].push(b);
    partners[b].push(a);
}

/// Run deferred acceptance with the given per-user capacity
pub fn solve(prefs: &PreferenceLists, capacity: usize) -> (MatchAssignment, SolveStats) {
    let n = prefs.len();
    let mut next_choice = vec![0usize; n];
    let mut partners: Vec<Vec<usize>> = (0..n).map(|_| Vec::with_capacity(capacity)).collect();
    let mut stats = SolveStats::default();

    loop {
        let mut changed = false;
        stats.passes += 1;

        for proposer in 0..n {
            if partners[proposer].len() >= capacity {
                continue;
            }
            let list = prefs.list(proposer);
            let Some(&target) = list.get(next_choice[proposer]) else {
                continue;
            };
            next_choice[proposer] += 1;
            stats.proposals += 1;

            // A proposer may be offered to someone who already accepted it
            // through the other direction; that proposal is spent.
            if partners[proposer].contains(&target) {
                stats.rejections += 1;
                continue;
            }

            if partners[target].len() < capacity {
                link(&mut partners, proposer, target);
                stats.accepted += 1;
                changed = true;
                continue;
            }

            let Some(my_rank) = prefs.rank(target, proposer) else {
                stats.rejections += 1;
                continue;
            };

            match worst_partner(prefs, target, &partners[target]) {
                Some((worst, worst_rank)) if my_rank < worst_rank => {
                    unlink(&mut partners, target, worst);
                    link(&mut partners, proposer, target);
                    stats.evictions += 1;
                    stats.accepted += 1;
                    changed = true;
                }
                _ => stats.rejections += 1,
            }
        }

        if !changed {
            break;
        }
    }

    log::debug!(
        "Deferred acceptance finished: {} passes, {} proposals, {} accepted, \
         {} evictions, {} rejections",
        stats.passes,
        stats.proposals,
        stats.accepted,
        stats.evictions,
        stats.rejections
    );

    (MatchAssignment { capacity, partners }, stats)
}
