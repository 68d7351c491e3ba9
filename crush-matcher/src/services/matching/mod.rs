// Matching service for computing weekly partner assignments
//
// Pure business logic: profiles in, canonical pairs out. No database access
// happens here; the generator service wires it to the ledger.

pub mod models;
pub mod preferences;
pub mod scoring;
pub mod solver;

// Re-export commonly used types
pub use models::{AnswerWeights, MatchPair, MissingAnswerPolicy, UserProfile};
pub use preferences::PreferenceLists;
pub use scoring::{DistanceMatrix, SkippedProfile};
pub use solver::{MatchAssignment, SolveStats};

/// Settings consumed by the matching pipeline
#[derive(Debug, Clone)]
pub struct MatchingContext {
    pub capacity: usize,
    pub weights: AnswerWeights,
    pub missing_answers: MissingAnswerPolicy,
}

impl Default for MatchingContext {
    fn default() -> Self {
        Self {
            capacity: models::DEFAULT_CAPACITY,
            weights: AnswerWeights::default(),
            missing_answers: MissingAnswerPolicy::default(),
        }
    }
}

/// Complete matching results
#[derive(Debug, Clone)]
pub struct MatchingResults {
    pub pairs: Vec<MatchPair>,
    pub skipped: Vec<SkippedProfile>,
    pub stats: SolveStats,
    /// Mutually compatible pairs the solver could choose from
    pub candidate_pairs: usize,
    /// Unmatched feasible pairs that would both prefer each other
    pub blocking_pairs: usize,
    pub participants: usize,
}

/// Compute this period's matches for a population of profiles
/// Main orchestrator function for the matching service
pub fn compute_all_matches(
    profiles: Vec<UserProfile>,
    context: &MatchingContext,
) -> MatchingResults {
    // Drop malformed profiles first so indices stay dense
    let (profiles, skipped) = scoring::prepare_profiles(profiles, context.missing_answers);

    let distances = DistanceMatrix::build(&profiles, &context.weights);
    let candidate_pairs = distances.candidate_pairs().count();
    log::debug!(
        "{} feasible pairs among {} users",
        candidate_pairs,
        profiles.len()
    );
    let prefs = PreferenceLists::build(&distances);
    let (assignment, stats) = solver::solve(&prefs, context.capacity);

    let blocking_pairs = assignment.blocking_pairs(&prefs).len();
    if blocking_pairs > 0 {
        log::warn!(
            "Assignment leaves {} blocking pair(s) among {} users",
            blocking_pairs,
            profiles.len()
        );
    }

    let mut pairs: Vec<MatchPair> = assignment
        .pairs()
        .into_iter()
        .filter_map(|(i, j)| MatchPair::new(&profiles[i].email, &profiles[j].email))
        .collect();
    pairs.sort();

    MatchingResults {
        pairs,
        skipped,
        stats,
        candidate_pairs,
        blocking_pairs,
        participants: profiles.len(),
    }
}
