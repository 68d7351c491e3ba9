//! Weekly match generation: profiles -> scores -> preferences -> solver -> ledger

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::time::Instant;

use crate::repository::matches::{self, WeeklyWrite};
use crate::repository::profiles;
use crate::services::matching::{self, MatchPair, MatchingContext, SkippedProfile, SolveStats};

/// Summary of one batch run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub week: NaiveDate,
    pub participants: usize,
    pub skipped: Vec<SkippedProfile>,
    pub pairs: Vec<MatchPair>,
    pub candidate_pairs: usize,
    /// Rows committed to the ledger (0 on a dry run)
    pub written: usize,
    /// Earlier user-initiated rows turned into server-generated ones
    pub promoted: usize,
    pub stats: SolveStats,
    pub blocking_pairs: usize,
}

/// Run the batch for `week`.
///
/// The solver runs on a blocking thread since it is O(n²) in the number of
/// active users. With `dry_run` the pairs are computed but nothing is written.
pub async fn generate_weekly_matches(
    pool: &SqlitePool,
    context: &MatchingContext,
    week: NaiveDate,
    dry_run: bool,
) -> Result<GenerationReport> {
    let start = Instant::now();
    let profiles = profiles::load_active_profiles(pool).await?;

    let solver_context = context.clone();
    let results = tokio::task::spawn_blocking(move || {
        matching::compute_all_matches(profiles, &solver_context)
    })
    .await
    .context("Matching task panicked")?;

    log::info!(
        "Computed {} pairs for {} users ({} skipped) in {:?}",
        results.pairs.len(),
        results.participants,
        results.skipped.len(),
        start.elapsed()
    );

    let write = if dry_run {
        log::info!("Dry run: not writing matches for week {}", week);
        WeeklyWrite::default()
    } else {
        let write = matches::insert_weekly_matches(pool, week, &results.pairs)
            .await
            .with_context(|| format!("Failed to persist matches for week {}", week))?;
        log::info!("Wrote {} matches for week {}", write.written, week);
        write
    };

    Ok(GenerationReport {
        week,
        participants: results.participants,
        skipped: results.skipped,
        pairs: results.pairs,
        candidate_pairs: results.candidate_pairs,
        written: write.written,
        promoted: write.promoted,
        stats: results.stats,
        blocking_pairs: results.blocking_pairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::matches::list_week;
    use crate::repository::test_support::{insert_user, memory_pool, sunday};
    use crate::services::interest::{InterestEvent, apply_interest};

    const MALE: i64 = 0b01;
    const FEMALE: i64 = 0b10;

    #[tokio::test]
    async fn test_generate_full_connectivity() {
        let pool = memory_pool().await;
        for (email, value) in [("a@x.edu", 0), ("b@x.edu", 1), ("c@x.edu", 3), ("d@x.edu", 5)] {
            insert_user(&pool, email, MALE | FEMALE, MALE | FEMALE, Some([Some(value); 12])).await;
        }

        let report = generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
            .await
            .unwrap();
        assert_eq!(report.participants, 4);
        assert_eq!(report.written, 6);

        let rows = list_week(&pool, sunday()).await.unwrap();
        assert_eq!(rows.len(), 6);
        for email in ["a@x.edu", "b@x.edu", "c@x.edu", "d@x.edu"] {
            assert_eq!(rows.iter().filter(|r| r.involves(email)).count(), 3);
        }
        assert!(rows.iter().all(|r| r.server_generated && r.user1 < r.user2));
    }

    #[tokio::test]
    async fn test_generate_respects_gender_preferences() {
        let pool = memory_pool().await;
        insert_user(&pool, "m1@x.edu", MALE, FEMALE, Some([Some(2); 12])).await;
        insert_user(&pool, "m2@x.edu", MALE, FEMALE, Some([Some(2); 12])).await;
        insert_user(&pool, "f1@x.edu", FEMALE, MALE, Some([Some(4); 12])).await;
        insert_user(&pool, "f2@x.edu", FEMALE, FEMALE, Some([Some(2); 12])).await;

        let report = generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
            .await
            .unwrap();

        // Only m1-f1 and m2-f1 are mutually compatible
        assert_eq!(report.candidate_pairs, 2);
        assert_eq!(
            report.pairs,
            vec![
                MatchPair::new("f1@x.edu", "m1@x.edu").unwrap(),
                MatchPair::new("f1@x.edu", "m2@x.edu").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_dry_run_writes_nothing() {
        let pool = memory_pool().await;
        insert_user(&pool, "a@x.edu", 1, 1, Some([Some(1); 12])).await;
        insert_user(&pool, "b@x.edu", 1, 1, Some([Some(2); 12])).await;
        insert_user(&pool, "c@x.edu", 1, 1, None).await;

        let report = generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), true)
            .await
            .unwrap();
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.written, 0);
        assert!(list_week(&pool, sunday()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_twice_same_week_fails_cleanly() {
        let pool = memory_pool().await;
        insert_user(&pool, "a@x.edu", 1, 1, Some([Some(1); 12])).await;
        insert_user(&pool, "b@x.edu", 1, 1, Some([Some(2); 12])).await;

        generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
            .await
            .unwrap();
        assert!(
            generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
                .await
                .is_err()
        );
        assert_eq!(list_week(&pool, sunday()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_after_early_interest_keeps_flags() {
        let pool = memory_pool().await;
        insert_user(&pool, "a@x.edu", 1, 1, Some([Some(1); 12])).await;
        insert_user(&pool, "b@x.edu", 1, 1, Some([Some(2); 12])).await;
        insert_user(&pool, "c@x.edu", 1, 1, Some([Some(3); 12])).await;
        insert_user(&pool, "d@x.edu", 1, 1, Some([Some(4); 12])).await;

        // a pursues b before the week's batch has run
        let early = InterestEvent {
            source: "a@x.edu".to_string(),
            target: "b@x.edu".to_string(),
            week: sunday(),
            wants_match: true,
        };
        apply_interest(&pool, &early).await.unwrap();

        let report = generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
            .await
            .unwrap();
        assert_eq!(report.written, 6);
        assert_eq!(report.promoted, 1);

        let rows = list_week(&pool, sunday()).await.unwrap();
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.server_generated));
        let ab = rows.iter().find(|r| r.pairs("a@x.edu", "b@x.edu")).unwrap();
        assert_eq!(ab.interest_of("a@x.edu"), Some(true));
    }

    #[tokio::test]
    async fn test_generate_empty_population() {
        let pool = memory_pool().await;
        let report = generate_weekly_matches(&pool, &MatchingContext::default(), sunday(), false)
            .await
            .unwrap();
        assert_eq!(report.participants, 0);
        assert_eq!(report.written, 0);
    }
}
