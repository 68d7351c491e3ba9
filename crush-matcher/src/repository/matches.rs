//! Match ledger repository
//!
//! Rows are keyed by the canonical pair (`user1_email < user2_email`) and the
//! week anchor. Functions taking `&mut SqliteConnection` run inside a caller's
//! transaction; pass `&mut *tx`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::services::matching::MatchPair;

/// One persisted ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub user1: String,
    pub user2: String,
    pub user1_interested: bool,
    pub user2_interested: bool,
    pub server_generated: bool,
    pub week: NaiveDate,
}

/// Which column pair a user occupies in a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    User1,
    User2,
}

impl Side {
    /// Side `email` takes in `pair`, `None` if it is not part of the pair
    pub fn of(pair: &MatchPair, email: &str) -> Option<Side> {
        if pair.user1 == email {
            Some(Side::User1)
        } else if pair.user2 == email {
            Some(Side::User2)
        } else {
            None
        }
    }
}

impl MatchRecord {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            user1: row.try_get("user1_email")?,
            user2: row.try_get("user2_email")?,
            user1_interested: row.try_get("user1_interested")?,
            user2_interested: row.try_get("user2_interested")?,
            server_generated: row.try_get("server_generated")?,
            week: row.try_get("week")?,
        })
    }

    pub fn involves(&self, email: &str) -> bool {
        self.user1 == email || self.user2 == email
    }

    /// Whether this row is the pair `{a, b}`
    pub fn pairs(&self, a: &str, b: &str) -> bool {
        (self.user1 == a && self.user2 == b) || (self.user1 == b && self.user2 == a)
    }

    /// Interest flag of `email`'s side
    #[cfg(test)]
    pub fn interest_of(&self, email: &str) -> Option<bool> {
        if self.user1 == email {
            Some(self.user1_interested)
        } else if self.user2 == email {
            Some(self.user2_interested)
        } else {
            None
        }
    }
}

const SELECT_COLUMNS: &str =
    "user1_email, user2_email, user1_interested, user2_interested, server_generated, week";

/// Number of rows for `week` with the given origin
pub async fn count_week_rows(
    conn: &mut SqliteConnection,
    week: NaiveDate,
    server_generated: bool,
) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM matches WHERE server_generated = ? AND week = ?")
            .bind(server_generated)
            .bind(week)
            .fetch_one(conn)
            .await
            .context("Failed to count matches")?;
    Ok(count)
}

/// Rows touched by one weekly write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeeklyWrite {
    /// Pairs now held as server-generated rows
    pub written: usize,
    /// Of those, user-initiated rows that already existed and were promoted
    pub promoted: usize,
}

/// Persist a solver run for `week` in one transaction.
///
/// Nothing is written unless every pair is stored. Refuses to run for a
/// week that already holds server-generated rows. A pair that already has a
/// user-initiated row for the week is promoted to server-generated, keeping
/// its interest flags.
pub async fn insert_weekly_matches(
    pool: &SqlitePool,
    week: NaiveDate,
    pairs: &[MatchPair],
) -> Result<WeeklyWrite> {
    // Dropping `tx` on any early return rolls back
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let existing = count_week_rows(&mut tx, week, true).await?;
    if existing > 0 {
        anyhow::bail!("Week {} already has {} server-generated matches", week, existing);
    }
    let user_rows_before = count_week_rows(&mut tx, week, false).await?;

    for pair in pairs {
        sqlx::query(
            r#"
            INSERT INTO matches
            (user1_email, user2_email, user1_interested, user2_interested, server_generated, week)
            VALUES (?, ?, 0, 0, 1, ?)
            ON CONFLICT (user1_email, user2_email, week) DO UPDATE SET server_generated = 1
            "#,
        )
        .bind(&pair.user1)
        .bind(&pair.user2)
        .bind(week)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert match ({}, {})", pair.user1, pair.user2))?;
    }

    let user_rows_after = count_week_rows(&mut tx, week, false).await?;
    tx.commit().await.context("Failed to commit transaction")?;

    let promoted = usize::try_from(user_rows_before - user_rows_after).unwrap_or_default();
    if promoted > 0 {
        log::info!(
            "Promoted {} user-initiated match(es) to server-generated for week {}",
            promoted,
            week
        );
    }
    Ok(WeeklyWrite {
        written: pairs.len(),
        promoted,
    })
}

/// Take the write lock over every row touching `email` in `week` and return
/// those rows.
///
/// The first statement is a write over exactly those rows, so the database
/// grants this transaction the write lock before anything is read. Any other
/// transaction reaching the same point waits until this one commits or rolls
/// back.
pub async fn lock_user_week(
    conn: &mut SqliteConnection,
    email: &str,
    week: NaiveDate,
) -> Result<Vec<MatchRecord>> {
    let locked = sqlx::query(
        "UPDATE matches SET week = week WHERE (user1_email = ? OR user2_email = ?) AND week = ?",
    )
    .bind(email)
    .bind(email)
    .bind(week)
    .execute(&mut *conn)
    .await
    .context("Locking rows failed")?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM matches \
         WHERE (user1_email = ? OR user2_email = ?) AND week = ? ORDER BY id",
        SELECT_COLUMNS
    ))
    .bind(email)
    .bind(email)
    .bind(week)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to read locked rows")?;

    let records = rows
        .iter()
        .map(MatchRecord::from_row)
        .collect::<Result<Vec<_>>>()
        .context("Scan of locked rows failed")?;

    log::debug!(
        "Locked {} row(s) for {} in week {}",
        locked.rows_affected(),
        email,
        week
    );
    Ok(records)
}

/// Set one side's interest flag on an existing row
pub async fn set_interest(
    conn: &mut SqliteConnection,
    pair: &MatchPair,
    week: NaiveDate,
    side: Side,
    interested: bool,
) -> Result<u64> {
    let sql = match side {
        Side::User1 => {
            "UPDATE matches SET user1_interested = ? \
             WHERE user1_email = ? AND user2_email = ? AND week = ?"
        }
        Side::User2 => {
            "UPDATE matches SET user2_interested = ? \
             WHERE user1_email = ? AND user2_email = ? AND week = ?"
        }
    };

    let result = sqlx::query(sql)
        .bind(interested)
        .bind(&pair.user1)
        .bind(&pair.user2)
        .bind(week)
        .execute(conn)
        .await
        .context("Update failed")?;

    Ok(result.rows_affected())
}

/// Record a user-initiated first contact: one-sided interest from `side`
pub async fn insert_user_match(
    conn: &mut SqliteConnection,
    pair: &MatchPair,
    week: NaiveDate,
    side: Side,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO matches
            (user1_email, user2_email, user1_interested, user2_interested, server_generated, week)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&pair.user1)
    .bind(&pair.user2)
    .bind(side == Side::User1)
    .bind(side == Side::User2)
    .bind(week)
    .execute(conn)
    .await
    .with_context(|| format!("Insert failed for ({}, {})", pair.user1, pair.user2))?;

    Ok(())
}

/// Every ledger row where `email` is either side, oldest week first
pub async fn list_matches_for_user(pool: &SqlitePool, email: &str) -> Result<Vec<MatchRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM matches WHERE user1_email = ? OR user2_email = ? \
         ORDER BY week, user1_email, user2_email",
        SELECT_COLUMNS
    ))
    .bind(email)
    .bind(email)
    .fetch_all(pool)
    .await
    .context("Failed to list matches")?;

    rows.iter().map(MatchRecord::from_row).collect()
}

/// Every ledger row for `week`, in pair order
pub async fn list_week(pool: &SqlitePool, week: NaiveDate) -> Result<Vec<MatchRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM matches WHERE week = ? ORDER BY user1_email, user2_email",
        SELECT_COLUMNS
    ))
    .bind(week)
    .fetch_all(pool)
    .await
    .context("Failed to list week")?;

    rows.iter().map(MatchRecord::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{memory_pool, sunday};

    fn pair(a: &str, b: &str) -> MatchPair {
        MatchPair::new(a, b).unwrap()
    }

    #[tokio::test]
    async fn test_insert_weekly_matches() {
        let pool = memory_pool().await;
        let pairs = vec![pair("a@x.edu", "b@x.edu"), pair("a@x.edu", "c@x.edu")];

        let write = insert_weekly_matches(&pool, sunday(), &pairs).await.unwrap();
        assert_eq!(write, WeeklyWrite { written: 2, promoted: 0 });

        let rows = list_week(&pool, sunday()).await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(row.server_generated);
            assert!(!row.user1_interested);
            assert!(!row.user2_interested);
            assert_eq!(row.week, sunday());
        }
    }

    #[tokio::test]
    async fn test_weekly_insert_all_or_nothing() {
        let pool = memory_pool().await;
        // The reversed pair violates the canonical-order check, so the first
        // row must not survive
        let reversed = MatchPair {
            user1: "z@x.edu".to_string(),
            user2: "c@x.edu".to_string(),
        };
        let pairs = vec![pair("a@x.edu", "b@x.edu"), reversed];

        assert!(insert_weekly_matches(&pool, sunday(), &pairs).await.is_err());
        assert!(list_week(&pool, sunday()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_weekly_insert_refuses_second_run() {
        let pool = memory_pool().await;
        let pairs = vec![pair("a@x.edu", "b@x.edu")];
        insert_weekly_matches(&pool, sunday(), &pairs).await.unwrap();

        let err = insert_weekly_matches(&pool, sunday(), &[pair("c@x.edu", "d@x.edu")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already has 1"));
        assert_eq!(list_week(&pool, sunday()).await.unwrap().len(), 1);

        // A different week is untouched by the guard
        let next = sunday() + chrono::TimeDelta::days(7);
        insert_weekly_matches(&pool, next, &pairs).await.unwrap();
    }

    #[tokio::test]
    async fn test_weekly_insert_promotes_earlier_first_contact() {
        let pool = memory_pool().await;
        let ab = pair("a@x.edu", "b@x.edu");

        // a reached out to b before the batch ran for the week
        let mut tx = pool.begin().await.unwrap();
        insert_user_match(&mut tx, &ab, sunday(), Side::User1).await.unwrap();
        tx.commit().await.unwrap();

        let pairs = [ab.clone(), pair("c@x.edu", "d@x.edu")];
        let write = insert_weekly_matches(&pool, sunday(), &pairs).await.unwrap();
        assert_eq!(write, WeeklyWrite { written: 2, promoted: 1 });

        let rows = list_week(&pool, sunday()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.server_generated));
        let promoted = rows.iter().find(|r| r.pairs("a@x.edu", "b@x.edu")).unwrap();
        assert_eq!(promoted.interest_of("a@x.edu"), Some(true));
        assert_eq!(promoted.interest_of("b@x.edu"), Some(false));

        // The week is now generated; a second run is still refused
        assert!(insert_weekly_matches(&pool, sunday(), &[ab]).await.is_err());
    }

    #[tokio::test]
    async fn test_canonical_order_enforced_by_schema() {
        let pool = memory_pool().await;
        let result = sqlx::query(
            "INSERT INTO matches (user1_email, user2_email, week) VALUES ('z@x.edu', 'a@x.edu', ?)",
        )
        .bind(sunday())
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_lock_and_update_interest() {
        let pool = memory_pool().await;
        let ab = pair("a@x.edu", "b@x.edu");
        insert_weekly_matches(&pool, sunday(), &[ab.clone(), pair("c@x.edu", "d@x.edu")])
            .await
            .unwrap();

        let mut tx = pool.begin().await.unwrap();
        let locked = lock_user_week(&mut tx, "b@x.edu", sunday()).await.unwrap();
        assert_eq!(locked.len(), 1);
        assert!(locked[0].pairs("b@x.edu", "a@x.edu"));

        let updated = set_interest(&mut tx, &ab, sunday(), Side::User2, true).await.unwrap();
        assert_eq!(updated, 1);
        tx.commit().await.unwrap();

        let rows = list_matches_for_user(&pool, "b@x.edu").await.unwrap();
        assert_eq!(rows[0].interest_of("b@x.edu"), Some(true));
        assert_eq!(rows[0].interest_of("a@x.edu"), Some(false));
        assert_eq!(rows[0].interest_of("c@x.edu"), None);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let pool = memory_pool().await;
        let ab = pair("a@x.edu", "b@x.edu");
        {
            let mut tx = pool.begin().await.unwrap();
            insert_user_match(&mut tx, &ab, sunday(), Side::User1).await.unwrap();
            // no commit
        }
        assert!(list_week(&pool, sunday()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_user_match_sides() {
        let pool = memory_pool().await;
        let ab = pair("a@x.edu", "b@x.edu");

        let mut tx = pool.begin().await.unwrap();
        insert_user_match(&mut tx, &ab, sunday(), Side::User2).await.unwrap();
        // Same pair and week again violates the unique key
        assert!(insert_user_match(&mut tx, &ab, sunday(), Side::User1).await.is_err());
        tx.commit().await.unwrap();

        let rows = list_week(&pool, sunday()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].server_generated);
        assert!(!rows[0].user1_interested);
        assert!(rows[0].user2_interested);
    }

    #[tokio::test]
    async fn test_list_matches_for_user_across_weeks() {
        let pool = memory_pool().await;
        let next = sunday() + chrono::TimeDelta::days(7);
        insert_weekly_matches(&pool, next, &[pair("a@x.edu", "b@x.edu")]).await.unwrap();
        let pairs = [pair("a@x.edu", "c@x.edu"), pair("b@x.edu", "c@x.edu")];
        insert_weekly_matches(&pool, sunday(), &pairs).await.unwrap();

        let rows = list_matches_for_user(&pool, "a@x.edu").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].week, sunday());
        assert_eq!(rows[1].week, next);
        assert!(rows.iter().all(|r| r.involves("a@x.edu")));
    }
}
