//! Profile source: active users with their gender bitmasks and answers

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::services::matching::models::{ANSWER_COUNT, UserProfile};

const QUESTION_COLUMNS: [&str; ANSWER_COUNT] = [
    "question1",
    "question2",
    "question3",
    "question4",
    "question5",
    "question6",
    "question7",
    "question8",
    "question9",
    "question10",
    "question11",
    "question12",
];

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile> {
    let email: String = row.try_get("email")?;
    let gender: i64 = row.try_get("gender")?;
    let partner_genders: i64 = row.try_get("partner_genders")?;

    let gender = u32::try_from(gender)
        .with_context(|| format!("gender bitmask {} out of range", gender))?;
    let partner_genders = u32::try_from(partner_genders)
        .with_context(|| format!("partner bitmask {} out of range", partner_genders))?;

    let mut answers = [None; ANSWER_COUNT];
    for (slot, column) in answers.iter_mut().zip(QUESTION_COLUMNS) {
        *slot = row.try_get::<Option<i64>, _>(column)?;
    }

    Ok(UserProfile {
        email,
        gender,
        partner_genders,
        answers,
    })
}

/// Load every active user, ordered by identity.
///
/// Users without an answers row come back with all answers missing; the
/// matching service applies the missing-answer policy. Rows that cannot be
/// decoded are logged and skipped.
pub async fn load_active_profiles(pool: &SqlitePool) -> Result<Vec<UserProfile>> {
    let rows = sqlx::query(
        r#"
        SELECT
            u.email,
            u.gender,
            u.partner_genders,
            a.question1, a.question2, a.question3, a.question4,
            a.question5, a.question6, a.question7, a.question8,
            a.question9, a.question10, a.question11, a.question12
        FROM users u
        LEFT JOIN answers a ON u.email = a.email
        WHERE u.is_active = 1
        ORDER BY u.email
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to load active profiles")?;

    let mut profiles = Vec::with_capacity(rows.len());
    for row in &rows {
        match profile_from_row(row) {
            Ok(profile) => profiles.push(profile),
            Err(e) => {
                let email: Option<String> = row.try_get("email").ok();
                log::warn!(
                    "Skipping malformed profile row {}: {:#}",
                    email.as_deref().unwrap_or("<unknown>"),
                    e
                );
            }
        }
    }

    log::info!("Loaded {} active profiles", profiles.len());
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{insert_user, memory_pool};

    #[tokio::test]
    async fn test_load_active_profiles() {
        let pool = memory_pool().await;
        insert_user(&pool, "zed@x.edu", 1, 2, Some([Some(3); 12])).await;
        insert_user(&pool, "amy@x.edu", 2, 1, Some([Some(1); 12])).await;
        insert_user(&pool, "noanswers@x.edu", 2, 1, None).await;
        insert_user(&pool, "gone@x.edu", 2, 1, Some([Some(1); 12])).await;
        sqlx::query("UPDATE users SET is_active = 0 WHERE email = 'gone@x.edu'")
            .execute(&pool)
            .await
            .unwrap();

        let profiles = load_active_profiles(&pool).await.unwrap();
        let emails: Vec<&str> = profiles.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(emails, vec!["amy@x.edu", "noanswers@x.edu", "zed@x.edu"]);

        assert_eq!(profiles[0].gender, 2);
        assert_eq!(profiles[0].partner_genders, 1);
        assert_eq!(profiles[0].answers, [Some(1); 12]);
        assert_eq!(profiles[1].missing_answers(), 12);
    }

    #[tokio::test]
    async fn test_partial_answers_and_bad_bitmask() {
        let pool = memory_pool().await;
        let mut partial = [Some(2); 12];
        partial[5] = None;
        insert_user(&pool, "partial@x.edu", 1, 1, Some(partial)).await;
        insert_user(&pool, "negative@x.edu", -1, 1, Some([Some(2); 12])).await;

        let profiles = load_active_profiles(&pool).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].email, "partial@x.edu");
        assert_eq!(profiles[0].answers[5], None);
        assert_eq!(profiles[0].answers[6], Some(2));
    }
}
