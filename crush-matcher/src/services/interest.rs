//! Interest reconciliation: applies one user's match decision to the ledger
//!
//! Each event runs in its own transaction. The transaction first locks every
//! row touching the source user for the event's week, so concurrent events for
//! the same user and week are applied one after the other.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use std::fmt;

use crate::repository::matches::{self, MatchRecord, Side};
use crate::services::matching::MatchPair;

/// A single decision, already anchored to its week
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestEvent {
    pub source: String,
    pub target: String,
    pub week: NaiveDate,
    pub wants_match: bool,
}

/// What the reconciliation decided to do with the locked rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// A server-generated row pairs source and target
    UpdateServerMatch,
    /// The source's only user-initiated row already pairs it with target
    UpdateUserMatch,
    /// The source already pursues someone else this week
    Reject { existing: usize },
    /// No user-initiated row yet: record first contact
    Insert,
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterestOutcome {
    UpdatedServerMatch,
    UpdatedUserMatch,
    Inserted,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyIdentity,
    SelfInterest,
    /// Source already holds this many user-initiated rows with other users
    AlreadyPursuing(usize),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::EmptyIdentity => write!(f, "empty identity"),
            RejectReason::SelfInterest => write!(f, "source and target are the same user"),
            RejectReason::AlreadyPursuing(n) => {
                write!(f, "source already holds {} self-initiated match(es) this week", n)
            }
        }
    }
}

impl InterestEvent {
    fn validate(&self) -> Option<RejectReason> {
        if self.source.trim().is_empty() || self.target.trim().is_empty() {
            Some(RejectReason::EmptyIdentity)
        } else if self.source == self.target {
            Some(RejectReason::SelfInterest)
        } else {
            None
        }
    }
}

/// Decide how an event applies to the rows locked for its source
pub fn decide(rows: &[MatchRecord], source: &str, target: &str) -> Decision {
    if rows
        .iter()
        .any(|r| r.server_generated && r.pairs(source, target))
    {
        return Decision::UpdateServerMatch;
    }

    let user_initiated: Vec<&MatchRecord> = rows
        .iter()
        .filter(|r| !r.server_generated && r.involves(source))
        .collect();

    match user_initiated.as_slice() {
        [] => Decision::Insert,
        [only] if only.pairs(source, target) => Decision::UpdateUserMatch,
        others => Decision::Reject {
            existing: others.len(),
        },
    }
}

/// Apply one interest event to the ledger.
///
/// Safe to re-run: a redelivered event finds the row its first delivery wrote
/// and takes an update path that leaves the flag unchanged.
pub async fn apply_interest(pool: &SqlitePool, event: &InterestEvent) -> Result<InterestOutcome> {
    if let Some(reason) = event.validate() {
        log::warn!(
            "Rejecting interest event {} -> {}: {}",
            event.source,
            event.target,
            reason
        );
        return Ok(InterestOutcome::Rejected(reason));
    }

    let Some(pair) = MatchPair::new(&event.source, &event.target) else {
        return Ok(InterestOutcome::Rejected(RejectReason::SelfInterest));
    };
    let side = Side::of(&pair, &event.source).context("Source is not part of its own pair")?;

    // Dropping `tx` on any early return rolls back and releases the lock
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let rows = matches::lock_user_week(&mut tx, &event.source, event.week).await?;

    let outcome = match decide(&rows, &event.source, &event.target) {
        Decision::UpdateServerMatch => {
            matches::set_interest(&mut tx, &pair, event.week, side, event.wants_match).await?;
            InterestOutcome::UpdatedServerMatch
        }
        Decision::UpdateUserMatch => {
            matches::set_interest(&mut tx, &pair, event.week, side, event.wants_match).await?;
            InterestOutcome::UpdatedUserMatch
        }
        Decision::Insert => {
            matches::insert_user_match(&mut tx, &pair, event.week, side).await?;
            InterestOutcome::Inserted
        }
        Decision::Reject { existing } => {
            tx.rollback().await.context("Failed to roll back transaction")?;
            let reason = RejectReason::AlreadyPursuing(existing);
            log::info!(
                "Rejecting interest event {} -> {} for week {}: {}",
                event.source,
                event.target,
                event.week,
                reason
            );
            return Ok(InterestOutcome::Rejected(reason));
        }
    };

    tx.commit().await.context("Failed to commit transaction")?;

    log::info!(
        "Applied interest {} -> {} (week {}, wants_match={}): {:?}",
        event.source,
        event.target,
        event.week,
        event.wants_match,
        outcome
    );
    Ok(outcome)
}
