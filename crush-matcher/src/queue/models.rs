use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::services::interest::InterestEvent;
use crate::week;

/// Queue message body, as produced by the match endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestMessage {
    pub email_source: String,
    pub email_target: String,
    /// `YYYY-MM-DD`, any day of the target week
    pub date: String,
    pub wants_match: bool,
}

impl InterestMessage {
    /// Anchor the message date and build the event the consumer applies
    pub fn to_event(&self) -> Result<InterestEvent> {
        let week = week::parse_week(&self.date)
            .with_context(|| format!("Bad date in message from {}", self.email_source))?;
        Ok(InterestEvent {
            source: self.email_source.clone(),
            target: self.email_target.clone(),
            week,
            wants_match: self.wants_match,
        })
    }
}

/// A user's decision on a match, as submitted to the HTTP endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub source_email: String,
    pub target_email: String,
    #[serde(default)]
    pub source_interested: bool,
    #[serde(default)]
    pub target_interested: bool,
    pub week: String,
}

impl MatchDecision {
    /// Forward the decision as a queue message
    pub fn to_message(&self) -> InterestMessage {
        InterestMessage {
            email_source: self.source_email.clone(),
            email_target: self.target_email.clone(),
            date: self.week.clone(),
            wants_match: self.source_interested || self.target_interested,
        }
    }
}

/// One delivered queue record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub message_id: String,
    pub body: String,
}

impl QueueRecord {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
        }
    }
}
