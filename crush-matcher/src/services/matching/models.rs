use serde::{Deserialize, Serialize};

/// Number of questionnaire answers each profile carries
pub const ANSWER_COUNT: usize = 12;

/// Highest valid answer value (answers range over 0..=5)
pub const MAX_ANSWER: i64 = 5;

/// Default number of simultaneous partners per user
pub const DEFAULT_CAPACITY: usize = 3;

/// A user as read from the profile store for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    /// Bitmask of the user's own gender(s)
    pub gender: u32,
    /// Bitmask of genders the user wants to be matched with
    pub partner_genders: u32,
    pub answers: [Option<i64>; ANSWER_COUNT],
}

impl UserProfile {
    pub fn new(
        email: impl Into<String>,
        gender: u32,
        partner_genders: u32,
        answers: [Option<i64>; ANSWER_COUNT],
    ) -> Self {
        Self {
            email: email.into(),
            gender,
            partner_genders,
            answers,
        }
    }

    /// Profile with every answer present
    #[cfg(test)]
    pub fn answered(
        email: impl Into<String>,
        gender: u32,
        partner_genders: u32,
        answers: [i64; ANSWER_COUNT],
    ) -> Self {
        Self::new(email, gender, partner_genders, answers.map(Some))
    }

    /// Mutual gender compatibility between two profiles
    pub fn is_compatible_with(&self, other: &UserProfile) -> bool {
        (self.gender & other.partner_genders) != 0 && (other.gender & self.partner_genders) != 0
    }

    pub fn missing_answers(&self) -> usize {
        self.answers.iter().filter(|a| a.is_none()).count()
    }

    pub fn has_out_of_range_answer(&self) -> bool {
        self.answers
            .iter()
            .flatten()
            .any(|a| !(0..=MAX_ANSWER).contains(a))
    }
}

/// How profiles with null answers are treated by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAnswerPolicy {
    /// Drop the profile from the batch
    #[default]
    Exclude,
    /// Treat each missing answer as 0
    ZeroFill,
}

/// Per-question weights for the distance function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerWeights {
    pub multiplier: [u32; ANSWER_COUNT],
    pub additive: [u32; ANSWER_COUNT],
}

impl Default for AnswerWeights {
    fn default() -> Self {
        Self {
            multiplier: [1; ANSWER_COUNT],
            additive: [0; ANSWER_COUNT],
        }
    }
}

/// A matched pair of users, canonicalized so that `user1 < user2`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MatchPair {
    pub user1: String,
    pub user2: String,
}

impl MatchPair {
    /// Build a pair in canonical order. Returns `None` for a self pair.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self {
                user1: a.to_string(),
                user2: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                user1: b.to_string(),
                user2: a.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }
}
