//! Per-operator conversation states.
//!
//! Each variant carries exactly the data collected so far, so a later step
//! can never read a field an earlier step did not fill in.

use chrono::NaiveDate;
use roster_core::Record;

/// Date format accepted for expiration input.
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%d";

/// A record being added, complete except for the offline flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub device_id: String,
    pub username: String,
    pub password: String,
    pub expires_at: String,
}

impl Draft {
    /// Completes the draft.
    #[must_use]
    pub fn into_record(self, allow_offline: bool) -> Record {
        Record::new(
            self.device_id,
            self.username,
            self.password,
            self.expires_at,
            allow_offline,
        )
    }
}

/// A record picked for removal, remembered with its position in the
/// collection it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub position: usize,
    pub record: Record,
}

impl Candidate {
    /// Finds this candidate in a freshly loaded collection.
    ///
    /// Prefers the remembered position if the record there is unchanged,
    /// otherwise the first equal record. Returns `None` if the record is gone.
    #[must_use]
    pub fn locate(&self, records: &[Record]) -> Option<usize> {
        if records.get(self.position) == Some(&self.record) {
            return Some(self.position);
        }
        records.iter().position(|r| r == &self.record)
    }
}

/// Where an operator is in a multi-step operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationState {
    AwaitingDeviceId,
    AwaitingUsername {
        device_id: String,
    },
    AwaitingPassword {
        device_id: String,
        username: String,
    },
    AwaitingExpiration {
        device_id: String,
        username: String,
        password: String,
    },
    AwaitingOffline {
        draft: Draft,
    },
    /// The new record's credentials match an existing record.
    ConfirmDuplicate {
        record: Record,
    },
    AwaitingRemoveUsername,
    /// Several records share the username; the operator picks one or all.
    AwaitingRemoveChoice {
        username: String,
        candidates: Vec<Candidate>,
    },
    ConfirmRemoveSingle {
        target: Candidate,
    },
    ConfirmRemoveAll {
        username: String,
    },
}

impl ConversationState {
    /// Returns the state's name, for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AwaitingDeviceId => "awaiting_device_id",
            Self::AwaitingUsername { .. } => "awaiting_username",
            Self::AwaitingPassword { .. } => "awaiting_password",
            Self::AwaitingExpiration { .. } => "awaiting_expiration",
            Self::AwaitingOffline { .. } => "awaiting_offline",
            Self::ConfirmDuplicate { .. } => "confirm_duplicate",
            Self::AwaitingRemoveUsername => "awaiting_remove_username",
            Self::AwaitingRemoveChoice { .. } => "awaiting_remove_choice",
            Self::ConfirmRemoveSingle { .. } => "confirm_remove_single",
            Self::ConfirmRemoveAll { .. } => "confirm_remove_all",
        }
    }
}

/// Validates an expiration date, returning it in canonical form.
#[must_use]
pub fn parse_expiration(input: &str) -> Option<String> {
    NaiveDate::parse_from_str(input.trim(), EXPIRATION_FORMAT)
        .ok()
        .map(|date| date.format(EXPIRATION_FORMAT).to_string())
}

/// Days from `today` until the record expires, if its date parses.
#[must_use]
pub fn days_left(expires_at: &str, today: NaiveDate) -> Option<i64> {
    NaiveDate::parse_from_str(expires_at.trim(), EXPIRATION_FORMAT)
        .ok()
        .map(|date| (date - today).num_days())
}
