//! Inbound event vocabulary: slash commands and button payloads.

use crate::error::{ParseActionError, ParseCommandError};
use std::fmt;
use std::str::FromStr;

/// A slash command typed by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Show the welcome menu.
    Start,
    /// Show usage help.
    Help,
    /// Begin adding a record.
    Add,
    /// Begin removing records.
    Remove,
    /// List all records.
    List,
    /// Report store and bot status.
    Debug,
}

impl Command {
    /// Every command, in menu order.
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Add,
        Self::Remove,
        Self::List,
        Self::Help,
        Self::Debug,
    ];

    /// Returns the command name without the leading slash.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::List => "list",
            Self::Debug => "debug",
        }
    }

    /// One-line description shown in the chat client's command list.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Start => "Show the main menu",
            Self::Help => "Show help information",
            Self::Add => "Add a new record",
            Self::Remove => "Remove records by username",
            Self::List => "List all records",
            Self::Debug => "Check bot and store status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim_start_matches('/');
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseCommandError {
                name: s.to_string(),
            })
    }
}

/// An inline button press, identified by its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AddUser,
    RemoveUser,
    ListUsers,
    Help,
    Debug,
    /// Abandon the current operation.
    Cancel,
    OfflineYes,
    OfflineNo,
    /// Confirm removal of the selected record.
    ConfirmRemove,
    /// Confirm removal of every record with the selected username.
    ConfirmRemoveAll,
    /// Add a record even though its credentials already exist.
    AddAnyway,
    /// Return to the main menu.
    Menu,
}

impl Action {
    pub const ALL: [Self; 12] = [
        Self::AddUser,
        Self::RemoveUser,
        Self::ListUsers,
        Self::Help,
        Self::Debug,
        Self::Cancel,
        Self::OfflineYes,
        Self::OfflineNo,
        Self::ConfirmRemove,
        Self::ConfirmRemoveAll,
        Self::AddAnyway,
        Self::Menu,
    ];

    /// Returns the payload carried by the button.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddUser => "add_user",
            Self::RemoveUser => "remove_user",
            Self::ListUsers => "list_users",
            Self::Help => "help",
            Self::Debug => "debug",
            Self::Cancel => "cancel",
            Self::OfflineYes => "offline_yes",
            Self::OfflineNo => "offline_no",
            Self::ConfirmRemove => "confirm_remove",
            Self::ConfirmRemoveAll => "confirm_remove_all",
            Self::AddAnyway => "add_anyway",
            Self::Menu => "menu",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseActionError {
                payload: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_parses_from_its_payload() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn payloads_are_distinct() {
        let mut payloads: Vec<_> = Action::ALL.iter().map(Action::as_str).collect();
        payloads.sort_unstable();
        payloads.dedup();
        assert_eq!(payloads.len(), Action::ALL.len());
    }

    #[test]
    fn unknown_payload_is_rejected() {
        let err = "confirm_everything".parse::<Action>().unwrap_err();
        assert_eq!(err.payload, "confirm_everything");
    }

    #[test]
    fn payloads_are_case_sensitive() {
        assert!("CANCEL".parse::<Action>().is_err());
    }

    #[test]
    fn commands_parse_with_or_without_slash() {
        assert_eq!("/add".parse::<Command>(), Ok(Command::Add));
        assert_eq!("remove".parse::<Command>(), Ok(Command::Remove));
        assert_eq!("/LIST".parse::<Command>(), Ok(Command::List));
        assert!("/purge".parse::<Command>().is_err());
    }
}
