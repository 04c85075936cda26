//! Message text.
//!
//! Everything here produces Telegram-flavoured HTML. Values that came from
//! an operator or from the store are escaped before interpolation.

use crate::state::{Candidate, days_left};
use chrono::NaiveDate;
use roster_core::Record;
use roster_store::StoreStatus;
use std::fmt::Write as _;

/// Longest error detail shown to an operator.
pub const ERROR_DETAIL_LIMIT: usize = 200;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Escapes text for HTML parse mode.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn code(text: &str) -> String {
    format!("<code>{}</code>", escape(text))
}

#[must_use]
pub fn welcome() -> String {
    "🏆 <b>ADMIN PANEL</b> 🏆\n\n\
     Manage the approved account list stored in the repository.\n\n\
     <b>Available Commands:</b>\n\
     /start - Show this menu\n\
     /add - Add a new record\n\
     /remove - Remove records\n\
     /list - List all records\n\
     /help - Show help information\n\
     /debug - Check bot status\n\n\
     Use the buttons below or type a command."
        .to_string()
}

#[must_use]
pub fn help() -> String {
    "📖 <b>HELP</b>\n\n\
     <b>1. Add Record</b>: press 'Add Record' or type /add\n\
     You will be asked for:\n\
     • Device ID\n\
     • Username\n\
     • Password\n\
     • Expiration Date (YYYY-MM-DD, empty for the default)\n\
     • Offline Access (yes/no)\n\n\
     <b>2. Remove Record</b>: press 'Remove Record' or type /remove\n\
     • Enter the username to remove\n\
     • If several records share it, pick one by number or type 'all'\n\n\
     <b>3. List Records</b>: press 'List Records' or type /list\n\
     • Shows every record with its expiry\n\n\
     <b>4. Debug</b>: press 'Debug' or type /debug\n\
     • Checks the connection to the record store\n\n\
     Press Cancel at any step to abandon the operation.\n\
     All data is stored in the GitHub repository."
        .to_string()
}

#[must_use]
pub fn use_menu() -> String {
    "Please use the buttons or commands to interact with the bot.".to_string()
}

#[must_use]
pub fn ask_device_id() -> String {
    "➕ Let's add a new record.\n\nPlease enter the <b>Device ID</b>:".to_string()
}

#[must_use]
pub fn ask_username() -> String {
    "Great! Now enter the <b>Username</b>:".to_string()
}

#[must_use]
pub fn ask_password() -> String {
    "Now enter the <b>Password</b>:".to_string()
}

#[must_use]
pub fn ask_expiration(default_expiration: &str) -> String {
    format!(
        "⏳ Enter the <b>Expiration Date</b> (YYYY-MM-DD):\nExample: {}\nSend a blank message to use the default.",
        code(default_expiration)
    )
}

#[must_use]
pub fn invalid_date() -> String {
    "❌ Invalid date format. Please use YYYY-MM-DD. Try again:".to_string()
}

#[must_use]
pub fn ask_offline() -> String {
    "Allow <b>Offline Access</b>?".to_string()
}

#[must_use]
pub fn use_buttons() -> String {
    "👆 Please use the buttons to continue, or press Cancel.".to_string()
}

#[must_use]
pub fn duplicate_warning() -> String {
    "⚠️ This username/password combination already exists.\n\nDo you want to add it anyway?"
        .to_string()
}

/// Summary shown after a record is saved.
#[must_use]
pub fn record_created(record: &Record, total: usize) -> String {
    format!(
        "✅ <b>RECORD CREATED</b>\n\n\
         🆔 <b>Device ID:</b> {}\n\
         👤 <b>Username:</b> {}\n\
         🔑 <b>Password:</b> {}\n\
         📅 <b>Expires:</b> {}\n\
         💾 <b>Offline Access:</b> {}\n\n\
         💠 <b>Total records in store: {total}</b>",
        code(&record.id),
        code(&record.username),
        code(&record.password),
        code(&record.expires_at),
        code(&record.allow_offline.to_string()),
    )
}

#[must_use]
pub fn save_failed() -> String {
    "❌ Failed to save changes to the record store.\n\n\
     Possible reasons:\n\
     1. The access token expired\n\
     2. No write permission on the repository\n\
     3. A network problem\n\n\
     Use /debug to check the bot status."
        .to_string()
}

#[must_use]
pub fn ask_remove_username() -> String {
    "Please enter the <b>Username</b> to remove:".to_string()
}

#[must_use]
pub fn store_empty() -> String {
    "❌ No records found in the store.".to_string()
}

#[must_use]
pub fn username_not_found(username: &str) -> String {
    format!("❌ No record with username {} found.", code(username))
}

fn record_summary(out: &mut String, record: &Record) {
    let _ = writeln!(out, "ID: {}", code(&record.id));
    let _ = writeln!(out, "Username: {}", code(&record.username));
    let _ = writeln!(out, "Expiration: {}", code(&record.expires_at));
}

/// Confirmation prompt for removing one record.
#[must_use]
pub fn confirm_single(heading: &str, record: &Record) -> String {
    let mut out = format!("{heading}:\n\n");
    record_summary(&mut out, record);
    out.push_str("\nAre you sure you want to remove this record?");
    out
}

/// Numbered list of records sharing a username.
#[must_use]
pub fn remove_candidates(username: &str, candidates: &[Candidate]) -> String {
    let mut out = format!(
        "Found <b>{}</b> records with username {}:\n\n",
        candidates.len(),
        code(username)
    );
    for (n, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(out, "<b>Option {}:</b>", n + 1);
        let _ = writeln!(out, "Device ID: {}", code(&candidate.record.id));
        let _ = writeln!(out, "Expiration: {}", code(&candidate.record.expires_at));
        out.push('\n');
    }
    out.push_str("Enter the number to remove, or type 'all' to remove all:");
    out
}

#[must_use]
pub fn confirm_remove_all(username: &str, count: usize) -> String {
    format!(
        "⚠️ Are you sure you want to remove ALL {count} records with username {}?",
        code(username)
    )
}

#[must_use]
pub fn invalid_choice() -> String {
    "❌ Invalid choice. Please try again.".to_string()
}

#[must_use]
pub fn invalid_input() -> String {
    "❌ Invalid input. Please enter a number or 'all'.".to_string()
}

#[must_use]
pub fn removed_one() -> String {
    "✅ Record successfully removed!".to_string()
}

#[must_use]
pub fn removed_all(username: &str, count: usize) -> String {
    format!(
        "✅ Removed {count} records with username {}.",
        code(username)
    )
}

#[must_use]
pub fn record_gone() -> String {
    "⚠️ That record is no longer in the store. Nothing was removed.".to_string()
}

#[must_use]
pub fn cancelled() -> String {
    "Operation cancelled. Use /start to see the menu again.".to_string()
}

#[must_use]
pub fn nothing_pending() -> String {
    "⚠️ There is nothing pending for that button. Use /start to see the menu.".to_string()
}

/// The full record listing.
#[must_use]
pub fn record_list(records: &[Record], today: NaiveDate) -> String {
    if records.is_empty() {
        return "📭 <b>No approved records yet.</b>\n\nUse /add to add the first one.".to_string();
    }

    let mut out = format!("📋 <b>APPROVED RECORDS</b> ({} total)\n\n", records.len());
    for (n, record) in records.iter().enumerate() {
        let days = days_left(&record.expires_at, today);
        let status = if days.is_some_and(|d| d > 0) {
            "✅"
        } else {
            "❌"
        };
        let remaining = match days {
            Some(d) => format!("{d} days left"),
            None => "unknown".to_string(),
        };

        let _ = writeln!(out, "<b>Record #{}</b>", n + 1);
        let _ = writeln!(out, "{status} <b>ID:</b> {}", code(&record.id));
        let _ = writeln!(out, "👤 <b>Username:</b> {}", code(&record.username));
        let _ = writeln!(out, "🔑 <b>Password:</b> {}", code(&record.password));
        let _ = writeln!(
            out,
            "📅 <b>Expires:</b> {} ({remaining})",
            code(&record.expires_at)
        );
        let _ = writeln!(
            out,
            "💾 <b>Offline Access:</b> {}",
            code(&record.allow_offline.to_string())
        );
        let _ = writeln!(out, "{SEPARATOR}");
    }
    out
}

/// Facts gathered for the debug report.
#[derive(Debug, Clone)]
pub struct DebugReport {
    pub location: String,
    pub status: StoreStatus,
    pub record_count: usize,
    /// Outcome of re-saving the loaded records; `None` when there was nothing to save.
    pub save_test: Option<bool>,
    pub active_conversations: usize,
    pub default_expiration: String,
}

#[must_use]
pub fn debug_report(report: &DebugReport) -> String {
    let status_code = report
        .status
        .status_code
        .map_or_else(|| "no response".to_string(), |c| c.to_string());
    let save_test = match report.save_test {
        Some(true) => "✅ Success",
        Some(false) => "❌ Failed",
        None => "⏭️ Skipped (no records)",
    };

    format!(
        "🔍 <b>BOT DEBUG INFORMATION</b>\n\n\
         <b>Store Status:</b>\n\
         • Document: {}\n\
         • Exists: {} (Status: {})\n\
         • Records Loaded: {}\n\
         • Save Test: {save_test}\n\n\
         <b>Bot Status:</b>\n\
         • Active Conversations: {}\n\n\
         <b>Settings:</b>\n\
         • Default Date: {}",
        code(&report.location),
        code(&report.status.exists.to_string()),
        escape(&status_code),
        code(&report.record_count.to_string()),
        code(&report.active_conversations.to_string()),
        code(&report.default_expiration),
    )
}

/// Message for an unexpected failure, with the detail cut short.
#[must_use]
pub fn internal_error(detail: &str) -> String {
    let detail: String = detail.chars().take(ERROR_DETAIL_LIMIT).collect();
    format!("❌ Error: {}", escape(&detail))
}
