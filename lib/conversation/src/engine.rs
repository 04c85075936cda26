//! The conversation engine.
//!
//! Routes commands, free text and button presses through the per-operator
//! state machine, calling the record gateway where a step needs the store.
//! Every entry point returns a [`Reply`]; failures inside a step abandon the
//! operation and are reported to the operator rather than propagated.

use crate::action::{Action, Command};
use crate::error::StateStoreError;
use crate::render::{self, DebugReport};
use crate::reply::{Delivery, Keyboard, Reply};
use crate::state::{Candidate, ConversationState, Draft, parse_expiration};
use crate::state_store::StateStore;
use chrono::Local;
use roster_core::{DEFAULT_EXPIRATION, OperatorId, Record};
use roster_store::RecordGateway;
use rootcause::Report;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

type Step = Result<Reply, Report<StateStoreError>>;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Expiration date stored when the operator sends a blank date.
    /// Default: "2025-12-12"
    #[serde(default = "default_expiration")]
    pub default_expiration: String,
}

fn default_expiration() -> String {
    DEFAULT_EXPIRATION.to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_expiration: default_expiration(),
        }
    }
}

impl EngineSettings {
    /// Returns true if the default expiration is a valid `YYYY-MM-DD` date.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        parse_expiration(&self.default_expiration).is_some()
    }
}

/// Drives every operator's conversation.
pub struct ConversationEngine {
    states: Arc<dyn StateStore>,
    records: RecordGateway,
    settings: EngineSettings,
}

impl ConversationEngine {
    /// Creates an engine over injected state storage and record gateway.
    #[must_use]
    pub fn new(
        states: Arc<dyn StateStore>,
        records: RecordGateway,
        settings: EngineSettings,
    ) -> Self {
        Self {
            states,
            records,
            settings,
        }
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The reply for input the engine has no use for.
    #[must_use]
    pub fn menu_prompt() -> Reply {
        Reply::send(render::use_menu()).with_keyboard(Keyboard::menu_prompt())
    }

    /// Handles a slash command.
    #[instrument(skip(self), fields(operator = %operator, command = %command))]
    pub async fn handle_command(&self, operator: OperatorId, command: Command) -> Reply {
        let step = match command {
            Command::Start => {
                Ok(Reply::send(render::welcome()).with_keyboard(Keyboard::main_menu()))
            }
            Command::Help => Ok(Reply::send(render::help())),
            Command::Add => self.begin_add(operator, Delivery::Send).await,
            Command::Remove => self.begin_remove(operator, Delivery::Send).await,
            Command::List => Ok(self.list(Delivery::Send).await),
            Command::Debug => self.debug().await,
        };
        self.settle(operator, step, Delivery::Send).await
    }

    /// Handles a free-text message.
    #[instrument(skip(self, text), fields(operator = %operator))]
    pub async fn handle_text(&self, operator: OperatorId, text: &str) -> Reply {
        let step = self.on_text(operator, text.trim()).await;
        self.settle(operator, step, Delivery::Send).await
    }

    /// Handles a button press.
    #[instrument(skip(self), fields(operator = %operator, action = %action))]
    pub async fn handle_action(&self, operator: OperatorId, action: Action) -> Reply {
        let step = match action {
            Action::AddUser => self.begin_add(operator, Delivery::Edit).await,
            Action::RemoveUser => self.begin_remove(operator, Delivery::Edit).await,
            Action::ListUsers => Ok(self.list(Delivery::Edit).await),
            Action::Help => Ok(Reply::send(render::help())),
            Action::Debug => self.debug().await,
            Action::Cancel => self
                .finish(operator)
                .await
                .map(|()| Reply::edit(render::cancelled())),
            Action::Menu => self.finish(operator).await.map(|()| {
                Reply::edit(render::welcome()).with_keyboard(Keyboard::main_menu())
            }),
            Action::OfflineYes => self.complete_add(operator, true).await,
            Action::OfflineNo => self.complete_add(operator, false).await,
            Action::AddAnyway => self.add_anyway(operator).await,
            Action::ConfirmRemove => self.remove_selected(operator).await,
            Action::ConfirmRemoveAll => self.remove_all(operator).await,
        };
        self.settle(operator, step, Delivery::Edit).await
    }

    async fn settle(&self, operator: OperatorId, step: Step, delivery: Delivery) -> Reply {
        match step {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "conversation step failed, abandoning operation");
                if let Err(cleanup) = self.states.remove(operator).await {
                    warn!(error = %cleanup, "failed to discard conversation state");
                }
                Reply::new(render::internal_error(&e.to_string()), delivery)
            }
        }
    }

    async fn advance(
        &self,
        operator: OperatorId,
        state: ConversationState,
    ) -> Result<(), Report<StateStoreError>> {
        debug!(state = state.label(), "conversation advanced");
        self.states.set(operator, state).await
    }

    async fn finish(&self, operator: OperatorId) -> Result<(), Report<StateStoreError>> {
        if let Some(state) = self.states.remove(operator).await? {
            debug!(state = state.label(), "conversation ended");
        }
        Ok(())
    }

    fn stale() -> Reply {
        Reply::send(render::nothing_pending())
    }

    async fn begin_add(&self, operator: OperatorId, delivery: Delivery) -> Step {
        self.advance(operator, ConversationState::AwaitingDeviceId)
            .await?;
        Ok(Reply::new(render::ask_device_id(), delivery).with_keyboard(Keyboard::cancel()))
    }

    async fn begin_remove(&self, operator: OperatorId, delivery: Delivery) -> Step {
        self.advance(operator, ConversationState::AwaitingRemoveUsername)
            .await?;
        Ok(Reply::new(render::ask_remove_username(), delivery).with_keyboard(Keyboard::cancel()))
    }

    async fn on_text(&self, operator: OperatorId, text: &str) -> Step {
        let Some(state) = self.states.get(operator).await? else {
            return Ok(Self::menu_prompt());
        };

        match state {
            ConversationState::AwaitingDeviceId => {
                self.advance(
                    operator,
                    ConversationState::AwaitingUsername {
                        device_id: text.to_string(),
                    },
                )
                .await?;
                Ok(Reply::send(render::ask_username()).with_keyboard(Keyboard::cancel()))
            }
            ConversationState::AwaitingUsername { device_id } => {
                self.advance(
                    operator,
                    ConversationState::AwaitingPassword {
                        device_id,
                        username: text.to_string(),
                    },
                )
                .await?;
                Ok(Reply::send(render::ask_password()).with_keyboard(Keyboard::cancel()))
            }
            ConversationState::AwaitingPassword {
                device_id,
                username,
            } => {
                self.advance(
                    operator,
                    ConversationState::AwaitingExpiration {
                        device_id,
                        username,
                        password: text.to_string(),
                    },
                )
                .await?;
                Ok(
                    Reply::send(render::ask_expiration(&self.settings.default_expiration))
                        .with_keyboard(Keyboard::cancel()),
                )
            }
            ConversationState::AwaitingExpiration {
                device_id,
                username,
                password,
            } => {
                let input = if text.is_empty() {
                    self.settings.default_expiration.as_str()
                } else {
                    text
                };
                let Some(expires_at) = parse_expiration(input) else {
                    return Ok(Reply::send(render::invalid_date()).with_keyboard(Keyboard::cancel()));
                };

                self.advance(
                    operator,
                    ConversationState::AwaitingOffline {
                        draft: Draft {
                            device_id,
                            username,
                            password,
                            expires_at,
                        },
                    },
                )
                .await?;
                Ok(Reply::send(render::ask_offline()).with_keyboard(Keyboard::offline_choice()))
            }
            ConversationState::AwaitingRemoveUsername => self.find_for_removal(operator, text).await,
            ConversationState::AwaitingRemoveChoice {
                username,
                candidates,
            } => self.choose_candidate(operator, text, username, candidates).await,
            ConversationState::AwaitingOffline { .. }
            | ConversationState::ConfirmDuplicate { .. }
            | ConversationState::ConfirmRemoveSingle { .. }
            | ConversationState::ConfirmRemoveAll { .. } => {
                Ok(Reply::send(render::use_buttons()).with_keyboard(pending_keyboard(&state)))
            }
        }
    }

    async fn find_for_removal(&self, operator: OperatorId, username: &str) -> Step {
        let records = self.records.load().await;
        if records.is_empty() {
            self.finish(operator).await?;
            return Ok(Reply::send(render::store_empty()));
        }

        let mut candidates: Vec<Candidate> = records
            .into_iter()
            .enumerate()
            .filter(|(_, record)| record.username == username)
            .map(|(position, record)| Candidate { position, record })
            .collect();

        match candidates.len() {
            0 => {
                self.finish(operator).await?;
                Ok(Reply::send(render::username_not_found(username)))
            }
            1 => {
                let target = candidates.remove(0);
                let text = render::confirm_single("Found record", &target.record);
                self.advance(operator, ConversationState::ConfirmRemoveSingle { target })
                    .await?;
                Ok(Reply::send(text).with_keyboard(Keyboard::confirm_remove()))
            }
            _ => {
                let text = render::remove_candidates(username, &candidates);
                self.advance(
                    operator,
                    ConversationState::AwaitingRemoveChoice {
                        username: username.to_string(),
                        candidates,
                    },
                )
                .await?;
                Ok(Reply::send(text).with_keyboard(Keyboard::cancel()))
            }
        }
    }

    async fn choose_candidate(
        &self,
        operator: OperatorId,
        text: &str,
        username: String,
        candidates: Vec<Candidate>,
    ) -> Step {
        let choice = text.to_lowercase();
        if choice == "all" {
            let prompt = render::confirm_remove_all(&username, candidates.len());
            self.advance(operator, ConversationState::ConfirmRemoveAll { username })
                .await?;
            return Ok(Reply::send(prompt).with_keyboard(Keyboard::confirm_remove_all()));
        }

        if choice.is_empty() || !choice.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Reply::send(render::invalid_input()).with_keyboard(Keyboard::cancel()));
        }

        let Some(target) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| candidates.get(index))
            .cloned()
        else {
            return Ok(Reply::send(render::invalid_choice()).with_keyboard(Keyboard::cancel()));
        };

        let prompt = render::confirm_single("Selected record", &target.record);
        self.advance(operator, ConversationState::ConfirmRemoveSingle { target })
            .await?;
        Ok(Reply::send(prompt).with_keyboard(Keyboard::confirm_remove()))
    }

    async fn complete_add(&self, operator: OperatorId, allow_offline: bool) -> Step {
        let Some(ConversationState::AwaitingOffline { draft }) = self.states.get(operator).await?
        else {
            return Ok(Self::stale());
        };

        let record = draft.into_record(allow_offline);
        let Some(mut records) = self.records.load_for_update().await else {
            return self.abandon_commit(operator).await;
        };
        if records
            .iter()
            .any(|r| r.has_credentials(&record.username, &record.password))
        {
            info!("credentials already present, asking for confirmation");
            self.advance(operator, ConversationState::ConfirmDuplicate { record })
                .await?;
            return Ok(
                Reply::edit(render::duplicate_warning()).with_keyboard(Keyboard::confirm_duplicate()),
            );
        }

        records.push(record.clone());
        self.commit_addition(operator, &record, &records).await
    }

    async fn add_anyway(&self, operator: OperatorId) -> Step {
        let Some(ConversationState::ConfirmDuplicate { record }) =
            self.states.get(operator).await?
        else {
            return Ok(Self::stale());
        };

        let Some(mut records) = self.records.load_for_update().await else {
            return self.abandon_commit(operator).await;
        };
        records.push(record.clone());
        self.commit_addition(operator, &record, &records).await
    }

    async fn commit_addition(
        &self,
        operator: OperatorId,
        record: &Record,
        records: &[Record],
    ) -> Step {
        let saved = self.records.save(records).await;
        self.finish(operator).await?;

        if saved {
            info!(total = records.len(), "record added");
            Ok(Reply::edit(render::record_created(record, records.len()))
                .with_keyboard(Keyboard::back_to_menu()))
        } else {
            Ok(Reply::edit(render::save_failed()))
        }
    }

    /// Ends the conversation without writing when the document could not be
    /// read as the base of a save.
    async fn abandon_commit(&self, operator: OperatorId) -> Step {
        warn!("document unreadable, nothing saved");
        self.finish(operator).await?;
        Ok(Reply::edit(render::save_failed()))
    }

    async fn remove_selected(&self, operator: OperatorId) -> Step {
        let Some(ConversationState::ConfirmRemoveSingle { target }) =
            self.states.get(operator).await?
        else {
            return Ok(Self::stale());
        };

        let Some(mut records) = self.records.load_for_update().await else {
            return self.abandon_commit(operator).await;
        };
        let Some(index) = target.locate(&records) else {
            self.finish(operator).await?;
            return Ok(Reply::edit(render::record_gone()));
        };

        records.remove(index);
        let saved = self.records.save(&records).await;
        self.finish(operator).await?;

        if saved {
            info!(position = index, "record removed");
            Ok(Reply::edit(render::removed_one()))
        } else {
            Ok(Reply::edit(render::save_failed()))
        }
    }

    async fn remove_all(&self, operator: OperatorId) -> Step {
        let Some(ConversationState::ConfirmRemoveAll { username }) =
            self.states.get(operator).await?
        else {
            return Ok(Self::stale());
        };

        let Some(mut records) = self.records.load_for_update().await else {
            return self.abandon_commit(operator).await;
        };
        let before = records.len();
        records.retain(|r| r.username != username);
        let removed = before - records.len();
        if removed == 0 {
            self.finish(operator).await?;
            return Ok(Reply::edit(render::record_gone()));
        }

        let saved = self.records.save(&records).await;
        self.finish(operator).await?;

        if saved {
            info!(removed, "records removed");
            Ok(Reply::edit(render::removed_all(&username, removed)))
        } else {
            Ok(Reply::edit(render::save_failed()))
        }
    }

    async fn list(&self, delivery: Delivery) -> Reply {
        let records = self.records.load().await;
        let today = Local::now().date_naive();
        Reply::new(render::record_list(&records, today), delivery)
            .with_keyboard(Keyboard::list_actions())
    }

    async fn debug(&self) -> Step {
        let status = self.records.status().await;
        let records = self.records.load().await;
        let save_test = if records.is_empty() {
            None
        } else {
            Some(self.records.save(&records).await)
        };

        let report = DebugReport {
            location: self.records.location(),
            status,
            record_count: records.len(),
            save_test,
            active_conversations: self.states.active_count().await?,
            default_expiration: self.settings.default_expiration.clone(),
        };
        Ok(Reply::send(render::debug_report(&report)))
    }
}

/// Buttons that move a button-only state forward.
fn pending_keyboard(state: &ConversationState) -> Keyboard {
    match state {
        ConversationState::AwaitingOffline { .. } => Keyboard::offline_choice(),
        ConversationState::ConfirmDuplicate { .. } => Keyboard::confirm_duplicate(),
        ConversationState::ConfirmRemoveSingle { .. } => Keyboard::confirm_remove(),
        ConversationState::ConfirmRemoveAll { .. } => Keyboard::confirm_remove_all(),
        ConversationState::AwaitingDeviceId
        | ConversationState::AwaitingUsername { .. }
        | ConversationState::AwaitingPassword { .. }
        | ConversationState::AwaitingExpiration { .. }
        | ConversationState::AwaitingRemoveUsername
        | ConversationState::AwaitingRemoveChoice { .. } => Keyboard::cancel(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;
    use async_trait::async_trait;
    use roster_store::{InMemoryRecordStore, RecordStore, StoreError, StoreStatus};

    const OP: OperatorId = OperatorId::new(7);

    struct Harness {
        engine: ConversationEngine,
        store: Arc<InMemoryRecordStore>,
        states: Arc<InMemoryStateStore>,
    }

    fn harness_over(store: InMemoryRecordStore) -> Harness {
        let store = Arc::new(store);
        let states = Arc::new(InMemoryStateStore::new());
        let engine = ConversationEngine::new(
            states.clone(),
            RecordGateway::new(store.clone()),
            EngineSettings::default(),
        );
        Harness {
            engine,
            store,
            states,
        }
    }

    fn harness(records: Vec<Record>) -> Harness {
        harness_over(InMemoryRecordStore::new(records))
    }

    fn record(id: &str, username: &str, password: &str) -> Record {
        Record::new(id, username, password, "2026-06-30", false)
    }

    impl Harness {
        async fn state(&self) -> Option<ConversationState> {
            self.states.get(OP).await.unwrap()
        }

        async fn stored(&self) -> Vec<Record> {
            self.store.records().await.unwrap_or_default()
        }

        async fn command(&self, command: Command) -> Reply {
            self.engine.handle_command(OP, command).await
        }

        async fn text(&self, text: &str) -> Reply {
            self.engine.handle_text(OP, text).await
        }

        async fn press(&self, action: Action) -> Reply {
            self.engine.handle_action(OP, action).await
        }

        async fn fill_draft(&self, device: &str, username: &str, password: &str, expires: &str) {
            self.command(Command::Add).await;
            self.text(device).await;
            self.text(username).await;
            self.text(password).await;
            let reply = self.text(expires).await;
            assert!(reply.offers(Action::OfflineYes));
        }
    }

    #[tokio::test]
    async fn add_walks_through_every_prompt() {
        let h = harness(vec![]);

        let reply = h.command(Command::Add).await;
        assert_eq!(reply.delivery, Delivery::Send);
        assert!(reply.offers(Action::Cancel));
        assert_eq!(h.state().await, Some(ConversationState::AwaitingDeviceId));

        h.text("  dev-9  ").await;
        assert_eq!(
            h.state().await,
            Some(ConversationState::AwaitingUsername {
                device_id: "dev-9".to_string()
            })
        );

        h.text("alice").await;
        h.text("hunter2").await;
        assert_eq!(
            h.state().await.map(|s| s.label()),
            Some("awaiting_expiration")
        );

        let reply = h.text("2026-03-01").await;
        assert!(reply.offers(Action::OfflineNo));

        let reply = h.press(Action::OfflineYes).await;
        assert_eq!(reply.delivery, Delivery::Edit);
        assert!(reply.text.contains("RECORD CREATED"));
        assert!(reply.text.contains("Total records in store: 1"));
        assert!(reply.offers(Action::Menu));

        assert_eq!(
            h.stored().await,
            vec![Record::new("dev-9", "alice", "hunter2", "2026-03-01", true)]
        );
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn blank_expiration_uses_default_date() {
        let h = harness(vec![]);
        h.fill_draft("dev", "bob", "pw", "   ").await;
        h.press(Action::OfflineNo).await;

        let stored = h.stored().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].expires_at, "2025-12-12");
        assert!(!stored[0].allow_offline);
    }

    #[tokio::test]
    async fn invalid_expiration_reprompts_in_place() {
        let h = harness(vec![]);
        h.command(Command::Add).await;
        h.text("dev").await;
        h.text("carol").await;
        h.text("pw").await;

        let reply = h.text("31/12/2026").await;
        assert!(reply.text.contains("Invalid date format"));
        assert_eq!(
            h.state().await.map(|s| s.label()),
            Some("awaiting_expiration")
        );

        let reply = h.text("2026-12-31").await;
        assert!(reply.offers(Action::OfflineYes));
    }

    #[tokio::test]
    async fn existing_records_are_kept_in_order_on_add() {
        let existing = vec![record("1", "a", "x"), record("2", "b", "y")];
        let h = harness(existing.clone());
        h.fill_draft("3", "c", "z", "2026-01-01").await;
        h.press(Action::OfflineNo).await;

        let stored = h.stored().await;
        assert_eq!(stored.len(), 3);
        assert_eq!(&stored[..2], &existing[..]);
        assert_eq!(stored[2].username, "c");
    }

    #[tokio::test]
    async fn duplicate_credentials_need_confirmation() {
        let h = harness(vec![record("1", "dup", "same")]);
        h.fill_draft("2", "dup", "same", "2026-01-01").await;

        let reply = h.press(Action::OfflineYes).await;
        assert!(reply.text.contains("already exists"));
        assert!(reply.offers(Action::AddAnyway));
        assert_eq!(h.stored().await.len(), 1);
        assert_eq!(
            h.state().await.map(|s| s.label()),
            Some("confirm_duplicate")
        );

        let reply = h.press(Action::AddAnyway).await;
        assert!(reply.text.contains("RECORD CREATED"));
        let stored = h.stored().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].id, "2");
        assert!(stored[1].allow_offline);
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn same_username_with_other_password_is_not_a_duplicate() {
        let h = harness(vec![record("1", "dup", "one")]);
        h.fill_draft("2", "dup", "two", "2026-01-01").await;

        let reply = h.press(Action::OfflineNo).await;
        assert!(reply.text.contains("RECORD CREATED"));
        assert_eq!(h.stored().await.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_duplicate_is_not_saved() {
        let h = harness(vec![record("1", "dup", "same")]);
        h.fill_draft("2", "dup", "same", "2026-01-01").await;
        h.press(Action::OfflineYes).await;

        let reply = h.press(Action::Cancel).await;
        assert!(reply.text.contains("cancelled"));
        assert_eq!(h.stored().await.len(), 1);
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn single_match_goes_straight_to_confirmation() {
        let h = harness(vec![record("1", "a", "x")]);

        h.command(Command::Remove).await;
        let reply = h.text("a").await;
        assert!(reply.text.starts_with("Found record"));
        assert!(reply.offers(Action::ConfirmRemove));

        let reply = h.press(Action::ConfirmRemove).await;
        assert!(reply.text.contains("successfully removed"));
        assert_eq!(h.stored().await, Vec::<Record>::new());
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn removal_matches_username_exactly() {
        let h = harness(vec![record("1", "Alice", "x")]);

        h.command(Command::Remove).await;
        let reply = h.text("alice").await;
        assert!(reply.text.contains("No record with username"));
        assert_eq!(h.state().await, None);
        assert_eq!(h.stored().await.len(), 1);
    }

    #[tokio::test]
    async fn removal_from_empty_store_ends_conversation() {
        let h = harness(vec![]);

        h.press(Action::RemoveUser).await;
        let reply = h.text("anyone").await;
        assert!(reply.text.contains("No records found"));
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn index_selects_kth_match() {
        let h = harness(vec![
            record("1", "shared", "a"),
            record("2", "other", "b"),
            record("3", "shared", "c"),
            record("4", "shared", "d"),
        ]);

        h.command(Command::Remove).await;
        let reply = h.text("shared").await;
        assert!(reply.text.contains("Found <b>3</b> records"));
        assert_eq!(
            h.state().await.map(|s| s.label()),
            Some("awaiting_remove_choice")
        );

        let reply = h.text("2").await;
        assert!(reply.text.starts_with("Selected record"));
        assert!(reply.text.contains("<code>3</code>"));

        h.press(Action::ConfirmRemove).await;
        let ids: Vec<_> = h.stored().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn all_removes_every_match() {
        let h = harness(vec![
            record("1", "shared", "a"),
            record("2", "other", "b"),
            record("3", "shared", "c"),
        ]);

        h.command(Command::Remove).await;
        h.text("shared").await;
        let reply = h.text("ALL").await;
        assert!(reply.offers(Action::ConfirmRemoveAll));
        assert!(reply.text.contains("ALL 2 records"));

        let reply = h.press(Action::ConfirmRemoveAll).await;
        assert!(reply.text.contains("Removed 2 records"));
        assert_eq!(h.stored().await, vec![record("2", "other", "b")]);
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn bad_choices_reprompt_without_advancing() {
        let h = harness(vec![record("1", "s", "a"), record("2", "s", "b")]);
        h.command(Command::Remove).await;
        h.text("s").await;

        for (input, expected) in [
            ("0", "Invalid choice"),
            ("3", "Invalid choice"),
            ("99999999999999999999999", "Invalid choice"),
            ("two", "Invalid input"),
            ("-1", "Invalid input"),
            ("", "Invalid input"),
        ] {
            let reply = h.text(input).await;
            assert!(reply.text.contains(expected), "input {input:?}");
            assert_eq!(
                h.state().await.map(|s| s.label()),
                Some("awaiting_remove_choice")
            );
        }
    }

    #[tokio::test]
    async fn single_removal_takes_exactly_one_of_identical_records() {
        let twin = record("same", "twin", "pw");
        let h = harness(vec![twin.clone(), twin.clone()]);

        h.command(Command::Remove).await;
        h.text("twin").await;
        h.text("2").await;
        h.press(Action::ConfirmRemove).await;

        assert_eq!(h.stored().await, vec![twin]);
    }

    #[tokio::test]
    async fn single_removal_follows_record_after_outside_edit() {
        let h = harness(vec![record("1", "a", "x"), record("2", "b", "y")]);
        h.command(Command::Remove).await;
        h.text("b").await;

        h.store
            .replace(vec![record("0", "new", "n"), record("1", "a", "x"), record("2", "b", "y")])
            .await;
        h.press(Action::ConfirmRemove).await;

        let ids: Vec<_> = h.stored().await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn vanished_record_is_reported_not_saved() {
        let h = harness(vec![record("1", "a", "x")]);
        h.command(Command::Remove).await;
        h.text("a").await;

        h.store.replace(vec![record("9", "z", "z")]).await;
        let reply = h.press(Action::ConfirmRemove).await;

        assert!(reply.text.contains("no longer in the store"));
        assert_eq!(h.stored().await, vec![record("9", "z", "z")]);
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn failed_save_is_reported_and_ends_conversation() {
        let h = harness(vec![]);
        h.fill_draft("d", "u", "p", "2026-01-01").await;
        h.store.set_unavailable(true);

        let reply = h.press(Action::OfflineYes).await;
        assert!(reply.text.contains("Failed to save"));
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn add_against_missing_document_fails() {
        let h = harness_over(InMemoryRecordStore::missing());
        h.fill_draft("d", "u", "p", "2026-01-01").await;

        let reply = h.press(Action::OfflineYes).await;
        assert!(reply.text.contains("Failed to save"));
        assert_eq!(h.store.records().await, None);
    }

    /// Serves a document that cannot be decoded but still accepts writes.
    struct UndecodableStore {
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for UndecodableStore {
        fn location(&self) -> String {
            self.inner.location()
        }

        async fn fetch(&self) -> Result<Vec<Record>, Report<StoreError>> {
            Err(StoreError::MalformedDocument {
                reason: "expected a list of users".to_string(),
            }
            .into())
        }

        async fn revision(&self) -> Result<String, Report<StoreError>> {
            self.inner.revision().await
        }

        async fn update(&self, records: &[Record], revision: &str) -> Result<(), Report<StoreError>> {
            self.inner.update(records, revision).await
        }

        async fn status(&self) -> StoreStatus {
            self.inner.status().await
        }
    }

    fn harness_undecodable(records: Vec<Record>) -> (ConversationEngine, Arc<UndecodableStore>) {
        let store = Arc::new(UndecodableStore {
            inner: InMemoryRecordStore::new(records),
        });
        let engine = ConversationEngine::new(
            Arc::new(InMemoryStateStore::new()),
            RecordGateway::new(store.clone()),
            EngineSettings::default(),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn add_over_undecodable_document_keeps_existing_records() {
        let existing = vec![record("1", "kept", "a"), record("2", "also", "b")];
        let (engine, store) = harness_undecodable(existing.clone());

        engine.handle_command(OP, Command::Add).await;
        for answer in ["d", "u", "p", "2026-01-01"] {
            engine.handle_text(OP, answer).await;
        }
        let reply = engine.handle_action(OP, Action::OfflineYes).await;

        assert_eq!(reply.delivery, Delivery::Edit);
        assert!(reply.text.contains("Failed to save"));
        assert_eq!(store.inner.records().await, Some(existing));
        assert_eq!(engine.states.get(OP).await.unwrap(), None);
    }

    #[tokio::test]
    async fn confirmations_over_undecodable_document_write_nothing() {
        let existing = vec![record("1", "shared", "a")];
        let (engine, store) = harness_undecodable(existing.clone());

        let cases = [
            (
                ConversationState::ConfirmRemoveAll {
                    username: "shared".to_string(),
                },
                Action::ConfirmRemoveAll,
            ),
            (
                ConversationState::ConfirmDuplicate {
                    record: record("2", "shared", "a"),
                },
                Action::AddAnyway,
            ),
        ];
        for (state, action) in cases {
            engine.states.set(OP, state).await.unwrap();

            let reply = engine.handle_action(OP, action).await;
            assert!(reply.text.contains("Failed to save"));
            assert_eq!(store.inner.records().await, Some(existing.clone()));
            assert_eq!(engine.states.get(OP).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn cancel_clears_any_state() {
        let states = vec![
            ConversationState::AwaitingDeviceId,
            ConversationState::AwaitingUsername {
                device_id: "d".to_string(),
            },
            ConversationState::AwaitingPassword {
                device_id: "d".to_string(),
                username: "u".to_string(),
            },
            ConversationState::AwaitingExpiration {
                device_id: "d".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
            },
            ConversationState::AwaitingOffline {
                draft: Draft {
                    device_id: "d".to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                    expires_at: "2026-01-01".to_string(),
                },
            },
            ConversationState::ConfirmDuplicate {
                record: record("d", "u", "p"),
            },
            ConversationState::AwaitingRemoveUsername,
            ConversationState::AwaitingRemoveChoice {
                username: "u".to_string(),
                candidates: vec![],
            },
            ConversationState::ConfirmRemoveSingle {
                target: Candidate {
                    position: 0,
                    record: record("d", "u", "p"),
                },
            },
            ConversationState::ConfirmRemoveAll {
                username: "u".to_string(),
            },
        ];

        for state in states {
            let h = harness(vec![record("d", "u", "p")]);
            let label = state.label();
            h.states.set(OP, state).await.unwrap();

            let reply = h.press(Action::Cancel).await;
            assert_eq!(reply.delivery, Delivery::Edit);
            assert_eq!(h.state().await, None, "state {label}");

            let reply = h.text("hello").await;
            assert_eq!(reply, ConversationEngine::menu_prompt(), "state {label}");
            assert_eq!(h.stored().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn text_without_conversation_prompts_for_menu() {
        let h = harness(vec![]);
        let reply = h.text("what now?").await;
        assert_eq!(reply.text, render::use_menu());
        assert!(reply.offers(Action::AddUser));
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn text_in_button_state_reoffers_buttons() {
        let h = harness(vec![]);
        h.fill_draft("d", "u", "p", "2026-01-01").await;

        let reply = h.text("yes").await;
        assert!(reply.offers(Action::OfflineYes));
        assert_eq!(
            h.state().await.map(|s| s.label()),
            Some("awaiting_offline")
        );
    }

    #[tokio::test]
    async fn stale_buttons_do_nothing() {
        let h = harness(vec![record("1", "a", "x")]);

        for action in [
            Action::OfflineYes,
            Action::AddAnyway,
            Action::ConfirmRemove,
            Action::ConfirmRemoveAll,
        ] {
            let reply = h.press(action).await;
            assert!(reply.text.contains("nothing pending"));
        }

        h.command(Command::Add).await;
        h.press(Action::ConfirmRemove).await;
        assert_eq!(h.state().await, Some(ConversationState::AwaitingDeviceId));
        assert_eq!(h.stored().await.len(), 1);
    }

    #[tokio::test]
    async fn starting_over_replaces_current_operation() {
        let h = harness(vec![]);
        h.command(Command::Add).await;
        h.text("dev").await;

        h.press(Action::RemoveUser).await;
        assert_eq!(
            h.state().await,
            Some(ConversationState::AwaitingRemoveUsername)
        );
    }

    #[tokio::test]
    async fn menu_discards_state() {
        let h = harness(vec![]);
        h.command(Command::Remove).await;

        let reply = h.press(Action::Menu).await;
        assert!(reply.offers(Action::Debug));
        assert_eq!(h.state().await, None);
    }

    #[tokio::test]
    async fn operators_do_not_share_state() {
        let h = harness(vec![]);
        let other = OperatorId::new(8);

        h.command(Command::Add).await;
        let reply = h.engine.handle_text(other, "dev").await;

        assert_eq!(reply, ConversationEngine::menu_prompt());
        assert_eq!(h.state().await, Some(ConversationState::AwaitingDeviceId));
    }

    #[tokio::test]
    async fn list_shows_records_and_keeps_state() {
        let h = harness(vec![record("1", "a", "x"), record("2", "b", "y")]);
        h.command(Command::Remove).await;

        let reply = h.command(Command::List).await;
        assert!(reply.text.contains("(2 total)"));
        assert!(reply.offers(Action::ListUsers));

        let refreshed = h.press(Action::ListUsers).await;
        assert_eq!(refreshed.delivery, Delivery::Edit);
        assert_eq!(
            h.state().await,
            Some(ConversationState::AwaitingRemoveUsername)
        );
    }

    #[tokio::test]
    async fn debug_reports_store_and_conversations() {
        let h = harness(vec![record("1", "a", "x")]);
        h.engine
            .handle_command(OperatorId::new(100), Command::Add)
            .await;

        let reply = h.press(Action::Debug).await;
        assert_eq!(reply.delivery, Delivery::Send);
        assert!(reply.text.contains("Records Loaded: <code>1</code>"));
        assert!(reply.text.contains("✅ Success"));
        assert!(reply.text.contains("Active Conversations: <code>1</code>"));
        assert_eq!(h.stored().await, vec![record("1", "a", "x")]);
    }

    #[tokio::test]
    async fn help_is_sent_as_new_message() {
        let h = harness(vec![]);
        let reply = h.press(Action::Help).await;
        assert_eq!(reply.delivery, Delivery::Send);
        assert!(reply.text.contains("HELP"));
    }

    struct BrokenStateStore;

    #[async_trait]
    impl StateStore for BrokenStateStore {
        async fn get(
            &self,
            _operator: OperatorId,
        ) -> Result<Option<ConversationState>, Report<StateStoreError>> {
            Ok(None)
        }

        async fn set(
            &self,
            operator: OperatorId,
            _state: ConversationState,
        ) -> Result<(), Report<StateStoreError>> {
            Err(StateStoreError::StorageFailed {
                operator,
                reason: "backend offline ".repeat(40),
            }
            .into())
        }

        async fn remove(
            &self,
            _operator: OperatorId,
        ) -> Result<Option<ConversationState>, Report<StateStoreError>> {
            Ok(None)
        }

        async fn active_count(&self) -> Result<usize, Report<StateStoreError>> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn storage_failure_is_reported_briefly() {
        let engine = ConversationEngine::new(
            Arc::new(BrokenStateStore),
            RecordGateway::new(Arc::new(InMemoryRecordStore::default())),
            EngineSettings::default(),
        );

        let reply = engine.handle_command(OP, Command::Add).await;
        assert!(reply.text.starts_with("❌ Error: "));
        assert!(reply.text.contains("backend offline"));
        assert!(!reply.text.contains(&"backend offline ".repeat(40)));
        assert!(reply.keyboard.is_none());

        let reply = engine.handle_action(OP, Action::AddUser).await;
        assert_eq!(reply.delivery, Delivery::Edit);
    }

    #[test]
    fn settings_validation() {
        assert!(EngineSettings::default().is_valid());
        let bad = EngineSettings {
            default_expiration: "12/12/2025".to_string(),
        };
        assert!(!bad.is_valid());
    }
}
