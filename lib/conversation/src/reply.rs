//! Outbound replies.
//!
//! A reply is transport-neutral: HTML text, an optional grid of buttons, and
//! whether it replaces the message whose button was pressed.

use crate::action::Action;

/// How the transport should deliver a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Post a new message.
    Send,
    /// Replace the message that carried the pressed button.
    Edit,
}

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    #[must_use]
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Rows of inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Full main menu.
    #[must_use]
    pub fn main_menu() -> Self {
        Self {
            rows: vec![
                vec![Button::new("➕ Add Record", Action::AddUser)],
                vec![Button::new("🗑️ Remove Record", Action::RemoveUser)],
                vec![Button::new("📋 List Records", Action::ListUsers)],
                vec![Button::new("ℹ️ Help", Action::Help)],
                vec![Button::new("🔍 Debug", Action::Debug)],
            ],
        }
    }

    /// Shorter menu offered when free text arrives outside any operation.
    #[must_use]
    pub fn menu_prompt() -> Self {
        Self {
            rows: vec![
                vec![Button::new("➕ Add Record", Action::AddUser)],
                vec![Button::new("🗑️ Remove Record", Action::RemoveUser)],
                vec![Button::new("📋 List Records", Action::ListUsers)],
                vec![Button::new("ℹ️ Help", Action::Help)],
            ],
        }
    }

    #[must_use]
    pub fn cancel() -> Self {
        Self {
            rows: vec![vec![cancel_button()]],
        }
    }

    #[must_use]
    pub fn offline_choice() -> Self {
        Self {
            rows: vec![
                vec![
                    Button::new("✅ Yes", Action::OfflineYes),
                    Button::new("❌ No", Action::OfflineNo),
                ],
                vec![cancel_button()],
            ],
        }
    }

    #[must_use]
    pub fn confirm_duplicate() -> Self {
        Self {
            rows: vec![vec![
                Button::new("✅ Yes, Add Anyway", Action::AddAnyway),
                cancel_button(),
            ]],
        }
    }

    #[must_use]
    pub fn confirm_remove() -> Self {
        Self {
            rows: vec![vec![
                Button::new("✅ Yes, Remove", Action::ConfirmRemove),
                cancel_button(),
            ]],
        }
    }

    #[must_use]
    pub fn confirm_remove_all() -> Self {
        Self {
            rows: vec![vec![
                Button::new("✅ Yes, Remove All", Action::ConfirmRemoveAll),
                cancel_button(),
            ]],
        }
    }

    /// Buttons under the record list.
    #[must_use]
    pub fn list_actions() -> Self {
        Self {
            rows: vec![
                vec![Button::new("🔙 Back to Menu", Action::Menu)],
                vec![Button::new("🔄 Refresh", Action::ListUsers)],
            ],
        }
    }

    #[must_use]
    pub fn back_to_menu() -> Self {
        Self {
            rows: vec![vec![Button::new("🏠 Back to Menu", Action::Menu)]],
        }
    }

    /// Iterates over every button.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    /// Returns true if some button carries `action`.
    #[must_use]
    pub fn offers(&self, action: Action) -> bool {
        self.buttons().any(|b| b.action == action)
    }
}

fn cancel_button() -> Button {
    Button::new("❌ Cancel", Action::Cancel)
}

/// A message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTML-formatted text.
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub delivery: Delivery,
}

impl Reply {
    /// Creates a reply posted as a new message.
    #[must_use]
    pub fn send(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            delivery: Delivery::Send,
        }
    }

    /// Creates a reply that replaces the pressed message.
    #[must_use]
    pub fn edit(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            delivery: Delivery::Edit,
        }
    }

    /// Creates a reply with the given delivery.
    #[must_use]
    pub fn new(text: impl Into<String>, delivery: Delivery) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            delivery,
        }
    }

    /// Attaches buttons.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Returns true if the reply offers a button for `action`.
    #[must_use]
    pub fn offers(&self, action: Action) -> bool {
        self.keyboard.as_ref().is_some_and(|k| k.offers(action))
    }
}
