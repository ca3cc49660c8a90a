//! Presentation-side helpers — status text and input gating.
//!
//! Renderers consume [`ConnectionState`] from a
//! [`ConnectionAccessor`](crate::session::ConnectionAccessor); these helpers
//! turn it into what a chat window shows and whether its input accepts text.

use crate::session::{ConnectionState, ConnectionStatus};

/// Characters of the session id shown next to the status.
const SHORT_ID_LEN: usize = 6;

/// Human-readable connection status, e.g. `"Connected (abc123)"`.
///
/// # Examples
///
/// ```
/// use chatlink::chat::status_label;
/// use chatlink::session::{ConnectionState, LifecycleEvent};
///
/// let mut state = ConnectionState::connecting();
/// assert_eq!(status_label(&state), "Connecting");
///
/// state.apply(&LifecycleEvent::Open { session_id: Some("abc123xyz".into()) });
/// assert_eq!(status_label(&state), "Connected (abc123)");
/// ```
pub fn status_label(state: &ConnectionState) -> String {
    match state.status() {
        ConnectionStatus::Connected => match state.session_id() {
            Some(id) => format!("Connected ({})", short_id(id)),
            None => "Connected".to_owned(),
        },
        ConnectionStatus::Connecting => "Connecting".to_owned(),
        ConnectionStatus::Uninitialized
        | ConnectionStatus::Disconnected
        | ConnectionStatus::Released => "Disconnected".to_owned(),
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// The message input box.
///
/// Input is only enabled while connected. Submitting takes the draft and
/// clears the box; it does not transmit anything. Callers that want to send
/// turn the returned text into a
/// [`ClientEvent::MessageSend`](crate::protocol::ClientEvent::MessageSend).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replaces the draft with `text`.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether the input box accepts typing.
    pub fn input_enabled(&self, state: &ConnectionState) -> bool {
        state.is_connected()
    }

    /// Whether the send control is active.
    pub fn can_send(&self, state: &ConnectionState) -> bool {
        self.input_enabled(state) && !self.draft.trim().is_empty()
    }

    /// Takes the draft and clears the input.
    ///
    /// Returns the trimmed text when it could be sent. While disconnected the
    /// draft is left untouched and `None` is returned.
    pub fn submit(&mut self, state: &ConnectionState) -> Option<String> {
        if !self.input_enabled(state) {
            return None;
        }
        let text = std::mem::take(&mut self.draft);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}
