mod memory;

pub use memory::ConversationStore;

use crate::models::chat::{ ConversationHistory, Role };

/// One-line description of a history for debug logs; message bodies are left out.
pub fn describe_history(history: &ConversationHistory) -> String {
    let roles = history
        .messages()
        .iter()
        .map(|msg| match msg.role() {
            Role::System => "S",
            Role::User => "U",
            Role::Assistant => "A",
        })
        .collect::<Vec<_>>()
        .join("");
    format!("{} messages [{}]", history.len(), roles)
}
