use serde::{ Deserialize, Serialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    role: Role,
    content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered prompt context for one thread.
///
/// The only way to obtain a history is [`ConversationHistory::new`], which seeds
/// the system message; afterwards only user and assistant turns can be pushed,
/// so the system message is always first and unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self { messages: vec![ChatMessage::system(system_prompt)] }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Drops everything appended after `len`. The system message is never removed.
    pub fn rollback_to(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn roles(&self) -> Vec<Role> {
        self.messages.iter().map(ChatMessage::role).collect()
    }
}

pub fn question_turn(user_label: &str, prompt: &str) -> String {
    format!("{} asked:\n{}", user_label, prompt)
}

pub fn follow_up_turn(user_label: &str, text: &str) -> String {
    format!("{} said:\n{}", user_label, text)
}
