pub mod discord;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::models::thread::ThreadId;

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;
/// Discord rejects thread names longer than this many characters.
pub const THREAD_NAME_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub mention: String,
    pub display_name: String,
}

/// Where a slash command was invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationChannel {
    /// A standard text channel inside a guild; the only place a thread can be opened.
    GuildText(u64),
    Other,
}

/// Opaque handle to a posted message that can seed a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedMessage {
    pub channel_id: u64,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    pub name: String,
    pub auto_archive_minutes: u16,
    pub reason: String,
}

/// A message observed in some channel. Only channels that map to a stored
/// conversation are ever treated as threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel_id: u64,
    pub author_is_self: bool,
    pub author_is_bot: bool,
    pub author_label: String,
    pub content: String,
}

/// A single `/ask` invocation.
#[async_trait]
pub trait AskInteraction: Send + Sync {
    fn requester(&self) -> &Requester;

    fn channel(&self) -> InvocationChannel;

    /// Immediate ephemeral response; used instead of `defer`.
    async fn reject(&self, text: &str) -> Result<(), PlatformError>;

    async fn defer(&self) -> Result<(), PlatformError>;

    /// Public follow-up that a thread can be started from.
    async fn post_seed(&self, text: &str) -> Result<SeedMessage, PlatformError>;

    async fn followup_ephemeral(&self, text: &str) -> Result<(), PlatformError>;
}

/// Held while a typing indicator is shown; dropping it stops the indicator.
pub type TypingGuard = Box<dyn Send>;

#[async_trait]
pub trait ThreadMessenger: Send + Sync {
    async fn create_thread(
        &self,
        seed: SeedMessage,
        spec: &ThreadSpec
    ) -> Result<ThreadId, PlatformError>;

    async fn send(&self, thread: ThreadId, text: &str) -> Result<(), PlatformError>;

    fn start_typing(&self, thread: ThreadId) -> TypingGuard;
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn thread_name_for(display_name: &str) -> String {
    truncate_chars(&format!("{}'s question", display_name), THREAD_NAME_LIMIT)
}

/// Splits `text` into chunks of at most `limit` characters, preferring to break
/// after a newline, then after whitespace. Blank chunks are dropped, since
/// Discord refuses to post them.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > limit {
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..hard_end];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .map(|idx| idx + window[idx..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(hard_end);

        push_non_blank(&mut chunks, &rest[..cut]);
        rest = &rest[cut..];
    }
    push_non_blank(&mut chunks, rest);
    chunks
}

fn push_non_blank(chunks: &mut Vec<String>, chunk: &str) {
    if !chunk.trim().is_empty() {
        chunks.push(chunk.to_string());
    }
}
