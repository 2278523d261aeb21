use async_trait::async_trait;
use log::{ debug, error, info, warn };
use std::collections::HashMap;
use std::sync::{ Arc, Mutex };
use tokio::sync::{ Mutex as AsyncMutex, OwnedMutexGuard };

use crate::error::error_chain;
use crate::events::{ BotEvent, EventKind, EventListener, ListenerTable };
use crate::history::{ describe_history, ConversationStore };
use crate::llm::chat::CompletionGateway;
use crate::models::chat::{ follow_up_turn, question_turn, ConversationHistory };
use crate::models::thread::ThreadId;
use crate::platform::{
    thread_name_for,
    AskInteraction,
    IncomingMessage,
    InvocationChannel,
    ThreadMessenger,
    ThreadSpec,
};

pub const DEFAULT_ARCHIVE_MINUTES: u16 = 60;

const NOT_THREAD_CAPABLE: &str =
    "Please run `/ask` inside a server text channel so I can open a thread.";
const NEW_THREAD_FAILURE: &str = "I couldn't reach the assistant. Please try again in a moment.";
const REQUESTER_FAILURE: &str = "The assistant request failed. Check logs for details.";
const THREAD_SETUP_FAILURE: &str = "I couldn't open a thread for your question. Please try again.";
const FOLLOW_UP_FAILURE: &str =
    "I hit an error while contacting the assistant. Please try again later.";
const EMPTY_REPLY: &str = "The assistant returned an empty reply.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskRejection {
    NotThreadCapable,
}

impl AskRejection {
    pub fn message(&self) -> &'static str {
        match self {
            AskRejection::NotThreadCapable => NOT_THREAD_CAPABLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    Rejected(AskRejection),
    Answered(ThreadId),
    /// The thread, if one was opened before the failure.
    Failed(Option<ThreadId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    BotAuthor,
    UnknownThread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpOutcome {
    Ignored(IgnoreReason),
    Answered,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub system_prompt: String,
    pub archive_minutes: u16,
}

/// One async mutex per live thread. Every store mutation for a thread happens
/// while holding its lock, so turns on the same thread never interleave.
#[derive(Default)]
struct ThreadLocks {
    inner: Mutex<HashMap<ThreadId, Arc<AsyncMutex<()>>>>,
}

impl ThreadLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, Arc<AsyncMutex<()>>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn acquire(&self, thread: ThreadId) -> OwnedMutexGuard<()> {
        let lock = self.map().entry(thread).or_default().clone();
        lock.lock_owned().await
    }

    /// Forgets the lock unless another task still holds or awaits it.
    fn prune(&self, thread: ThreadId) {
        let mut map = self.map();
        if map.get(&thread).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&thread);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

pub struct ConversationController {
    store: Arc<ConversationStore>,
    gateway: CompletionGateway,
    settings: ControllerSettings,
    locks: ThreadLocks,
}

impl ConversationController {
    pub fn new(
        store: Arc<ConversationStore>,
        gateway: CompletionGateway,
        settings: ControllerSettings
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
            locks: ThreadLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn register(self: &Arc<Self>, table: &mut ListenerTable) {
        let listener: Arc<dyn EventListener> = self.clone();
        table
            .register(EventKind::Ask, listener.clone())
            .register(EventKind::ThreadMessage, listener.clone())
            .register(EventKind::ThreadClosed, listener);
    }

    pub async fn new_question(
        &self,
        messenger: &dyn ThreadMessenger,
        interaction: &dyn AskInteraction,
        prompt: &str
    ) -> AskOutcome {
        let requester = interaction.requester().clone();
        let parent = match interaction.channel() {
            InvocationChannel::GuildText(id) => id,
            InvocationChannel::Other => {
                let rejection = AskRejection::NotThreadCapable;
                info!("Rejected /ask from {} outside a guild text channel", requester.display_name);
                if let Err(e) = interaction.reject(rejection.message()).await {
                    warn!("Failed to send /ask rejection: {}", e);
                }
                return AskOutcome::Rejected(rejection);
            }
        };

        if let Err(e) = interaction.defer().await {
            error!("Failed to acknowledge /ask interaction in channel {}: {}", parent, e);
            return AskOutcome::Failed(None);
        }

        let seed_text = format!("Creating thread for {}...", requester.mention);
        let seed = match interaction.post_seed(&seed_text).await {
            Ok(seed) => seed,
            Err(e) => {
                error!("Failed to post thread seed message in channel {}: {}", parent, e);
                notify_requester(interaction, THREAD_SETUP_FAILURE).await;
                return AskOutcome::Failed(None);
            }
        };

        let spec = ThreadSpec {
            name: thread_name_for(&requester.display_name),
            auto_archive_minutes: self.settings.archive_minutes,
            reason: format!("Thread for {}'s /ask command", requester.display_name),
        };
        let thread = match messenger.create_thread(seed, &spec).await {
            Ok(thread) => thread,
            Err(e) => {
                error!("Failed to create thread in channel {}: {}", parent, e);
                notify_requester(interaction, THREAD_SETUP_FAILURE).await;
                return AskOutcome::Failed(None);
            }
        };
        info!("Opened thread {} for {}", thread, requester.display_name);

        let guard = self.locks.acquire(thread).await;
        let mut history = ConversationHistory::new(self.settings.system_prompt.as_str());
        history.push_user(question_turn(&requester.display_name, prompt));

        let outcome = match self.gateway.complete(&history).await {
            Err(e) => {
                error!("Failed to fetch completion for new thread {}: {}", thread, error_chain(&e));
                send_or_log(messenger, thread, NEW_THREAD_FAILURE).await;
                notify_requester(interaction, REQUESTER_FAILURE).await;
                AskOutcome::Failed(Some(thread))
            }
            Ok(reply) => {
                let answer = format!("{} asked:\n> {}\n\n{}", requester.mention, prompt, reply);
                history.push_assistant(reply);
                debug!("Stored thread {}: {}", thread, describe_history(&history));
                self.store.set(thread, history);

                send_or_log(messenger, thread, &answer).await;
                let ready = format!(
                    "Thread {} is ready. Continue the conversation there!",
                    thread.mention()
                );
                notify_requester(interaction, &ready).await;
                AskOutcome::Answered(thread)
            }
        };

        drop(guard);
        self.release_if_closed(thread);
        outcome
    }

    pub async fn follow_up(
        &self,
        messenger: &dyn ThreadMessenger,
        message: &IncomingMessage
    ) -> FollowUpOutcome {
        if message.author_is_self {
            return FollowUpOutcome::Ignored(IgnoreReason::OwnMessage);
        }
        if message.author_is_bot {
            debug!("Ignoring bot message in channel {}", message.channel_id);
            return FollowUpOutcome::Ignored(IgnoreReason::BotAuthor);
        }

        let thread = ThreadId(message.channel_id);
        if !self.store.contains(thread) {
            return FollowUpOutcome::Ignored(IgnoreReason::UnknownThread);
        }

        let guard = self.locks.acquire(thread).await;
        let outcome = self.answer_follow_up(messenger, thread, message).await;
        drop(guard);
        self.release_if_closed(thread);
        outcome
    }

    async fn answer_follow_up(
        &self,
        messenger: &dyn ThreadMessenger,
        thread: ThreadId,
        message: &IncomingMessage
    ) -> FollowUpOutcome {
        // Re-read under the lock: the thread may have closed while we waited.
        let Some(mut history) = self.store.get(thread) else {
            return FollowUpOutcome::Ignored(IgnoreReason::UnknownThread);
        };

        let checkpoint = history.len();
        history.push_user(follow_up_turn(&message.author_label, &message.content));
        let snapshot = history.clone();
        self.store.update(thread, move |stored| {
            *stored = snapshot;
        });

        let result = {
            let _typing = messenger.start_typing(thread);
            self.gateway.complete(&history).await
        };

        match result {
            Err(e) => {
                self.store.update(thread, |stored| stored.rollback_to(checkpoint));
                error!("Failed to continue conversation in thread {}: {}", thread, error_chain(&e));
                send_or_log(messenger, thread, FOLLOW_UP_FAILURE).await;
                FollowUpOutcome::RolledBack
            }
            Ok(reply) => {
                self.store.update(thread, |stored| stored.push_assistant(reply.as_str()));
                if reply.is_empty() {
                    warn!("Empty completion for thread {}", thread);
                    send_or_log(messenger, thread, EMPTY_REPLY).await;
                } else {
                    send_or_log(messenger, thread, &reply).await;
                }
                FollowUpOutcome::Answered
            }
        }
    }

    pub async fn thread_closed(&self, thread: ThreadId) {
        let guard = self.locks.acquire(thread).await;
        let existed = self.store.delete(thread);
        drop(guard);
        self.locks.prune(thread);
        if existed {
            info!("Thread {} closed; conversation discarded", thread);
        }
    }

    fn release_if_closed(&self, thread: ThreadId) {
        if !self.store.contains(thread) {
            self.locks.prune(thread);
        }
    }
}

#[async_trait]
impl EventListener for ConversationController {
    async fn on_event(&self, event: &BotEvent, messenger: &dyn ThreadMessenger) {
        match event {
            BotEvent::Ask { interaction, prompt } => {
                self.new_question(messenger, interaction.as_ref(), prompt).await;
            }
            BotEvent::ThreadMessage(message) => {
                self.follow_up(messenger, message).await;
            }
            BotEvent::ThreadClosed(thread) => {
                self.thread_closed(*thread).await;
            }
        }
    }
}

async fn send_or_log(messenger: &dyn ThreadMessenger, thread: ThreadId, text: &str) {
    if let Err(e) = messenger.send(thread, text).await {
        error!("Failed to send message to thread {}: {}", thread, e);
    }
}

async fn notify_requester(interaction: &dyn AskInteraction, text: &str) {
    if let Err(e) = interaction.followup_ephemeral(text).await {
        warn!("Failed to send ephemeral follow-up: {}", e);
    }
}
