use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::models::thread::ThreadId;
use crate::platform::{ AskInteraction, IncomingMessage, ThreadMessenger };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ask,
    ThreadMessage,
    ThreadClosed,
}

/// Platform events, already translated out of the gateway's types.
pub enum BotEvent {
    Ask {
        interaction: Arc<dyn AskInteraction>,
        prompt: String,
    },
    ThreadMessage(IncomingMessage),
    ThreadClosed(ThreadId),
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BotEvent::Ask { .. } => EventKind::Ask,
            BotEvent::ThreadMessage(_) => EventKind::ThreadMessage,
            BotEvent::ThreadClosed(_) => EventKind::ThreadClosed,
        }
    }
}

impl fmt::Debug for BotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotEvent::Ask { interaction, .. } =>
                f
                    .debug_struct("Ask")
                    .field("requester", &interaction.requester().display_name)
                    .finish_non_exhaustive(),
            BotEvent::ThreadMessage(message) =>
                f.debug_tuple("ThreadMessage").field(&message.channel_id).finish(),
            BotEvent::ThreadClosed(thread) => f.debug_tuple("ThreadClosed").field(thread).finish(),
        }
    }
}

#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &BotEvent, messenger: &dyn ThreadMessenger);
}

/// Event kind → listeners, composed once at startup.
#[derive(Default)]
pub struct ListenerTable {
    listeners: HashMap<EventKind, Vec<Arc<dyn EventListener>>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, listener: Arc<dyn EventListener>) -> &mut Self {
        self.listeners.entry(kind).or_default().push(listener);
        self
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Runs every listener for the event's kind, in registration order.
    pub async fn dispatch(&self, event: BotEvent, messenger: &dyn ThreadMessenger) {
        let kind = event.kind();
        match self.listeners.get(&kind) {
            Some(listeners) => {
                for listener in listeners {
                    listener.on_event(&event, messenger).await;
                }
            }
            None => debug!("No listener registered for {:?}", kind),
        }
    }
}
