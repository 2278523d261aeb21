use crate::events::ListenerTable;
use crate::history::ConversationStore;
use crate::platform::discord::{ intents, DiscordHandler };
use log::info;
use serenity::Client;
use std::error::Error;
use std::sync::Arc;

pub struct Bot {
    token: String,
    events: Arc<ListenerTable>,
    store: Arc<ConversationStore>,
}

impl Bot {
    pub fn new(token: String, events: Arc<ListenerTable>, store: Arc<ConversationStore>) -> Self {
        Self { token, events, store }
    }

    /// Connects to the gateway and serves events until the connection ends or
    /// Ctrl-C is received. Conversations are dropped on the way out.
    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let handler = DiscordHandler::new(self.events.clone());
        let mut client = Client::builder(&self.token, intents()).event_handler(handler).await?;
        let shard_manager = client.shard_manager.clone();

        let result = tokio::select! {
            res = client.start() => res.map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, closing gateway connection");
                shard_manager.shutdown_all().await;
                Ok(())
            }
        };

        info!("Discarding {} open conversation(s)", self.store.len());
        self.store.clear();
        result
    }
}
