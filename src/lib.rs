pub mod bot;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod history;
pub mod llm;
pub mod models;
pub mod platform;

use bot::Bot;
use cli::Args;
use config::prompt::resolve_system_prompt;
use controller::{ ControllerSettings, ConversationController };
use events::ListenerTable;
use history::ConversationStore;
use llm::chat::CompletionGateway;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let token = args.discord_token()?;
    let llm_config = args.llm_config();
    let defaults = llm_config.default_options();

    info!("--- Core Configuration ---");
    info!("Completion Base URL: {}", args.openai_base_url);
    info!("Completion Model: {}", defaults.model);
    info!("Temperature: {}", defaults.temperature);
    info!("Request Timeout: {:?}", llm_config.request_timeout);
    info!("Thread Auto-Archive: {} minutes", args.thread_archive_minutes);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(none)"));
    if llm_config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; every completion request will fail until it is configured");
    }
    info!("-------------------------");

    let system_prompt = resolve_system_prompt(
        args.prompts_path.as_deref(),
        args.system_prompt.as_deref()
    )?;
    let gateway = CompletionGateway::from_config(&llm_config)?;
    let store = Arc::new(ConversationStore::new());
    let controller = Arc::new(
        ConversationController::new(store.clone(), gateway, ControllerSettings {
            system_prompt,
            archive_minutes: args.thread_archive_minutes,
        })
    );

    let mut events = ListenerTable::new();
    controller.register(&mut events);

    info!("Connecting to Discord");
    Bot::new(token, Arc::new(events), store).run().await
}
