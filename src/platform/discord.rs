use async_trait::async_trait;
use log::{ debug, error, info };
use once_cell::sync::OnceCell;
use serenity::all::{
    AutoArchiveDuration,
    ChannelId,
    ChannelType,
    Command,
    CommandDataOptionValue,
    CommandInteraction,
    CommandOptionType,
    Context,
    CreateCommand,
    CreateCommandOption,
    CreateInteractionResponse,
    CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage,
    CreateThread,
    EventHandler,
    GatewayIntents,
    GuildChannel,
    Http,
    Interaction,
    Mentionable,
    Message,
    MessageId,
    PartialGuildChannel,
    Ready,
    ThreadMembersUpdateEvent,
    UserId,
};
use std::sync::Arc;

use super::{
    split_message,
    AskInteraction,
    IncomingMessage,
    InvocationChannel,
    Requester,
    SeedMessage,
    ThreadMessenger,
    ThreadSpec,
    TypingGuard,
    MESSAGE_LIMIT,
};
use crate::error::PlatformError;
use crate::events::{ BotEvent, ListenerTable };
use crate::models::thread::ThreadId;

pub const ASK_COMMAND: &str = "ask";
pub const ASK_DESCRIPTION: &str = "Ask the assistant a question in a dedicated thread.";
const PROMPT_OPTION: &str = "prompt";

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

pub fn ask_command() -> CreateCommand {
    CreateCommand::new(ASK_COMMAND)
        .description(ASK_DESCRIPTION)
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, PROMPT_OPTION, "Your question")
                .required(true)
        )
}

pub fn archive_duration(minutes: u16) -> AutoArchiveDuration {
    match minutes {
        1440 => AutoArchiveDuration::OneDay,
        4320 => AutoArchiveDuration::ThreeDays,
        10080 => AutoArchiveDuration::OneWeek,
        _ => AutoArchiveDuration::OneHour,
    }
}

/// Threads can be opened from guild text and announcement channels only.
fn invocation_channel(
    in_guild: bool,
    kind: Option<ChannelType>,
    channel_id: ChannelId
) -> InvocationChannel {
    match (in_guild, kind) {
        (true, Some(ChannelType::Text | ChannelType::News)) => {
            InvocationChannel::GuildText(channel_id.get())
        }
        _ => InvocationChannel::Other,
    }
}

pub struct DiscordMessenger {
    http: Arc<Http>,
}

impl DiscordMessenger {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ThreadMessenger for DiscordMessenger {
    async fn create_thread(
        &self,
        seed: SeedMessage,
        spec: &ThreadSpec
    ) -> Result<ThreadId, PlatformError> {
        let builder = CreateThread::new(spec.name.clone())
            .auto_archive_duration(archive_duration(spec.auto_archive_minutes))
            .audit_log_reason(&spec.reason);
        let thread = ChannelId::new(seed.channel_id).create_thread_from_message(
            &self.http,
            MessageId::new(seed.message_id),
            builder
        ).await?;
        Ok(ThreadId(thread.id.get()))
    }

    async fn send(&self, thread: ThreadId, text: &str) -> Result<(), PlatformError> {
        let channel = ChannelId::new(thread.get());
        for chunk in split_message(text, MESSAGE_LIMIT) {
            channel.say(&self.http, chunk).await?;
        }
        Ok(())
    }

    fn start_typing(&self, thread: ThreadId) -> TypingGuard {
        Box::new(ChannelId::new(thread.get()).start_typing(&self.http))
    }
}

pub struct DiscordAskInteraction {
    http: Arc<Http>,
    command: CommandInteraction,
    requester: Requester,
}

impl DiscordAskInteraction {
    pub fn new(http: Arc<Http>, command: CommandInteraction) -> Self {
        let display_name = command.member
            .as_ref()
            .map(|member| member.display_name().to_string())
            .unwrap_or_else(|| command.user.display_name().to_string());
        let requester = Requester {
            mention: command.user.mention().to_string(),
            display_name,
        };
        Self { http, command, requester }
    }

    pub fn prompt(&self) -> String {
        self.command.data.options
            .iter()
            .find(|option| option.name == PROMPT_OPTION)
            .and_then(|option| match &option.value {
                CommandDataOptionValue::String(value) => Some(value.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AskInteraction for DiscordAskInteraction {
    fn requester(&self) -> &Requester {
        &self.requester
    }

    fn channel(&self) -> InvocationChannel {
        let kind = self.command.channel.as_ref().map(|channel| channel.kind);
        invocation_channel(self.command.guild_id.is_some(), kind, self.command.channel_id)
    }

    async fn reject(&self, text: &str) -> Result<(), PlatformError> {
        let message = CreateInteractionResponseMessage::new().content(text).ephemeral(true);
        self.command.create_response(
            &self.http,
            CreateInteractionResponse::Message(message)
        ).await?;
        Ok(())
    }

    async fn defer(&self) -> Result<(), PlatformError> {
        self.command.defer(&self.http).await?;
        Ok(())
    }

    async fn post_seed(&self, text: &str) -> Result<SeedMessage, PlatformError> {
        let message = self.command.create_followup(
            &self.http,
            CreateInteractionResponseFollowup::new().content(text)
        ).await?;
        Ok(SeedMessage {
            channel_id: message.channel_id.get(),
            message_id: message.id.get(),
        })
    }

    async fn followup_ephemeral(&self, text: &str) -> Result<(), PlatformError> {
        self.command.create_followup(
            &self.http,
            CreateInteractionResponseFollowup::new().content(text).ephemeral(true)
        ).await?;
        Ok(())
    }
}

/// Translates gateway callbacks into [`BotEvent`]s for the listener table.
pub struct DiscordHandler {
    events: Arc<ListenerTable>,
    bot_user: OnceCell<UserId>,
}

impl DiscordHandler {
    pub fn new(events: Arc<ListenerTable>) -> Self {
        Self { events, bot_user: OnceCell::new() }
    }

    async fn dispatch(&self, ctx: &Context, event: BotEvent) {
        let messenger = DiscordMessenger::new(ctx.http.clone());
        self.events.dispatch(event, &messenger).await;
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let _ = self.bot_user.set(ready.user.id);
        info!("Logged in as {} ({})", ready.user.name, ready.user.id);

        match Command::set_global_commands(&ctx.http, vec![ask_command()]).await {
            Ok(commands) => info!("Slash commands synced ({} registered)", commands.len()),
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        if command.data.name != ASK_COMMAND {
            debug!("Ignoring unknown command /{}", command.data.name);
            return;
        }

        let ask = DiscordAskInteraction::new(ctx.http.clone(), command);
        let prompt = ask.prompt();
        self.dispatch(&ctx, BotEvent::Ask { interaction: Arc::new(ask), prompt }).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let author_is_self = self.bot_user.get().is_some_and(|id| *id == msg.author.id);
        let author_label = msg.member
            .as_ref()
            .and_then(|member| member.nick.clone())
            .unwrap_or_else(|| msg.author.display_name().to_string());
        let incoming = IncomingMessage {
            channel_id: msg.channel_id.get(),
            author_is_self,
            author_is_bot: msg.author.bot,
            author_label,
            content: msg.content,
        };
        self.dispatch(&ctx, BotEvent::ThreadMessage(incoming)).await;
    }

    async fn thread_delete(
        &self,
        ctx: Context,
        thread: PartialGuildChannel,
        _full_thread_data: Option<GuildChannel>
    ) {
        self.dispatch(&ctx, BotEvent::ThreadClosed(ThreadId(thread.id.get()))).await;
    }

    async fn thread_members_update(&self, ctx: Context, update: ThreadMembersUpdateEvent) {
        let Some(me) = self.bot_user.get() else {
            return;
        };
        if update.removed_member_ids.contains(me) {
            debug!("Removed from thread {}", update.id);
            self.dispatch(&ctx, BotEvent::ThreadClosed(ThreadId(update.id.get()))).await;
        }
    }
}
