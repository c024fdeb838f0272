use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use twachat::api::{ApiClient, ResourceApi};
use twachat::cli::{Cli, Commands};
use twachat::core::{init_logger, ClientConfig};
use twachat::loaders::{known_match_from_query, load_chat_room, load_match_chat, start_chat, MatchChatView};
use twachat::realtime::{ChannelManager, ClientCommand, ServerEvent};
use twachat::session::{AppContext, Bootstrapper, SessionState, Supervisor, SupervisorHandle};
use twachat::telegram::{EnvInitData, IdentityProvider, StaticInitData};

/// Entry point
///
/// Parses CLI arguments and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if configuration, bootstrap or the command itself fails.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    let cli = Cli::parse_args();
    init_logger(cli.log_file.as_deref())?;

    let config = ClientConfig::load_from(&cli.config).context("Failed to load configuration")?;
    let provider = Arc::new(match cli.init_data.clone() {
        Some(raw) => IdentityProvider::new(StaticInitData::new(raw)),
        None => IdentityProvider::new(EnvInitData::new()),
    });

    if let Commands::Verify {
        bot_token,
        max_age_secs,
    } = &cli.command
    {
        let credential = provider.credential()?;
        credential
            .decode()
            .verify(bot_token, max_age_secs.map(Duration::from_secs))?;
        println!("init data OK (user id: {:?})", credential.decode().user_id());
        return Ok(());
    }

    let api: Arc<dyn ResourceApi> = Arc::new(ApiClient::new(&config)?);
    let bootstrapper = Bootstrapper::new(provider, api);
    let channels = ChannelManager::new(&config)?;

    let (ctx, handle) = match Supervisor::launch(bootstrapper, channels).await {
        Ok(launched) => launched,
        Err(err) if err.is_fatal() => {
            tracing::error!("{}", err);
            eprintln!("Open the app through Telegram: {}", err);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let outcome = run_command(cli.command, &ctx, &handle).await;
    handle.stop().await;
    outcome
}

async fn run_command(command: Commands, ctx: &AppContext, handle: &SupervisorHandle) -> Result<()> {
    match command {
        Commands::Whoami => {
            let session = ctx.session()?;
            print_json(session.identity())?;
        }
        Commands::Chat { match_id } => match load_match_chat(ctx, &match_id).await? {
            MatchChatView::Redirect { location, .. } => println!("redirect: {}", location),
            MatchChatView::StartChat { match_user } => {
                println!("no chat yet, start one with:");
                print_json(&match_user)?;
            }
        },
        Commands::StartChat { match_id } => {
            if let MatchChatView::Redirect { location, .. } = start_chat(ctx, &match_id).await? {
                println!("redirect: {}", location);
            }
        }
        Commands::Room { chat_id, query } => {
            let known = query.as_deref().and_then(known_match_from_query);
            match load_chat_room(ctx, chat_id, known).await {
                Ok(view) => {
                    println!("chat {} with {}", view.chat_id, view.match_user.name);
                    for message in view.messages {
                        println!("[{}] {}: {}", message.created_at, message.user_id, message.text);
                    }
                }
                Err(err) if err.is_not_found() => println!("not found: {}", err),
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Chats => {
            let session = ctx.session()?;
            let chats = ctx.api().list_chats(session.credential()).await?;
            print_json(&chats)?;
        }
        Commands::DeleteChat { chat_id } => {
            let session = ctx.session()?;
            ctx.api().delete_chat(chat_id, session.credential()).await?;
            println!("chat {} deleted", chat_id);
        }
        Commands::Send { chat_id, text } => {
            handle.send(ClientCommand::NewMessage { chat_id, text }).await?;
            println!("sent");
        }
        Commands::Listen => listen(ctx, handle).await?,
        Commands::Verify { .. } => {}
    }
    Ok(())
}

/// Prints realtime events until Ctrl+C or an unrecoverable session failure.
async fn listen(ctx: &AppContext, handle: &SupervisorHandle) -> Result<()> {
    let mut events = handle.subscribe();
    let mut state = ctx.watch();
    tracing::info!("Listening for realtime events, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ServerEvent::NewMessage(message)) => println!("[chat {}] {}: {}", message.chat_id, message.user_id, message.text),
                Ok(ServerEvent::NewChat(chat)) => println!("new chat: {}", chat.location()),
                Ok(ServerEvent::Unknown(raw)) => println!("unknown event: {}", raw),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Skipped {} realtime events", skipped),
                Err(RecvError::Closed) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                match current {
                    SessionState::Failed(reason) => anyhow::bail!("session lost: {}", reason),
                    SessionState::Active(session) => tracing::info!(user_id = %session.user_id(), "Session active"),
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
