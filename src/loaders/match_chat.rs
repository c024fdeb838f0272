//! "Open a chat with a match" page (`/users/{match_id}/chat`).

use crate::api::{Identity, Lookup};
use crate::core::error::AppResult;
use crate::session::AppContext;

/// What the match-chat page should show.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchChatView {
    /// A chat with this match already exists; navigate to it
    Redirect { chat_id: i64, location: String },
    /// No chat yet; offer to start one with this match
    StartChat { match_user: Identity },
}

/// Resolves the existing chat with `match_id`, or falls back to the match's
/// profile when there is none. Only "no chat yet" is absorbed; every other
/// failure propagates.
pub async fn load_match_chat(ctx: &AppContext, match_id: &str) -> AppResult<MatchChatView> {
    let session = ctx.session()?;
    let api = ctx.api();

    match api.get_chat_by_match_id(match_id, session.credential()).await? {
        Lookup::Found(chat) => {
            tracing::debug!(chat_id = chat.id, "Chat with match exists, redirecting");
            Ok(MatchChatView::Redirect {
                chat_id: chat.id,
                location: chat.location(),
            })
        }
        Lookup::NotFound => {
            let match_user = api
                .get_user(match_id, session.credential())
                .await?
                .found_or("User not found")?;
            Ok(MatchChatView::StartChat { match_user })
        }
    }
}

/// Creates the chat with `match_id` and returns where to navigate.
pub async fn start_chat(ctx: &AppContext, match_id: &str) -> AppResult<MatchChatView> {
    let session = ctx.session()?;
    let chat = ctx.api().create_chat(match_id, session.credential()).await?;
    tracing::info!(chat_id = chat.id, "Chat created");
    Ok(MatchChatView::Redirect {
        chat_id: chat.id,
        location: chat.location(),
    })
}
