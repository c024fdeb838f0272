//! Chat room page (`/chats/{id}`).

use crate::api::{Identity, Message, ResourceApi};
use crate::core::error::{AppError, AppResult};
use crate::session::{AppContext, Session};

/// Page parameter that may carry the already-known match as JSON
pub const MATCH_PARAM: &str = "match";

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRoomView {
    pub chat_id: i64,
    pub match_user: Identity,
    pub messages: Vec<Message>,
}

/// Loads the match and the message history concurrently.
///
/// When `known_match` is given (see [`known_match_from_query`]) the member
/// lookup is skipped entirely.
pub async fn load_chat_room(ctx: &AppContext, chat_id: i64, known_match: Option<Identity>) -> AppResult<ChatRoomView> {
    let session = ctx.session()?;
    let api = ctx.api();

    let (match_user, messages) = tokio::try_join!(
        resolve_match(api, &session, chat_id, known_match),
        api.get_chat_messages(chat_id, session.credential()),
    )?;

    Ok(ChatRoomView {
        chat_id,
        match_user,
        messages,
    })
}

async fn resolve_match(
    api: &dyn ResourceApi,
    session: &Session,
    chat_id: i64,
    known_match: Option<Identity>,
) -> AppResult<Identity> {
    if let Some(known) = known_match {
        return Ok(known);
    }

    let members = api.get_chat_members(chat_id, session.credential()).await?;
    if !members.iter().any(|member| member.user_id == session.user_id()) {
        tracing::warn!(chat_id, members = members.len(), "Current user is not a member of the chat");
        return Err(AppError::NotFound("No match found".to_string()));
    }
    let match_id = members
        .iter()
        .find(|member| member.user_id != session.user_id())
        .map(|member| member.user_id.clone())
        .ok_or_else(|| {
            tracing::warn!(chat_id, members = members.len(), "Chat has no member besides the current user");
            AppError::NotFound("No match found".to_string())
        })?;

    api.get_user(&match_id, session.credential())
        .await?
        .found_or("No match found")
}

/// Extracts the `match` page parameter from a query string.
///
/// Returns `None` when the parameter is missing or is not a valid profile.
pub fn known_match_from_query(query: &str) -> Option<Identity> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let raw = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == MATCH_PARAM)
        .map(|(_, value)| value.into_owned())?;

    serde_json::from_str(&raw).ok().or_else(|| {
        // Some links encode the JSON twice.
        let decoded = urlencoding::decode(&raw).ok()?;
        serde_json::from_str(&decoded).ok()
    })
}
