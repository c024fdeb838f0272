//! Page data loaders: combine resource calls into page view models

pub mod chat_room;
pub mod match_chat;

pub use chat_room::{known_match_from_query, load_chat_room, ChatRoomView};
pub use match_chat::{load_match_chat, start_chat, MatchChatView};
