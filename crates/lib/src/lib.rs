//! Zara core library: session store, backend gateway, conversation and chat-list
//! controllers, and a local mock backend. Used by the `zara` CLI.

pub mod api;
pub mod auth;
pub mod chats;
pub mod config;
pub mod conversation;
pub mod init;
pub mod prefs;
pub mod reply;
pub mod scroll;
pub mod server;
pub mod session;
pub mod upload;

#[cfg(test)]
mod testing;
