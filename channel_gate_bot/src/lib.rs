//! Source code for a bot that hands out a link to people who joined a set of channels.

/// Various types used throughout.
mod types;

/// Startup configuration.
mod config;

/// The database.
mod database;

/// Miscellaneous functions.
mod misc;

/// Asking Telegram who is in a channel.
mod membership;

/// Deciding whether a user has joined everything.
mod evaluator;

/// The admin's "add channel" conversation.
mod intake;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;
