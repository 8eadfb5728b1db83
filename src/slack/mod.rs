//! Everything the bot needs from Slack, behind two traits.
//!
//! [`Messenger`] delivers messages and dialogs, [`Directory`] answers
//! questions about users. [`client::SlackClient`] talks to the Web API;
//! [`mock::MockSlack`] stands in for it in tests.

pub mod client;
pub mod dialog;
pub mod events;
pub mod mock;
pub mod signature;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use dialog::Dialog;

use crate::standup::Field;

/// The bits of a user profile that show up on a summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub image_32: String,
}

/// A rendered stand-up summary: who answered, and what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub author_name: String,
    pub author_icon: String,
    pub fields: Vec<Field>,
}

impl Summary {
    pub fn new(profile: &Profile, fields: Vec<Field>) -> Self {
        Self {
            author_name: profile.real_name.clone(),
            author_icon: profile.image_32.clone(),
            fields,
        }
    }
}

/// Outbound messages. Every send returns the message timestamp Slack
/// assigned, which is also the handle for later edits.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Private message to a member.
    async fn send_direct(&self, user_id: &str, text: &str) -> Result<String>;

    /// Plain text into a channel.
    async fn post_text(&self, channel_id: &str, text: &str) -> Result<String>;

    async fn post(&self, channel_id: &str, summary: &Summary) -> Result<String>;

    /// Edit a message posted earlier with [`Messenger::post`].
    async fn update(&self, channel_id: &str, ts: &str, summary: &Summary) -> Result<()>;

    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<()>;
}

/// User lookups.
#[async_trait]
pub trait Directory: Send + Sync {
    /// IANA timezone name, e.g. `Asia/Tokyo`.
    async fn timezone(&self, user_id: &str) -> Result<String>;

    async fn profile(&self, user_id: &str) -> Result<Profile>;

    /// The bot's own user id, used to drop echoes of its own messages.
    async fn bot_user_id(&self) -> Result<String>;
}
