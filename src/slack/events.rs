//! Events API payloads.
//!
//! Only what the bot reacts to is modelled: the URL verification handshake
//! and `message` events carrying a member's reply or an edit of one.

use serde::Deserialize;

use crate::engine::MemberMessage;

/// Outer envelope of every Events API request.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: Event,
        #[serde(default)]
        event_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    /// The edited message, for `message_changed`.
    #[serde(default)]
    pub message: Option<InnerMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InnerMessage {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

impl Event {
    /// A member's direct message, new or edited. Everything else (other
    /// event types, other subtypes, bot posts, channel chatter) is `None`.
    pub fn into_member_message(self) -> Option<MemberMessage> {
        if self.kind != "message" {
            return None;
        }
        if self.channel_type.as_deref().is_some_and(|t| t != "im") {
            return None;
        }

        match self.subtype.as_deref() {
            None => {
                if self.bot_id.is_some() {
                    return None;
                }
                Some(MemberMessage {
                    user_id: self.user?,
                    text: self.text.unwrap_or_default(),
                    ts: self.ts?,
                    edited: false,
                })
            }
            Some("message_changed") => {
                let message = self.message?;
                if message.bot_id.is_some() {
                    return None;
                }
                Some(MemberMessage {
                    user_id: message.user?,
                    text: message.text.unwrap_or_default(),
                    ts: message.ts?,
                    edited: true,
                })
            }
            Some(_) => None,
        }
    }
}
