//! Channel-level stand-up configuration: who gets asked what, and where
//! the summaries go.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::standup::StandupError;

/// A channel's stand-up setting. Build it with [`Setting::new`] so the
/// question and member lists are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub channel_id: String,
    pub questions: Vec<String>,
    pub member_ids: Vec<String>,
    pub summary_channel_id: String,
}

/// The part of a setting that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    Channel,
    Questions,
    Members,
    SummaryChannel,
}

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct InvalidSetting {
    pub field: SettingField,
    pub reason: &'static str,
}

impl InvalidSetting {
    fn new(field: SettingField, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

impl From<InvalidSetting> for StandupError {
    fn from(e: InvalidSetting) -> Self {
        StandupError::InvalidSetting(e.reason.to_string())
    }
}

impl Setting {
    /// Trims every entry, drops blank ones and duplicate members.
    pub fn new(
        channel_id: impl Into<String>,
        questions: impl IntoIterator<Item = impl AsRef<str>>,
        member_ids: impl IntoIterator<Item = impl AsRef<str>>,
        summary_channel_id: impl Into<String>,
    ) -> Result<Self, InvalidSetting> {
        let channel_id: String = channel_id.into();
        let channel_id = channel_id.trim().to_string();
        let summary_channel_id: String = summary_channel_id.into();
        let summary_channel_id = summary_channel_id.trim().to_string();
        if channel_id.is_empty() {
            return Err(InvalidSetting::new(SettingField::Channel, "channel id is empty"));
        }
        if summary_channel_id.is_empty() {
            return Err(InvalidSetting::new(
                SettingField::SummaryChannel,
                "summary channel id is empty",
            ));
        }

        let questions = clean(questions);
        if questions.is_empty() {
            return Err(InvalidSetting::new(
                SettingField::Questions,
                "at least one question is required",
            ));
        }

        let mut members: Vec<String> = Vec::new();
        for id in clean(member_ids) {
            if !members.contains(&id) {
                members.push(id);
            }
        }
        if members.is_empty() {
            return Err(InvalidSetting::new(
                SettingField::Members,
                "at least one member is required",
            ));
        }

        Ok(Self {
            channel_id,
            questions,
            member_ids: members,
            summary_channel_id,
        })
    }

    /// Build from the configuration dialog, where questions and members
    /// are one per line. The summary channel doubles as the key.
    pub fn from_submission(
        questions: &str,
        member_ids: &str,
        summary_channel_id: &str,
    ) -> Result<Self, InvalidSetting> {
        Self::new(
            summary_channel_id,
            questions.lines(),
            member_ids.lines(),
            summary_channel_id,
        )
    }
}

fn clean(items: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Where settings live. Whole-value reads and writes keyed by channel.
#[async_trait]
pub trait SettingStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> Result<Option<Setting>>;
    async fn put(&self, setting: &Setting) -> Result<()>;
}
