//! The progression engine: wires the record store, the setting store and
//! Slack together and moves each member's stand-up forward one step at a
//! time.
//!
//! Every entry point is a stateless read → modify → replace cycle against
//! the [`StandupStore`], so any trigger (the daily schedule, a Slack retry,
//! an edited message) can be re-run safely. Guards on the record make
//! sequential repeats harmless. Two truly concurrent triggers for the same
//! member can still race; the last writer wins.

mod progression;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::setting::SettingStore;
use crate::slack::{Directory, Messenger};
use crate::standup::{StandupError, SummaryAction};
use crate::store::StandupStore;

/// A direct message from a member, as the webhook hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMessage {
    pub user_id: String,
    pub text: String,
    /// Slack timestamp of the member's message. Stable across edits.
    pub ts: String,
    pub edited: bool,
}

/// What one progression step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Sent the question at `index`.
    Asked { index: usize, question: String },
    /// The last question is out and unanswered.
    Waiting,
    Finalized(SummaryAction),
}

/// What became of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Answered { index: usize, progress: Progress },
    Amended { index: usize, progress: Progress },
    Cancelled,
    /// Nothing to do: no stand-up today, already complete, unknown edit...
    Ignored { reason: String },
}

/// Per-member outcome of a scheduled start.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StartReport {
    /// Members whose record was created by this run.
    pub initialized: Vec<String>,
    /// Members who already had a record for their day.
    pub existing: Vec<String>,
    /// Members that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Engine {
    settings: Arc<dyn SettingStore>,
    standups: Arc<dyn StandupStore>,
    messenger: Arc<dyn Messenger>,
    directory: Arc<dyn Directory>,
    clock: Clock,
}

impl Engine {
    pub fn new(
        settings: Arc<dyn SettingStore>,
        standups: Arc<dyn StandupStore>,
        messenger: Arc<dyn Messenger>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            settings,
            standups,
            messenger,
            directory,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock. Tests pin "now" with this.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

fn storage(e: anyhow::Error) -> StandupError {
    StandupError::Storage(e)
}

fn delivery(e: anyhow::Error) -> StandupError {
    StandupError::Delivery(e)
}
