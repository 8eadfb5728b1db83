//! The per-member, per-day stand-up record and its progression rules.
//!
//! Operations here only touch the in-memory [`Standup`]. Callers read the
//! record from a [`StandupStore`](crate::store::StandupStore), apply one
//! operation and replace the whole record.

pub mod day;
mod error;

pub use error::StandupError;

use serde::{Deserialize, Serialize};

use crate::consts::{CANCEL_KEYWORD, CANCEL_MARKER};

/// A question snapshotted from the channel setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    /// Timestamp of the direct message that carried the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            posted_at: None,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.posted_at.is_some()
    }
}

/// A member's reply. `posted_at` is the timestamp of the member's message
/// and identifies the answer when the message is edited later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
}

impl Answer {
    pub fn new(text: impl Into<String>, posted_at: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            posted_at: Some(posted_at.into()),
        }
    }

    fn cancelled() -> Self {
        Self {
            text: CANCEL_MARKER.to_string(),
            posted_at: None,
        }
    }

    /// Markers never carry a message timestamp, so a member who literally
    /// answers "none" is not mistaken for a cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.posted_at.is_none() && self.text == CANCEL_MARKER
    }
}

/// One question/answer pair of the public summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
}

/// What the finalizer wants the messenger to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryAction {
    /// Every answer is a cancellation marker. Nothing to post.
    Skip,
    /// First completion: post a new summary.
    Post(Vec<Field>),
    /// Already posted at `ts`: edit that message in place.
    Update { ts: String, fields: Vec<Field> },
}

/// Result of appending a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Answered { index: usize },
    /// The same message was already recorded at `index` (a redelivery).
    Duplicate { index: usize },
    Cancelled,
}

/// Returns true when a reply asks to abandon the run.
pub fn is_cancel_keyword(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(CANCEL_KEYWORD)
}

/// A member's stand-up for one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standup {
    pub user_id: String,
    /// `YYYY-MM-DD` in the member's own timezone.
    pub date: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    pub target_channel_id: String,
    /// Timestamp of the posted summary message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl Standup {
    /// A fresh record: nothing sent, nothing answered.
    pub fn new(
        user_id: impl Into<String>,
        date: impl Into<String>,
        questions: &[String],
        target_channel_id: impl Into<String>,
    ) -> Result<Self, StandupError> {
        if questions.is_empty() {
            return Err(StandupError::InvalidSetting(
                "a stand-up needs at least one question".to_string(),
            ));
        }
        Ok(Self {
            user_id: user_id.into(),
            date: date.into(),
            questions: questions.iter().map(Question::new).collect(),
            answers: Vec::new(),
            target_channel_id: target_channel_id.into(),
            finished_at: None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() >= self.questions.len()
    }

    /// Complete, and every slot holds the cancellation marker.
    pub fn is_cancelled(&self) -> bool {
        self.is_complete() && self.answers.iter().all(Answer::is_cancelled)
    }

    /// Fully answered, not cancelled, and the summary has not gone out.
    pub fn needs_summary(&self) -> bool {
        self.is_complete() && !self.is_cancelled() && self.finished_at.is_none()
    }

    pub fn sent_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_sent()).count()
    }

    /// The question that should go out now, if any.
    ///
    /// `None` when everything is answered or when the next question was
    /// already sent and the member has not replied yet.
    pub fn next_question(&self) -> Option<(usize, &str)> {
        let index = self.answers.len();
        let question = self.questions.get(index)?;
        if question.is_sent() {
            return None;
        }
        Some((index, question.text.as_str()))
    }

    /// Record that the question at `index` was delivered. Returns false when
    /// it was already marked, leaving the first timestamp in place.
    pub fn mark_sent(&mut self, index: usize, posted_at: impl Into<String>) -> bool {
        match self.questions.get_mut(index) {
            Some(question) if question.posted_at.is_none() => {
                question.posted_at = Some(posted_at.into());
                true
            }
            _ => false,
        }
    }

    /// Append the member's next reply, or cancel the run if the reply is
    /// the cancellation keyword.
    pub fn record_answer(
        &mut self,
        text: &str,
        posted_at: &str,
    ) -> Result<Recorded, StandupError> {
        if let Some(index) = self
            .answers
            .iter()
            .position(|a| a.posted_at.as_deref() == Some(posted_at))
        {
            return Ok(Recorded::Duplicate { index });
        }
        if self.is_complete() {
            return Err(StandupError::AlreadyComplete);
        }
        if is_cancel_keyword(text) {
            self.cancel()?;
            return Ok(Recorded::Cancelled);
        }

        let index = self.answers.len();
        if !self.questions[index].is_sent() {
            return Err(StandupError::QuestionNotSent { index });
        }
        self.answers.push(Answer::new(text, posted_at));
        Ok(Recorded::Answered { index })
    }

    /// Replace the text of the answer posted at `posted_at`, keeping its
    /// position. Returns that position.
    pub fn amend_answer(&mut self, posted_at: &str, text: &str) -> Result<usize, StandupError> {
        let (index, answer) = self
            .answers
            .iter_mut()
            .enumerate()
            .find(|(_, a)| a.posted_at.as_deref() == Some(posted_at))
            .ok_or_else(|| StandupError::AnswerNotFound(posted_at.to_string()))?;
        answer.text = text.to_string();
        Ok(index)
    }

    /// Abandon the run: every slot becomes the cancellation marker.
    ///
    /// Returns false when the run was already cancelled.
    pub fn cancel(&mut self) -> Result<bool, StandupError> {
        if self.is_cancelled() {
            return Ok(false);
        }
        if self.is_complete() {
            return Err(StandupError::AlreadyComplete);
        }
        self.answers = vec![Answer::cancelled(); self.questions.len()];
        Ok(true)
    }

    /// Question/answer pairs for the summary, markers left out.
    pub fn summary_fields(&self) -> Vec<Field> {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(_, answer)| !answer.is_cancelled())
            .map(|(question, answer)| Field {
                title: question.text.clone(),
                value: answer.text.clone(),
            })
            .collect()
    }

    /// Decide how the summary should be delivered.
    pub fn finalize(&self) -> Result<SummaryAction, StandupError> {
        if !self.is_complete() {
            return Err(StandupError::Incomplete {
                answered: self.answers.len(),
                total: self.questions.len(),
            });
        }

        let fields = self.summary_fields();
        if fields.is_empty() {
            return Ok(SummaryAction::Skip);
        }
        Ok(match &self.finished_at {
            Some(ts) => SummaryAction::Update {
                ts: ts.clone(),
                fields,
            },
            None => SummaryAction::Post(fields),
        })
    }

    /// Remember the posted summary. Happens at most once per record.
    pub fn finish(&mut self, ts: impl Into<String>) -> bool {
        if self.finished_at.is_some() {
            return false;
        }
        self.finished_at = Some(ts.into());
        true
    }
}
