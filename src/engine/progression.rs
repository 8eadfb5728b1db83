use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{Engine, Handled, MemberMessage, Progress, StartReport, delivery, storage};
use crate::consts::CANCEL_ACK;
use crate::setting::Setting;
use crate::slack::Summary;
use crate::standup::{Field, Recorded, Standup, StandupError, SummaryAction, day};

impl Engine {
    /// The member's current calendar date in their own timezone.
    pub async fn today(&self, user_id: &str) -> Result<String, StandupError> {
        let tz = self.directory.timezone(user_id).await.map_err(delivery)?;
        day::local_day(&tz, (self.clock)()).map_err(delivery)
    }

    /// Load the member's record for `day`.
    pub async fn load(&self, user_id: &str, day: &str) -> Result<Standup, StandupError> {
        self.standups
            .get(user_id, day)
            .await
            .map_err(storage)?
            .ok_or_else(|| StandupError::NotFound(format!("stand-up for {user_id} on {day}")))
    }

    /// Make sure the member has exactly one record for `day`.
    ///
    /// Returns the record and whether it already existed. An existing
    /// record is returned untouched.
    pub async fn initialize(
        &self,
        user_id: &str,
        day: &str,
        questions: &[String],
        summary_channel_id: &str,
    ) -> Result<(Standup, bool), StandupError> {
        let fresh = Standup::new(user_id, day, questions, summary_channel_id)?;
        if self.standups.insert(&fresh).await.map_err(storage)? {
            info!(user_id, day, questions = questions.len(), "initialized stand-up");
            return Ok((fresh, false));
        }
        debug!(user_id, day, "stand-up already initialized");
        Ok((self.load(user_id, day).await?, true))
    }

    /// Send the next unsent question, then record that it went out.
    ///
    /// Returns the question text, or `None` when there is nothing to send.
    /// A failed send leaves the record untouched.
    pub async fn advance(&self, standup: &mut Standup) -> Result<Option<String>, StandupError> {
        let Some((index, text)) = standup.next_question() else {
            return Ok(None);
        };
        let text = text.to_string();

        let ts = self
            .messenger
            .send_direct(&standup.user_id, &text)
            .await
            .map_err(delivery)?;

        let mut updated = standup.clone();
        updated.mark_sent(index, ts);
        self.standups.put(&updated).await.map_err(storage)?;
        *standup = updated;

        info!(user_id = %standup.user_id, index, "sent question");
        Ok(Some(text))
    }

    /// Append a reply. The cancellation keyword cancels the run instead,
    /// acknowledging it before the cancelled record is written.
    pub async fn record_answer(
        &self,
        standup: &mut Standup,
        text: &str,
        posted_at: &str,
    ) -> Result<Recorded, StandupError> {
        let mut updated = standup.clone();
        let recorded = updated.record_answer(text, posted_at)?;
        if let Recorded::Duplicate { index } = recorded {
            debug!(user_id = %standup.user_id, index, posted_at, "answer already recorded");
            return Ok(recorded);
        }

        // Acknowledge before writing; a failed send leaves the record open.
        if recorded == Recorded::Cancelled {
            self.acknowledge_cancel(&standup.user_id).await?;
        }
        self.standups.put(&updated).await.map_err(storage)?;
        *standup = updated;

        if recorded != Recorded::Cancelled {
            info!(user_id = %standup.user_id, answered = standup.answers.len(), "recorded answer");
        }
        Ok(recorded)
    }

    /// Replace the text of an answer after the member edited their message.
    pub async fn amend_answer(
        &self,
        standup: &mut Standup,
        posted_at: &str,
        text: &str,
    ) -> Result<usize, StandupError> {
        let mut updated = standup.clone();
        let index = updated.amend_answer(posted_at, text)?;
        self.standups.put(&updated).await.map_err(storage)?;
        *standup = updated;

        info!(user_id = %standup.user_id, index, "amended answer");
        Ok(index)
    }

    /// Abandon the run. Returns false when it was already cancelled, in
    /// which case nothing is written or sent.
    pub async fn cancel(&self, standup: &mut Standup) -> Result<bool, StandupError> {
        let mut updated = standup.clone();
        if !updated.cancel()? {
            return Ok(false);
        }
        self.acknowledge_cancel(&standup.user_id).await?;
        self.standups.put(&updated).await.map_err(storage)?;
        *standup = updated;
        Ok(true)
    }

    async fn acknowledge_cancel(&self, user_id: &str) -> Result<(), StandupError> {
        info!(user_id, "stand-up cancelled");
        self.messenger
            .send_direct(user_id, CANCEL_ACK)
            .await
            .map_err(delivery)?;
        Ok(())
    }

    /// Deliver the summary of a complete stand-up: post it the first time,
    /// edit the posted message afterwards, skip it when cancelled.
    pub async fn finalize(&self, standup: &mut Standup) -> Result<SummaryAction, StandupError> {
        let action = standup.finalize()?;
        match &action {
            SummaryAction::Skip => {
                debug!(user_id = %standup.user_id, "nothing to summarize");
            }
            SummaryAction::Post(fields) => {
                let summary = self.summary(&standup.user_id, fields).await?;
                let ts = self
                    .messenger
                    .post(&standup.target_channel_id, &summary)
                    .await
                    .map_err(delivery)?;

                let mut updated = standup.clone();
                updated.finish(ts);
                self.standups.put(&updated).await.map_err(storage)?;
                *standup = updated;
                info!(user_id = %standup.user_id, channel = %standup.target_channel_id, "posted summary");
            }
            SummaryAction::Update { ts, fields } => {
                let summary = self.summary(&standup.user_id, fields).await?;
                self.messenger
                    .update(&standup.target_channel_id, ts, &summary)
                    .await
                    .map_err(delivery)?;
                info!(user_id = %standup.user_id, ts = %ts, "updated summary");
            }
        }
        Ok(action)
    }

    async fn summary(&self, user_id: &str, fields: &[Field]) -> Result<Summary, StandupError> {
        let profile = self.directory.profile(user_id).await.map_err(delivery)?;
        Ok(Summary::new(&profile, fields.to_vec()))
    }

    /// One re-entrant step: ask the next question while unanswered ones
    /// remain, deliver the summary once everything is answered.
    pub async fn progress(&self, standup: &mut Standup) -> Result<Progress, StandupError> {
        if standup.is_complete() {
            return Ok(Progress::Finalized(self.finalize(standup).await?));
        }

        let next = standup.next_question().map(|(index, _)| index);
        match next {
            Some(index) => match self.advance(standup).await? {
                Some(question) => Ok(Progress::Asked { index, question }),
                None => Ok(Progress::Waiting),
            },
            None => Ok(Progress::Waiting),
        }
    }

    /// Scheduled trigger for a channel: create today's record for every
    /// member and send them their first question.
    ///
    /// Members run independently; one failing does not hold up the rest.
    pub async fn start(&self, channel_id: &str) -> Result<StartReport, StandupError> {
        let setting = self
            .settings
            .get(channel_id)
            .await
            .map_err(storage)?
            .ok_or_else(|| StandupError::NotFound(format!("setting for channel {channel_id}")))?;
        info!(channel_id, members = setting.member_ids.len(), "starting stand-ups");

        let setting = &setting;
        let runs = setting.member_ids.iter().map(|user_id| async move {
            (user_id, self.start_member(setting, user_id).await)
        });

        let mut report = StartReport::default();
        for (user_id, result) in join_all(runs).await {
            match result {
                Ok(false) => report.initialized.push(user_id.clone()),
                Ok(true) => report.existing.push(user_id.clone()),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "failed to start stand-up");
                    report.failed.push((user_id.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Returns whether the member's record already existed.
    async fn start_member(&self, setting: &Setting, user_id: &str) -> Result<bool, StandupError> {
        let day = self.today(user_id).await?;
        let (mut standup, existed) = self
            .initialize(user_id, &day, &setting.questions, &setting.summary_channel_id)
            .await?;

        // A repeated trigger re-sends a question or a summary whose first
        // delivery failed, but leaves finished runs alone.
        if !standup.is_complete() || standup.needs_summary() {
            self.progress(&mut standup).await?;
        }
        Ok(existed)
    }

    /// React to a member's direct message, new or edited.
    ///
    /// Expected refusals (no record today, run already complete, edit of an
    /// unknown message, reply before the question went out) come back as
    /// [`Handled::Ignored`].
    pub async fn handle_message(&self, message: &MemberMessage) -> Result<Handled, StandupError> {
        match self.apply_message(message).await {
            Err(e) if e.is_expected() => {
                debug!(user_id = %message.user_id, reason = %e, "ignored message");
                Ok(Handled::Ignored {
                    reason: e.to_string(),
                })
            }
            other => other,
        }
    }

    async fn apply_message(&self, message: &MemberMessage) -> Result<Handled, StandupError> {
        let day = self.today(&message.user_id).await?;
        let mut standup = self.load(&message.user_id, &day).await?;

        if message.edited {
            let index = self
                .amend_answer(&mut standup, &message.ts, &message.text)
                .await?;
            let progress = self.progress(&mut standup).await?;
            return Ok(Handled::Amended { index, progress });
        }

        match self
            .record_answer(&mut standup, &message.text, &message.ts)
            .await?
        {
            Recorded::Cancelled => Ok(Handled::Cancelled),
            Recorded::Duplicate { index } if standup.is_complete() && !standup.needs_summary() => {
                debug!(user_id = %message.user_id, index, "redelivery after summary");
                Ok(Handled::Ignored {
                    reason: format!("answer {index} already recorded"),
                })
            }
            // A redelivery re-runs the step after the recorded answer.
            Recorded::Answered { index } | Recorded::Duplicate { index } => {
                let progress = self.progress(&mut standup).await?;
                Ok(Handled::Answered { index, progress })
            }
        }
    }
}
