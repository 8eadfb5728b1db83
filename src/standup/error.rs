use thiserror::Error;

/// Everything that can go wrong while moving a stand-up forward.
#[derive(Debug, Error)]
pub enum StandupError {
    /// A record or setting that the trigger refers to does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("stand-up is already complete")]
    AlreadyComplete,

    /// An edit arrived for a message that was never recorded as an answer.
    #[error("no answer was posted at {0}")]
    AnswerNotFound(String),

    /// The member replied before the question at this position went out.
    #[error("question {index} has not been sent yet")]
    QuestionNotSent { index: usize },

    #[error("stand-up is incomplete ({answered} of {total} answered)")]
    Incomplete { answered: usize, total: usize },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("storage failure: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("delivery failure: {0:#}")]
    Delivery(#[source] anyhow::Error),
}

impl StandupError {
    /// Expected refusals. Callers skip these instead of raising an alarm.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            StandupError::NotFound(_)
                | StandupError::AlreadyComplete
                | StandupError::AnswerNotFound(_)
                | StandupError::QuestionNotSent { .. }
        )
    }

    /// Failures that leave the persisted state re-runnable from the trigger.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StandupError::Storage(_) | StandupError::Delivery(_))
    }
}
