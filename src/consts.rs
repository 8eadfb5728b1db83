//! Project-wide constants.

use std::path::PathBuf;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");

/// Reply that abandons the day's stand-up.
pub const CANCEL_KEYWORD: &str = "cancel";

/// Answer text stored in every slot of a cancelled stand-up.
pub const CANCEL_MARKER: &str = "none";

/// Direct message sent to a member after cancelling.
pub const CANCEL_ACK: &str = "Stand-up canceled.";

/// Posted in the channel after the setting dialog is submitted.
pub const SETTING_FINISHED: &str = "Setting finished";

/// Callback id of the configuration dialog.
pub const SETTING_CALLBACK_ID: &str = "setting";

pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Default database path: `~/.standup/standup.db`.
/// Single DB for settings and stand-up records.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".standup")
        .join("standup.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_are_non_empty() {
        assert!(!AUTHOR.is_empty());
        assert!(!HOMEPAGE.is_empty());
        assert!(!CANCEL_KEYWORD.is_empty());
        assert!(!CANCEL_MARKER.is_empty());
    }

    #[test]
    fn keyword_and_marker_differ() {
        // A stored marker must never read back as a fresh cancel request.
        assert_ne!(CANCEL_KEYWORD, CANCEL_MARKER);
    }

    #[test]
    fn default_db_path_ends_with_standup_db() {
        let path = default_db_path();
        assert!(path.ends_with(".standup/standup.db"));
    }
}
