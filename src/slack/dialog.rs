//! The `/standup setting` configuration dialog.

use serde::Serialize;

use crate::consts::SETTING_CALLBACK_ID;
use crate::setting::Setting;

/// A legacy Slack dialog, serialized exactly as `dialog.open` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialog {
    pub callback_id: String,
    pub title: String,
    pub elements: Vec<DialogElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogElement {
    Textarea {
        label: String,
        name: String,
        value: String,
        hint: String,
        placeholder: String,
    },
    Select {
        label: String,
        name: String,
        value: String,
        data_source: String,
        placeholder: String,
    },
}

/// Submission field names.
pub const MEMBERS_FIELD: &str = "user_ids";
pub const QUESTIONS_FIELD: &str = "questions";
pub const TARGET_CHANNEL_FIELD: &str = "target_channel_id";

/// Build the dialog, pre-filled with the channel's current setting.
pub fn setting_dialog(channel_id: &str, current: Option<&Setting>) -> Dialog {
    let (members, questions) = match current {
        Some(s) => (s.member_ids.join("\n"), s.questions.join("\n")),
        None => (String::new(), String::new()),
    };

    Dialog {
        callback_id: SETTING_CALLBACK_ID.to_string(),
        title: "Setting".to_string(),
        elements: vec![
            DialogElement::Textarea {
                label: "Members".to_string(),
                name: MEMBERS_FIELD.to_string(),
                value: members,
                hint: "Please type user ID (not username)".to_string(),
                placeholder: "W012A3CDE\nW034B4FGH".to_string(),
            },
            DialogElement::Textarea {
                label: "Questions".to_string(),
                name: QUESTIONS_FIELD.to_string(),
                value: questions,
                hint: "Please write multiple questions in multiple lines".to_string(),
                placeholder: "What did you do yesterday?\nWhat will you do today?\nAnything blocking your progress?".to_string(),
            },
            DialogElement::Select {
                label: "Target channel".to_string(),
                name: TARGET_CHANNEL_FIELD.to_string(),
                value: channel_id.to_string(),
                data_source: "channels".to_string(),
                placeholder: "Choose a channel".to_string(),
            },
        ],
    }
}
