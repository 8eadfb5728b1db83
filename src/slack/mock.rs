use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{Dialog, Directory, Messenger, Profile, Summary};

/// Something [`MockSlack`] was asked to deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Direct { user_id: String, text: String, ts: String },
    Text { channel_id: String, text: String, ts: String },
    Post { channel_id: String, summary: Summary, ts: String },
    Update { channel_id: String, ts: String, summary: Summary },
    Dialog { trigger_id: String, dialog: Dialog },
}

/// An in-process Slack for tests. Records every delivery, hands out
/// increasing timestamps, and can be told to fail.
pub struct MockSlack {
    default_timezone: String,
    timezones: Mutex<HashMap<String, String>>,
    bot_user_id: String,
    deliveries: Mutex<Vec<Delivery>>,
    next_ts: AtomicU64,
    failing: AtomicBool,
}

impl MockSlack {
    pub fn new(default_timezone: &str) -> Self {
        Self {
            default_timezone: default_timezone.to_string(),
            timezones: Mutex::new(HashMap::new()),
            bot_user_id: "UBOT".to_string(),
            deliveries: Mutex::new(Vec::new()),
            next_ts: AtomicU64::new(1),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_timezone(&self, user_id: &str, timezone: &str) {
        self.timezones
            .lock()
            .unwrap()
            .insert(user_id.to_string(), timezone.to_string());
    }

    /// While set, every delivery fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Texts sent privately to `user_id`, oldest first.
    pub fn directs_to(&self, user_id: &str) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Direct { user_id: to, text, .. } if to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn posts(&self) -> Vec<(String, Summary, String)> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Post { channel_id, summary, ts } => Some((channel_id, summary, ts)),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, String, Summary)> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Update { channel_id, ts, summary } => Some((channel_id, ts, summary)),
                _ => None,
            })
            .collect()
    }

    fn deliver(&self, make: impl FnOnce(String) -> Delivery) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("MockSlack: delivery failed");
        }
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst);
        let ts = format!("1704844800.{n:06}");
        self.deliveries.lock().unwrap().push(make(ts.clone()));
        Ok(ts)
    }
}

#[async_trait]
impl Messenger for MockSlack {
    async fn send_direct(&self, user_id: &str, text: &str) -> Result<String> {
        self.deliver(|ts| Delivery::Direct {
            user_id: user_id.to_string(),
            text: text.to_string(),
            ts,
        })
    }

    async fn post_text(&self, channel_id: &str, text: &str) -> Result<String> {
        self.deliver(|ts| Delivery::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
            ts,
        })
    }

    async fn post(&self, channel_id: &str, summary: &Summary) -> Result<String> {
        self.deliver(|ts| Delivery::Post {
            channel_id: channel_id.to_string(),
            summary: summary.clone(),
            ts,
        })
    }

    async fn update(&self, channel_id: &str, ts: &str, summary: &Summary) -> Result<()> {
        self.deliver(|_| Delivery::Update {
            channel_id: channel_id.to_string(),
            ts: ts.to_string(),
            summary: summary.clone(),
        })?;
        Ok(())
    }

    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<()> {
        self.deliver(|_| Delivery::Dialog {
            trigger_id: trigger_id.to_string(),
            dialog: dialog.clone(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl Directory for MockSlack {
    async fn timezone(&self, user_id: &str) -> Result<String> {
        let timezones = self.timezones.lock().unwrap();
        Ok(timezones
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| self.default_timezone.clone()))
    }

    async fn profile(&self, user_id: &str) -> Result<Profile> {
        Ok(Profile {
            real_name: format!("Member {user_id}"),
            image_32: format!("https://avatars.example/{user_id}_32.png"),
        })
    }

    async fn bot_user_id(&self) -> Result<String> {
        Ok(self.bot_user_id.clone())
    }
}
