use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Dialog, Directory, Messenger, Profile, Summary};
use crate::consts::DEFAULT_SLACK_API_URL;

/// Slack Web API client.
///
/// Messages go out with the bot token. Profile lookups use the user token
/// when one is configured, since `users.profile.get` may need user scopes.
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    user_token: Option<String>,
    bot_user_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct Status {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Posted {
    ts: String,
}

#[derive(Deserialize)]
struct UserInfo {
    user: User,
}

#[derive(Deserialize)]
struct User {
    #[serde(default)]
    tz: Option<String>,
}

#[derive(Deserialize)]
struct ProfileInfo {
    profile: Profile,
}

#[derive(Deserialize)]
struct AuthTest {
    user_id: String,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>, user_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_SLACK_API_URL.to_string(),
            bot_token: bot_token.into(),
            user_token: user_token.filter(|t| !t.is_empty()),
            bot_user_id: OnceCell::new(),
        }
    }

    /// Point the client somewhere other than `https://slack.com/api`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn lookup_token(&self) -> &str {
        self.user_token.as_deref().unwrap_or(&self.bot_token)
    }

    /// JSON POST to a Web API method.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "calling Slack API");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("content-type", "application/json; charset=utf-8")
            .json(body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;
        Self::parse(method, resp).await
    }

    /// GET for read methods that do not accept JSON bodies.
    async fn get<T: DeserializeOwned>(&self, method: &str, token: &str, query: &str) -> Result<T> {
        let url = format!("{}/{}?{}", self.base_url, method, query);
        debug!(method, "calling Slack API");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;
        Self::parse(method, resp).await
    }

    async fn parse<T: DeserializeOwned>(method: &str, resp: reqwest::Response) -> Result<T> {
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Slack API error ({status}) on {method}: {text}");
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("{method} returned invalid JSON"))?;
        let status: Status = serde_json::from_value(value.clone())
            .with_context(|| format!("{method} returned an unexpected payload"))?;
        if !status.ok {
            bail!(
                "Slack API {method} failed: {}",
                status.error.as_deref().unwrap_or("unknown_error")
            );
        }
        serde_json::from_value(value).with_context(|| format!("{method} returned an unexpected payload"))
    }
}

/// Summary as a legacy attachment, one long field per question.
pub(crate) fn summary_attachments(summary: &Summary) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = summary
        .fields
        .iter()
        .map(|f| {
            serde_json::json!({
                "title": f.title,
                "value": f.value,
                "short": false,
            })
        })
        .collect();

    serde_json::json!([{
        "fallback": format!("Stand-up from {}", summary.author_name),
        "author_name": summary.author_name,
        "author_icon": summary.author_icon,
        "fields": fields,
    }])
}

#[async_trait]
impl Messenger for SlackClient {
    async fn send_direct(&self, user_id: &str, text: &str) -> Result<String> {
        self.post_text(user_id, text).await
    }

    async fn post_text(&self, channel_id: &str, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "channel": channel_id,
            "text": text,
            "as_user": true,
        });
        let posted: Posted = self.call("chat.postMessage", &self.bot_token, &body).await?;
        Ok(posted.ts)
    }

    async fn post(&self, channel_id: &str, summary: &Summary) -> Result<String> {
        let body = serde_json::json!({
            "channel": channel_id,
            "attachments": summary_attachments(summary),
            "as_user": true,
        });
        let posted: Posted = self.call("chat.postMessage", &self.bot_token, &body).await?;
        Ok(posted.ts)
    }

    async fn update(&self, channel_id: &str, ts: &str, summary: &Summary) -> Result<()> {
        let body = serde_json::json!({
            "channel": channel_id,
            "ts": ts,
            "attachments": summary_attachments(summary),
            "as_user": true,
        });
        let _: Posted = self.call("chat.update", &self.bot_token, &body).await?;
        Ok(())
    }

    async fn open_dialog(&self, trigger_id: &str, dialog: &Dialog) -> Result<()> {
        let body = serde_json::json!({
            "trigger_id": trigger_id,
            "dialog": dialog,
        });
        let _: Status = self.call("dialog.open", &self.bot_token, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl Directory for SlackClient {
    async fn timezone(&self, user_id: &str) -> Result<String> {
        let info: UserInfo = self
            .get("users.info", self.lookup_token(), &format!("user={user_id}"))
            .await?;
        match info.user.tz {
            Some(tz) if !tz.is_empty() => Ok(tz),
            _ => bail!("user {user_id} has no timezone"),
        }
    }

    async fn profile(&self, user_id: &str) -> Result<Profile> {
        let info: ProfileInfo = self
            .get("users.profile.get", self.lookup_token(), &format!("user={user_id}"))
            .await?;
        Ok(info.profile)
    }

    async fn bot_user_id(&self) -> Result<String> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let auth: AuthTest = self
                    .call("auth.test", &self.bot_token, &serde_json::json!({}))
                    .await?;
                Ok::<_, anyhow::Error>(auth.user_id)
            })
            .await?;
        Ok(id.clone())
    }
}
