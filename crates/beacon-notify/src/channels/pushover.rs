use super::check_response;
use crate::error::Result;

/// Push delivery to a single Pushover user key.
#[derive(Debug, Clone)]
pub struct PushoverChannel {
    client: reqwest::Client,
    api_base: String,
    user_key: String,
    app_token: String,
}

impl PushoverChannel {
    pub fn new(client: reqwest::Client, api_base: &str, user_key: &str, app_token: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            user_key: user_key.to_string(),
            app_token: app_token.to_string(),
        }
    }

    pub async fn send(&self, title: &str, message: &str) -> Result<()> {
        let url = format!("{}/1/messages.json", self.api_base);
        let form = [
            ("token", self.app_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", title),
            ("message", message),
        ];

        let resp = self.client.post(&url).form(&form).send().await?;
        check_response("pushover", resp).await?;
        tracing::debug!("Pushover message sent");
        Ok(())
    }
}
