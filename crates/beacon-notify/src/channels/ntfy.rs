use super::check_response;
use crate::error::Result;

/// Topic-based push through an ntfy server.
#[derive(Debug, Clone)]
pub struct NtfyChannel {
    client: reqwest::Client,
    server_url: String,
    topic: String,
    token: Option<String>,
}

impl NtfyChannel {
    pub fn new(client: reqwest::Client, server_url: &str, topic: &str, token: Option<String>) -> Self {
        Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            topic: topic.to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn topic_url(&self) -> String {
        format!("{}/{}", self.server_url, self.topic)
    }

    pub async fn send(&self, title: &str, message: &str) -> Result<()> {
        let mut request = self
            .client
            .post(self.topic_url())
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("Title", title)
            .header("Tags", "bell")
            .body(message.to_string());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        check_response("ntfy", resp).await?;
        tracing::debug!(topic = %self.topic, "ntfy message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let channel = NtfyChannel::new(reqwest::Client::new(), "https://ntfy.example.com/", "alerts", None);
        assert_eq!(channel.topic_url(), "https://ntfy.example.com/alerts");
    }

    #[test]
    fn empty_token_is_ignored() {
        let channel = NtfyChannel::new(reqwest::Client::new(), "https://ntfy.sh", "alerts", Some(String::new()));
        assert!(channel.token.is_none());
    }
}
