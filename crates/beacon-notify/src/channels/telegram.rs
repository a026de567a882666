use super::check_response;
use crate::error::Result;
use serde_json::json;

/// Characters that carry meaning in Telegram's MarkdownV2 and must be
/// backslash-escaped in literal text.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Chat-bot delivery through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(client: reqwest::Client, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    /// Bold title, blank line, message. Both parts are escaped.
    pub fn render_text(title: &str, message: &str) -> String {
        format!(
            "*{}*\n\n{}",
            escape_markdown(title),
            escape_markdown(message)
        )
    }

    pub async fn send(&self, title: &str, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": Self::render_text(title, message),
            "parse_mode": "MarkdownV2",
        });

        let resp = self.client.post(&url).json(&payload).send().await?;
        check_response("telegram", resp).await?;
        tracing::debug!(chat_id = %self.chat_id, "Telegram message sent");
        Ok(())
    }
}

pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_special_character() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown("v1.2.0!"), "v1\\.2\\.0\\!");
        assert_eq!(escape_markdown("[x](y)"), "\\[x\\]\\(y\\)");
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[test]
    fn render_text_bolds_escaped_title() {
        let text = TelegramChannel::render_text("Event: sign-up", "3 occurrence(s).");
        assert_eq!(text, "*Event: sign\\-up*\n\n3 occurrence\\(s\\)\\.");
    }
}
