//! Telegram Bot API client

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::types::{ApiResponse, ChatMember, Message, Update};
use crate::config::TelegramConfig;
use crate::domain::{
    ChatId, DomainError, Keyboard, MemberStatus, MessageId, Messenger, TextFormat, UserId,
};

/// HTTP client for the Bot API
///
/// The token is part of every URL, so transport errors are stripped of their
/// URL before they are logged or returned.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(
        token: &str,
        api_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, DomainError> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DomainError::configuration("TELEGRAM_TOKEN is not set"))?;

        Self::new(
            token.trim(),
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Call a Bot API method and unwrap its `result`
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, DomainError> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                DomainError::messenger(format!("{} request failed: {}", method, e.without_url()))
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            DomainError::messenger(format!(
                "{} returned HTTP {} with an unreadable body: {}",
                method,
                status,
                e.without_url()
            ))
        })?;

        if !envelope.ok {
            return Err(DomainError::messenger(format!(
                "{} failed ({}): {}",
                method,
                envelope.error_code.unwrap_or(status.as_u16() as i64),
                envelope.description.unwrap_or_default()
            )));
        }

        envelope
            .result
            .ok_or_else(|| DomainError::messenger(format!("{} returned no result", method)))
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, DomainError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Received updates");
        }
        Ok(updates)
    }
}

fn keyboard_markup(keyboard: &Keyboard) -> serde_json::Value {
    json!({ "inline_keyboard": keyboard.rows })
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, DomainError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if format == TextFormat::Markdown {
            body["parse_mode"] = json!("Markdown");
        }
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }

        let message: Message = self.call("sendMessage", &body).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), DomainError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });

        // Returns the edited message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), DomainError> {
        let mut body = json!({
            "callback_query_id": callback_id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            body["text"] = json!(text);
        }

        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn chat_member_status(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<MemberStatus, DomainError> {
        let body = json!({ "chat_id": chat_id, "user_id": user_id });
        let member: ChatMember = self.call("getChatMember", &body).await?;

        MemberStatus::parse(&member.status).ok_or_else(|| {
            DomainError::messenger(format!("Unknown chat member status '{}'", member.status))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InlineButton;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new("TEST", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_with_keyboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": -100,
                "parse_mode": "Markdown",
                "reply_markup": {"inline_keyboard": [[{"text": "Ana", "callback_data": "k:1"}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 42, "chat": {"id": -100, "type": "group"}, "date": 0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let keyboard = Keyboard::single_column(vec![InlineButton::new("Ana", "k:1")]);
        let id = client
            .send_message(-100, "*Noche*", TextFormat::Markdown, Some(&keyboard))
            .await
            .unwrap();

        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn test_api_error_maps_to_messenger_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/sendMessage"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "ok": false,
                "error_code": 403,
                "description": "Forbidden: bot can't initiate conversation with a user"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .send_message(7, "hola", TextFormat::Plain, None)
            .await
            .unwrap_err();

        match err {
            DomainError::Messenger { message } => {
                assert!(message.contains("403"));
                assert!(message.contains("Forbidden"));
                assert!(!message.contains("TEST"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_updates_sends_offset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/getUpdates"))
            .and(body_partial_json(json!({"offset": 11, "timeout": 30})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [{
                    "update_id": 11,
                    "callback_query": {
                        "id": "cb1",
                        "from": {"id": 7, "first_name": "Ana"},
                        "data": "abc:3"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let updates = client.get_updates(Some(11), 30).await.unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].callback_query.as_ref().unwrap().data.as_deref(),
            Some("abc:3")
        );
    }

    #[tokio::test]
    async fn test_chat_member_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/getChatMember"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"status": "administrator", "user": {"id": 7, "first_name": "Ana"}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let status = client.chat_member_status(-100, 7).await.unwrap();

        assert!(status.is_admin());
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = TelegramConfig::default();
        assert!(matches!(
            TelegramClient::from_config(&config),
            Err(DomainError::Configuration { .. })
        ));
    }
}
