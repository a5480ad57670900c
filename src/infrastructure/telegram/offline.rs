use async_trait::async_trait;
use tracing::warn;

use crate::domain::{
    ChatId, DomainError, Keyboard, MemberStatus, MessageId, Messenger, TextFormat, UserId,
};

/// Messenger for the dashboard when no bot token is configured.
/// Every call fails with a messenger error.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineMessenger;

fn offline(method: &str) -> DomainError {
    warn!(method, "Telegram is not configured; message dropped");
    DomainError::messenger("Telegram token is not configured")
}

#[async_trait]
impl Messenger for OfflineMessenger {
    async fn send_message(
        &self,
        _chat_id: ChatId,
        _text: &str,
        _format: TextFormat,
        _keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, DomainError> {
        Err(offline("sendMessage"))
    }

    async fn edit_message(
        &self,
        _chat_id: ChatId,
        _message_id: MessageId,
        _text: &str,
    ) -> Result<(), DomainError> {
        Err(offline("editMessageText"))
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        _text: Option<&str>,
        _show_alert: bool,
    ) -> Result<(), DomainError> {
        Err(offline("answerCallbackQuery"))
    }

    async fn chat_member_status(
        &self,
        _chat_id: ChatId,
        _user_id: UserId,
    ) -> Result<MemberStatus, DomainError> {
        Err(offline("getChatMember"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_is_a_messenger_error() {
        let messenger = OfflineMessenger;

        let sent = messenger
            .send_message(-1, "hola", TextFormat::Plain, None)
            .await;
        assert!(matches!(sent, Err(DomainError::Messenger { .. })));
        assert!(messenger.chat_member_status(-1, 1).await.is_err());
    }
}
