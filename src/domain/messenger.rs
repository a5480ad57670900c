//! Outbound chat messaging

use async_trait::async_trait;
use serde::Serialize;

use super::game::{ChatId, UserId};
use super::DomainError;

pub type MessageId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Inline keyboard, one button per row unless built otherwise
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    pub fn single_column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "creator" => Some(Self::Creator),
            "administrator" => Some(Self::Administrator),
            "member" => Some(Self::Member),
            "restricted" => Some(Self::Restricted),
            "left" => Some(Self::Left),
            "kicked" => Some(Self::Kicked),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Creator | Self::Administrator)
    }
}

/// Chat transport used by the game engine
#[async_trait]
pub trait Messenger: Send + Sync + std::fmt::Debug {
    /// Send a message, returning its id
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        format: TextFormat,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, DomainError>;

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), DomainError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), DomainError>;

    async fn chat_member_status(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<MemberStatus, DomainError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column_keyboard() {
        let kb = Keyboard::single_column(vec![
            InlineButton::new("Ana", "k1:1"),
            InlineButton::new("Luis", "k2:2"),
        ]);

        assert_eq!(kb.rows.len(), 2);
        assert_eq!(kb.buttons().count(), 2);
        assert!(!kb.is_empty());
        assert!(Keyboard::default().is_empty());
    }

    #[test]
    fn test_member_status() {
        assert_eq!(MemberStatus::parse("creator"), Some(MemberStatus::Creator));
        assert!(MemberStatus::Administrator.is_admin());
        assert!(!MemberStatus::Member.is_admin());
        assert_eq!(MemberStatus::parse("owner"), None);
    }
}
