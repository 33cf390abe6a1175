//! 通知请求

use relay_common::Timestamp;
use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// 投递到 `notifications_queue` 的通知，与记录生命周期无关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub message: String,
    pub recipient: String,
    #[serde(rename = "timestamp")]
    pub emitted_at: Timestamp,
}

impl NotificationRequest {
    pub fn new(message: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            recipient: recipient.into(),
            emitted_at: Timestamp::now(),
        }
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.message.trim().is_empty() {
            return Err(DecodeError::invalid("notification message is empty"));
        }
        if self.recipient.trim().is_empty() {
            return Err(DecodeError::invalid("notification recipient is empty"));
        }
        Ok(())
    }
}
