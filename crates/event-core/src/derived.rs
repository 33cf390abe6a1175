//! 处理端产生的派生消息：处理回执与自定义事件

use relay_common::{Timestamp, new_simple_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DecodeError, EventKind};

/// 回执状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Processed,
    Sent,
}

/// 回执来源，决定线上字段名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckOrigin {
    Event { original_event: EventKind },
    Action { original_action: EventKind },
    Notification { notification_id: String, recipient: String },
}

/// 处理回执，仅用于中继，从不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingAck {
    #[serde(flatten)]
    pub origin: AckOrigin,
    pub processed_by: String,
    pub status: AckStatus,
    #[serde(rename = "timestamp")]
    pub emitted_at: Timestamp,
}

impl ProcessingAck {
    pub fn for_event(kind: EventKind, processed_by: impl Into<String>) -> Self {
        Self::processed(AckOrigin::Event { original_event: kind }, processed_by)
    }

    pub fn for_action(action: EventKind, processed_by: impl Into<String>) -> Self {
        Self::processed(AckOrigin::Action { original_action: action }, processed_by)
    }

    /// 通知已投递，分配新的通知 ID
    pub fn for_notification(recipient: impl Into<String>, processed_by: impl Into<String>) -> Self {
        Self {
            origin: AckOrigin::Notification {
                notification_id: new_simple_id(),
                recipient: recipient.into(),
            },
            processed_by: processed_by.into(),
            status: AckStatus::Sent,
            emitted_at: Timestamp::now(),
        }
    }

    fn processed(origin: AckOrigin, processed_by: impl Into<String>) -> Self {
        Self {
            origin,
            processed_by: processed_by.into(),
            status: AckStatus::Processed,
            emitted_at: Timestamp::now(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        let expected = match self.origin {
            AckOrigin::Notification { .. } => AckStatus::Sent,
            _ => AckStatus::Processed,
        };
        if self.status != expected {
            return Err(DecodeError::invalid(format!(
                "ack status {:?} does not match its origin",
                self.status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CustomTag {
    #[serde(rename = "custom_event")]
    CustomEvent,
}

/// `POST /api/events` 触发的自定义事件，`data` 原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    event: CustomTag,
    pub data: Value,
    pub source: String,
    #[serde(rename = "timestamp")]
    pub emitted_at: Timestamp,
}

impl CustomEvent {
    pub const NAME: &'static str = "custom_event";

    pub fn new(data: Value, source: impl Into<String>) -> Self {
        Self {
            event: CustomTag::CustomEvent,
            data,
            source: source.into(),
            emitted_at: Timestamp::now(),
        }
    }
}
