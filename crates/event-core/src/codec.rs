//! 线上编解码
//!
//! 所有通道统一使用扁平 JSON 对象，按判别字段识别形态。

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{CustomEvent, DomainEvent, NotificationRequest, ProcessingAck, QueueAction};

/// 消息形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    DomainEvent,
    QueueAction,
    Notification,
    Ack,
    Custom,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::DomainEvent => "domain_event",
            MessageKind::QueueAction => "queue_action",
            MessageKind::Notification => "notification",
            MessageKind::Ack => "ack",
            MessageKind::Custom => "custom_event",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 已解码的中继消息，封闭集合
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Domain(DomainEvent),
    Action(QueueAction),
    Notification(NotificationRequest),
    Ack(ProcessingAck),
    Custom(CustomEvent),
}

impl RelayMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            RelayMessage::Domain(_) => MessageKind::DomainEvent,
            RelayMessage::Action(_) => MessageKind::QueueAction,
            RelayMessage::Notification(_) => MessageKind::Notification,
            RelayMessage::Ack(_) => MessageKind::Ack,
            RelayMessage::Custom(_) => MessageKind::Custom,
        }
    }
}

/// 解码错误
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload matches no known message shape")]
    UnknownShape,

    #[error("malformed {kind}: {source}")]
    Malformed {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: MessageKind,
        found: MessageKind,
    },

    #[error("invalid message: {0}")]
    Invalid(String),
}

impl DecodeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// 编码错误
#[derive(Debug, Error)]
#[error("failed to encode message: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// 可在线上传输的消息形态
pub trait WireMessage: Serialize + DeserializeOwned + Sized {
    const KIND: MessageKind;

    /// 结构约束检查，反序列化成功后执行
    fn check(&self) -> Result<(), DecodeError> {
        Ok(())
    }

    fn into_relay(self) -> RelayMessage;
}

impl WireMessage for DomainEvent {
    const KIND: MessageKind = MessageKind::DomainEvent;

    fn check(&self) -> Result<(), DecodeError> {
        self.validate()
    }

    fn into_relay(self) -> RelayMessage {
        RelayMessage::Domain(self)
    }
}

impl WireMessage for QueueAction {
    const KIND: MessageKind = MessageKind::QueueAction;

    fn check(&self) -> Result<(), DecodeError> {
        self.validate()
    }

    fn into_relay(self) -> RelayMessage {
        RelayMessage::Action(self)
    }
}

impl WireMessage for NotificationRequest {
    const KIND: MessageKind = MessageKind::Notification;

    fn check(&self) -> Result<(), DecodeError> {
        self.validate()
    }

    fn into_relay(self) -> RelayMessage {
        RelayMessage::Notification(self)
    }
}

impl WireMessage for ProcessingAck {
    const KIND: MessageKind = MessageKind::Ack;

    fn check(&self) -> Result<(), DecodeError> {
        self.validate()
    }

    fn into_relay(self) -> RelayMessage {
        RelayMessage::Ack(self)
    }
}

impl WireMessage for CustomEvent {
    const KIND: MessageKind = MessageKind::Custom;

    fn into_relay(self) -> RelayMessage {
        RelayMessage::Custom(self)
    }
}

pub fn encode<M: WireMessage>(message: &M) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(message)?)
}

impl RelayMessage {
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            RelayMessage::Domain(m) => encode(m),
            RelayMessage::Action(m) => encode(m),
            RelayMessage::Notification(m) => encode(m),
            RelayMessage::Ack(m) => encode(m),
            RelayMessage::Custom(m) => encode(m),
        }
    }
}

/// 解码任意已知形态
pub fn decode(bytes: &[u8]) -> Result<RelayMessage, DecodeError> {
    let object = parse_object(bytes)?;
    match detect_kind(&object)? {
        MessageKind::DomainEvent => from_object::<DomainEvent>(object).map(WireMessage::into_relay),
        MessageKind::QueueAction => from_object::<QueueAction>(object).map(WireMessage::into_relay),
        MessageKind::Notification => {
            from_object::<NotificationRequest>(object).map(WireMessage::into_relay)
        }
        MessageKind::Ack => from_object::<ProcessingAck>(object).map(WireMessage::into_relay),
        MessageKind::Custom => from_object::<CustomEvent>(object).map(WireMessage::into_relay),
    }
}

/// 按通道期望的形态解码，其他形态视为错误
pub fn decode_as<M: WireMessage>(bytes: &[u8]) -> Result<M, DecodeError> {
    let object = parse_object(bytes)?;
    let found = detect_kind(&object)?;
    if found != M::KIND {
        return Err(DecodeError::UnexpectedShape {
            expected: M::KIND,
            found,
        });
    }
    from_object(object)
}

/// 解码并要求指定形态，返回封闭集合中的变体
pub fn decode_expected(bytes: &[u8], expected: MessageKind) -> Result<RelayMessage, DecodeError> {
    let message = decode(bytes)?;
    if message.kind() != expected {
        return Err(DecodeError::UnexpectedShape {
            expected,
            found: message.kind(),
        });
    }
    Ok(message)
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, DecodeError> {
    match serde_json::from_slice::<Value>(bytes).map_err(DecodeError::NotJson)? {
        Value::Object(object) => Ok(object),
        _ => Err(DecodeError::NotAnObject),
    }
}

fn detect_kind(object: &Map<String, Value>) -> Result<MessageKind, DecodeError> {
    if object.contains_key("action") {
        return Ok(MessageKind::QueueAction);
    }
    if let Some(event) = object.get("event") {
        return Ok(if event.as_str() == Some(CustomEvent::NAME) {
            MessageKind::Custom
        } else {
            MessageKind::DomainEvent
        });
    }
    if object.contains_key("processed_by") {
        return Ok(MessageKind::Ack);
    }
    if object.contains_key("message") && object.contains_key("recipient") {
        return Ok(MessageKind::Notification);
    }
    Err(DecodeError::UnknownShape)
}

fn from_object<M: WireMessage>(object: Map<String, Value>) -> Result<M, DecodeError> {
    let message: M = serde_json::from_value(Value::Object(object)).map_err(|source| {
        DecodeError::Malformed {
            kind: M::KIND,
            source,
        }
    })?;
    message.check()?;
    Ok(message)
}
