//! Domain Event 定义

use relay_common::{ItemId, Timestamp};
use relay_domain_core::Item;
use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// 记录变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 事件负载：完整记录，或删除时仅有 ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Record(Item),
    Id(ItemId),
}

impl EventPayload {
    pub fn item_id(&self) -> ItemId {
        match self {
            EventPayload::Record(item) => item.id,
            EventPayload::Id(id) => *id,
        }
    }
}

/// 一次已提交变更产生的领域事件
///
/// 线上形态 `{"event": "...", "data": ..., "timestamp": "..."}`。
/// 字段只读，构造后不可修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "event")]
    kind: EventKind,
    #[serde(rename = "data")]
    payload: EventPayload,
    #[serde(rename = "timestamp")]
    emitted_at: Timestamp,
}

impl DomainEvent {
    pub fn created(item: Item) -> Self {
        Self::record(EventKind::Created, item)
    }

    pub fn updated(item: Item) -> Self {
        Self::record(EventKind::Updated, item)
    }

    pub fn deleted(id: ItemId) -> Self {
        Self {
            kind: EventKind::Deleted,
            payload: EventPayload::Id(id),
            emitted_at: Timestamp::now(),
        }
    }

    fn record(kind: EventKind, item: Item) -> Self {
        Self {
            kind,
            payload: EventPayload::Record(item),
            emitted_at: Timestamp::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn emitted_at(&self) -> Timestamp {
        self.emitted_at
    }

    pub fn item_id(&self) -> ItemId {
        self.payload.item_id()
    }

    /// 删除事件只携带 ID，其余事件携带完整记录
    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        match (self.kind, &self.payload) {
            (EventKind::Deleted, EventPayload::Id(_)) => Ok(()),
            (EventKind::Created | EventKind::Updated, EventPayload::Record(_)) => Ok(()),
            (EventKind::Deleted, EventPayload::Record(_)) => Err(DecodeError::invalid(
                "deleted event must carry an item id, not a record",
            )),
            (kind, EventPayload::Id(_)) => Err(DecodeError::invalid(format!(
                "{} event must carry the full record",
                kind
            ))),
        }
    }
}
