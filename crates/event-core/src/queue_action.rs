//! 队列动作消息

use relay_common::{ItemId, Timestamp};
use relay_domain_core::Item;
use serde::{Deserialize, Serialize};

use crate::{DecodeError, DomainEvent, EventKind, EventPayload};

/// 投递到 `items_queue` 的动作
///
/// `item` 与 `itemId` 恰好有一个：`deleted` 时只有 `itemId`，否则只有 `item`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueAction {
    action: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item: Option<Item>,
    #[serde(rename = "itemId", default, skip_serializing_if = "Option::is_none")]
    item_id: Option<ItemId>,
    #[serde(rename = "timestamp")]
    emitted_at: Timestamp,
}

impl QueueAction {
    pub fn action(&self) -> EventKind {
        self.action
    }

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    pub fn emitted_at(&self) -> Timestamp {
        self.emitted_at
    }

    pub(crate) fn validate(&self) -> Result<(), DecodeError> {
        match (self.action, &self.item, &self.item_id) {
            (EventKind::Deleted, None, Some(_)) => Ok(()),
            (EventKind::Deleted, _, _) => Err(DecodeError::invalid(
                "deleted action must carry itemId and no item",
            )),
            (_, Some(_), None) => Ok(()),
            (action, _, _) => Err(DecodeError::invalid(format!(
                "{} action must carry item and no itemId",
                action
            ))),
        }
    }
}

impl From<&DomainEvent> for QueueAction {
    fn from(event: &DomainEvent) -> Self {
        let (item, item_id) = match event.payload() {
            EventPayload::Record(item) => (Some(item.clone()), None),
            EventPayload::Id(id) => (None, Some(*id)),
        };

        Self {
            action: event.kind(),
            item,
            item_id,
            emitted_at: event.emitted_at(),
        }
    }
}
