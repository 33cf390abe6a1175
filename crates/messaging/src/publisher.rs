//! 事件发布者

use std::sync::Arc;

use relay_errors::{AppError, AppResult};
use relay_event_core::{
    Channel, CustomEvent, DomainEvent, NotificationRequest, QueueAction, WireMessage, encode,
};
use relay_ports::EventPublisher;
use relay_telemetry::{Direction, Outcome, record_message};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

/// 一次发布在两个代理上的投递结果，仅用于观测
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub log_delivered: bool,
    pub queue_delivered: bool,
}

impl PublishOutcome {
    pub fn is_complete(&self) -> bool {
        self.log_delivered && self.queue_delivered
    }
}

/// 编码并发送到指定通道
pub async fn send<M: WireMessage + Sync>(
    target: &dyn EventPublisher,
    channel: Channel,
    key: Option<&str>,
    message: &M,
) -> AppResult<()> {
    let payload = encode(message).map_err(|e| AppError::internal(e.to_string()))?;

    let result = target.publish_raw(channel, key, &payload).await;
    let outcome = if result.is_ok() {
        Outcome::Ok
    } else {
        Outcome::Failed
    };
    record_message(channel.name(), Direction::Published, outcome);
    result
}

/// 中继发布者
///
/// 记录变更已提交后调用；投递失败只记录日志，不会让变更失败。
#[derive(Clone)]
pub struct RelayPublisher {
    log: Arc<dyn EventPublisher>,
    queue: Arc<dyn EventPublisher>,
    service_name: String,
}

impl RelayPublisher {
    pub fn new(
        log: Arc<dyn EventPublisher>,
        queue: Arc<dyn EventPublisher>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            log,
            queue,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 领域事件发往 `item-events`，派生的队列动作发往 `items_queue`
    ///
    /// 两次发送并发执行，一方失败不影响另一方，也不会回滚。
    pub async fn publish(&self, event: DomainEvent) -> PublishOutcome {
        let action = QueueAction::from(&event);
        let key = event.item_id().to_string();

        let (log_delivered, queue_delivered) = tokio::join!(
            self.emit(&*self.log, Channel::DomainEvents, Some(&key), &event),
            self.emit(&*self.queue, Channel::ItemActions, None, &action),
        );

        let outcome = PublishOutcome {
            log_delivered,
            queue_delivered,
        };

        if outcome.is_complete() {
            debug!(event = %event.kind(), item_id = %key, "Domain event relayed");
        } else {
            warn!(
                event = %event.kind(),
                item_id = %key,
                log_delivered,
                queue_delivered,
                "Domain event only partially relayed"
            );
        }

        outcome
    }

    /// 通知请求发往 `notifications_queue`，失败返回错误
    pub async fn notify(&self, request: NotificationRequest) -> AppResult<()> {
        request
            .validate()
            .map_err(|e| AppError::validation(e.to_string()))?;

        send(&*self.queue, Channel::Notifications, None, &request)
            .await
            .inspect_err(|e| {
                error!(recipient = %request.recipient, error = %e, "Failed to queue notification")
            })
    }

    /// 自定义事件同时发往 `go-events` 与 `go_events_queue`
    pub async fn publish_custom(&self, data: Value) -> PublishOutcome {
        let event = CustomEvent::new(data, self.service_name.clone());

        let (log_delivered, queue_delivered) = tokio::join!(
            self.emit(&*self.log, Channel::DerivedAcks, None, &event),
            self.emit(&*self.queue, Channel::DerivedQueueAcks, None, &event),
        );

        PublishOutcome {
            log_delivered,
            queue_delivered,
        }
    }

    async fn emit<M: WireMessage + Sync>(
        &self,
        target: &dyn EventPublisher,
        channel: Channel,
        key: Option<&str>,
        message: &M,
    ) -> bool {
        match send(target, channel, key, message).await {
            Ok(()) => true,
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to publish message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_adapter_memory::InMemoryBroker;
    use relay_common::ItemId;
    use relay_domain_core::{Item, NewItem};
    use relay_event_core::{EventKind, MessageKind, RelayMessage};
    use serde_json::json;

    fn widget() -> Item {
        Item::create(
            NewItem {
                name: "Widget".to_string(),
                description: String::new(),
                price: 9.99,
                category: "Tools".to_string(),
            },
            Utc::now(),
        )
    }

    fn publisher(log: &InMemoryBroker, queue: &InMemoryBroker) -> RelayPublisher {
        RelayPublisher::new(
            Arc::new(log.clone()),
            Arc::new(queue.clone()),
            "item-relay",
        )
    }

    #[tokio::test]
    async fn test_publish_emits_to_both_brokers() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        let item = widget();

        let outcome = publisher(&log, &queue)
            .publish(DomainEvent::created(item.clone()))
            .await;
        assert!(outcome.is_complete());

        let events = log.published_messages(Channel::DomainEvents).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(RelayMessage::Domain(event)) => assert_eq!(event.kind(), EventKind::Created),
            other => panic!("unexpected {:?}", other),
        }

        let actions = queue.published_messages(Channel::ItemActions).await;
        match &actions[0] {
            Ok(RelayMessage::Action(action)) => {
                assert_eq!(action.action(), EventKind::Created);
                assert_eq!(action.item(), Some(&item));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failing_queue_does_not_block_log() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        queue.set_failing(true).await;

        let outcome = publisher(&log, &queue)
            .publish(DomainEvent::updated(widget()))
            .await;

        assert!(outcome.log_delivered);
        assert!(!outcome.queue_delivered);
        assert_eq!(log.published(Channel::DomainEvents).await.len(), 1);
        assert!(queue.published(Channel::ItemActions).await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_log_does_not_block_queue() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        log.set_failing(true).await;

        let outcome = publisher(&log, &queue)
            .publish(DomainEvent::deleted(ItemId::new()))
            .await;

        assert!(!outcome.log_delivered);
        assert!(outcome.queue_delivered);
    }

    #[tokio::test]
    async fn test_deleted_event_queues_item_id_only() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        let id = ItemId::new();

        publisher(&log, &queue).publish(DomainEvent::deleted(id)).await;

        let raw = queue.published(Channel::ItemActions).await;
        let value: Value = serde_json::from_slice(&raw[0]).unwrap();
        assert_eq!(value["action"], "deleted");
        assert_eq!(value["itemId"], id.to_string());
        assert!(value.get("item").is_none());
    }

    #[tokio::test]
    async fn test_notify_propagates_broker_failure() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        let relay = publisher(&log, &queue);

        relay
            .notify(NotificationRequest::new("hi", "a@b.com"))
            .await
            .unwrap();
        let sent = queue.published_messages(Channel::Notifications).await;
        assert_eq!(sent[0].as_ref().unwrap().kind(), MessageKind::Notification);

        queue.set_failing(true).await;
        let err = relay
            .notify(NotificationRequest::new("hi", "a@b.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
    }

    #[tokio::test]
    async fn test_notify_rejects_blank_fields() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());
        let err = publisher(&log, &queue)
            .notify(NotificationRequest::new("", "a@b.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(queue.published(Channel::Notifications).await.is_empty());
    }

    #[tokio::test]
    async fn test_custom_event_goes_to_derived_channels() {
        let (log, queue) = (InMemoryBroker::log(), InMemoryBroker::queue());

        let outcome = publisher(&log, &queue)
            .publish_custom(json!({"hello": "world"}))
            .await;
        assert!(outcome.is_complete());

        let raw = log.published(Channel::DerivedAcks).await;
        let value: Value = serde_json::from_slice(&raw[0]).unwrap();
        assert_eq!(value["event"], "custom_event");
        assert_eq!(value["source"], "item-relay");
        assert_eq!(value["data"]["hello"], "world");
        assert_eq!(queue.published(Channel::DerivedQueueAcks).await.len(), 1);
    }
}
