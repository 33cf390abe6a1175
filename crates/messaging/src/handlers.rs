//! 入站通道处理器
//!
//! 每个处理器消费一种消息并发出派生回执

use std::sync::Arc;

use async_trait::async_trait;
use relay_errors::{AppError, AppResult};
use relay_event_core::{
    Channel, MessageHandler, NotificationRequest, ProcessingAck, RelayMessage,
};
use relay_ports::EventPublisher;
use tracing::info;

use crate::publisher::send;

fn unexpected(channel: Channel, message: &RelayMessage) -> AppError {
    AppError::validation(format!(
        "{} handler cannot process {}",
        channel,
        message.kind()
    ))
}

/// `item-events` → 回执发往 `go-events`
pub struct DomainEventHandler {
    acks: Arc<dyn EventPublisher>,
    processed_by: String,
}

impl DomainEventHandler {
    pub fn new(acks: Arc<dyn EventPublisher>, processed_by: impl Into<String>) -> Self {
        Self {
            acks,
            processed_by: processed_by.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for DomainEventHandler {
    fn channel(&self) -> Channel {
        Channel::DomainEvents
    }

    async fn handle(&self, message: RelayMessage) -> AppResult<()> {
        let RelayMessage::Domain(event) = message else {
            return Err(unexpected(self.channel(), &message));
        };

        let item_id = event.item_id().to_string();
        info!(event = %event.kind(), item_id = %item_id, "Processing domain event");

        let ack = ProcessingAck::for_event(event.kind(), self.processed_by.clone());
        send(&*self.acks, Channel::DerivedAcks, Some(&item_id), &ack).await
    }
}

/// `items_queue` → 回执发往 `go_events_queue`
pub struct ItemActionHandler {
    acks: Arc<dyn EventPublisher>,
    processed_by: String,
}

impl ItemActionHandler {
    pub fn new(acks: Arc<dyn EventPublisher>, processed_by: impl Into<String>) -> Self {
        Self {
            acks,
            processed_by: processed_by.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for ItemActionHandler {
    fn channel(&self) -> Channel {
        Channel::ItemActions
    }

    async fn handle(&self, message: RelayMessage) -> AppResult<()> {
        let RelayMessage::Action(action) = message else {
            return Err(unexpected(self.channel(), &message));
        };

        info!(
            action = %action.action(),
            item_id = ?action.item().map(|item| item.id).or(action.item_id()),
            "Processing queue action"
        );

        let ack = ProcessingAck::for_action(action.action(), self.processed_by.clone());
        send(&*self.acks, Channel::DerivedQueueAcks, None, &ack).await
    }
}

/// 通知投递通道
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, request: &NotificationRequest) -> AppResult<()>;
}

/// 仅写日志的投递，用于模拟外部通知渠道
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, request: &NotificationRequest) -> AppResult<()> {
        info!(
            recipient = %request.recipient,
            message = %request.message,
            "Notification delivered"
        );
        Ok(())
    }
}

/// `notifications_queue` → 投递后以 `sent` 回执发往 `go_events_queue`
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
    acks: Arc<dyn EventPublisher>,
    processed_by: String,
}

impl NotificationHandler {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        acks: Arc<dyn EventPublisher>,
        processed_by: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            acks,
            processed_by: processed_by.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for NotificationHandler {
    fn channel(&self) -> Channel {
        Channel::Notifications
    }

    async fn handle(&self, message: RelayMessage) -> AppResult<()> {
        let RelayMessage::Notification(request) = message else {
            return Err(unexpected(self.channel(), &message));
        };

        self.notifier.deliver(&request).await?;

        let ack = ProcessingAck::for_notification(request.recipient, self.processed_by.clone());
        send(&*self.acks, Channel::DerivedQueueAcks, None, &ack).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_adapter_memory::InMemoryBroker;
    use relay_common::ItemId;
    use relay_event_core::{AckOrigin, AckStatus, DomainEvent, EventKind, QueueAction};

    fn only_ack(messages: Vec<Result<RelayMessage, relay_event_core::DecodeError>>) -> ProcessingAck {
        assert_eq!(messages.len(), 1);
        match messages.into_iter().next() {
            Some(Ok(RelayMessage::Ack(ack))) => ack,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_domain_event_acked_on_log() {
        let log = InMemoryBroker::log();
        let handler = DomainEventHandler::new(Arc::new(log.clone()), "item-relay");

        handler
            .handle(RelayMessage::Domain(DomainEvent::deleted(ItemId::new())))
            .await
            .unwrap();

        let ack = only_ack(log.published_messages(Channel::DerivedAcks).await);
        assert_eq!(
            ack.origin,
            AckOrigin::Event {
                original_event: EventKind::Deleted
            }
        );
        assert_eq!(ack.status, AckStatus::Processed);
        assert_eq!(ack.processed_by, "item-relay");
    }

    #[tokio::test]
    async fn test_queue_action_acked_on_queue() {
        let queue = InMemoryBroker::queue();
        let handler = ItemActionHandler::new(Arc::new(queue.clone()), "item-relay");
        let action = QueueAction::from(&DomainEvent::deleted(ItemId::new()));

        handler.handle(RelayMessage::Action(action)).await.unwrap();

        let ack = only_ack(queue.published_messages(Channel::DerivedQueueAcks).await);
        assert_eq!(
            ack.origin,
            AckOrigin::Action {
                original_action: EventKind::Deleted
            }
        );
    }

    #[tokio::test]
    async fn test_notification_acked_as_sent() {
        let queue = InMemoryBroker::queue();
        let handler =
            NotificationHandler::new(Arc::new(LogNotifier), Arc::new(queue.clone()), "item-relay");

        handler
            .handle(RelayMessage::Notification(NotificationRequest::new(
                "hi", "a@b.com",
            )))
            .await
            .unwrap();

        let ack = only_ack(queue.published_messages(Channel::DerivedQueueAcks).await);
        assert_eq!(ack.status, AckStatus::Sent);
        match ack.origin {
            AckOrigin::Notification { recipient, .. } => assert_eq!(recipient, "a@b.com"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_shape_rejected() {
        let log = InMemoryBroker::log();
        let handler = DomainEventHandler::new(Arc::new(log.clone()), "item-relay");

        let err = handler
            .handle(RelayMessage::Notification(NotificationRequest::new(
                "hi", "a@b.com",
            )))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(log.published(Channel::DerivedAcks).await.is_empty());
    }
}
