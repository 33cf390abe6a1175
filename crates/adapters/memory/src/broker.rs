//! 内存消息代理

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use relay_errors::{AppError, AppResult};
use relay_event_core::{Channel, DecodeError, RelayMessage, Transport, decode};
use relay_ports::{BrokerLifecycle, EventPublisher, EventSubscriber, ReceivedMessage, Subscription};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// 订阅分组：日志流按消费组各得一份，队列所有消费者竞争同一份
type GroupKey = (Channel, String);

/// 订阅方收到的一次投递，`Err` 模拟接收失败
type Delivery = AppResult<ReceivedMessage>;

#[derive(Default)]
struct Group {
    senders: Vec<mpsc::UnboundedSender<Delivery>>,
    next: usize,
}

impl Group {
    /// 轮询投递给仍存活的订阅者，全部失效时退回消息
    fn deliver(&mut self, mut message: Delivery) -> Option<Delivery> {
        self.senders.retain(|tx| !tx.is_closed());
        while !self.senders.is_empty() {
            let index = self.next % self.senders.len();
            self.next = self.next.wrapping_add(1);
            match self.senders[index].send(message) {
                Ok(()) => return None,
                Err(mpsc::error::SendError(returned)) => {
                    self.senders.remove(index);
                    message = returned;
                }
            }
        }
        Some(message)
    }
}

#[derive(Default)]
struct State {
    published: Vec<(Channel, Vec<u8>)>,
    groups: HashMap<GroupKey, Group>,
    backlog: HashMap<Channel, VecDeque<Delivery>>,
    failing: bool,
    declared: bool,
    closed: bool,
}

/// 内存消息代理，可模拟不可达
///
/// 没有订阅者时消息保留在积压中，首个订阅者接入后按序取走。
#[derive(Clone)]
pub struct InMemoryBroker {
    transport: Transport,
    state: Arc<Mutex<State>>,
}

impl InMemoryBroker {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn log() -> Self {
        Self::new(Transport::Log)
    }

    pub fn queue() -> Self {
        Self::new(Transport::Queue)
    }

    /// 模拟代理不可达：发布与订阅均返回错误
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    pub async fn is_declared(&self) -> bool {
        self.state.lock().await.declared
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// 绕过发布记录直接投递，模拟其他服务写入
    pub async fn inject(&self, channel: Channel, payload: impl Into<Vec<u8>>) -> AppResult<()> {
        self.ensure_channel(channel)?;
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;
        let payload = payload.into();
        Self::dispatch(&mut state, channel, || {
            Ok(ReceivedMessage::new(channel, payload.clone()))
        });
        Ok(())
    }

    /// 向某通道的订阅方投递一次接收错误
    pub async fn inject_error(&self, channel: Channel, reason: &str) -> AppResult<()> {
        self.ensure_channel(channel)?;
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;
        Self::dispatch(&mut state, channel, || Err(AppError::broker(reason)));
        Ok(())
    }

    /// 结束某通道上的所有订阅，订阅方随后收到流结束
    pub async fn end_subscriptions(&self, channel: Channel) {
        self.state
            .lock()
            .await
            .groups
            .retain(|(c, _), _| *c != channel);
    }

    /// 已成功发布到某通道的原始消息
    pub async fn published(&self, channel: Channel) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// 已发布消息解码后的结果
    pub async fn published_messages(
        &self,
        channel: Channel,
    ) -> Vec<Result<RelayMessage, DecodeError>> {
        self.published(channel)
            .await
            .iter()
            .map(|payload| decode(payload))
            .collect()
    }

    fn ensure_channel(&self, channel: Channel) -> AppResult<()> {
        if channel.transport() != self.transport {
            return Err(AppError::validation(format!(
                "{} is not served by this broker",
                channel
            )));
        }
        Ok(())
    }

    fn ensure_available(state: &State) -> AppResult<()> {
        if state.closed {
            return Err(AppError::broker("in-memory broker is closed"));
        }
        if state.failing {
            return Err(AppError::broker("in-memory broker unreachable"));
        }
        Ok(())
    }

    fn dispatch(state: &mut State, channel: Channel, delivery: impl Fn() -> Delivery) {
        let mut delivered = false;
        for ((c, _), group) in state.groups.iter_mut() {
            if *c != channel {
                continue;
            }
            if group.deliver(delivery()).is_none() {
                delivered = true;
            }
        }

        if !delivered {
            state.backlog.entry(channel).or_default().push_back(delivery());
        }
    }

    fn group_key(&self, channel: Channel, group: &str) -> GroupKey {
        match self.transport {
            Transport::Log => (channel, group.to_string()),
            Transport::Queue => (channel, String::new()),
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish_raw(
        &self,
        channel: Channel,
        _key: Option<&str>,
        payload: &[u8],
    ) -> AppResult<()> {
        self.ensure_channel(channel)?;
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;

        state.published.push((channel, payload.to_vec()));
        Self::dispatch(&mut state, channel, || {
            Ok(ReceivedMessage::new(channel, payload.to_vec()))
        });

        debug!(channel = %channel, bytes = payload.len(), "In-memory message published");
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryBroker {
    async fn subscribe(&self, channel: Channel, group: &str) -> AppResult<Box<dyn Subscription>> {
        self.ensure_channel(channel)?;
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(backlog) = state.backlog.remove(&channel) {
            for delivery in backlog {
                let _ = tx.send(delivery);
            }
        }

        state
            .groups
            .entry(self.group_key(channel, group))
            .or_default()
            .senders
            .push(tx);

        Ok(Box::new(MemorySubscription { rx }))
    }
}

#[async_trait]
impl BrokerLifecycle for InMemoryBroker {
    fn transport(&self) -> Transport {
        self.transport
    }

    async fn declare_topology(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        Self::ensure_available(&state)?;
        state.declared = true;
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.groups.clear();
        Ok(())
    }
}

/// 内存订阅
pub struct MemorySubscription {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next(&mut self) -> Option<AppResult<ReceivedMessage>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = InMemoryBroker::queue();
        let mut sub = broker.subscribe(Channel::ItemActions, "").await.unwrap();

        broker
            .publish_raw(Channel::ItemActions, None, b"one")
            .await
            .unwrap();

        let received = sub.next().await.unwrap().unwrap();
        assert_eq!(received.payload, b"one");
        assert_eq!(broker.published(Channel::ItemActions).await.len(), 1);
    }

    #[tokio::test]
    async fn test_backlog_delivered_to_late_subscriber() {
        let broker = InMemoryBroker::log();
        broker.inject(Channel::DomainEvents, "a").await.unwrap();
        broker.inject(Channel::DomainEvents, "b").await.unwrap();

        let mut sub = broker.subscribe(Channel::DomainEvents, "g").await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().payload, b"a");
        assert_eq!(sub.next().await.unwrap().unwrap().payload, b"b");
        assert!(broker.published(Channel::DomainEvents).await.is_empty());
    }

    #[tokio::test]
    async fn test_log_groups_each_get_a_copy() {
        let broker = InMemoryBroker::log();
        let mut first = broker.subscribe(Channel::DomainEvents, "g1").await.unwrap();
        let mut second = broker.subscribe(Channel::DomainEvents, "g2").await.unwrap();

        broker.inject(Channel::DomainEvents, "x").await.unwrap();

        assert_eq!(first.next().await.unwrap().unwrap().payload, b"x");
        assert_eq!(second.next().await.unwrap().unwrap().payload, b"x");
    }

    #[tokio::test]
    async fn test_failing_broker_rejects() {
        let broker = InMemoryBroker::queue();
        broker.set_failing(true).await;

        let err = broker
            .publish_raw(Channel::Notifications, None, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
        assert!(broker.subscribe(Channel::Notifications, "").await.is_err());
        assert!(broker.published(Channel::Notifications).await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_transport_rejected() {
        let broker = InMemoryBroker::log();
        let err = broker
            .publish_raw(Channel::ItemActions, None, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_injected_error_reaches_subscriber() {
        let broker = InMemoryBroker::log();
        let mut sub = broker.subscribe(Channel::DomainEvents, "g").await.unwrap();

        broker
            .inject_error(Channel::DomainEvents, "partition leader lost")
            .await
            .unwrap();
        broker.inject(Channel::DomainEvents, "after").await.unwrap();

        let err = sub.next().await.unwrap().unwrap_err();
        assert!(matches!(err, AppError::Broker(_)));
        assert_eq!(sub.next().await.unwrap().unwrap().payload, b"after");
    }

    #[tokio::test]
    async fn test_end_and_close_finish_streams() {
        let broker = InMemoryBroker::queue();
        let mut sub = broker.subscribe(Channel::ItemActions, "").await.unwrap();
        broker.end_subscriptions(Channel::ItemActions).await;
        assert!(sub.next().await.is_none());

        let mut sub = broker.subscribe(Channel::ItemActions, "").await.unwrap();
        broker.close().await.unwrap();
        assert!(sub.next().await.is_none());
        assert!(broker.is_closed().await);
    }
}
