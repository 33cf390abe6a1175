//! 中继协调器测试
//!
//! 使用内存适配器验证启动、端到端中继与关闭顺序

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get};
use chrono::Utc;
use relay_adapter_memory::{InMemoryBroker, InMemoryItemRepository};
use relay_bootstrap::{
    Infrastructure, RelayCoordinator, RelaySettings, ServiceContext, ShutdownController, serve,
};
use relay_common::RetryConfig;
use relay_config::AppConfig;
use relay_domain_core::{Item, NewItem};
use relay_errors::AppError;
use relay_event_core::{AckOrigin, AckStatus, Channel, DomainEvent, NotificationRequest, RelayMessage};
use relay_messaging::LoopState;
use relay_ports::BrokerHandle;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Fixture {
    log: InMemoryBroker,
    queue: InMemoryBroker,
    store: InMemoryItemRepository,
}

impl Fixture {
    fn new() -> Self {
        Self {
            log: InMemoryBroker::log(),
            queue: InMemoryBroker::queue(),
            store: InMemoryItemRepository::new(),
        }
    }

    fn infrastructure(&self) -> Infrastructure {
        let config = AppConfig::from_figment(AppConfig::defaults()).unwrap();
        Infrastructure::from_parts(
            config,
            Arc::new(self.store.clone()),
            BrokerHandle::new(Arc::new(self.log.clone())),
            BrokerHandle::new(Arc::new(self.queue.clone())),
        )
    }

    fn settings() -> RelaySettings {
        RelaySettings {
            consumer_group: "relay-test".to_string(),
            service_name: "item-relay".to_string(),
            retry: RetryConfig::new(2, Duration::from_millis(5), Duration::from_millis(10)),
            join_timeout: Duration::from_secs(1),
        }
    }

    async fn start(&self) -> RelayCoordinator {
        RelayCoordinator::start(self.infrastructure(), Self::settings())
            .await
            .unwrap()
    }
}

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

async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let wait = async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("condition not reached in time");
}

#[tokio::test]
async fn test_start_declares_topology_and_consumes_inbound_channels() {
    let fixture = Fixture::new();
    let coordinator = fixture.start().await;

    assert!(fixture.log.is_declared().await);
    assert!(fixture.queue.is_declared().await);

    let states = coordinator.consumers().states();
    assert_eq!(states.len(), 3);
    assert_eq!(states["item-events"], LoopState::Consuming);
    assert_eq!(states["items_queue"], LoopState::Consuming);
    assert_eq!(states["notifications_queue"], LoopState::Consuming);
    assert!(coordinator.consumers().all_consuming());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_published_event_relayed_to_derived_channels() {
    let fixture = Fixture::new();
    let coordinator = fixture.start().await;

    let outcome = coordinator
        .publisher()
        .publish(DomainEvent::created(widget()))
        .await;
    assert!(outcome.is_complete());

    let log = fixture.log.clone();
    eventually(|| {
        let log = log.clone();
        async move { !log.published(Channel::DerivedAcks).await.is_empty() }
    })
    .await;
    let queue = fixture.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { !queue.published(Channel::DerivedQueueAcks).await.is_empty() }
    })
    .await;

    let stats = coordinator.stats();
    assert_eq!(stats["item-events"].processed, 1);
    assert_eq!(stats["items_queue"].processed, 1);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_notification_acknowledged_as_sent() {
    let fixture = Fixture::new();
    let coordinator = fixture.start().await;

    coordinator
        .publisher()
        .notify(NotificationRequest::new("Your order shipped", "a@b.com"))
        .await
        .unwrap();

    let queue = fixture.queue.clone();
    eventually(|| {
        let queue = queue.clone();
        async move { !queue.published(Channel::DerivedQueueAcks).await.is_empty() }
    })
    .await;

    let acks = fixture.queue.published_messages(Channel::DerivedQueueAcks).await;
    match &acks[0] {
        Ok(RelayMessage::Ack(ack)) => {
            assert_eq!(ack.status, AckStatus::Sent);
            assert!(matches!(ack.origin, AckOrigin::Notification { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_loops_and_closes_everything() {
    let fixture = Fixture::new();
    let coordinator = fixture.start().await;
    let consumers = coordinator.consumers();

    coordinator.shutdown().await;

    assert!(
        consumers
            .states()
            .values()
            .all(|state| *state == LoopState::Stopped)
    );
    assert!(fixture.log.is_closed().await);
    assert!(fixture.queue.is_closed().await);
}

#[tokio::test]
async fn test_start_fails_when_queue_unreachable() {
    let fixture = Fixture::new();
    fixture.queue.set_failing(true).await;

    let err = RelayCoordinator::start(fixture.infrastructure(), Fixture::settings())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AppError::Broker(_)));
    assert!(fixture.log.is_closed().await);
}

#[tokio::test]
async fn test_serve_handles_requests_until_shutdown() {
    let fixture = Fixture::new();
    let coordinator = fixture.start().await;
    let context = ServiceContext::from_coordinator(&coordinator, None);
    assert_eq!(context.service_name, "item-relay");

    let router = Router::new().route("/ping", get(|| async { "pong" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = ShutdownController::new();
    let server = tokio::spawn(serve(
        listener,
        router,
        coordinator,
        Duration::from_secs(1),
        shutdown.signal(),
    ));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("pong"));

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(fixture.log.is_closed().await);
    assert!(fixture.queue.is_closed().await);
}
