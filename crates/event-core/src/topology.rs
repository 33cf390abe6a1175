//! 固定的通道拓扑：逻辑通道 → 物理 topic / queue

use crate::MessageKind;

/// 承载通道的传输方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// 分区日志流（Kafka）
    Log,
    /// 具名持久队列（AMQP）
    Queue,
}

/// 逻辑通道，进程内唯一且运行期不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    DomainEvents,
    DerivedAcks,
    ItemActions,
    Notifications,
    DerivedQueueAcks,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::DomainEvents,
        Channel::DerivedAcks,
        Channel::ItemActions,
        Channel::Notifications,
        Channel::DerivedQueueAcks,
    ];

    /// 物理名称
    pub fn name(&self) -> &'static str {
        match self {
            Channel::DomainEvents => "item-events",
            Channel::DerivedAcks => "go-events",
            Channel::ItemActions => "items_queue",
            Channel::Notifications => "notifications_queue",
            Channel::DerivedQueueAcks => "go_events_queue",
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Channel::DomainEvents | Channel::DerivedAcks => Transport::Log,
            Channel::ItemActions | Channel::Notifications | Channel::DerivedQueueAcks => {
                Transport::Queue
            }
        }
    }

    /// 该通道上由消费循环接收的消息形态；纯出站通道返回 `None`
    pub fn inbound_kind(&self) -> Option<MessageKind> {
        match self {
            Channel::DomainEvents => Some(MessageKind::DomainEvent),
            Channel::ItemActions => Some(MessageKind::QueueAction),
            Channel::Notifications => Some(MessageKind::Notification),
            Channel::DerivedAcks | Channel::DerivedQueueAcks => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 拓扑查询
pub struct Topology;

impl Topology {
    pub fn log_topics() -> impl Iterator<Item = Channel> {
        Self::by_transport(Transport::Log)
    }

    pub fn queues() -> impl Iterator<Item = Channel> {
        Self::by_transport(Transport::Queue)
    }

    /// 需要启动消费循环的通道
    pub fn inbound() -> impl Iterator<Item = Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| channel.inbound_kind().is_some())
    }

    fn by_transport(transport: Transport) -> impl Iterator<Item = Channel> {
        Channel::ALL
            .into_iter()
            .filter(move |channel| channel.transport() == transport)
    }
}
