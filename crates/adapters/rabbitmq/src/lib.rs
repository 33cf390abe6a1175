//! adapter-rabbitmq - RabbitMQ 队列适配器
//!
//! - 具名持久队列声明
//! - 默认交换机直投发布
//! - 每个消费循环独占一个 AMQP channel，接收即确认

mod broker;
mod connection;
mod consumer;

pub use broker::*;
pub use connection::*;
pub use consumer::*;
