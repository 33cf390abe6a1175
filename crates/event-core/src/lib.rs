//! relay-event-core - 事件核心库
//!
//! 中继消息的线上形态、编解码与固定拓扑。

mod codec;
mod derived;
mod domain_event;
mod event_handler;
mod notification;
mod queue_action;
mod topology;

pub use codec::*;
pub use derived::*;
pub use domain_event::*;
pub use event_handler::*;
pub use notification::*;
pub use queue_action::*;
pub use topology::*;
