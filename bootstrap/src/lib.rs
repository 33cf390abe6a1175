//! relay-bootstrap - 服务启动骨架
//!
//! 连接基础设施、启动消费循环、运行 HTTP 服务并按序关闭

mod coordinator;
mod infrastructure;
mod runtime;
mod shutdown;
mod starter;

pub use coordinator::*;
pub use infrastructure::*;
pub use runtime::*;
pub use shutdown::*;
pub use starter::*;
