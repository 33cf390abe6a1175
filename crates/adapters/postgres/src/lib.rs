//! relay-adapter-postgres - PostgreSQL 记录存储适配器

mod connection;
mod item_repository;
mod migration;

pub use connection::*;
pub use item_repository::*;
pub use migration::*;
