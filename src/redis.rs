//! Redis 連接管理
//!
//! 提供 L2 遠端快取使用的連接池抽象。

pub mod pool;

#[cfg(test)]
pub mod test_config;

pub use pool::{ConnectionPool, RedisPool, RedisPoolError};
