//! Redis infrastructure shared by persistent store backends.

mod pool;

pub use pool::{PoolError, RedisPool};
