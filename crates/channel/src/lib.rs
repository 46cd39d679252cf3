pub mod bus;
pub mod error;
pub mod local;
pub mod matcher;
pub mod redis_bus;
pub mod teardown;

pub use bus::{RevocationBus, Subscription};
pub use error::{ChannelError, Result};
pub use local::LocalRevocationBus;
pub use matcher::{HardwareLookup, LocalDevice, MatchDecision};
pub use redis_bus::{ChannelConfig, RedisRevocationBus};
pub use teardown::{handle_signal, run_listener, SessionTerminator};
