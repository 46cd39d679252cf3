pub mod error;
pub mod geo;
pub mod manager;
pub mod sweeper;

pub use error::{Result, SessionError};
pub use geo::{GeoInfo, GeoLocator};
pub use manager::{Actor, RegisterOutcome, SessionManager, StoreHardwareLookup};
pub use sweeper::spawn_sweeper;
