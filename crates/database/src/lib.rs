pub mod connection;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use store::SessionStore;
