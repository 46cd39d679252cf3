pub mod error;
pub mod resolver;

pub use error::{DeviceError, Result};
pub use resolver::resolve;
