// Core modules
pub mod device;
pub mod policy;
pub mod revocation;
pub mod role;
pub mod session;

// Re-export commonly used types
pub use device::{DeviceIdentity, DeviceSignals, HardwareProfile};
pub use policy::TokenPolicy;
pub use revocation::RevocationSignal;
pub use role::Role;
pub use session::{NewSession, Session};
