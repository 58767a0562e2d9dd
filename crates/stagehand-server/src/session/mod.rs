//! Connection handles and the role registry.

pub mod connection;
pub mod registry;

pub use connection::{Connection, ConnectionId};
pub use registry::{ControllerCleanup, Registration, SessionRegistry};
