//! Shared key-value service ("network tables").
//!
//! Entries live in a [`NetworkTableInstance`]; the transport mirrors them to a
//! server or to connected clients as newline-delimited JSON.
//!
//! The wire format is private to rvision. It does not speak the NT3 binary
//! protocol, so a roboRIO or an NT3 dashboard cannot connect to it.

pub mod ds_client;
pub mod instance;
pub mod table;
pub mod transport;
pub mod value;

pub use instance::{EntryNotification, NetworkTableInstance, NotifyFlags};
pub use table::{NetworkTable, NetworkTableEntry};
pub use value::Value;
