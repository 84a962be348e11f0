mod registry;
mod tracker;

// Public API of the session subsystem.
pub use registry::{SessionHandle, SessionRegistry};
pub use sqlearn_core::model::SessionError;
pub use tracker::SessionTracker;
