//! Advertiser and subscriber handles and the manager that opens them

pub mod handle;
pub mod manager;

pub use handle::{OrbHandle, Role};
pub use manager::HandleOf;
