//! OctoPrint integration module
//!
//! - `client`: status API snapshot fetching
//! - `sync`: background poll loop feeding the relay

pub mod client;
pub mod sync;

pub use client::OctoPrintClient;
pub use sync::PrinterSyncer;
