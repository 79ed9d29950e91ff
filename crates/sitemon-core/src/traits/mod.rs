//! Core traits for the sitemap monitor
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RetrievalStrategy`]: Retrieve a raw document by one network path
//! - [`MonitorStore`]: Persistence of monitors and snapshots
//! - [`Notifier`]: Delivery of change sets

pub mod retrieval;
pub mod monitor_store;
pub mod notifier;

pub use retrieval::RetrievalStrategy;
pub use monitor_store::MonitorStore;
pub use notifier::Notifier;
