// # sitemon-core
//
// Core library for the sitemap change-detection system.
//
// ## Architecture Overview
//
// This library provides the fetch, normalize and diff pipeline:
// - **DocumentFetcher**: Ordered fallback over RetrievalStrategy paths
// - **parser**: Sitemap XML into an index or urlset shape
// - **SitemapResolver**: Recursive, batch-bounded index traversal
// - **diff**: Keyed added/modified/removed partition of two snapshots
// - **MonitorEngine**: Per-monitor check cycle and scheduled batch
// - **MonitorStore** / **Notifier**: Collaborator traits with built-in stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Network, persistence and notification live
//    behind traits; the pipeline itself is pure or I/O-agnostic
// 2. **Library-First**: All core functionality can be used as a library
// 3. **Failure Isolation**: A failing child sitemap or monitor never aborts
//    its siblings

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use traits::{MonitorStore, Notifier, RetrievalStrategy};
pub use engine::{BatchReport, EngineEvent, MonitorEngine, MonitorOutcome, ProcessLog};
pub use config::{EngineConfig, FetchConfig, NotifierConfig, ResolverConfig, SitemonConfig, StoreConfig};
pub use error::{CheckStage, Error, Result};
pub use fetch::DocumentFetcher;
pub use model::{ChangeSet, Monitor, MonitorUpdate, UrlRecord};
pub use resolver::{Resolution, SitemapResolver};
pub use store::{FileMonitorStore, MemoryMonitorStore};
