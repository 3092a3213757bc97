//! Backend Health Probe Widget
//!
//! Probes a fixed set of health-check endpoints on a backend, folds the
//! results into an OK/FAIL verdict and exposes the outcome as a status badge
//! with an expandable JSON report.

pub mod clipboard;
pub mod config;
pub mod console;
pub mod endpoints;
pub mod errors;
pub mod fetcher;
pub mod report;
pub mod runner;
pub mod widget;

pub use config::Config;
pub use endpoints::EndpointMap;
pub use errors::{DrWebError, Result};
pub use fetcher::{BoundedFetcher, FetchOptions, FetchResult, Fetcher};
pub use report::{Report, Verdict};
pub use runner::{DiagnosticRunner, RunOutcome};
pub use widget::{BadgeStatus, PanelState};
