//! Marketo Lead Extractor
//!
//! Windowed, cursor-paginated lead extraction from the Marketo SOAP API.

pub mod cli;
pub mod client;
pub mod error;
pub mod lead;
pub mod pipeline;
pub mod timeslice;

// Re-exports for convenience
pub use client::{Credentials, HttpSoapTransport, RpcTransport, SoapClient};
pub use error::MarketoError;
pub use lead::{BATCH_SIZE_DEFAULT, Column, LeadFetcher, NormalizedRecord, generate_columns};
pub use pipeline::{ExtractionConfig, run_extraction};
pub use timeslice::{DEFAULT_INTERVAL_SECONDS, TimeWindow, generate_windows, slice};
