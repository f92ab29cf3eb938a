//! # atelier-client
//!
//! Client for the Atelier generation backend.
//!
//! This crate provides:
//! - [`JobApi`] - Trait covering the list, status, collect, delete and submit endpoints
//! - [`HttpJobApi`] - reqwest implementation speaking the `{code, message, data}` envelope
//! - [`MockJobApi`] - Scripted in-memory implementation for tests
//! - [`ClientError`] - Network vs. application failure classification
//!
//! ## Example
//!
//! ```no_run
//! use atelier_client::{HttpJobApi, JobApi};
//! use atelier_core::{AtelierConfig, JobId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AtelierConfig::load()?;
//!     let api = HttpJobApi::from_config(&config.api)?;
//!
//!     for item in api.status(&[JobId::Int(101)]).await? {
//!         println!("{}", item.format_compact());
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod envelope;
pub mod error;
pub mod http;
pub mod mock;

pub use api::{CollectAction, GenerateRequest, JobApi};
pub use envelope::{Envelope, ItemList};
pub use error::{ClientError, Result};
pub use http::HttpJobApi;
pub use mock::{MockCall, MockJobApi};
