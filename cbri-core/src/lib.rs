//! # cbri-core - uploading core metrics to a CBRI dashboard
//!
//! This crate posts one code-quality measurement per analyzed revision to the
//! REST API of a CBRI metrics dashboard. A measurement is a [`MetricsRecord`]
//! computed by an external static-analysis tool; this crate authenticates,
//! maps the record to the dashboard's field names and posts it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cbri_core::prelude::*;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploadConfig::new("https://cbri.example.org/api", "builder", "s3cret", "42");
//! let mut uploader = UploadClient::from_config(&config)?;
//!
//! let record = MetricsRecord::builder()
//!     .captured_at(Utc::now())
//!     .revision_id(revision_id_for_build(17))
//!     .architecture_type("Core-Periphery")
//!     .is_core(true)
//!     .propagation_cost(33.5)
//!     .uloc(10234)
//!     .num_classes(120)
//!     .num_files(98)
//!     .core_size(14)
//!     .num_files_in_core(14)
//!     .num_files_overly_complex(3)
//!     .percent_files_overly_complex(3.06)
//!     .useful_lines_of_comments(2048)
//!     .useful_comment_density(20.0)
//!     .duplicate_uloc(512)
//!     .percent_duplicate_uloc(5.0)
//!     .build()?;
//!
//! uploader.post_action(record, &WriterSink::stderr()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`metrics`**: the immutable [`MetricsRecord`] and its wire payload
//! - **`session`**: login, token validity check and re-login
//! - **`upload`**: the authenticated measurement POST
//! - **`analysis`**: the boundary to the external analysis tool
//! - **`config`**: connection settings, tool paths and languages
//! - **`sink`**: the operator-facing audit trail
//! - **`logging`**: `tracing` subscriber setup
//!
//! One upload makes at most three sequential requests (token check, login,
//! post). Create one [`UploadClient`] per build; the token check and its use
//! are not synchronized.
//!
//! [`MetricsRecord`]: metrics::MetricsRecord
//! [`UploadClient`]: upload::UploadClient

pub mod analysis;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod security;
pub mod session;
pub mod sink;
pub mod upload;
