//! Common imports for uploading measurements.
//!
//! ```rust
//! use cbri_core::prelude::*;
//! ```

pub use crate::analysis::{revision_id_for_build, AnalysisPlan, MetricsProducer, ReportProducer};
pub use crate::config::{Language, ToolPaths, UploadConfig};
pub use crate::error::{AnalysisError, AuthError, ConfigError, RecordError, UploadError};
pub use crate::metrics::{MeasurementPayload, MetricsRecord};
pub use crate::session::SessionClient;
pub use crate::sink::{LogSink, MemorySink, TracingSink, WriterSink};
pub use crate::upload::UploadClient;
