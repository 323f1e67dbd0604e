//! Upload pipeline: storage layout, segmentation, enrichment streaming, and
//! catalog orchestration.

mod service;
pub mod types;

pub use service::{UploadApi, UploadService};
pub use types::{IncomingUpload, UploadError, UploadOutcome, UploadPhase, UploadSession};
