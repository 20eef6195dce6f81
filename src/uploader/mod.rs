// Uploader module - sequences file uploads to the configured endpoint
//
// The orchestrator drives runs; the transport, observer and result types are
// the seams a front end plugs into.

pub mod http_client;
pub mod orchestrator;
pub mod progress_tracker;
pub mod results;
pub mod selection;

pub use http_client::{HttpOptions, HttpTransport, UploadTransport};
pub use orchestrator::UploadOrchestrator;
pub use progress_tracker::{RunPhase, UploadEvent, UploadObserver};
pub use results::{FileUploadResult, RunReport, UploadOutcome, UploadReceipt};
pub use selection::{FileSelection, SelectedFile, TriggerState};
