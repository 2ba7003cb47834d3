pub mod common;
pub mod generation;
pub mod verification;

// Common re-exports
pub use common::{pause_unless_cancelled, worker_detail};
pub use generation::{BatchJob, BatchReport, Generator};
pub use verification::{VerificationPipeline, VerifyRequest, VerifyResponse};
