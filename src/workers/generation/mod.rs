pub mod batch;
pub mod generator;

pub use batch::{BatchJob, BatchReport};
pub use generator::{parse_candidate, CandidateArticle, Generator};
