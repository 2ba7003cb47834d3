// Declare submodules
mod common;
mod fact_check;
mod generation;

pub use common::*;
pub use fact_check::fact_check_prompt;
pub use generation::article_generation_prompt;
