//! Replacement text for stale comments: prompt construction, the external generator seam,
//! output clean-up and the bounded-concurrency driver.

pub mod driver;
pub mod generator;
pub mod prompt;
pub mod response;

pub use driver::{RegenerationDriver, RegenerationOutcome, RegenerationReport, WaveProgress};
pub use generator::Generator;
pub use prompt::{Placeholder, PromptTemplate, DEFAULT_TEMPLATE};
pub use response::{extract_comment, postprocess, strip_fences};
