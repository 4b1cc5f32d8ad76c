pub mod classifier;
pub mod gemini;
pub mod resolver;
#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use classifier::{is_fee_message, FEE_MARKERS};
pub use gemini::{FetchError, GeminiClient, TextGenerator};
pub use resolver::{add_fee, PriceResolver};
#[cfg(any(test, feature = "test-utils"))]
pub use scripted::ScriptedGenerator;
