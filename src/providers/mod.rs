pub mod envelope;
pub mod openai;
pub mod reliable;
pub mod scrub;
pub mod traits;

pub use envelope::{Extraction, ResponseEnvelope};
pub use openai::OpenAiProvider;
pub use reliable::ReliableProvider;
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use traits::{Provider, ServiceReply};

use crate::config::Config;
use std::sync::Arc;

/// Build the provider stack from config: the OpenAI client, wrapped in the
/// retry layer only when the operator opted into it.
pub fn create_provider(config: &Config) -> Arc<dyn Provider> {
    let base: Arc<dyn Provider> = Arc::new(OpenAiProvider::from_config(config));
    if config.reliability.max_retries == 0 {
        base
    } else {
        Arc::new(ReliableProvider::new(
            base,
            config.reliability.max_retries,
            config.reliability.base_backoff_ms,
        ))
    }
}
