use super::gemini::{FetchError, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Generator replaying queued replies.
///
/// Once the queue is empty every call fails with `Status(503)`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, u16>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn fail(self, status: u16) -> Self {
        self.push(Err(status));
        self
    }

    fn push(&self, reply: Result<String, u16>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _api_key: &str, prompt: &str) -> Result<String, FetchError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(status)) => Err(FetchError::Status(status)),
            None => Err(FetchError::Status(503)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generator_replays_then_fails() {
        let generator = ScriptedGenerator::new().reply("100 TL").fail(500);

        assert_eq!(generator.generate("k", "a").await.unwrap(), "100 TL");
        assert!(matches!(generator.generate("k", "b").await, Err(FetchError::Status(500))));
        assert!(matches!(generator.generate("k", "c").await, Err(FetchError::Status(503))));
        assert_eq!(generator.prompts(), vec!["a", "b", "c"]);
    }
}
