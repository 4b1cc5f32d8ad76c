use super::classifier::{is_fee_message, normalize_caption};
use super::gemini::{FetchError, TextGenerator};
use regex::Regex;
use std::sync::{Arc, LazyLock};

static FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());

static CURRENCY_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)(?:tl|₺)").unwrap());

pub fn price_prompt(text: &str) -> String {
    format!(
        "Extract only the TL/₺ price from this text and format it as 'X TL': {}\n\
         Example input: \"250₺=7.30$=6.75€\"\n\
         Example output: \"250 TL\"\n\
         Only return the formatted price, nothing else.",
        text
    )
}

/// Adds `fee` to the first number in `price` and formats it as `"{sum} TL"`.
///
/// Returns `price` unchanged when it holds no number or the sum overflows.
pub fn add_fee(price: &str, fee: i64) -> String {
    let total = FIRST_NUMBER
        .captures(price)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .and_then(|amount| amount.checked_add(fee));

    match total {
        Some(total) => format!("{} TL", total),
        None => price.to_string(),
    }
}

/// Local extraction used when the text generator is unavailable.
///
/// The currency marker must directly follow the digits.
pub fn fallback_price(text: &str) -> Option<String> {
    CURRENCY_AMOUNT
        .captures(text)
        .map(|caps| format!("{} TL", &caps[1]))
}

/// Turns price captions into `"X TL"` strings with the configured fee applied.
pub struct PriceResolver {
    generator: Arc<dyn TextGenerator>,
    api_key: String,
    fee: i64,
}

impl PriceResolver {
    pub fn new(generator: Arc<dyn TextGenerator>, api_key: impl Into<String>, fee: i64) -> Self {
        Self {
            generator,
            api_key: api_key.into(),
            fee,
        }
    }

    /// Never fails. A failed remote call falls back to local extraction, and
    /// text with no recognisable price comes back unchanged.
    pub async fn resolve(&self, raw: &str) -> String {
        match self.fetch_price(raw).await {
            Ok(candidate) => add_fee(candidate.trim(), self.fee),
            Err(e) => {
                tracing::warn!(error = %e, "Price extraction failed, using local fallback");
                match fallback_price(raw) {
                    Some(price) => add_fee(&price, self.fee),
                    None => raw.to_string(),
                }
            }
        }
    }

    /// Resolves a cluster's caption, or `None` when there is nothing worth publishing.
    pub async fn resolve_caption(&self, text: Option<&str>) -> Option<String> {
        let text = text.filter(|t| !t.is_empty() && is_fee_message(t))?;
        let resolved = self.resolve(&normalize_caption(text)).await;
        let resolved = resolved.trim();
        if resolved.is_empty() {
            None
        } else {
            Some(resolved.to_string())
        }
    }

    async fn fetch_price(&self, raw: &str) -> Result<String, FetchError> {
        if self.api_key.is_empty() {
            return Err(FetchError::MissingApiKey);
        }
        self.generator
            .generate(&self.api_key, &price_prompt(raw))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::TextGenerationConfig;
    use crate::pricing::gemini::GeminiClient;
    use crate::pricing::scripted::ScriptedGenerator;
    use std::time::Duration;

    fn resolver(generator: ScriptedGenerator, fee: i64) -> (PriceResolver, Arc<ScriptedGenerator>) {
        let generator = Arc::new(generator);
        (PriceResolver::new(generator.clone(), "key", fee), generator)
    }

    #[test]
    fn test_add_fee() {
        assert_eq!(add_fee("100 TL", 20), "120 TL");
        assert_eq!(add_fee("no digits here", 20), "no digits here");
        assert_eq!(add_fee("fiyat 45 tl, kargo 10", 5), "50 TL");
        assert_eq!(add_fee("99999999999999999999 TL", 1), "99999999999999999999 TL");
    }

    #[test]
    fn test_fallback_price() {
        assert_eq!(fallback_price("250₺ kampanya"), Some("250 TL".to_string()));
        assert_eq!(fallback_price("sadece 300tl"), Some("300 TL".to_string()));
        assert_eq!(fallback_price("FIYAT 120TL"), Some("120 TL".to_string()));
        assert_eq!(fallback_price("fiyat 120 TL"), None);
        assert_eq!(fallback_price("yeni sezon"), None);
    }

    #[tokio::test]
    async fn test_resolve_uses_generated_price() {
        let (resolver, generator) = resolver(ScriptedGenerator::new().reply("  250 TL\n"), 20);
        assert_eq!(resolver.resolve("250₺=7.30$=6.75€").await, "270 TL");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("250₺=7.30$=6.75€"));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_on_failure() {
        let (resolver, _) = resolver(ScriptedGenerator::new().fail(500), 20);
        assert_eq!(resolver.resolve("250₺ kampanya").await, "270 TL");
    }

    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn test_network_failure_falls_back_to_local_price() {
        let client = GeminiClient::new(&TextGenerationConfig {
            endpoint: format!("{}/v1beta/models/test:generateContent", closed_port_url()),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        let resolver = PriceResolver::new(Arc::new(client), "key", 20);

        assert_eq!(resolver.resolve("250₺ kampanya").await, "270 TL");
    }

    #[tokio::test]
    async fn test_fallback_leaves_spaced_price_unchanged() {
        let (resolver, _) = resolver(ScriptedGenerator::new().fail(500), 20);
        assert_eq!(
            resolver.resolve("fiyat 120 tl kargo dahil").await,
            "fiyat 120 tl kargo dahil"
        );
    }

    #[tokio::test]
    async fn test_resolve_returns_raw_text_without_price() {
        let (resolver, _) = resolver(ScriptedGenerator::new(), 20);
        assert_eq!(resolver.resolve("stokta yok").await, "stokta yok");
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_remote_call() {
        let generator = Arc::new(ScriptedGenerator::new().reply("999 TL"));
        let resolver = PriceResolver::new(generator.clone(), "", 10);

        assert_eq!(resolver.resolve("150₺").await, "160 TL");
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_caption() {
        let (resolver, generator) = resolver(ScriptedGenerator::new(), 0);

        assert_eq!(resolver.resolve_caption(None).await, None);
        assert_eq!(resolver.resolve_caption(Some("")).await, None);
        assert_eq!(resolver.resolve_caption(Some("no price")).await, None);
        assert_eq!(
            resolver.resolve_caption(Some("Yeni Ürün\n300TL")).await,
            Some("300 TL".to_string())
        );
        assert!(generator.prompts()[0].contains("yeni ürün300tl"));
    }
}
