use crate::config::SessionOptions;

/// Builds the engine-specific half of the handshake message.
///
/// The coordinator merges the returned value into the first transport
/// message under the `engine-config` key; the proxy relays it to the
/// recognition backend unchanged.
pub trait EngineProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn build_engine_config(&self, opts: &SessionOptions) -> serde_json::Value;
}

/// AmiVoice: takes only the common recognition fields.
pub struct AmiVoice;

impl EngineProvider for AmiVoice {
    fn name(&self) -> &'static str {
        "amivoice"
    }

    fn build_engine_config(&self, opts: &SessionOptions) -> serde_json::Value {
        serde_json::json!({
            "type": self.name(),
            "lang": opts.lang,
            "continuous": opts.continuous,
            "interim_results": opts.interim_results,
            "max_alternatives": opts.max_alternatives,
        })
    }
}

/// Google Speech-to-Text: common fields plus punctuation and the
/// single-utterance hint (the inverse of continuous mode).
pub struct GoogleSpeechToText {
    pub enable_automatic_punctuation: bool,
}

impl Default for GoogleSpeechToText {
    fn default() -> Self {
        Self {
            enable_automatic_punctuation: true,
        }
    }
}

impl EngineProvider for GoogleSpeechToText {
    fn name(&self) -> &'static str {
        "google"
    }

    fn build_engine_config(&self, opts: &SessionOptions) -> serde_json::Value {
        serde_json::json!({
            "type": self.name(),
            "lang": opts.lang,
            "continuous": opts.continuous,
            "interim_results": opts.interim_results,
            "max_alternatives": opts.max_alternatives,
            "enable_automatic_punctuation": self.enable_automatic_punctuation,
            "single_utterance": !opts.continuous,
        })
    }
}
