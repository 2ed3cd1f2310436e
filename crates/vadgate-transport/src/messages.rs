use serde::{Deserialize, Serialize};

use vadgate_foundation::SessionError;

/// One transcript hypothesis with its confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionAlternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// One entry of an inbound result batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub is_final: bool,
    pub alternatives: Vec<RecognitionAlternative>,
}

/// Validate and decode one inbound text message.
///
/// The wire format is a JSON array of result objects. Anything else is a
/// `Protocol` error; the caller surfaces it without tearing the session down.
pub fn parse_result_batch(text: &str) -> Result<Vec<RecognitionResult>, SessionError> {
    serde_json::from_str::<Vec<RecognitionResult>>(text)
        .map_err(|e| SessionError::Protocol(e.to_string()))
}
