#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One plate found in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateReading {
    pub plate_number: String,
    pub confidence: f64,
    pub is_valid: bool,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub raw_text: Option<String>,
}

/// Where a [`ProcessingResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    #[default]
    Backend,
    LocalFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub plates_detected: usize,
    #[serde(default)]
    pub results: Vec<PlateReading>,
    /// Seconds spent, as measured by the caller.
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub source: ResultSource,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProcessRequest<'a> {
    pub image: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchRequest<'a> {
    pub images: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchResponse {
    pub results: Vec<ProcessingResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_payload_parses() {
        let payload = r#"{
            "success": true,
            "plates_detected": 1,
            "results": [{
                "plate_number": "TN-01-AB-1234",
                "confidence": 93.5,
                "is_valid": true,
                "bbox": {"x": 10, "y": 20, "width": 100, "height": 30},
                "raw_text": "TN01AB1234"
            }]
        }"#;
        let result: ProcessingResult = serde_json::from_str(payload).unwrap();
        assert_eq!(result.source, ResultSource::Backend);
        assert_eq!(result.results[0].bbox.unwrap().width, 100.0);
        assert!(result.error.is_none());
    }
}
