use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Interval dataset shipped to the external analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
    /// Peak-to-peak intervals in milliseconds
    pub data: Vec<u32>,
    pub analysis: AnalysisSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSpec {
    #[serde(rename = "type")]
    pub kind: String,
}

impl AnalysisRequest {
    /// Readiness analysis over an RRI dataset, the only kind the device asks
    /// for.
    pub fn readiness(id: u32, data: Vec<u32>) -> Self {
        Self {
            id,
            kind: "RRI".into(),
            data,
            analysis: AnalysisSpec {
                kind: "readiness".into(),
            },
        }
    }
}

/// Result payload delivered by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub mean_hr_bpm: f64,
    pub mean_rr_ms: f64,
    pub rmssd_ms: f64,
    pub sdnn_ms: f64,
    pub pns_index: f64,
    pub sns_index: f64,
}

impl AnalysisResponse {
    /// Coarse parasympathetic activity level shown next to the raw index.
    pub fn pns_level(&self) -> &'static str {
        if self.pns_index < -1.0 {
            "+"
        } else if self.pns_index <= 1.0 {
            "++"
        } else {
            "+++"
        }
    }

    /// Coarse sympathetic activity level; the scale runs the other way.
    pub fn sns_level(&self) -> &'static str {
        if self.sns_index < -1.0 {
            "+++"
        } else if self.sns_index <= 1.0 {
            "++"
        } else {
            "+"
        }
    }
}

/// Fire-and-forget contract with the analysis collaborator.
///
/// `submit` must not block the main loop; the response arrives later and is
/// picked up by polling between processing steps.
pub trait AnalysisClient {
    fn submit(&mut self, request: &AnalysisRequest) -> Result<()>;
    fn poll(&mut self) -> Option<AnalysisResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_renamed_tags() {
        let request = AnalysisRequest::readiness(123, vec![800, 820]);
        let js = serde_json::to_string(&request).unwrap();
        assert!(js.contains("\"type\":\"RRI\""));
        assert!(js.contains("\"type\":\"readiness\""));
        assert!(js.contains("\"data\":[800,820]"));
    }

    #[test]
    fn response_round_trips() {
        let text = r#"{"mean_hr_bpm":74.2,"mean_rr_ms":808.0,"rmssd_ms":31.5,
                       "sdnn_ms":16.4,"pns_index":0.42,"sns_index":-0.17}"#;
        let response: AnalysisResponse = serde_json::from_str(text).unwrap();
        assert_eq!(response.mean_hr_bpm, 74.2);
        assert_eq!(response.pns_level(), "++");
        assert_eq!(response.sns_level(), "++");
    }

    #[test]
    fn index_levels_cover_all_bands() {
        let mut response = AnalysisResponse {
            mean_hr_bpm: 70.0,
            mean_rr_ms: 850.0,
            rmssd_ms: 40.0,
            sdnn_ms: 30.0,
            pns_index: -2.0,
            sns_index: -2.0,
        };
        assert_eq!(response.pns_level(), "+");
        assert_eq!(response.sns_level(), "+++");
        response.pns_index = 2.0;
        response.sns_index = 2.0;
        assert_eq!(response.pns_level(), "+++");
        assert_eq!(response.sns_level(), "+");
    }
}
