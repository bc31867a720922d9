//! Decoding of backend response bodies.
//!
//! Bodies are decoded regardless of HTTP status: the backend reports
//! liveness rejections as structured 4xx bodies, so a non-2xx status only
//! becomes a transport failure when the body carries no usable verdict.

use serde::Deserialize;

use crate::recognition::domain::identity_registry::UserReport;
use crate::recognition::domain::outcome::{EnrollAck, LivenessReport, RecognitionOutcome};
use crate::recognition::domain::recognition_client::RecognitionError;

/// Status line and body of a completed HTTP exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct LivenessDetails {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    max_score: f64,
    #[serde(default)]
    reasons: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeBody {
    #[serde(rename = "match")]
    matched: Option<bool>,
    person: Option<String>,
    confidence: Option<f64>,
    liveness_score: Option<f64>,
    error: Option<String>,
    liveness_details: Option<LivenessDetails>,
}

#[derive(Debug, Deserialize)]
struct LivenessBody {
    is_live: Option<bool>,
    details: Option<LivenessDetails>,
    liveness_details: Option<LivenessDetails>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrollBody {
    success: Option<bool>,
    message: Option<String>,
    error: Option<String>,
    #[serde(alias = "images_saved", alias = "saved_count")]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DeleteBody {
    remaining_users: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn parse<'a, T: Deserialize<'a>>(response: &'a RawResponse) -> Result<T, RecognitionError> {
    serde_json::from_slice(&response.body).map_err(|e| {
        RecognitionError::Transport(format!(
            "HTTP {}: unreadable response body: {e}",
            response.status
        ))
    })
}

fn status_message(response: &RawResponse, error: Option<String>) -> String {
    error.unwrap_or_else(|| format!("HTTP error! status: {}", response.status))
}

/// Classifies a recognition response into exactly one outcome.
pub fn decode_recognition(response: &RawResponse) -> Result<RecognitionOutcome, RecognitionError> {
    let body: RecognizeBody = parse(response)?;

    if let Some(details) = body.liveness_details {
        if !response.is_success() || body.error.is_some() {
            return Ok(RecognitionOutcome::LivenessFailed {
                score: details.score,
                max_score: details.max_score,
                reasons: details.reasons,
            });
        }
    }

    if !response.is_success() {
        return Err(RecognitionError::Transport(status_message(
            response, body.error,
        )));
    }

    match (body.matched, body.person) {
        (Some(true), Some(person)) => Ok(RecognitionOutcome::Matched {
            person,
            confidence: body.confidence.unwrap_or(0.0),
            liveness_score: body.liveness_score.unwrap_or(0.0),
        }),
        (Some(true), None) => Err(RecognitionError::Transport(
            "match reported without a person".to_string(),
        )),
        (Some(false), _) => Ok(RecognitionOutcome::NotMatched {
            liveness_score: body.liveness_score.unwrap_or(0.0),
        }),
        (None, _) => Err(RecognitionError::Transport(status_message(
            response,
            body.error.or_else(|| Some("response has no match field".to_string())),
        ))),
    }
}

pub fn decode_liveness(response: &RawResponse) -> Result<LivenessReport, RecognitionError> {
    let body: LivenessBody = parse(response)?;
    let details = body.details.or(body.liveness_details);

    match (body.is_live, details) {
        (Some(is_live), details) => {
            let details = details.unwrap_or(LivenessDetails {
                score: 0.0,
                max_score: 0.0,
                reasons: Vec::new(),
            });
            Ok(LivenessReport {
                is_live,
                score: details.score,
                max_score: details.max_score,
                reasons: details.reasons,
            })
        }
        (None, Some(details)) => Ok(LivenessReport {
            is_live: false,
            score: details.score,
            max_score: details.max_score,
            reasons: details.reasons,
        }),
        (None, None) => Err(RecognitionError::Transport(status_message(
            response, body.error,
        ))),
    }
}

/// An acknowledgment requires an explicit `success: true`; anything else
/// is a server rejection carrying the backend's message.
pub fn decode_enroll(
    response: &RawResponse,
    name: &str,
    frames_sent: usize,
) -> Result<EnrollAck, RecognitionError> {
    let body: EnrollBody = parse(response)?;
    if body.success == Some(true) && response.is_success() {
        let summary = body
            .message
            .or_else(|| body.count.map(|n| format!("{n} images stored")));
        return Ok(EnrollAck {
            name: name.to_string(),
            frames_sent,
            summary,
        });
    }
    Err(RecognitionError::Upload(
        body.error.or(body.message).unwrap_or_else(|| {
            format!("enrollment not acknowledged (HTTP {})", response.status)
        }),
    ))
}

pub fn decode_report(response: &RawResponse) -> Result<UserReport, RecognitionError> {
    if !response.is_success() {
        let error = serde_json::from_slice::<ErrorBody>(&response.body)
            .ok()
            .and_then(|b| b.error);
        return Err(RecognitionError::Transport(status_message(response, error)));
    }
    parse(response)
}

pub fn decode_delete(response: &RawResponse) -> Result<u64, RecognitionError> {
    let body: DeleteBody = parse(response)?;
    match (response.is_success(), body.remaining_users) {
        (true, Some(remaining)) => Ok(remaining),
        (true, None) => Err(RecognitionError::Transport(
            "delete response has no remaining_users".to_string(),
        )),
        (false, _) => Err(RecognitionError::Upload(status_message(
            response, body.error,
        ))),
    }
}
