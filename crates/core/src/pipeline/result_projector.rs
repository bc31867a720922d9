use std::fmt;

use crate::recognition::domain::outcome::{EnrollAck, LivenessReport, RecognitionOutcome};
use crate::recognition::domain::recognition_client::RecognitionError;

use super::capture_error::CaptureError;

#[derive(Clone, Debug, PartialEq)]
pub enum SuccessDetails {
    Matched {
        person: String,
        /// Rounded to one decimal place.
        confidence_percent: f64,
        liveness_score: f64,
    },
    NoMatch {
        liveness_score: f64,
    },
    Live {
        score: f64,
        max_score: f64,
    },
    Enrolled {
        person: String,
        frames: usize,
        summary: Option<String>,
    },
}

/// What the presentation layer shows for one finished action.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayState {
    Success(SuccessDetails),
    /// Liveness rejection with the backend's reasons, in order.
    Rejected(Vec<String>),
    Failed(String),
}

impl fmt::Display for SuccessDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessDetails::Matched {
                person,
                confidence_percent,
                liveness_score,
            } => write!(
                f,
                "Matched {person} ({confidence_percent:.1}% confidence, \
                 liveness score {liveness_score})"
            ),
            SuccessDetails::NoMatch { liveness_score } => {
                write!(f, "No match (liveness score {liveness_score})")
            }
            SuccessDetails::Live { score, max_score } => {
                write!(f, "Live subject (score {score}/{max_score})")
            }
            SuccessDetails::Enrolled {
                person,
                frames,
                summary,
            } => {
                write!(f, "Enrolled {person} from {frames} frames")?;
                match summary {
                    Some(summary) => write!(f, ": {summary}"),
                    None => Ok(()),
                }
            }
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayState::Success(details) => details.fmt(f),
            DisplayState::Rejected(reasons) => {
                write!(f, "Liveness check failed")?;
                for reason in reasons {
                    write!(f, "\n  - {reason}")?;
                }
                Ok(())
            }
            DisplayState::Failed(message) => write!(f, "Failed: {message}"),
        }
    }
}

/// Confidence fraction as a percentage rounded to one decimal place.
///
/// Values above 1 are taken to be percentages already.
pub fn confidence_percent(confidence: f64) -> f64 {
    let percent = if confidence > 1.0 {
        confidence
    } else {
        confidence * 100.0
    };
    (percent * 10.0).round() / 10.0
}

pub fn project(outcome: &RecognitionOutcome) -> DisplayState {
    match outcome {
        RecognitionOutcome::Matched {
            person,
            confidence,
            liveness_score,
        } => DisplayState::Success(SuccessDetails::Matched {
            person: person.clone(),
            confidence_percent: confidence_percent(*confidence),
            liveness_score: *liveness_score,
        }),
        RecognitionOutcome::NotMatched { liveness_score } => {
            DisplayState::Success(SuccessDetails::NoMatch {
                liveness_score: *liveness_score,
            })
        }
        RecognitionOutcome::LivenessFailed {
            score,
            max_score,
            reasons,
        } => rejected(*score, *max_score, reasons),
        RecognitionOutcome::TransportError { message } => DisplayState::Failed(message.clone()),
    }
}

pub fn project_liveness(report: &LivenessReport) -> DisplayState {
    if report.is_live {
        DisplayState::Success(SuccessDetails::Live {
            score: report.score,
            max_score: report.max_score,
        })
    } else {
        rejected(report.score, report.max_score, &report.reasons)
    }
}

pub fn project_enrollment(ack: &EnrollAck) -> DisplayState {
    DisplayState::Success(SuccessDetails::Enrolled {
        person: ack.name.clone(),
        frames: ack.frames_sent,
        summary: ack.summary.clone(),
    })
}

pub fn project_failure(error: &CaptureError) -> DisplayState {
    let message = match error {
        CaptureError::Recognition(RecognitionError::Upload(detail)) => detail.clone(),
        CaptureError::Recognition(RecognitionError::Transport(detail)) => {
            format!("could not reach the recognition server ({detail})")
        }
        other => other.to_string(),
    };
    DisplayState::Failed(message)
}

fn rejected(score: f64, max_score: f64, reasons: &[String]) -> DisplayState {
    if reasons.is_empty() {
        DisplayState::Rejected(vec![format!("liveness score {score}/{max_score}")])
    } else {
        DisplayState::Rejected(reasons.to_vec())
    }
}
