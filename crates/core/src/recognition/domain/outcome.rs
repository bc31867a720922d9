/// Result of one recognition request. Exactly one variant per call.
#[derive(Clone, Debug, PartialEq)]
pub enum RecognitionOutcome {
    Matched {
        person: String,
        /// Match confidence as a fraction in [0, 1].
        confidence: f64,
        liveness_score: f64,
    },
    NotMatched {
        liveness_score: f64,
    },
    /// The backend judged the image not to come from a live subject.
    LivenessFailed {
        score: f64,
        max_score: f64,
        reasons: Vec<String>,
    },
    /// No structured verdict was available (network or decode failure).
    TransportError {
        message: String,
    },
}

/// Verdict of a stand-alone liveness test.
#[derive(Clone, Debug, PartialEq)]
pub struct LivenessReport {
    pub is_live: bool,
    pub score: f64,
    pub max_score: f64,
    pub reasons: Vec<String>,
}

/// The backend's acknowledgment of an enrollment batch.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrollAck {
    pub name: String,
    pub frames_sent: usize,
    pub summary: Option<String>,
}
