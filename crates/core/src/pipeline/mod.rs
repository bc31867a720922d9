pub mod capture_error;
pub mod capture_request;
pub mod capture_sequencer;
pub mod capture_session;
pub mod result_projector;
