pub mod identity_registry;
pub mod outcome;
pub mod recognition_client;
