pub mod http_recognition_client;
pub mod retry_policy;
#[cfg(test)]
pub(crate) mod stub_server;
pub mod wire;
