use std::thread;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Request};

use crate::recognition::domain::identity_registry::{IdentityRegistry, UserReport};
use crate::recognition::domain::outcome::{EnrollAck, LivenessReport, RecognitionOutcome};
use crate::recognition::domain::recognition_client::{RecognitionClient, RecognitionError};
use crate::recognition::infrastructure::retry_policy::RetryPolicy;
use crate::recognition::infrastructure::wire::{self, RawResponse};
use crate::shared::cancel::{CancelToken, Cancelled};
use crate::shared::config::ClientConfig;
use crate::shared::constants::SNAPSHOT_FILENAME;
use crate::shared::payload::Payload;

/// Talks to the recognition backend over HTTP with multipart uploads.
///
/// Every request runs on a short-lived helper thread so the caller can
/// abandon it when its [`CancelToken`] fires; a late reply is dropped.
/// The client-side timeout comes from [`ClientConfig::timeout`].
pub struct HttpRecognitionClient {
    client: Client,
    config: ClientConfig,
    retry: RetryPolicy,
}

impl HttpRecognitionClient {
    pub fn new(config: ClientConfig) -> Result<Self, RecognitionError> {
        config
            .validate()
            .map_err(|e| RecognitionError::Validation(e.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_backoff);
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn send(
        &self,
        cancel: &CancelToken,
        build: impl Fn() -> Result<Request, RecognitionError>,
    ) -> Result<RawResponse, RecognitionError> {
        self.retry.run(cancel, || {
            cancel.check()?;
            let request = build()?;
            log::debug!("{} {}", request.method(), request.url());
            self.round_trip(request, cancel)
        })
    }

    fn round_trip(
        &self,
        request: Request,
        cancel: &CancelToken,
    ) -> Result<RawResponse, RecognitionError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let client = self.client.clone();
        let timeout = self.config.timeout;

        thread::Builder::new()
            .name("recognition-request".to_string())
            .spawn(move || {
                let result = client
                    .execute(request)
                    .and_then(|response| {
                        let status = response.status().as_u16();
                        response.bytes().map(|body| RawResponse {
                            status,
                            body: body.to_vec(),
                        })
                    })
                    .map_err(|e| {
                        if e.is_timeout() {
                            RecognitionError::Transport(format!(
                                "request timed out after {}s",
                                timeout.as_secs_f64()
                            ))
                        } else {
                            RecognitionError::Transport(e.to_string())
                        }
                    });
                let _ = tx.send(result);
            })
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        crossbeam_channel::select! {
            recv(rx) -> reply => reply.unwrap_or_else(|_| {
                Err(RecognitionError::Transport(
                    "request thread exited without a reply".to_string(),
                ))
            }),
            recv(cancel.signal()) -> _ => Err(RecognitionError::Cancelled(Cancelled)),
        }
    }

    fn image_part(payload: &Payload, filename: &str) -> Result<Part, RecognitionError> {
        Part::bytes(payload.bytes().to_vec())
            .file_name(filename.to_string())
            .mime_str(payload.mime_type())
            .map_err(|e| RecognitionError::Validation(e.to_string()))
    }

    fn post_single_image(
        &self,
        path: &str,
        payload: &Payload,
        cancel: &CancelToken,
    ) -> Result<RawResponse, RecognitionError> {
        if payload.is_empty() {
            return Err(RecognitionError::Validation("image is empty".to_string()));
        }
        let url = self.config.url(path);
        self.send(cancel, || {
            let form = Form::new().part("image", Self::image_part(payload, SNAPSHOT_FILENAME)?);
            self.client
                .post(&url)
                .multipart(form)
                .build()
                .map_err(|e| RecognitionError::Validation(e.to_string()))
        })
    }
}

impl RecognitionClient for HttpRecognitionClient {
    fn enroll(
        &self,
        label: &str,
        payloads: &[Payload],
        cancel: &CancelToken,
    ) -> Result<EnrollAck, RecognitionError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(RecognitionError::Validation("name is required".to_string()));
        }
        if payloads.is_empty() {
            return Err(RecognitionError::Validation(
                "no images to enroll".to_string(),
            ));
        }

        let url = self.config.url(&self.config.endpoints.enroll);
        log::info!("Enrolling '{label}' with {} images", payloads.len());
        let response = self.send(cancel, || {
            let mut form = Form::new().text("name", label.to_string());
            for (i, payload) in payloads.iter().enumerate() {
                form = form.part("images", Self::image_part(payload, payload.filename())?);
                log::trace!("images[{i}] = {} ({} bytes)", payload.filename(), payload.len());
            }
            self.client
                .post(&url)
                .multipart(form)
                .build()
                .map_err(|e| RecognitionError::Validation(e.to_string()))
        })?;
        wire::decode_enroll(&response, label, payloads.len())
    }

    fn recognize(
        &self,
        payload: &Payload,
        cancel: &CancelToken,
    ) -> Result<RecognitionOutcome, Cancelled> {
        let decoded = self
            .post_single_image(&self.config.endpoints.recognize, payload, cancel)
            .and_then(|response| wire::decode_recognition(&response));
        match decoded {
            Ok(outcome) => Ok(outcome),
            Err(RecognitionError::Cancelled(c)) => Err(c),
            Err(e) => Ok(RecognitionOutcome::TransportError {
                message: match e {
                    RecognitionError::Transport(message) => message,
                    other => other.to_string(),
                },
            }),
        }
    }

    fn test_liveness(
        &self,
        payload: &Payload,
        cancel: &CancelToken,
    ) -> Result<LivenessReport, RecognitionError> {
        let response = self.post_single_image(&self.config.endpoints.liveness, payload, cancel)?;
        wire::decode_liveness(&response)
    }
}

impl IdentityRegistry for HttpRecognitionClient {
    fn list_users(&self, limit: u32, page: u32) -> Result<UserReport, RecognitionError> {
        if limit == 0 || page == 0 {
            return Err(RecognitionError::Validation(
                "limit and page must be at least 1".to_string(),
            ));
        }
        let url = self.config.url(&self.config.endpoints.report);
        let response = self.send(&CancelToken::new(), || {
            self.client
                .get(&url)
                .query(&[("limit", limit), ("page", page)])
                .build()
                .map_err(|e| RecognitionError::Validation(e.to_string()))
        })?;
        let report = wire::decode_report(&response)?;
        let total_pages = report.pagination.total_pages;
        if total_pages > 0 && !report.page_in_range(page) {
            return Err(RecognitionError::Validation(format!(
                "page {page} is outside 1..={total_pages}"
            )));
        }
        Ok(report)
    }

    fn delete_user(&self, name: &str) -> Result<u64, RecognitionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecognitionError::Validation("Invalid userName".to_string()));
        }
        let mut url = reqwest::Url::parse(&self.config.url(&self.config.endpoints.delete_user))
            .map_err(|e| RecognitionError::Validation(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RecognitionError::Validation("server URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(name);

        log::info!("Deleting user '{name}'");
        let response = self.send(&CancelToken::new(), || {
            self.client
                .delete(url.clone())
                .build()
                .map_err(|e| RecognitionError::Validation(e.to_string()))
        })?;
        wire::decode_delete(&response)
    }
}
