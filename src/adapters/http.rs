/// reqwest-backed call adapter
///
/// Each attempt calls the supplied builder closure to get a brand new
/// `RequestBuilder`, sends it, and turns a non-success status into a
/// [`Failure::Status`] carrying the body so the classifier can read the
/// service's own error code.
use super::Capability;
use crate::error::{ErrorClassifier, Failure, RetryEngine, RetryError, RetryStatus};
use crate::settings::{HttpSettings, RetryProfiles};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct HttpAdapter {
    client: Client,
    engine: RetryEngine,
    profiles: RetryProfiles,
}

impl HttpAdapter {
    /// Build a client with the configured timeout and user agent
    pub fn new(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            engine: RetryEngine::new(),
            profiles: RetryProfiles::default(),
        }
    }

    pub fn with_profiles(mut self, profiles: RetryProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.engine = RetryEngine::with_classifier(classifier);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn profiles(&self) -> &RetryProfiles {
        &self.profiles
    }

    /// Send a request built by `build` and decode a JSON success body
    pub async fn call_json<T, B>(&self, capability: Capability, build: B) -> Result<T, RetryError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        self.call_json_with(capability, None, |_| {}, build).await
    }

    pub async fn call_json_cancellable<T, B>(
        &self,
        capability: Capability,
        cancel: &CancellationToken,
        build: B,
    ) -> Result<T, RetryError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
    {
        self.call_json_with(capability, Some(cancel), |_| {}, build)
            .await
    }

    /// JSON call with optional cancellation and a callback before every wait
    pub async fn call_json_with<T, B, S>(
        &self,
        capability: Capability,
        cancel: Option<&CancellationToken>,
        on_retry: S,
        build: B,
    ) -> Result<T, RetryError>
    where
        T: DeserializeOwned,
        B: Fn(&Client) -> RequestBuilder,
        S: FnMut(&RetryStatus),
    {
        self.run(capability, cancel, on_retry, || {
            let request = build(&self.client);
            async move {
                let response = self.send(capability, request).await?;
                response.json::<T>().await.map_err(Failure::from)
            }
        })
        .await
    }

    /// Send a request built by `build` and return the raw success body
    pub async fn call_bytes<B>(&self, capability: Capability, build: B) -> Result<Vec<u8>, RetryError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        self.call_bytes_with(capability, None, |_| {}, build).await
    }

    pub async fn call_bytes_cancellable<B>(
        &self,
        capability: Capability,
        cancel: &CancellationToken,
        build: B,
    ) -> Result<Vec<u8>, RetryError>
    where
        B: Fn(&Client) -> RequestBuilder,
    {
        self.call_bytes_with(capability, Some(cancel), |_| {}, build)
            .await
    }

    pub async fn call_bytes_with<B, S>(
        &self,
        capability: Capability,
        cancel: Option<&CancellationToken>,
        on_retry: S,
        build: B,
    ) -> Result<Vec<u8>, RetryError>
    where
        B: Fn(&Client) -> RequestBuilder,
        S: FnMut(&RetryStatus),
    {
        self.run(capability, cancel, on_retry, || {
            let request = build(&self.client);
            async move {
                let response = self.send(capability, request).await?;
                let body = response.bytes().await?;
                Ok::<_, Failure>(body.to_vec())
            }
        })
        .await
    }

    async fn run<T, F, Fut, S>(
        &self,
        capability: Capability,
        cancel: Option<&CancellationToken>,
        on_retry: S,
        operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
        S: FnMut(&RetryStatus),
    {
        let config = self.profiles.for_capability(capability);
        tracing::debug!(%capability, max_attempts = config.max_attempts(), "Calling service");

        self.engine
            .execute_with_status(config, cancel, on_retry, operation)
            .await
    }

    /// One attempt; any non-success status becomes a failure
    async fn send(&self, capability: Capability, request: RequestBuilder) -> Result<Response, Failure> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // A body we cannot read still leaves the status to classify by
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%capability, status = status.as_u16(), "Service returned an error status");

        Err(Failure::status_with_fallback(
            status.as_u16(),
            body,
            capability.failure_kind(),
        ))
    }
}
