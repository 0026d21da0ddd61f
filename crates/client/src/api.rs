//! REST client for the read side of the executor's HTTP surface.
//!
//! [`StrikerApi`] is also the default [`Fetcher`] for the status poller:
//! the poll key is the request path.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use striker_core::capacity::CapacityDescriptor;
use striker_core::entity::{AnvilOverview, HostOverview, ServerOverview};
use striker_core::job::{Job, JobOverview, LegacyJobSnapshot};
use striker_core::network::NetworkSnapshot;
use striker_core::routes;

use crate::config::ClientConfig;
use crate::fetch::{FetchError, Fetcher};
use crate::gateway::CommandGateway;

/// HTTP client for one executor.
#[derive(Debug, Clone)]
pub struct StrikerApi {
    client: reqwest::Client,
    api_url: String,
}

impl StrikerApi {
    /// Build a client with the configured request timeout (`0` disables it).
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if !config.request_timeout.is_zero() {
            builder = builder.timeout(config.request_timeout);
        }
        Ok(Self::with_client(builder.build()?, config.api_url.clone()))
    }

    /// Reuse an existing [`reqwest::Client`] and its connection pool.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Command gateway sharing this client's connection pool.
    pub fn gateway(&self) -> CommandGateway {
        CommandGateway::with_client(self.client.clone(), self.api_url.clone())
    }

    /// `GET <api_url><path>` decoded as JSON.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, FetchError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    pub async fn anvils(&self) -> Result<Vec<AnvilOverview>, FetchError> {
        self.get_json(routes::ANVILS).await
    }

    pub async fn anvil(&self, uuid: &str) -> Result<AnvilOverview, FetchError> {
        self.get_json(&routes::anvil(uuid)?).await
    }

    pub async fn hosts(&self) -> Result<Vec<HostOverview>, FetchError> {
        self.get_json(routes::HOSTS).await
    }

    pub async fn servers(&self) -> Result<Vec<ServerOverview>, FetchError> {
        self.get_json(routes::SERVERS).await
    }

    pub async fn capacity(&self, anvil_uuid: &str) -> Result<CapacityDescriptor, FetchError> {
        self.get_json(&routes::anvil_capacity(anvil_uuid)?).await
    }

    pub async fn jobs(&self) -> Result<Vec<JobOverview>, FetchError> {
        self.get_json(routes::JOBS).await
    }

    pub async fn job(&self, uuid: &str) -> Result<Job, FetchError> {
        self.get_json(&routes::job(uuid)?).await
    }

    /// Job list from the legacy status snapshot, in overview form.
    pub async fn legacy_jobs(&self) -> Result<Vec<JobOverview>, FetchError> {
        let snapshot: LegacyJobSnapshot = self.get_json(routes::LEGACY_JOBS).await?;
        Ok(snapshot.into_overviews())
    }

    pub async fn legacy_network(&self) -> Result<NetworkSnapshot, FetchError> {
        self.get_json(routes::LEGACY_NETWORK).await
    }

    // ---- private helpers ----

    async fn parse_response<R: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<R, FetchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl<R> Fetcher<R> for StrikerApi
where
    R: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, key: &str) -> Result<R, FetchError> {
        self.get_json(key).await
    }
}
