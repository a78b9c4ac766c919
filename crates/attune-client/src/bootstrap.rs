//! HTTP client for the one-shot bootstrap fetch done at session start.

use std::time::Duration;

use attune_core::documents::{Adaptations, PersonalityProfile, UiConfiguration};
use attune_settings::AttuneSettings;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::errors::BootstrapError;

/// Response of `GET /health`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// The three session documents fetched before the socket is needed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BootstrapDocuments {
    pub profile: PersonalityProfile,
    pub adaptations: Adaptations,
    pub ui_config: UiConfiguration,
}

#[derive(Clone, Debug)]
pub struct BootstrapClient {
    http: Client,
    base_url: String,
}

impl BootstrapClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BootstrapError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BootstrapError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    pub fn from_settings(settings: &AttuneSettings) -> Result<Self, BootstrapError> {
        Self::new(settings.server.http_base(), settings.http.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn personality_profile(&self) -> Result<PersonalityProfile, BootstrapError> {
        self.get("/personality-profile").await
    }

    pub async fn adaptations(&self) -> Result<Adaptations, BootstrapError> {
        self.get("/adaptations").await
    }

    /// Ask the server for a configuration suited to `context`.
    pub async fn ui_config(&self, context: &str) -> Result<UiConfiguration, BootstrapError> {
        let path = "/ui-config";
        let request = self
            .request(Method::POST, path)
            .json(&json!({ "context": context }));
        self.execute(path, request).await
    }

    /// Everything the server knows about this user, returned as-is.
    pub async fn full_context(&self) -> Result<Value, BootstrapError> {
        self.get("/full-context").await
    }

    pub async fn health(&self) -> Result<HealthStatus, BootstrapError> {
        self.get("/health").await
    }

    /// Fetch profile, adaptations and UI configuration concurrently.
    /// The first failure wins.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_all(&self, context: &str) -> Result<BootstrapDocuments, BootstrapError> {
        let (profile, adaptations, ui_config) = tokio::try_join!(
            self.personality_profile(),
            self.adaptations(),
            self.ui_config(context),
        )?;
        Ok(BootstrapDocuments {
            profile,
            adaptations,
            ui_config,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BootstrapError> {
        let request = self.request(Method::GET, path);
        self.execute(path, request).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{path}", self.base_url))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, BootstrapError> {
        debug!(path, "bootstrap request");
        let response = request.send().await.map_err(|source| BootstrapError::Http {
            path: path.to_owned(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| BootstrapError::Http {
            path: path.to_owned(),
            source,
        })?;
        debug!(path, status = status.as_u16(), bytes = body.len(), "bootstrap response");

        if !status.is_success() {
            return Err(BootstrapError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| BootstrapError::Decode {
            path: path.to_owned(),
            source,
        })
    }
}
