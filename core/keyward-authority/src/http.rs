//! HTTP client for a remote authority.
//!
//! Speaks the JSON REST mapping under `/api/v1/licenses`. One request per
//! call, bounded by the configured timeout, never retried.

use crate::authority::RemoteAuthority;
use crate::error::{AuthorityError, AuthorityResult};
use crate::wire::{
    BindRequest, BlacklistRequest, CreateLicenseRequest, CreateLicenseResponse, ErrorBody,
    WireLicense,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use keyward_types::{LicensePatch, LicenseRecord, LicenseToken};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpAuthorityClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Base URL of the authority (e.g. `https://licenses.example.com`).
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Optional bearer key sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

impl AuthorityConfig {
    /// Config for `base_url` with default timeout and no key.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// [`RemoteAuthority`] over HTTP.
pub struct HttpAuthorityClient {
    config: AuthorityConfig,
    client: Client,
}

impl HttpAuthorityClient {
    /// Builds a client for the given config.
    pub fn new(config: AuthorityConfig) -> AuthorityResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuthorityError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// The config this client was built with.
    #[must_use]
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Sends the request and turns every non-success answer into an error.
    /// `subject` names what a 404 refers to.
    ///
    /// Only a 404 carrying the authority's not-found code means the token is
    /// unknown. Any other 404 came from a proxy or a wrong base path and is
    /// a malformed response.
    async fn send(&self, builder: RequestBuilder, subject: &str) -> AuthorityResult<Response> {
        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error_body = serde_json::from_str::<ErrorBody>(&body).ok();
        if status == StatusCode::NOT_FOUND {
            return match error_body {
                Some(b) if b.is_not_found() => Err(AuthorityError::NotFound(subject.to_string())),
                _ => {
                    warn!("404 for {subject} did not come from the authority");
                    Err(AuthorityError::MalformedResponse(format!(
                        "404 for {subject} without a not-found answer"
                    )))
                }
            };
        }

        let message = error_body.map(|b| b.error).unwrap_or(body);
        Err(AuthorityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> AuthorityResult<T> {
        let body = response.text().await.map_err(map_transport)?;
        serde_json::from_str(&body).map_err(|e| AuthorityError::MalformedResponse(e.to_string()))
    }

    fn license_path(token: &LicenseToken) -> String {
        format!("/api/v1/licenses/{}", token.as_str())
    }
}

#[async_trait]
impl RemoteAuthority for HttpAuthorityClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn list_licenses(&self) -> AuthorityResult<Vec<LicenseRecord>> {
        let response = self
            .send(self.request(Method::GET, "/api/v1/licenses"), "/api/v1/licenses")
            .await?;
        let wire: Vec<WireLicense> = Self::decode(response).await?;
        debug!("authority listed {} license(s)", wire.len());
        wire.into_iter().map(WireLicense::into_record).collect()
    }

    async fn get_license(&self, token: &LicenseToken) -> AuthorityResult<LicenseRecord> {
        let response = self
            .send(
                self.request(Method::GET, &Self::license_path(token)),
                token.as_str(),
            )
            .await?;
        let wire: WireLicense = Self::decode(response).await?;
        wire.into_record()
    }

    async fn create_license(
        &self,
        expiry_date: NaiveDate,
        memo: &str,
    ) -> AuthorityResult<LicenseToken> {
        let body = CreateLicenseRequest {
            expiry_date,
            memo: memo.to_string(),
        };
        let response = self
            .send(
                self.request(Method::POST, "/api/v1/licenses").json(&body),
                "/api/v1/licenses",
            )
            .await?;
        let created: CreateLicenseResponse = Self::decode(response).await?;
        LicenseToken::parse(&created.token)
            .map_err(|e| AuthorityError::MalformedResponse(e.to_string()))
    }

    async fn patch_license(
        &self,
        token: &LicenseToken,
        patch: &LicensePatch,
    ) -> AuthorityResult<()> {
        self.send(
            self.request(Method::PATCH, &Self::license_path(token))
                .json(patch),
            token.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn set_blacklist(&self, token: &LicenseToken, blacklisted: bool) -> AuthorityResult<()> {
        let path = format!("{}/blacklist", Self::license_path(token));
        self.send(
            self.request(Method::PUT, &path)
                .json(&BlacklistRequest { blacklisted }),
            token.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn soft_delete_license(&self, token: &LicenseToken) -> AuthorityResult<()> {
        self.send(
            self.request(Method::DELETE, &Self::license_path(token)),
            token.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn validate_and_bind(
        &self,
        token: &LicenseToken,
        fingerprint_hash: &str,
        app_name: &str,
    ) -> AuthorityResult<LicenseRecord> {
        let path = format!("{}/bind", Self::license_path(token));
        let body = BindRequest {
            fingerprint_hash: fingerprint_hash.to_string(),
            app_name: app_name.to_string(),
        };
        let response = self
            .send(self.request(Method::POST, &path).json(&body), token.as_str())
            .await?;
        let wire: WireLicense = Self::decode(response).await?;
        wire.into_record()
    }
}

fn map_transport(e: reqwest::Error) -> AuthorityError {
    if e.is_timeout() {
        AuthorityError::Timeout
    } else if e.is_decode() {
        AuthorityError::MalformedResponse(e.to_string())
    } else {
        AuthorityError::Network(e.to_string())
    }
}
