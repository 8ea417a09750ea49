// API client module: a blocking HTTP client for the Honulabs API.
//
// Every call is a synchronous request/response exchange bounded by the
// configured request timeout. Job-producing endpoints return the freshly
// created `Job`, which callers hand to the poller.

use crate::poller::JobSource;
use crate::schema::{
    Business, BusinessPlanRequirementsCreate, Collaborators, FullBusinessDetailsCreate, Job,
    JobStatus, MarketSegment, VercelSecrets,
};
use anyhow::Context;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure classes of an API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, timeout...).
    #[error("Failed to send {action} request: {source}")]
    Transport {
        action: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{action} failed: {status} - {body}")]
    Status {
        action: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The server answered successfully but the body did not match the schema.
    #[error("Parsing {action} response json: {source}")]
    Decode {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Malformed responses are bugs, not outages, and must not be retried away.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ApiError::Decode { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Status {
                status: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            }
        )
    }
}

/// Blocking API client holding the reqwest client, the base URL of the API
/// and an optional bearer token for authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url`. Each request is bounded by `timeout`,
    /// which must cover slow server-side generation steps.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Same client, different credentials. Used to vet a token before saving it.
    pub fn with_token(&self, token: &str) -> Self {
        let mut other = self.clone();
        other.set_token(token);
        other
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a request and decode a JSON body from a 2xx response.
    fn send<T: DeserializeOwned>(&self, action: &'static str, req: RequestBuilder) -> Result<T, ApiError> {
        let res = self
            .authorized(req)
            .send()
            .map_err(|source| ApiError::Transport { action, source })?;
        let status = res.status();
        debug!(action, %status, "API response");
        let body = res
            .text()
            .map_err(|source| ApiError::Transport { action, source })?;
        if !status.is_success() {
            return Err(ApiError::Status { action, status, body });
        }
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { action, source })
    }

    /// Whether the current token is accepted by the API.
    pub fn check_token(&self) -> bool {
        let req = self.authorized(self.client.get(self.url("/v1/organisations")));
        match req.send() {
            Ok(res) => res.status() == StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "token check request failed");
                false
            }
        }
    }

    pub fn list_businesses(&self) -> Result<Vec<Business>, ApiError> {
        self.send("list businesses", self.client.get(self.url("/v1/businesses")))
    }

    pub fn create_business(&self, name: &str) -> Result<Business, ApiError> {
        let req = self
            .client
            .post(self.url("/v1/businesses"))
            .json(&json!({ "name": name }));
        self.send("create business", req)
    }

    /// Starts a deletion job for the business and everything deployed for it.
    pub fn delete_business(&self, business_id: &str) -> Result<Job, ApiError> {
        let req = self
            .client
            .delete(self.url(&format!("/v1/businesses/{business_id}")));
        self.send("delete business", req)
    }

    pub fn get_job(&self, business_id: &str, job_id: &str) -> Result<Job, ApiError> {
        let req = self
            .client
            .get(self.url(&format!("/v1/businesses/{business_id}/jobs/{job_id}")));
        self.send("get job", req)
    }

    pub fn get_jobs(&self, business_id: &str, status: JobStatus) -> Result<Vec<Job>, ApiError> {
        let req = self
            .client
            .get(self.url(&format!("/v1/businesses/{business_id}/jobs")))
            .query(&[("job_status", status.as_str())]);
        self.send("list jobs", req)
    }

    fn submit<B: serde::Serialize>(
        &self,
        action: &'static str,
        business_id: &str,
        path: &str,
        body: &B,
    ) -> Result<Job, ApiError> {
        let req = self
            .client
            .post(self.url(&format!("/v1/businesses/{business_id}/{path}")))
            .json(body);
        self.send(action, req)
    }

    pub fn generate_market_segment(
        &self,
        business_id: &str,
        geography: &str,
        industry: &str,
    ) -> Result<Job, ApiError> {
        let body = json!({ "geography": geography, "industry": industry });
        self.submit("market segmentation", business_id, "market_segments", &body)
    }

    pub fn generate_ideas(
        &self,
        business_id: &str,
        geography: &str,
        segment: &MarketSegment,
    ) -> Result<Job, ApiError> {
        let body = json!({ "geography": geography, "market_segment": segment });
        self.submit("idea generation", business_id, "ideas", &body)
    }

    pub fn generate_business_requirements(
        &self,
        business_id: &str,
        payload: &BusinessPlanRequirementsCreate,
    ) -> Result<Job, ApiError> {
        self.submit(
            "requirements generation",
            business_id,
            "business_plan_requirements",
            payload,
        )
    }

    pub fn generate_business_plan(&self, business_id: &str) -> Result<Job, ApiError> {
        self.submit("business plan generation", business_id, "business_plan", &json!({}))
    }

    pub fn generate_business_names(&self, business_id: &str) -> Result<Job, ApiError> {
        self.submit("business naming", business_id, "business_names", &json!({}))
    }

    pub fn create_business_details(
        &self,
        business_id: &str,
        details: &FullBusinessDetailsCreate,
    ) -> Result<Job, ApiError> {
        self.submit("business details", business_id, "details", details)
    }

    pub fn deploy_landing_page(&self, business_id: &str) -> Result<Job, ApiError> {
        self.submit("landing page deployment", business_id, "deployments/landing_page", &json!({}))
    }

    pub fn deploy_secrets(&self, business_id: &str, secrets: &VercelSecrets) -> Result<Job, ApiError> {
        self.submit("secret upload", business_id, "deployments/secrets", secrets)
    }

    pub fn invite_collaborators(
        &self,
        business_id: &str,
        collaborators: &Collaborators,
    ) -> Result<Job, ApiError> {
        self.submit("collaborator invitation", business_id, "collaborators", collaborators)
    }
}

impl JobSource for ApiClient {
    fn refresh_job(&self, business_id: &str, job_id: &str) -> Result<Job, ApiError> {
        self.get_job(business_id, job_id)
    }
}
