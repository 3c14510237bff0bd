use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use shared::{
    domain::BranchId,
    error::parse_error_body,
    protocol::{BranchBpsData, CreateDisciplineRecordRequest},
};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub mod catalog;
pub mod config;
pub mod error;
pub mod roster;
pub mod submission;
pub mod wizard;

pub use config::{load_settings, ClientSettings};
pub use error::{BpsError, RecordFailure};
pub use submission::{
    complete_submission, PairFailure, SubmissionEngine, SubmissionEvent, SubmissionOutcome,
    SubmissionResult,
};
pub use wizard::{BpsWizard, ClassToggle, ReviewSummary, SelectionMode, SelectionState, WizardStep};

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn fetch_branch(&self, branch_id: &BranchId) -> Result<BranchBpsData>;
}

#[async_trait]
pub trait DisciplineRecordSink: Send + Sync {
    async fn create_record(
        &self,
        request: &CreateDisciplineRecordRequest,
    ) -> std::result::Result<(), RecordFailure>;
}

/// Re-fetches the branch the UI is currently showing.
#[async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn refresh(&self) -> Result<BranchBpsData>;
}

#[derive(Default)]
struct HttpClientState {
    current_branch: Option<BranchId>,
    last_branch_data: Option<BranchBpsData>,
}

pub struct BpsHttpClient {
    http: Client,
    server_url: String,
    auth_token: Option<String>,
    inner: RwLock<HttpClientState>,
}

impl BpsHttpClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), server_url.into(), None)
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        let server_url = config::normalize_server_url(&settings.server_url)?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("failed to build http client")?;
        Ok(Self::with_http_client(
            http,
            server_url,
            settings.auth_token.clone(),
        ))
    }

    fn with_http_client(http: Client, server_url: String, auth_token: Option<String>) -> Self {
        Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
            auth_token,
            inner: RwLock::new(HttpClientState::default()),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Branch data from the most recent successful fetch or refresh.
    pub async fn cached_branch(&self) -> Option<BranchBpsData> {
        self.inner.read().await.last_branch_data.clone()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl RosterSource for BpsHttpClient {
    async fn fetch_branch(&self, branch_id: &BranchId) -> Result<BranchBpsData> {
        let data: BranchBpsData = self
            .authorized(
                self.http
                    .get(format!("{}/branches/{}/bps", self.server_url, branch_id)),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("invalid BPS payload for branch {branch_id}"))?;

        {
            let mut guard = self.inner.write().await;
            guard.current_branch = Some(branch_id.clone());
            guard.last_branch_data = Some(data.clone());
        }
        Ok(data)
    }
}

#[async_trait]
impl DisciplineRecordSink for BpsHttpClient {
    async fn create_record(
        &self,
        request: &CreateDisciplineRecordRequest,
    ) -> std::result::Result<(), RecordFailure> {
        let response = self
            .authorized(
                self.http
                    .post(format!("{}/discipline-records", self.server_url))
                    .json(request),
            )
            .send()
            .await
            .map_err(|err| {
                warn!("bps http: create record transport error: {err}");
                RecordFailure::new(submission::NETWORK_ERROR_MESSAGE, None)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match parse_error_body(&body) {
            Some(api_error) => (api_error.code, api_error.message),
            None => (None, submission::NETWORK_ERROR_MESSAGE.to_string()),
        };
        warn!(
            "bps http: create record rejected status={status} code={}: {message}",
            code.as_deref().unwrap_or("none")
        );
        Err(RecordFailure::new(message, Some(status.as_u16())))
    }
}

#[async_trait]
impl RefreshTrigger for BpsHttpClient {
    async fn refresh(&self) -> Result<BranchBpsData> {
        let branch_id = self
            .inner
            .read()
            .await
            .current_branch
            .clone()
            .ok_or_else(|| anyhow!("no branch has been loaded yet"))?;
        let data = self.fetch_branch(&branch_id).await?;
        info!(
            "bps http: refreshed branch={branch_id} students={}",
            data.students.len()
        );
        Ok(data)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
