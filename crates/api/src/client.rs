//! HTTP implementation of [`JobRepository`].
//!
//! The base address and bearer credential are read from the settings
//! providers on every request, so a change made in settings applies to
//! the next call without rebuilding the client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use jobstream_core::job::{ExportKind, JobPage, JobSnapshot};
use jobstream_core::settings::{BaseAddressProvider, CredentialProvider};
use jobstream_core::types::JobId;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::repository::JobRepository;

/// HTTP client for the job REST endpoints.
pub struct JobApi {
    client: reqwest::Client,
    base_address: Arc<dyn BaseAddressProvider>,
    credential: Arc<dyn CredentialProvider>,
}

/// Response body of the export endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCreateResponse {
    job_id: Option<JobId>,
}

/// Filters for [`JobApi::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    pub page: u32,
    pub size: u32,
    /// Server status name, e.g. `RUNNING`.
    pub status: Option<String>,
    /// Server job type, e.g. `REPLAY_MP4`.
    pub job_type: Option<String>,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// An export request succeeded but the response carried no job id.
    #[error("Export response did not include a job id")]
    MissingJobId,

    /// Writing a downloaded result to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobApi {
    pub fn new(
        base_address: Arc<dyn BaseAddressProvider>,
        credential: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self::with_client(reqwest::Client::new(), base_address, credential)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_address: Arc<dyn BaseAddressProvider>,
        credential: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            base_address,
            credential,
        }
    }

    /// Fetch one page of jobs, optionally filtered by status and type.
    ///
    /// Sends `GET /api/jobs?page=&size=&status=&type=`. Blank filters are
    /// omitted.
    pub async fn list_jobs(&self, query: &JobListQuery) -> Result<JobPage, ApiError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("size", query.size.to_string()),
        ];
        if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("status", status.to_string()));
        }
        if let Some(job_type) = query.job_type.as_deref().filter(|s| !s.trim().is_empty()) {
            params.push(("type", job_type.to_string()));
        }

        let url = self.url("/api/jobs").await;
        let request = self.authorize(self.client.get(url).query(&params)).await;
        Self::parse_response(request.send().await?).await
    }

    // ---- private helpers ----

    async fn url(&self, path: &str) -> String {
        let base = self.base_address.current_base_address().await;
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Attach `Authorization: Bearer` when a credential is stored.
    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credential.current_credential().await {
            Some(token) if !token.trim().is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Return the response unchanged on success, or an
    /// [`ApiError::Status`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobRepository for JobApi {
    /// Sends `GET /api/jobs/{job_id}`.
    async fn fetch_job_detail(&self, job_id: JobId) -> Result<JobSnapshot, ApiError> {
        let url = self.url(&format!("/api/jobs/{job_id}")).await;
        let response = self.authorize(self.client.get(url)).await.send().await?;
        Self::parse_response(response).await
    }

    /// Sends `POST /api/replays/{target_id}/exports/{mp4|thumbnail}`.
    async fn request_export(&self, kind: ExportKind, target_id: i64) -> Result<JobId, ApiError> {
        let url = self
            .url(&format!(
                "/api/replays/{target_id}/exports/{}",
                kind.path_segment()
            ))
            .await;
        let response = self.authorize(self.client.post(url)).await.send().await?;
        let created: JobCreateResponse = Self::parse_response(response).await?;
        let job_id = created.job_id.ok_or(ApiError::MissingJobId)?;

        tracing::info!(job_id, target_id, kind = ?kind, "Export job requested");
        Ok(job_id)
    }

    /// Sends `GET /api/jobs/{job_id}/result` and copies the body to
    /// `destination` chunk by chunk.
    async fn download_result(
        &self,
        job_id: JobId,
        destination: &Path,
    ) -> Result<PathBuf, ApiError> {
        let url = self.url(&format!("/api/jobs/{job_id}/result")).await;
        let response = self.authorize(self.client.get(url)).await.send().await?;
        let mut response = Self::ensure_success(response).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            job_id,
            bytes = written,
            path = %destination.display(),
            "Job result downloaded",
        );
        Ok(destination.to_path_buf())
    }
}
