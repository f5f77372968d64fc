//! Derives the job stream URL from the stored settings.
//!
//! The REST base address is rewritten to its WebSocket equivalent and the
//! bearer credential is appended as the `token` query parameter, giving
//! `<ws|wss>://<host>/ws/jobs?token=<bearer>`.

use std::sync::Arc;

use jobstream_core::settings::{BaseAddressProvider, CredentialProvider};
use reqwest::Url;

/// Path of the job stream endpoint, appended to the base address.
pub const JOB_STREAM_PATH: &str = "/ws/jobs";

/// Why a stream URL could not be built.
///
/// All variants are configuration problems; retrying without a settings
/// change will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No bearer credential is stored, or it is blank.
    #[error("no credential is stored")]
    MissingCredential,

    /// The base address uses a scheme other than http(s) or ws(s).
    #[error("unsupported base address scheme: {0}")]
    UnsupportedScheme(String),

    /// The base address could not be parsed as a URL.
    #[error("invalid base address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Builds the stream URL from the current settings on every call.
#[derive(Clone)]
pub struct UrlResolver {
    base_address: Arc<dyn BaseAddressProvider>,
    credential: Arc<dyn CredentialProvider>,
}

impl UrlResolver {
    pub fn new(
        base_address: Arc<dyn BaseAddressProvider>,
        credential: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            base_address,
            credential,
        }
    }

    /// Resolve the URL for the next connection attempt.
    pub async fn resolve(&self) -> Result<Url, ResolveError> {
        let token = self
            .credential
            .current_credential()
            .await
            .filter(|t| !t.trim().is_empty())
            .ok_or(ResolveError::MissingCredential)?;
        let base = self.base_address.current_base_address().await;
        build_stream_url(&base, &token)
    }
}

/// Rewrite `base` to a WebSocket address and append the stream path and
/// credential.
///
/// `http` becomes `ws`, `https` becomes `wss`, and `ws`/`wss` pass
/// through unchanged.
pub fn build_stream_url(base: &str, token: &str) -> Result<Url, ResolveError> {
    let base = base.trim().trim_end_matches('/');

    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        let scheme = base.split_once("://").map_or(base, |(scheme, _)| scheme);
        return Err(ResolveError::UnsupportedScheme(scheme.to_string()));
    };

    let mut url = Url::parse(&format!("{ws_base}{JOB_STREAM_PATH}")).map_err(|e| {
        ResolveError::InvalidAddress {
            address: base.to_string(),
            reason: e.to_string(),
        }
    })?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}
