//! Shared HTTP plumbing for the provider adapters.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::domain::DomainError;

/// Timeout for lightweight loopback availability probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for catalog fetches.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for completion and vision calls.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the shared reqwest client used by an adapter.
pub fn build_client() -> Result<Client, DomainError> {
    Client::builder()
        .use_rustls_tls()
        .user_agent(format!("Voxwrite/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| DomainError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Read a response body, preserving the raw body text inside the error when
/// the status is non-2xx so provider diagnostic detail is not lost.
pub async fn read_success_body(response: Response) -> Result<String, DomainError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(DomainError::from_transport)?;

    if !status.is_success() {
        return Err(DomainError::BadStatus {
            code: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

/// Infer an image MIME type from the leading bytes.
/// PNG magic `89 50 4E 47`; everything else is treated as JPEG.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else {
        "image/jpeg"
    }
}
