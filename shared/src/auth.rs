use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::ServiceError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const REQUEST_AT_HEADER: &str = "x-request-at";

/// Signing configuration for internal service-to-service calls. The secret
/// is injected explicitly from each service's startup arguments; nothing
/// here is process-global.
#[derive(Debug, Clone)]
pub struct ApiKeyConfig {
    /// Name this service signs its own outbound requests with.
    pub service_name: String,
    /// Secret shared across the deployment.
    pub secret: String,
    /// Maximum age, in seconds, of the timestamp a caller signed.
    pub max_skew_secs: i64,
}

impl ApiKeyConfig {
    pub fn new(service_name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            secret: secret.into(),
            max_skew_secs: 300,
        }
    }

    /// Signs an outbound request for this service at `unix_ts`.
    pub fn sign(&self, unix_ts: i64) -> String {
        signature(&self.service_name, &self.secret, unix_ts)
    }

    /// Recomputes the signature a caller claims and rejects mismatches and
    /// stale timestamps.
    pub fn verify(
        &self,
        caller: &str,
        api_key: &str,
        request_at: &str,
        now: i64,
    ) -> Result<(), ServiceError> {
        let ts: i64 = request_at
            .parse()
            .map_err(|_| ServiceError::Unauthorized("malformed request timestamp".into()))?;

        if (now - ts).abs() > self.max_skew_secs {
            return Err(ServiceError::Unauthorized("stale request timestamp".into()));
        }

        if signature(caller, &self.secret, ts) != api_key {
            return Err(ServiceError::Unauthorized("invalid api key".into()));
        }

        Ok(())
    }
}

/// `sha256("{service}:{secret}:{unix_ts}")`, hex-encoded. Both sides of an
/// internal call compute exactly this string.
pub fn signature(service_name: &str, secret: &str, unix_ts: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{service_name}:{secret}:{unix_ts}"));
    format!("{:x}", hasher.finalize())
}

/// Axum middleware guarding internal routes. Mount with
/// `middleware::from_fn_with_state(api_key_config, require_api_key)`.
pub async fn require_api_key(
    State(config): State<ApiKeyConfig>,
    request: Request,
    next: Next,
) -> Response {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    let api_key = header(API_KEY_HEADER);
    let caller = header(SERVICE_NAME_HEADER);
    let request_at = header(REQUEST_AT_HEADER);

    match config.verify(&caller, &api_key, &request_at, Utc::now().timestamp()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(caller = %caller, "rejected internal call: {err}");
            err.into_response()
        }
    }
}
