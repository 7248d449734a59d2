//! Metrics definitions for the token issuer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `issuer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: success, error (plus the HTTP-ish outcomes of membership checks)
//! - `error_category`: 4 values (see [`ErrorCategory`](super::ErrorCategory))
//! - `path`: the five routes plus `/other`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle served on `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.350, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Remote signing is one Key Vault round trip
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_remote_sign".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.500],
        )
        .map_err(|e| format!("Failed to set remote sign buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("issuer_token_issuance".to_string()),
            &[0.025, 0.050, 0.100, 0.200, 0.350, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `issuer_token_issuance_duration_seconds`, `issuer_token_issuance_total`
/// Labels: `status`
pub fn record_token_issuance(status: &str, duration: Duration) {
    histogram!("issuer_token_issuance_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("issuer_token_issuance_total", "status" => status.to_string()).increment(1);
}

/// Record a group membership decision
///
/// Metric: `issuer_membership_checks_total`
/// Labels: `result` (member, not_member, error)
pub fn record_membership_check(result: &str) {
    counter!("issuer_membership_checks_total", "result" => result.to_string()).increment(1);
}

// ============================================================================
// Signing Key Metrics
// ============================================================================

/// Record a JWKS build
///
/// Metric: `issuer_jwks_requests_total`, `issuer_jwks_published_keys`
/// Labels: `status`
pub fn record_jwks_request(status: &str, key_count: usize) {
    counter!("issuer_jwks_requests_total", "status" => status.to_string()).increment(1);

    #[allow(clippy::cast_precision_loss)]
    histogram!("issuer_jwks_published_keys").record(key_count as f64);
}

/// Record a remote sign call
///
/// Metric: `issuer_remote_sign_duration_seconds`, `issuer_remote_sign_total`
/// Labels: `status`
pub fn record_remote_sign(status: &str, duration: Duration) {
    histogram!("issuer_remote_sign_duration_seconds", "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("issuer_remote_sign_total", "status" => status.to_string()).increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `issuer_errors_total`
/// Labels: `operation`, `error_category`, `status_code`
pub fn record_error(operation: &str, error_category: &str, status_code: u16) {
    counter!("issuer_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `issuer_http_requests_total`, `issuer_http_request_duration_seconds`
/// Labels: `method`, `path`, `status_code`
///
/// Captures framework-level rejections (404, 405) as well as handler responses.
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let normalized_path = normalize_path(path);

    histogram!("issuer_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("issuer_http_requests_total",
        "method" => method.to_string(),
        "path" => normalized_path,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Map a request path onto the bounded label set.
pub(crate) fn normalize_path(path: &str) -> &'static str {
    match path {
        "/.well-known/openid-configuration" => "/.well-known/openid-configuration",
        "/jwks" => "/jwks",
        "/token" => "/token",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    fn counter_value(snapshotter: &Snapshotter, name: &str) -> u64 {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| key.key().name() == name)
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(v) => v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_normalize_path_known_routes() {
        assert_eq!(
            normalize_path("/.well-known/openid-configuration"),
            "/.well-known/openid-configuration"
        );
        assert_eq!(normalize_path("/jwks"), "/jwks");
        assert_eq!(normalize_path("/token"), "/token");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_path_unknown_routes_collapse() {
        assert_eq!(normalize_path("/"), "/other");
        assert_eq!(normalize_path("/token/extra"), "/other");
        assert_eq!(
            normalize_path("/users/0b8f3c7e-6c51-4a8e-9d4e-1d2c3b4a5f60"),
            "/other"
        );
    }

    #[test]
    fn test_token_and_signing_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_token_issuance("success", Duration::from_millis(120));
            record_token_issuance("error", Duration::from_millis(30));
            record_remote_sign("success", Duration::from_millis(80));
            record_membership_check("member");
            record_membership_check("not_member");
        });

        assert_eq!(counter_value(&snapshotter, "issuer_token_issuance_total"), 2);
        assert_eq!(counter_value(&snapshotter, "issuer_remote_sign_total"), 1);
        assert_eq!(counter_value(&snapshotter, "issuer_membership_checks_total"), 2);
    }

    #[test]
    fn test_http_and_error_counters() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_http_request("GET", "/jwks", 200, Duration::from_millis(15));
            record_http_request("GET", "/nope", 404, Duration::from_millis(1));
            record_error("token", "authorization", 403);
            record_jwks_request("success", 2);
        });

        assert_eq!(counter_value(&snapshotter, "issuer_http_requests_total"), 2);
        assert_eq!(counter_value(&snapshotter, "issuer_errors_total"), 1);
        assert_eq!(counter_value(&snapshotter, "issuer_jwks_requests_total"), 1);
    }
}
