/// Liveness probe. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}
