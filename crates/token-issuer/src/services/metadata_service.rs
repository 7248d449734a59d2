use crate::models::OidcMetadata;

impl OidcMetadata {
    /// Discovery document for an issuer served at `https://{hostname}`.
    pub fn for_hostname(hostname: &str) -> Self {
        let issuer = format!("https://{hostname}");
        Self {
            jwks_uri: format!("{issuer}/jwks"),
            issuer,
        }
    }
}
