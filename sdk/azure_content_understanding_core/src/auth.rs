use crate::error::{ContentUnderstandingError, ContentUnderstandingResult};
use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding a Content Understanding resource key.
pub const API_KEY_ENV: &str = "AZURE_CONTENT_UNDERSTANDING_KEY";

/// Environment variable holding a pre-acquired Microsoft Entra ID access token.
pub const TOKEN_ENV: &str = "AZURE_CONTENT_UNDERSTANDING_TOKEN";

/// Header used for resource key authentication.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Credential types supported by the SDK.
///
/// Token acquisition is left to the caller: pass an access token obtained
/// from `az account get-access-token` or any Entra ID library.
#[derive(Clone)]
pub enum ContentUnderstandingCredential {
    /// Resource key, sent in the `Ocp-Apim-Subscription-Key` header.
    ApiKey(SecretString),

    /// Microsoft Entra ID access token, sent as `Authorization: Bearer`.
    BearerToken(SecretString),
}

impl ContentUnderstandingCredential {
    /// Create a credential from the environment.
    ///
    /// Checks `AZURE_CONTENT_UNDERSTANDING_KEY` first, then
    /// `AZURE_CONTENT_UNDERSTANDING_TOKEN`.
    pub fn from_env() -> ContentUnderstandingResult<Self> {
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            return Ok(Self::ApiKey(SecretString::from(key)));
        }
        if let Some(token) = non_empty_env(TOKEN_ENV) {
            return Ok(Self::BearerToken(SecretString::from(token)));
        }
        Err(ContentUnderstandingError::Auth(format!(
            "no credential configured. Set {API_KEY_ENV} or {TOKEN_ENV}."
        )))
    }

    /// Create an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(SecretString::from(key.into()))
    }

    /// Create a bearer token credential.
    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self::BearerToken(SecretString::from(token.into()))
    }

    /// Resolve the credential to a `(header name, header value)` pair.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::ApiKey(key) => (SUBSCRIPTION_KEY_HEADER, key.expose_secret().to_string()),
            Self::BearerToken(token) => ("Authorization", format!("Bearer {}", token.expose_secret())),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl std::fmt::Debug for ContentUnderstandingCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "ContentUnderstandingCredential::ApiKey(****)"),
            Self::BearerToken(_) => write!(f, "ContentUnderstandingCredential::BearerToken(****)"),
        }
    }
}
