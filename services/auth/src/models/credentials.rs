//! Request and response payloads of the authentication operations

use serde::{Deserialize, Serialize};

/// Register or login payload. At least one identifier must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
}

impl CredentialsRequest {
    /// Email with surrounding whitespace removed, `None` when blank
    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// Username with surrounding whitespace removed, `None` when blank
    pub fn username(&self) -> Option<&str> {
        non_blank(self.username.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Request for token refresh
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token bundle returned by every successful operation
#[derive(Debug, Clone, Serialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
}

impl TokenBundle {
    /// Bearer bundle valid for `expires_in` seconds
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_identifiers_are_absent() {
        let request: CredentialsRequest =
            serde_json::from_str(r#"{"email": "  ", "username": "", "password": "x"}"#).unwrap();
        assert_eq!(request.email(), None);
        assert_eq!(request.username(), None);
    }

    #[test]
    fn test_missing_identifiers_deserialize() {
        let request: CredentialsRequest =
            serde_json::from_str(r#"{"password": "pw123456"}"#).unwrap();
        assert_eq!(request.email(), None);
        assert_eq!(request.username(), None);
    }

    #[test]
    fn test_identifiers_are_trimmed() {
        let request: CredentialsRequest =
            serde_json::from_str(r#"{"email": " a@b.com ", "password": "x"}"#).unwrap();
        assert_eq!(request.email(), Some("a@b.com"));
    }

    #[test]
    fn test_bundle_shape() {
        let bundle = TokenBundle::bearer("a".to_string(), "r".to_string(), 3600);
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 3600,
                "token_type": "Bearer",
            })
        );
    }
}
