use serde::{Deserialize, Serialize};

use crate::auth::repo::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for a partial profile update; absent fields are unchanged.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Response returned after register, login or profile update.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub status: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub status: &'static str,
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn auth_response_has_envelope_and_no_password() {
        let user = User {
            id: 3,
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: None,
            last_name: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&AuthResponse {
            status: "success",
            user: user.into(),
        })
        .unwrap();
        assert!(json.contains(r#""status":"success""#));
        assert!(json.contains(r#""username":"alice""#));
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
    }

    #[test]
    fn csrf_token_field_is_camel_case() {
        let json = serde_json::to_string(&CsrfTokenResponse {
            status: "success",
            csrf_token: "t".into(),
        })
        .unwrap();
        assert!(json.contains("csrfToken"));
    }

    #[test]
    fn register_request_accepts_camel_case_names() {
        let body = r#"{"username":"bob","password":"p","email":"b@x.com","firstName":"Bob"}"#;
        let req: RegisterRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.first_name.as_deref(), Some("Bob"));
        assert_eq!(req.last_name, None);
    }
}
