use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::database::schema::{User, UserRole};
use crate::error::ApiError;

use super::permissions::ActionType;

const SESSION_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// Viewer identity, threaded explicitly through every operation that needs
/// it. Anonymous viewers are represented as `Option::None` at call sites.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::Forbidden(
                "You don't have permission to perform this action".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &str) -> Hmac<Sha256> {
    // HMAC accepts keys of any length, this cannot fail
    Hmac::new_from_slice(secret.as_bytes()).unwrap()
}

pub fn generate_jwt_session(user: &User, secret: &str) -> String {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims.sign_with_key(&signing_key(secret)).unwrap()
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, ApiError> {
    token
        .verify_with_key(&signing_key(secret))
        .map_err(|_| ApiError::Unauthorized)
        .map(|session: JwtSessionData| {
            let now = Utc::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(ApiError::Unauthorized);
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let token = generate_jwt_session(&user(), "test-secret");
        let session = verify_jwt_session(&token, "test-secret").unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "ada");
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(&user(), "test-secret");
        assert!(verify_jwt_session(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = JwtSessionData::new(7, "ada".to_string(), UserRole::User);
        claims.exp = Utc::now().timestamp() - 60;
        let token = claims.sign_with_key(&signing_key("test-secret")).unwrap();

        assert!(matches!(
            verify_jwt_session(&token, "test-secret"),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn admin_flag_follows_the_role() {
        let session: SessionData =
            JwtSessionData::new(1, "root".to_string(), UserRole::Admin).into();
        assert!(session.is_admin);
    }
}
