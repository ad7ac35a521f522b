use std::convert::Infallible;

use serde_json::json;
use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::error::ApiError;

use super::jwt::{verify_jwt_session, SessionData};

fn token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
}

/// Requires a valid session token in the `Authorization` header.
pub fn with_session(
    secret: String,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let secret = secret.to_owned();
        async move {
            match token_from_header(&header) {
                Some(token) => verify_jwt_session(token, &secret)
                    .map(SessionData::from)
                    .map_err(Rejection::from),
                None => Err(ApiError::Unauthorized.into()),
            }
        }
    })
}

/// Extracts the session when one is presented; anonymous requests pass
/// through as `None`.
pub fn with_possible_session(
    secret: String,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header
            .as_deref()
            .and_then(token_from_header)
            .and_then(|token| verify_jwt_session(token, &secret).ok())
            .map(SessionData::from)
    })
}

/// Maps `ApiError` rejections onto structured JSON error responses.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<ApiError>() {
        (e.status(), e.to_string())
    } else if err
        .find::<warp::reject::MissingHeader>()
        .is_some()
    {
        (StatusCode::UNAUTHORIZED, ApiError::Unauthorized.to_string())
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let body = warp::reply::json(&json!({ "errors": message }));
    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::{User, UserRole};
    use crate::jwt::generate_jwt_session;

    fn token() -> String {
        let user = User {
            id: 3,
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Carol".to_string(),
            last_name: "Cook".to_string(),
            password: String::new(),
            role: UserRole::User,
        };
        generate_jwt_session(&user, "test-secret")
    }

    #[tokio::test]
    async fn bearer_header_yields_a_session() {
        let filter = with_session("test-secret".to_string());
        let session = warp::test::request()
            .header("authorization", format!("Bearer {}", token()))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(session.user_id, 3);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let filter = with_session("test-secret".to_string());
        assert!(warp::test::request().filter(&filter).await.is_err());
    }

    #[tokio::test]
    async fn anonymous_request_passes_optional_filter_as_none() {
        let filter = with_possible_session("test-secret".to_string());
        let session = warp::test::request().filter(&filter).await.unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn garbage_token_passes_optional_filter_as_none() {
        let filter = with_possible_session("test-secret".to_string());
        let session = warp::test::request()
            .header("authorization", "Bearer not-a-token")
            .filter(&filter)
            .await
            .unwrap();
        assert!(session.is_none());
    }
}
