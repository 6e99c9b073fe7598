//! Authentication middleware
//!
//! Validates bearer tokens issued by the external identity provider and
//! builds the [`Actor`] the authorization policy evaluates. Farm
//! membership and capabilities travel in the token claims; the harvest
//! services never look them up themselves.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::policy::Actor;

use crate::error::ErrorResponse;

/// Authentication middleware that validates JWT tokens
/// Note: This middleware extracts and validates the JWT token from the
/// Authorization header. The actual token validation is done inline to
/// avoid state dependency issues.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // Decode and validate JWT token
    // Get JWT secret from environment (fallback for middleware without state)
    let jwt_secret = std::env::var("AGRIOPS__JWT__SECRET")
        .or_else(|_| std::env::var("AGRIOPS_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(msg) => {
            return unauthorized_response(&msg);
        }
    };

    // Parse the subject into a user id
    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    // Create the Actor and insert it into request extensions
    let actor = Actor {
        user_id,
        admin: claims.admin,
        capabilities: claims.capabilities.into_iter().collect(),
        farm_ids: claims.farm_ids.into_iter().collect(),
    };

    request.extensions_mut().insert(actor);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    farm_ids: Vec<uuid::Uuid>,
    exp: i64,
    iat: i64,
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: crate::error::ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for the authenticated actor
/// Use this in handlers to get the current actor
#[derive(Clone, Debug)]
pub struct CurrentActor(pub Actor);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(CurrentActor)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: crate::error::ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message: "Authentication required".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
