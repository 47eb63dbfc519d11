use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());
        let claims = validate_jwt(&token, &secret)?;

        Ok(AuthUser::from(claims))
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))
}

/// Decode and validate an HS256 access token.
///
/// Shared by the HTTP extractor and the Socket.IO handshake.
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    if token_data.claims.is_expired() {
        return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
    }

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let user_id = Uuid::new_v4();
        let token = sign(&Claims::new(user_id, UserRole::User, 3600), "s3cret");

        let claims = validate_jwt(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&Claims::new(Uuid::new_v4(), UserRole::User, 3600), "s3cret");

        let err = validate_jwt(&token, "other").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TokenInvalid));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(&Claims::new(Uuid::new_v4(), UserRole::User, -3600), "s3cret");

        let err = validate_jwt(&token, "s3cret").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TokenExpired));
    }

    #[test]
    fn bearer_scheme_required() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Basic abc".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("Authorization", "Bearer abc".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }
}
