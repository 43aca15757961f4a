use std::str::FromStr;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" | "alumno" => Ok(Role::Student),
            "teacher" | "docente" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(Error::Unauthorized(format!("unknown role '{}'", other))),
        }
    }
}

/// The authenticated caller, inserted into request extensions by the auth layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorIdentity {
    pub user_id: Uuid,
    pub role: Role,
}

/// HS256 bearer token verification.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<ActorIdentity> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| Error::Unauthorized("invalid_token".to_string()))?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| Error::Unauthorized("invalid_subject".to_string()))?;
        let role = data
            .claims
            .role
            .as_deref()
            .ok_or_else(|| Error::Unauthorized("missing_role".to_string()))?
            .parse()?;
        Ok(ActorIdentity { user_id, role })
    }

    /// Signs a token for `user_id`. Used by operators and tests.
    pub fn issue(&self, user_id: Uuid, role: &str, ttl: chrono::Duration) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
            role: Some(role.to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))
    }
}

fn bearer_token(req: &Request) -> Result<&str> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))
}

async fn require_roles(
    verifier: &TokenVerifier,
    mut req: Request,
    next: Next,
    allowed: &[Role],
) -> Response {
    let identity = match bearer_token(&req).and_then(|token| verifier.verify(token)) {
        Ok(identity) => identity,
        Err(err) => return err.into_response(),
    };
    if !allowed.is_empty() && !allowed.contains(&identity.role) {
        tracing::debug!(user_id = %identity.user_id, role = ?identity.role, "Role not allowed");
        return Error::Forbidden("forbidden".to_string()).into_response();
    }
    req.extensions_mut().insert(identity);
    next.run(req).await
}

pub async fn require_identity(
    State(verifier): State<TokenVerifier>,
    req: Request,
    next: Next,
) -> Response {
    require_roles(&verifier, req, next, &[]).await
}

pub async fn require_student(
    State(verifier): State<TokenVerifier>,
    req: Request,
    next: Next,
) -> Response {
    require_roles(&verifier, req, next, &[Role::Student]).await
}

pub async fn require_teacher_or_admin(
    State(verifier): State<TokenVerifier>,
    req: Request,
    next: Next,
) -> Response {
    require_roles(&verifier, req, next, &[Role::Teacher, Role::Admin]).await
}
