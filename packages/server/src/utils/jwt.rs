use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims issued by the platform's identity service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub uid: i32,    // User ID
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize, // Expiration timestamp
}

/// Sign a token. Used by tests and tooling; players obtain tokens from the identity service.
pub fn sign(
    user_id: i32,
    username: &str,
    role: &str,
    permissions: &[&str],
    secret: &str,
) -> Result<String> {
    let expiration = (Utc::now() + Duration::days(7)).timestamp();

    let claims = Claims {
        sub: username.to_owned(),
        uid: user_id,
        role: role.to_owned(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        exp: expiration as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token.
pub fn verify(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
