use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Session claims, `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub exp: i64,
}

/// Pending e-mail verification, `sub` is the address waiting for its OTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyClaims {
    pub sub: String,
    pub exp: i64,
}

impl UserClaims {
    pub fn new<S: Into<String>>(sub: S, ttl: chrono::Duration) -> Self {
        Self {
            sub: sub.into(),
            exp: (chrono::Utc::now() + ttl).timestamp(),
        }
    }
}

impl VerifyClaims {
    pub fn new<S: Into<String>>(sub: S, ttl: chrono::Duration) -> Self {
        Self {
            sub: sub.into(),
            exp: (chrono::Utc::now() + ttl).timestamp(),
        }
    }
}

pub fn generate_token<C: Serialize, K: AsRef<[u8]>>(
    claims: &C,
    key: K,
) -> jsonwebtoken::errors::Result<String> {
    let header = Header::default();
    let key = EncodingKey::from_secret(key.as_ref());

    let token = jsonwebtoken::encode(&header, claims, &key)?;
    Ok(token)
}

pub fn process_token<C: DeserializeOwned, K: AsRef<[u8]>>(
    token: &str,
    key: K,
) -> jsonwebtoken::errors::Result<TokenData<C>> {
    let validation = Validation::default();
    let key = DecodingKey::from_secret(key.as_ref());

    let claims = jsonwebtoken::decode::<C>(token, &key, &validation)?;
    Ok(claims)
}
