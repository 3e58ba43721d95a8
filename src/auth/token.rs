use crate::error::AppError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The id of the user the token was issued to.
    pub sub: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Unique token id, so two tokens issued in the same second differ.
    pub jti: Uuid,
    /// Expiration timestamp, present only when a token lifetime is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

/// Signs and verifies session tokens with a server-held HMAC secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: Option<i64>,
}

impl TokenKeys {
    /// Builds the keys from the signing secret. With `ttl_hours` set, tokens carry
    /// an `exp` claim that is enforced on verification; otherwise they never expire.
    pub fn new(secret: &str, ttl_hours: Option<i64>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    /// Generates a signed token embedding `user_id` as its subject.
    pub fn generate_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let exp = match self.ttl_hours {
            Some(hours) => Some(
                now.checked_add_signed(chrono::Duration::hours(hours))
                    .ok_or_else(|| AppError::InternalServerError("token expiry overflow".into()))?
                    .timestamp() as usize,
            ),
            None => None,
        };

        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies a token's signature (and expiry, when it has one) and decodes its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        if self.ttl_hours.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation_and_verification() {
        let keys = TokenKeys::new("test_secret_for_gen_verify", None);
        let user_id = Uuid::new_v4();
        let token = keys.generate_token(user_id).unwrap();
        let claims = keys.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_tokens_for_same_user_are_distinct() {
        let keys = TokenKeys::new("test_secret_distinct", None);
        let user_id = Uuid::new_v4();
        let a = keys.generate_token(user_id).unwrap();
        let b = keys.generate_token(user_id).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_with_ttl_carries_expiry() {
        let keys = TokenKeys::new("test_secret_ttl", Some(1));
        let token = keys.generate_token(Uuid::new_v4()).unwrap();
        let claims = keys.verify_token(&token).unwrap();
        assert!(claims.exp.is_some());
    }

    #[test]
    fn test_token_expiration() {
        let secret = "test_secret_for_expiration";
        let keys = TokenKeys::new(secret, Some(24));

        let expiration = chrono::Utc::now()
            .checked_sub_signed(chrono::Duration::hours(2))
            .expect("valid timestamp")
            .timestamp() as usize;
        let claims_expired = Claims {
            sub: Uuid::new_v4(),
            iat: 0,
            jti: Uuid::new_v4(),
            exp: Some(expiration),
        };
        let expired_token = encode(
            &Header::default(),
            &claims_expired,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        match keys.verify_token(&expired_token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("ExpiredSignature")),
            Ok(_) => panic!("Token should have been invalid due to expiration"),
            Err(e) => panic!("Unexpected error type for expired token: {:?}", e),
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let issuer = TokenKeys::new("one_secret", None);
        let verifier = TokenKeys::new("a_completely_different_secret", None);
        let token = issuer.generate_token(Uuid::new_v4()).unwrap();

        match verifier.verify_token(&token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("InvalidSignature")),
            Ok(_) => panic!("Token should have been invalid due to signature mismatch"),
            Err(e) => panic!("Unexpected error type for invalid signature: {:?}", e),
        }
    }

    #[test]
    fn test_garbage_token_rejected() {
        let keys = TokenKeys::new("any", None);
        assert!(matches!(
            keys.verify_token("not.a.jwt"),
            Err(AppError::Unauthorized(_))
        ));
    }
}
