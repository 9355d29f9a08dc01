use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::User;
use crate::services::error::AuthError;

/// `iss` of every token this service mints.
pub const TOKEN_ISSUER: &str = "admin-service";

/// Token engine: mints and validates HS256 tokens carrying [`TokenClaims`].
///
/// Access and refresh tokens share the claim shape and key; `typ` and the TTL differ.
#[derive(Clone)]
pub struct TokenEngine {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

/// Which half of a pair a token is. Access tokens never refresh and refresh
/// tokens never authenticate requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity claims carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token ID, unique per mint
    pub jti: String,
    pub typ: TokenKind,
}

/// Token pair returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds.
    #[schema(example = 900)]
    pub expires_in: i64,
}

impl TokenEngine {
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        if config.secret.is_empty() {
            return Err(anyhow::anyhow!("JWT signing secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Time claims are checked by hand so expiry and not-before map to distinct errors.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: Duration::minutes(config.access_token_expiry_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expiry_days),
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a `kind` token for `user` valid for `ttl` from now.
    pub fn issue(&self, user: &User, kind: TokenKind, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            iss: TOKEN_ISSUER.to_string(),
            sub: user.id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Mint an access/refresh pair.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access, self.access_ttl)?,
            refresh_token: self.issue(user, TokenKind::Refresh, self.refresh_ttl)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, algorithm, issuer and time bounds.
    ///
    /// Fails only with [`AuthError::TokenExpired`] or [`AuthError::InvalidToken`].
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            },
        )?;
        let claims = data.claims;

        let now = Utc::now().timestamp();
        if now >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        if now < claims.nbf {
            return Err(AuthError::InvalidToken);
        }
        if claims.sub != claims.user_id.to_string() {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// [`Self::validate`], then require the token to be of `kind`.
    pub fn validate_as(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = self.validate(token)?;
        if claims.typ != kind {
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

/// SHA-256 hex digest of a refresh token; sessions store only this.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn user() -> User {
        User::new(
            Uuid::new_v4(),
            "ops@example.com",
            "hash".to_string(),
            "Ops".to_string(),
            "Person".to_string(),
        )
    }

    fn sign(claims: &TokenClaims, alg: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_for(user: &User, iat: i64, nbf: i64, exp: i64) -> TokenClaims {
        TokenClaims {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            iss: TOKEN_ISSUER.to_string(),
            sub: user.id.to_string(),
            iat,
            nbf,
            exp,
            jti: Uuid::new_v4().to_string(),
            typ: TokenKind::Access,
        }
    }

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn issued_token_validates_with_matching_claims() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let user = user();

        let token = engine.issue(&user, TokenKind::Access, Duration::minutes(5))?;
        let claims = engine.validate(&token)?;

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.tenant_id, user.tenant_id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp - claims.iat, 300);
        Ok(())
    }

    #[test]
    fn pair_tokens_differ_and_report_access_ttl() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let pair = engine.issue_pair(&user())?;

        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        Ok(())
    }

    #[test]
    fn expired_token_is_token_expired() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let token = engine.issue(&user(), TokenKind::Access, Duration::seconds(-10))?;

        assert!(matches!(engine.validate(&token), Err(AuthError::TokenExpired)));
        Ok(())
    }

    #[test]
    fn token_expiring_now_is_expired() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let user = user();
        let now = Utc::now().timestamp();
        let token = sign(&claims_for(&user, now - 60, now - 60, now), Algorithm::HS256, SECRET);

        assert!(matches!(engine.validate(&token), Err(AuthError::TokenExpired)));
        Ok(())
    }

    #[test]
    fn wrong_key_is_invalid_token() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let other = TokenEngine::new(&config("another-secret-entirely-different-key"))?;
        let token = other.issue(&user(), TokenKind::Access, Duration::minutes(5))?;

        assert!(matches!(engine.validate(&token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn other_algorithm_is_rejected() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let user = user();
        let now = Utc::now().timestamp();
        let token = sign(&claims_for(&user, now, now, now + 300), Algorithm::HS512, SECRET);

        assert!(matches!(engine.validate(&token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn not_yet_valid_token_is_invalid() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let user = user();
        let now = Utc::now().timestamp();
        let token = sign(
            &claims_for(&user, now, now + 600, now + 900),
            Algorithm::HS256,
            SECRET,
        );

        assert!(matches!(engine.validate(&token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn foreign_issuer_is_invalid() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let user = user();
        let now = Utc::now().timestamp();
        let mut claims = claims_for(&user, now, now, now + 300);
        claims.iss = "someone-else".to_string();
        let token = sign(&claims, Algorithm::HS256, SECRET);

        assert!(matches!(engine.validate(&token), Err(AuthError::InvalidToken)));
        Ok(())
    }

    #[test]
    fn garbage_is_invalid() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        for token in ["", "abc", "a.b.c", "eyJhbGciOiJub25lIn0.e30."] {
            assert!(matches!(engine.validate(token), Err(AuthError::InvalidToken)));
        }
        Ok(())
    }

    #[test]
    fn pair_halves_are_not_interchangeable() -> Result<(), anyhow::Error> {
        let engine = TokenEngine::new(&config(SECRET))?;
        let pair = engine.issue_pair(&user())?;

        assert_eq!(engine.validate_as(&pair.access_token, TokenKind::Access)?.typ, TokenKind::Access);
        assert_eq!(engine.validate_as(&pair.refresh_token, TokenKind::Refresh)?.typ, TokenKind::Refresh);
        assert!(matches!(
            engine.validate_as(&pair.refresh_token, TokenKind::Access),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            engine.validate_as(&pair.access_token, TokenKind::Refresh),
            Err(AuthError::InvalidToken)
        ));
        Ok(())
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(TokenEngine::new(&config("")).is_err());
    }

    #[test]
    fn refresh_token_digest_is_stable_hex() {
        let a = hash_refresh_token("token");
        assert_eq!(a, hash_refresh_token("token"));
        assert_ne!(a, hash_refresh_token("token2"));
        assert_eq!(a.len(), 64);
    }
}
