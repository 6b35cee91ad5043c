// common/src/utils.rs
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

/// Setup tracing for consistent logging across services
pub fn setup_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

// Claims of a wallet-bound session token
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    pub sub: String,    // session_id
    pub wallet: String, // wallet_address
    pub exp: usize,     // expiration time, tied to the session expiry
    pub iat: usize,     // issued at time
}

// Issue a token bound to one session and its owner wallet.
// The token dies with the session.
pub fn generate_session_token(
    session_id: &Uuid,
    wallet_address: &str,
    expires_at: DateTime<Utc>,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = SessionTokenClaims {
        sub: session_id.to_string(),
        wallet: wallet_address.to_string(),
        iat: Utc::now().timestamp().max(0) as usize,
        exp: expires_at.timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

// Validate a session token and extract session_id and wallet_address
pub fn validate_session_token(
    token: &str,
    secret: &[u8],
) -> Result<(Uuid, String), jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<SessionTokenClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation,
    )?;

    let session_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| jsonwebtoken::errors::ErrorKind::InvalidSubject)?;

    Ok((session_id, token_data.claims.wallet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_round_trips_session_and_wallet() {
        let session_id = Uuid::new_v4();
        let wallet = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";
        let expires_at = Utc::now() + Duration::hours(1);

        let token =
            generate_session_token(&session_id, wallet, expires_at, b"secret").unwrap();
        let (decoded_id, decoded_wallet) =
            validate_session_token(&token, b"secret").unwrap();

        assert_eq!(decoded_id, session_id);
        assert_eq!(decoded_wallet, wallet);
    }

    #[test]
    fn expired_token_is_rejected() {
        let session_id = Uuid::new_v4();
        let expires_at = Utc::now() - Duration::hours(2);

        let token =
            generate_session_token(&session_id, "0xabc", expires_at, b"secret").unwrap();
        assert!(validate_session_token(&token, b"secret").is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let session_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(1);

        let token =
            generate_session_token(&session_id, "0xabc", expires_at, b"secret").unwrap();
        assert!(validate_session_token(&token, b"other").is_err());
    }
}
