use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, JwtClaims, JwtHeader, Role, TokenPair, TokenUse};

type HmacSha256 = Hmac<Sha256>;

const ACCESS_TTL_SECONDS: u64 = 3600;
const REFRESH_TTL_SECONDS: u64 = 30 * 24 * 3600;

/// Mint the access/refresh pair handed out after OTP verification.
pub fn issue_token_pair(
    identity_id: Uuid,
    phone_number: &str,
    role: Role,
    jwt_secret: &str,
) -> Result<TokenPair, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let access_token = sign_token(
        identity_id,
        phone_number,
        role,
        TokenUse::Access,
        ACCESS_TTL_SECONDS,
        jwt_secret,
    )?;
    let refresh_token = sign_token(
        identity_id,
        phone_number,
        role,
        TokenUse::Refresh,
        REFRESH_TTL_SECONDS,
        jwt_secret,
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn sign_token(
    identity_id: Uuid,
    phone_number: &str,
    role: Role,
    token_use: TokenUse,
    ttl_seconds: u64,
    jwt_secret: &str,
) -> Result<String, String> {
    let now = Utc::now().timestamp() as u64;

    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let claims = JwtClaims {
        sub: identity_id,
        phone_number: phone_number.to_string(),
        role,
        token_use,
        iat: now,
        exp: now + ttl_seconds,
    };

    let header_json =
        serde_json::to_string(&header).map_err(|_| "Failed to encode header".to_string())?;
    let claims_json =
        serde_json::to_string(&claims).map_err(|_| "Failed to encode claims".to_string())?;

    let header_b64 = URL_SAFE_NO_PAD.encode(header_json.as_bytes());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json.as_bytes());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature_b64))
}

/// Validate an access token and return the caller it identifies.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if claims.token_use != TokenUse::Access {
        return Err("Not an access token".to_string());
    }

    let now = Utc::now().timestamp() as u64;
    if claims.exp < now {
        debug!("Token expired at {} (now: {})", claims.exp, now);
        return Err("Token expired".to_string());
    }

    let user = AuthUser {
        id: claims.sub,
        phone_number: claims.phone_number,
        role: claims.role,
    };

    debug!("Token validated successfully for identity: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trip_preserves_identity() {
        let id = Uuid::new_v4();
        let pair = issue_token_pair(id, "5551234", Role::Patient, SECRET).unwrap();

        let user = validate_token(&pair.access_token, SECRET).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.phone_number, "5551234");
        assert_eq!(user.role, Role::Patient);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let pair = issue_token_pair(Uuid::new_v4(), "5551234", Role::None, SECRET).unwrap();

        let err = validate_token(&pair.refresh_token, SECRET).unwrap_err();
        assert_eq!(err, "Not an access token");
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let pair = issue_token_pair(Uuid::new_v4(), "5551234", Role::None, SECRET).unwrap();

        assert!(validate_token(&pair.access_token, "other-secret").is_err());

        let mut forged = pair.access_token.clone();
        forged.pop();
        forged.push('A');
        assert!(validate_token(&forged, SECRET).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(validate_token("not-a-token", SECRET).is_err());
        assert!(validate_token("a.b.c", SECRET).is_err());
    }
}
