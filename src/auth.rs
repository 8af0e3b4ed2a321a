use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{LoginRequest, TokenResponse};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("authentication service error: {0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

enum RemoteProbe {
    /// Could not reach the remote service at all; the only case that may
    /// fall back to the local table.
    Unavailable,
    Failed(String),
}

/// Validates credentials against a remote verification service, falling back
/// to a local table only when the remote side is unreachable, and issues
/// HS256 bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    client: Client,
    probe_timeout: Duration,
}

impl AuthService {
    pub fn new(config: AuthConfig, probe_timeout: Duration) -> Self {
        Self {
            config,
            client: Client::new(),
            probe_timeout,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<TokenResponse, AuthError> {
        tracing::info!(username = %request.username, "login attempt");

        let authorized = match self.remote_check(&request).await {
            Ok(verdict) => verdict,
            Err(RemoteProbe::Unavailable) => {
                tracing::info!("remote auth unavailable, using local credential table");
                self.local_check(&request)
            }
            Err(RemoteProbe::Failed(detail)) => return Err(AuthError::Upstream(detail)),
        };

        if !authorized {
            tracing::info!(username = %request.username, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let token = issue_token(
            &self.config.secret,
            &request.username,
            self.config.token_ttl_secs,
        )
        .map_err(|err| AuthError::Internal(err.to_string()))?;

        tracing::info!(username = %request.username, "login succeeded");
        Ok(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_in: self.config.token_ttl_secs,
            username: request.username,
        })
    }

    /// One bounded attempt against the remote verifier. The verdict is
    /// authoritative when the probe completes; only connect/timeout failures
    /// report Unavailable.
    async fn remote_check(&self, request: &LoginRequest) -> Result<bool, RemoteProbe> {
        #[derive(Serialize)]
        struct VerifyReq<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .client
            .post(&self.config.remote_url)
            .timeout(self.probe_timeout)
            .json(&VerifyReq {
                username: &request.username,
                password: &request.password,
            })
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    RemoteProbe::Unavailable
                } else {
                    RemoteProbe::Failed(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(false);
        }

        Err(RemoteProbe::Failed(format!(
            "remote auth returned {status}"
        )))
    }

    fn local_check(&self, request: &LoginRequest) -> bool {
        self.config
            .users
            .iter()
            .any(|(user, pass)| *user == request.username && *pass == request.password)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(secret: &str, username: &str, ttl_secs: i64) -> anyhow::Result<String> {
    #[derive(Serialize)]
    struct Header {
        alg: &'static str,
        typ: &'static str,
    }

    let iat = Utc::now().timestamp();
    let claims = TokenClaims {
        sub: username.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat,
        exp: iat + ttl_secs,
    };

    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&Header {
        alg: "HS256",
        typ: "JWT",
    })?);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| anyhow::anyhow!("invalid hmac key: {err}"))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Checks the signature and expiry and returns the claims.
pub fn verify_token(secret: &str, token: &str) -> anyhow::Result<TokenClaims> {
    let mut segments = token.splitn(3, '.');
    let (Some(header), Some(payload), Some(signature)) =
        (segments.next(), segments.next(), segments.next())
    else {
        anyhow::bail!("malformed token");
    };

    let signing_input = format!("{header}.{payload}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| anyhow::anyhow!("invalid hmac key: {err}"))?;
    mac.update(signing_input.as_bytes());
    let expected = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    if expected != signature {
        anyhow::bail!("signature mismatch");
    }

    let claims: TokenClaims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
    if claims.exp <= Utc::now().timestamp() {
        anyhow::bail!("token expired");
    }

    Ok(claims)
}
