//! Signed session cookies.
//!
//! The cookie carries the authenticated username in the clear, followed by an
//! HMAC-SHA256 tag over it:
//!
//! ```text
//! session=<base64url(username)>.<hex(hmac)>
//! ```
//!
//! Anything that fails verification is treated as "no session".

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::convert::Infallible;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "session";

const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; SameSite=Lax";

/// Issues and verifies session cookies for one secret.
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can accept any key length")
    }

    /// Cookie value (without attributes) for `username`.
    pub fn sign(&self, username: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(username.as_bytes());
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let tag = hex::encode(mac.finalize().into_bytes());
        format!("{payload}.{tag}")
    }

    /// Username carried by a cookie value, if the tag checks out.
    pub fn verify(&self, value: &str) -> Option<String> {
        let (payload, tag) = value.rsplit_once('.')?;
        let tag = hex::decode(tag).ok()?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).ok()?;

        let raw = URL_SAFE_NO_PAD.decode(payload).ok()?;
        String::from_utf8(raw).ok()
    }

    /// `Set-Cookie` value that authenticates `username`.
    pub fn issue_cookie(&self, username: &str) -> String {
        format!("{COOKIE_NAME}={}; {COOKIE_ATTRIBUTES}", self.sign(username))
    }

    /// `Set-Cookie` value that drops the session.
    pub fn clear_cookie() -> String {
        format!("{COOKIE_NAME}=; {COOKIE_ATTRIBUTES}; Max-Age=0")
    }

    /// Resolve the session carried by request headers.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Session {
        let Some(value) = find_cookie(headers, COOKIE_NAME) else {
            return Session::anonymous();
        };
        match self.verify(value) {
            Some(username) => Session::authenticated(username),
            None => {
                tracing::warn!("Discarding session cookie with invalid signature");
                Session::anonymous()
            }
        }
    }
}

fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// Per-request authentication context, handed to handlers as an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    username: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { username: None }
    }

    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    Arc<SessionSigner>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let signer = Arc::<SessionSigner>::from_ref(state);
        Ok(signer.session_from_headers(&parts.headers))
    }
}
