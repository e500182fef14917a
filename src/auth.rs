use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::RwLock;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::User,
    repository::UserStoreState,
};

/// Name of the session cookie the browser carries between requests.
pub const SESSION_COOKIE: &str = "sid";

// --- Password Hashing ---

/// hash_password
///
/// Derives the stored credential from a plaintext password: Argon2 with a
/// fresh random salt. The plaintext never leaves this function.
pub fn hash_password(plain: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("argon2 hash: {e}")))?
        .to_string();
    Ok(hash)
}

/// verify_password
///
/// Checks a plaintext against a stored hash. A mismatch is `Ok(false)`; a
/// stored hash that does not even parse is corrupt server-side data and
/// surfaces as an internal error rather than a login failure.
pub fn verify_password(plain: &str, hash: &str) -> AppResult<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("argon2 parse: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// --- Session Store ---

struct SessionEntry {
    user_id: Uuid,
    expires_at: Instant,
}

/// SessionManager
///
/// Server-side session table: opaque token -> user id with a fixed TTL.
/// Tokens are 256-bit random values, so possession of the cookie is the whole
/// credential; nothing about the user is encoded in it. Owned by the
/// [`AuthManager`] and injected through the application state, never ambient.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

fn generate_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Establishes a session bound to the user's id and returns its token.
    pub fn issue(&self, user_id: Uuid) -> String {
        let token = generate_token();
        let entry = SessionEntry {
            user_id,
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().insert(token.clone(), entry);
        token
    }

    /// Resolves a token to the bound user id, pruning the entry if its TTL
    /// has lapsed so the map does not accumulate dead tokens.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(token) {
                Some(entry) if entry.expires_at > now => return Some(entry.user_id),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().remove(token);
        None
    }

    /// Invalidates a session. True if the token was live.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }
}

// --- Auth Manager ---

/// AuthManager
///
/// Ties the credential store to the session table: verifies logins, issues
/// and revokes sessions, and resolves the current user for each request.
pub struct AuthManager {
    users: UserStoreState,
    sessions: SessionManager,
}

/// AuthState
///
/// The concrete type used to share the auth manager across the application state.
pub type AuthState = Arc<AuthManager>;

impl AuthManager {
    pub fn new(users: UserStoreState, ttl: Duration) -> Self {
        Self {
            users,
            sessions: SessionManager::new(ttl),
        }
    }

    /// verify_credentials
    ///
    /// Looks up by exact email and checks the password against the stored
    /// hash. Unknown email and wrong password both come back as `Ok(None)`:
    /// the caller must not be able to tell which one happened.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// login
    ///
    /// The full login flow: credential check, then session issue. Returns the
    /// session token the boundary layer turns into a cookie.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        let user = self
            .verify_credentials(email, password)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        tracing::info!(user = %user.email, "login");
        Ok(self.sessions.issue(user.id))
    }

    /// Tears down the session; subsequent requests with this token resolve to
    /// no user. True if the token was live.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.revoke(token)
    }

    /// current_user
    ///
    /// Resolves a session token to a live user record. The lookup goes back
    /// to the user store on every request, so a user deleted after login
    /// loses access immediately even though the session token still exists.
    pub async fn current_user(&self, token: &str) -> AppResult<Option<User>> {
        let Some(user_id) = self.sessions.resolve(token) else {
            return Ok(None);
        };
        self.users.find_by_id(user_id).await
    }
}

// --- Cookie Plumbing ---

/// Set-Cookie value establishing the session.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// Set-Cookie value clearing the session on logout.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Pulls the session token out of a request's Cookie header, if present.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

// --- Request Extractor ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers destructure it
/// to get the full user record, which carries everything the authorization
/// policy needs (id and admin flag).
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// AuthRedirect
///
/// Rejection for requests without a usable session: a 303 redirect to the
/// login page, the behavior a browser-facing form application expects instead
/// of a bare 401.
#[derive(Debug)]
pub struct AuthRedirect;

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

/// Lets any protected handler take `AuthUser` as an argument, so session
/// handling never leaks into business logic.
///
/// Resolution order:
/// 1. Read the session token from the `sid` cookie.
/// 2. Map the token to a user id, honoring the TTL.
/// 3. Fetch the user's current record, so a deleted user cannot keep acting
///    on a stale session.
///
/// Any failure redirects to `/login`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    // Lets the extractor pull the AuthManager out of the app state.
    AuthState: FromRef<S>,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);

        let token = token_from_headers(&parts.headers).ok_or(AuthRedirect)?;

        match auth.current_user(&token).await {
            Ok(Some(user)) => Ok(AuthUser(user)),
            Ok(None) => Err(AuthRedirect),
            Err(e) => {
                tracing::error!(error = %e, "session resolution failed");
                Err(AuthRedirect)
            }
        }
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
