//! Session management and authorized requests.
//!
//! [`SessionManager`] is the only component that knows the bearer token. It
//! logs users in and out, persists the session through a [`SessionStorage`],
//! and sends every authenticated request. When the backend answers `401`, the
//! session is torn down before the caller gets control back.

mod storage;
mod store;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use tradedesk_core::SessionUser;

pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError, keys};
pub use store::SessionStore;

use crate::api::types::{AuthResponse, LoginRequest, RegisterRequest};
use crate::config::ClientConfig;
use crate::error::{ClientError, error_from_response};

const USER_AGENT: &str = concat!("tradedesk/", env!("CARGO_PKG_VERSION"));
const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// Result of a login or registration attempt.
///
/// These never surface as errors: every failure is turned into a message the
/// front end can show next to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success { message: Option<String> },
    Failure { message: String },
}

impl AuthOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Method, extra headers and body of an authorized request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::with_method(Method::GET)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::with_method(Method::POST)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::with_method(Method::DELETE)
    }

    #[must_use]
    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Add a header. Headers set here override the defaults, including
    /// `Authorization`.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }
}

/// Owns the session and sends authenticated requests.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    client: reqwest::Client,
    api_base: String,
    store: SessionStore,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api_base", &self.inner.api_base)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build the manager and rehydrate any persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn restore(
        config: &ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(client, config, storage))
    }

    /// Build the manager around an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        config: &ClientConfig,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                client,
                api_base: config.api_url.as_str().trim_end_matches('/').to_string(),
                store: SessionStore::restore(storage),
            }),
        }
    }

    /// Whether a token and a user are both present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.is_authenticated()
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.inner.store.user()
    }

    /// Resolve an endpoint against the API base. Absolute URLs pass through.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.inner.api_base)
        } else {
            format!("{}/{endpoint}", self.inner.api_base)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Log in with email and password.
    ///
    /// On success the session is stored and persisted. On failure the
    /// existing session is left untouched.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> AuthOutcome {
        let request = LoginRequest { email, password };

        let auth = match self.post_auth("/api/auth/login", &request, LOGIN_FAILED).await {
            Ok(auth) => auth,
            Err(message) => return AuthOutcome::Failure { message },
        };

        let Some(profile) = auth.user_profile else {
            warn!("Login response carried no user profile");
            return AuthOutcome::Failure {
                message: LOGIN_FAILED.to_string(),
            };
        };

        let user = SessionUser {
            user_id: auth.user_id,
            profile,
        };
        self.establish(auth.access_token, user);
        info!("Logged in");

        AuthOutcome::Success {
            message: auth.message,
        }
    }

    /// Register a new user and log them in.
    ///
    /// The session is established from the registration response; the stored
    /// profile is built from the submitted fields.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> AuthOutcome {
        let auth = match self
            .post_auth("/api/auth/register", &request, REGISTRATION_FAILED)
            .await
        {
            Ok(auth) => auth,
            Err(message) => return AuthOutcome::Failure { message },
        };

        let user = SessionUser {
            user_id: auth.user_id,
            profile: request.profile(),
        };
        self.establish(auth.access_token, user);
        info!("Registered and logged in");

        AuthOutcome::Success {
            message: auth.message,
        }
    }

    /// Log out.
    ///
    /// The backend is notified with the current token on a best-effort basis;
    /// the local session and its persisted copy are cleared regardless. Only
    /// the first of several concurrent calls notifies the backend.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.end_session(self.inner.store.generation()).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorized requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a request with the session's credentials attached.
    ///
    /// `Content-Type: application/json` and, when logged in,
    /// `Authorization: Bearer <token>` are added; headers in `options` win.
    /// The token is read at call time.
    ///
    /// # Errors
    ///
    /// - [`ClientError::SessionExpired`] if the backend answered `401`. The
    ///   session has already been cleared when this is returned.
    /// - [`ClientError::Http`] if the request could not be sent.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn authorized_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let (token, generation) = self.inner.store.credentials();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut request = self
            .inner
            .client
            .request(options.method, self.url(endpoint))
            .headers(headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected the session token, logging out");
            self.end_session(generation).await;
            return Err(ClientError::SessionExpired);
        }

        Ok(response)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// POST an unauthenticated auth request and decode the response.
    ///
    /// Every failure is flattened into the message shown to the user.
    async fn post_auth<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
        fallback: &str,
    ) -> Result<AuthResponse, String> {
        let response = self
            .inner
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Auth request failed");
                format!("{fallback}: {e}")
            })?;

        if !response.status().is_success() {
            return Err(match error_from_response(response, fallback).await {
                ClientError::Api { status, detail } => {
                    debug!(status, "Auth request rejected");
                    detail
                }
                other => other.to_string(),
            });
        }

        response.json::<AuthResponse>().await.map_err(|e| {
            warn!(error = %e, "Auth response did not parse");
            fallback.to_string()
        })
    }

    /// Tear down session `generation`, unless a newer login replaced it
    /// while the backend was being notified.
    async fn end_session(&self, generation: u64) {
        if let Some(token) = self.inner.store.take_token(generation) {
            let result = self
                .inner
                .client
                .post(self.url("/api/auth/logout"))
                .bearer_auth(token.expose_secret())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => debug!("Backend acknowledged logout"),
                Ok(response) => warn!(status = %response.status(), "Logout notification rejected"),
                Err(e) => warn!(error = %e, "Logout notification failed"),
            }
        }

        if self.inner.store.clear(generation) {
            info!("Logged out");
        }
    }

    fn establish(&self, token: String, user: SessionUser) {
        if let Err(e) = self.inner.store.establish(SecretString::from(token), user) {
            warn!(error = %e, "Session could not be persisted; it will not survive a restart");
        }
    }
}
