//! Integration tests for Tradedesk.
//!
//! The tests drive the real client against [`FakeBackend`], an in-process
//! axum server that speaks the trading backend's JSON API and records what it
//! was asked.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tradedesk-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session` - Login, registration, persistence and forced logout
//! - `payments` - Deposits, withdrawals and checkout confirmation
//! - `trading` - Orders, positions and the dashboard refresh loops

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tradedesk_client::session::MemoryStorage;
use tradedesk_client::{ClientConfig, SessionManager};
use url::Url;

/// Email of the account every fake backend starts with.
pub const TRADER_EMAIL: &str = "trader@example.com";
/// Password of [`TRADER_EMAIL`].
pub const TRADER_PASSWORD: &str = "hunter22";
/// User id of [`TRADER_EMAIL`].
pub const TRADER_ID: &str = "user-1";

/// Mutable backend state and request counters.
#[derive(Default)]
pub struct BackendState {
    users: Mutex<HashMap<String, (String, Value)>>,
    tokens: Mutex<HashSet<String>>,
    next_token: AtomicUsize,
    next_position: AtomicUsize,

    expire_sessions: AtomicBool,
    omit_login_profile: AtomicBool,
    logout_delay: Mutex<Duration>,

    checkout_script: Mutex<VecDeque<Value>>,
    positions: Mutex<Vec<Value>>,
    history: Mutex<Vec<Value>>,
    transactions: Mutex<Vec<Value>>,
    balance: Mutex<f64>,

    orders: Mutex<Vec<Value>>,
    checkouts: Mutex<Vec<Value>>,
    authorizations: Mutex<Vec<Option<String>>>,

    pub logout_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub quote_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub transaction_calls: AtomicUsize,
}

impl BackendState {
    /// Every authenticated request answers `401` from now on.
    pub fn expire_sessions(&self) {
        self.expire_sessions.store(true, Ordering::SeqCst);
    }

    /// Login responses leave out `user_profile`.
    pub fn omit_login_profile(&self) {
        self.omit_login_profile.store(true, Ordering::SeqCst);
    }

    /// `/api/auth/logout` waits `delay` before answering.
    pub fn delay_logout(&self, delay: Duration) {
        *self.logout_delay.lock().unwrap() = delay;
    }

    /// Queue checkout status answers; the last one repeats once the queue
    /// runs dry.
    pub fn script_checkout(&self, answers: impl IntoIterator<Item = Value>) {
        self.checkout_script.lock().unwrap().extend(answers);
    }

    /// Order bodies received, oldest first.
    pub fn orders(&self) -> Vec<Value> {
        self.orders.lock().unwrap().clone()
    }

    /// Checkout creation bodies received, oldest first.
    pub fn checkouts(&self) -> Vec<Value> {
        self.checkouts.lock().unwrap().clone()
    }

    /// `Authorization` header of every authenticated request, oldest first.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.authorizations.lock().unwrap().clone()
    }

    pub fn balance(&self) -> f64 {
        *self.balance.lock().unwrap()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn issue_token(&self) -> String {
        let token = format!("tok-{}", self.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        self.tokens.lock().unwrap().insert(token.clone());
        token
    }

    /// Check the bearer token, recording the header.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.authorizations.lock().unwrap().push(header.clone());

        if self.expire_sessions.load(Ordering::SeqCst) {
            return Err(detail(StatusCode::UNAUTHORIZED, "Token expired"));
        }

        let valid = header
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
            .is_some_and(|token| self.tokens.lock().unwrap().contains(token));
        if valid {
            Ok(())
        } else {
            Err(detail(StatusCode::UNAUTHORIZED, "Not authenticated"))
        }
    }
}

/// In-process trading backend bound to an ephemeral local port.
pub struct FakeBackend {
    pub url: Url,
    pub state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start a backend with one registered trader and a 10 000 balance.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        state.users.lock().unwrap().insert(
            TRADER_EMAIL.to_string(),
            (
                TRADER_PASSWORD.to_string(),
                json!({
                    "user_id": TRADER_ID,
                    "email": TRADER_EMAIL,
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "phone": null
                }),
            ),
        );
        *state.balance.lock().unwrap() = 10_000.0;

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/logout", post(logout))
            .route("/api/prices", get(prices))
            .route("/api/accounts/{account}", get(account))
            .route("/api/positions/{key}", get(positions).delete(close_position))
            .route("/api/history/{account}", get(history))
            .route("/api/transactions/{account}", get(transactions))
            .route("/api/orders", post(place_order))
            .route("/api/stripe/checkout/session", post(create_checkout))
            .route("/api/stripe/checkout/status/{session_id}", get(checkout_status))
            .route("/api/stripe/withdrawal", post(withdraw))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
            server,
        }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A session manager for `url` backed by `storage`.
pub fn session_for(url: &Url, storage: &Arc<MemoryStorage>) -> SessionManager {
    let mut config = ClientConfig::new(url.clone());
    config.request_timeout = Duration::from_secs(5);
    SessionManager::restore(&config, storage.clone()).unwrap()
}

/// A session logged in as [`TRADER_EMAIL`], with its storage.
pub async fn logged_in(backend: &FakeBackend) -> (SessionManager, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let session = session_for(&backend.url, &storage);
    let outcome = session
        .login(TRADER_EMAIL, &SecretString::from(TRADER_PASSWORD))
        .await;
    assert!(outcome.is_success(), "login failed: {outcome:?}");
    (session, storage)
}

/// A backend URL nothing listens on.
pub fn unreachable_url() -> Url {
    Url::parse("http://127.0.0.1:9").unwrap()
}

/// Checkout status answer.
pub fn checkout_answer(payment_status: &str, status: &str, amount_total: Option<i64>) -> Value {
    json!({
        "payment_status": payment_status,
        "status": status,
        "amount_total": amount_total,
    })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

type Shared = State<Arc<BackendState>>;

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();

    let user = state.users.lock().unwrap().get(&email).cloned();
    match user {
        Some((expected, profile)) if expected == password => {
            let token = state.issue_token();
            let mut response = json!({
                "access_token": token,
                "user_id": profile["user_id"],
                "message": "Login successful",
            });
            if !state.omit_login_profile.load(Ordering::SeqCst) {
                response["user_profile"] = profile;
            }
            Json(response).into_response()
        }
        _ => detail(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(state): Shared, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if state.users.lock().unwrap().contains_key(&email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }

    let user_id = format!("user-{}", state.users.lock().unwrap().len() + 1);
    let profile = json!({
        "user_id": user_id,
        "email": email,
        "first_name": body["first_name"],
        "last_name": body["last_name"],
        "phone": body.get("phone").cloned().unwrap_or(Value::Null),
    });
    let password = body["password"].as_str().unwrap_or_default().to_string();
    state.users.lock().unwrap().insert(email, (password, profile));

    let token = state.issue_token();
    Json(json!({
        "access_token": token,
        "user_id": user_id,
        "message": "Registration successful",
    }))
    .into_response()
}

async fn logout(State(state): Shared, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *state.logout_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        state.tokens.lock().unwrap().remove(token);
    }
    Json(json!({ "message": "Logged out" })).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Market data and account views
// ─────────────────────────────────────────────────────────────────────────────

async fn prices(State(state): Shared) -> Response {
    state.quote_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        { "symbol": "EURUSD", "bid": 1.0841, "ask": 1.0843, "spread": 0.0002 },
        { "symbol": "GBPUSD", "bid": 1.2710, "ask": 1.2713 },
    ]))
    .into_response()
}

async fn account(State(state): Shared, headers: HeaderMap, Path(_account): Path<String>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    state.account_calls.fetch_add(1, Ordering::SeqCst);
    let balance = state.balance();
    Json(json!({
        "balance": balance,
        "equity": balance,
        "margin": 0.0,
        "free_margin": balance,
        "currency": "EUR",
    }))
    .into_response()
}

async fn positions(State(state): Shared, headers: HeaderMap, Path(_account): Path<String>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(Value::Array(state.positions.lock().unwrap().clone())).into_response()
}

async fn history(State(state): Shared, headers: HeaderMap, Path(_account): Path<String>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    state.history_calls.fetch_add(1, Ordering::SeqCst);
    Json(Value::Array(state.history.lock().unwrap().clone())).into_response()
}

async fn transactions(
    State(state): Shared,
    headers: HeaderMap,
    Path(_account): Path<String>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    state.transaction_calls.fetch_add(1, Ordering::SeqCst);
    Json(Value::Array(state.transactions.lock().unwrap().clone())).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

async fn place_order(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    state.orders.lock().unwrap().push(body.clone());

    let position_id = format!("pos-{}", state.next_position.fetch_add(1, Ordering::SeqCst) + 1);
    let open_price = if body["order_type"] == "sell" { 1.0841 } else { 1.0843 };
    state.positions.lock().unwrap().push(json!({
        "position_id": position_id,
        "symbol": body["symbol"],
        "order_type": body["order_type"],
        "volume": body["volume"],
        "leverage": body["leverage"],
        "open_price": open_price,
        "current_price": open_price,
        "profit_loss": 0.0,
    }));

    Json(json!({
        "order_id": format!("ord-{position_id}"),
        "position_id": position_id,
        "status": "filled",
    }))
    .into_response()
}

async fn close_position(
    State(state): Shared,
    headers: HeaderMap,
    Path(position_id): Path<String>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }

    let closed = {
        let mut positions = state.positions.lock().unwrap();
        let index = positions
            .iter()
            .position(|p| p["position_id"] == position_id.as_str());
        index.map(|i| positions.remove(i))
    };

    match closed {
        Some(position) => {
            state.history.lock().unwrap().insert(
                0,
                json!({
                    "position_id": position["position_id"],
                    "symbol": position["symbol"],
                    "order_type": position["order_type"],
                    "volume": position["volume"],
                    "profit_loss": 0.0,
                    "close_reason": "manual",
                }),
            );
            Json(json!({ "status": "closed", "close_price": position["current_price"] }))
                .into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Position not found"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

async fn create_checkout(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    state.checkouts.lock().unwrap().push(body.clone());
    let amount = body["amount"].as_f64().unwrap_or_default();

    if body["account_type"] == "demo" {
        *state.balance.lock().unwrap() += amount;
        record_transaction(&state, "recharge", amount);
        return Json(json!({ "message": format!("Demo account credited with {amount:.2}") }))
            .into_response();
    }

    Json(json!({
        "url": "https://checkout.example.com/pay/cs_test_1",
        "session_id": "cs_test_1",
    }))
    .into_response()
}

async fn checkout_status(State(state): Shared, Path(_session_id): Path<String>) -> Response {
    state.status_calls.fetch_add(1, Ordering::SeqCst);

    let mut script = state.checkout_script.lock().unwrap();
    let answer = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    drop(script);

    Json(answer.unwrap_or_else(|| checkout_answer("unpaid", "open", None))).into_response()
}

async fn withdraw(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let amount = body["amount"].as_f64().unwrap_or_default();

    let new_balance = {
        let mut balance = state.balance.lock().unwrap();
        if amount > *balance {
            return detail(StatusCode::BAD_REQUEST, "Insufficient balance");
        }
        *balance -= amount;
        *balance
    };
    record_transaction(&state, "stripe_withdrawal", amount);

    Json(json!({
        "message": "Withdrawal processed",
        "new_balance": new_balance,
    }))
    .into_response()
}

fn record_transaction(state: &BackendState, kind: &str, amount: f64) {
    let mut transactions = state.transactions.lock().unwrap();
    let id = format!("txn-{}", transactions.len() + 1);
    transactions.push(json!({
        "transaction_id": id,
        "transaction_type": kind,
        "amount": amount,
        "status": "completed",
        "timestamp": "2026-01-01T00:00:00Z",
        "description": null,
    }));
}
