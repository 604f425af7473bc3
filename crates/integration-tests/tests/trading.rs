//! Integration tests for order entry, position management and the dashboard.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tradedesk_client::validation::OrderDraft;
use tradedesk_client::{ClientError, Dashboard, RefreshIntervals, TradingApi};
use tradedesk_core::{AccountType, Leverage, OrderSide, PositionId, quote_for};
use tradedesk_integration_tests::{BackendState, FakeBackend, logged_in, session_for};

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Market data
// =============================================================================

#[tokio::test]
async fn test_quotes_do_not_need_a_session() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(tradedesk_client::session::MemoryStorage::new());
    let api = TradingApi::new(session_for(&backend.url, &storage));

    let quotes = api.quotes().await.unwrap();

    assert_eq!(quotes.len(), 2);
    let eurusd = quote_for(&quotes, "EURUSD");
    assert!(eurusd.ask > eurusd.bid);
    assert_eq!(quote_for(&quotes, "GBPUSD").spread, None);
    assert_eq!(quote_for(&quotes, "XAUUSD").bid, 0.0);
}

#[tokio::test]
async fn test_account_views_need_a_session() {
    let backend = FakeBackend::start().await;
    let storage = Arc::new(tradedesk_client::session::MemoryStorage::new());
    let api = TradingApi::new(session_for(&backend.url, &storage));

    let result = api.account(AccountType::Demo).await;

    assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    assert_eq!(BackendState::count(&backend.state.account_calls), 0);
    assert!(backend.state.authorizations().is_empty());
}

// =============================================================================
// Orders and positions
// =============================================================================

#[tokio::test]
async fn test_place_order_sends_normalized_request() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let draft = OrderDraft {
        symbol: " gbpusd ".to_string(),
        side: OrderSide::Sell,
        volume: 0.5,
        leverage: Leverage::Fixed(200),
    };
    let receipt = api.place_order(AccountType::Real, &draft).await.unwrap();

    assert_eq!(receipt.position_id, Some(PositionId::new("pos-1")));
    assert_eq!(receipt.status, "filled");

    let orders = backend.state.orders();
    let order = orders.first().unwrap();
    assert_eq!(order["account_type"], "real");
    assert_eq!(order["symbol"], "GBPUSD");
    assert_eq!(order["order_type"], "sell");
    assert_eq!(order["volume"], 0.5);
    assert_eq!(order["leverage"], 200);
    assert!(order["timestamp"].as_str().unwrap().contains('T'));

    let positions = api.positions(AccountType::Real).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions.first().unwrap().leverage, Leverage::Fixed(200));
}

#[tokio::test]
async fn test_unlimited_leverage_uses_sentinel() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    api.place_order(AccountType::Demo, &OrderDraft::default())
        .await
        .unwrap();

    let orders = backend.state.orders();
    assert_eq!(orders.first().unwrap()["leverage"], 999_999);

    let positions = api.positions(AccountType::Demo).await.unwrap();
    assert_eq!(positions.first().unwrap().leverage, Leverage::Unlimited);
}

#[tokio::test]
async fn test_invalid_order_is_never_sent() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let draft = OrderDraft {
        volume: 0.0,
        ..OrderDraft::default()
    };
    let result = api.place_order(AccountType::Demo, &draft).await;

    match result {
        Err(ClientError::Validation(errors)) => assert!(errors.get("volume").is_some()),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(backend.state.orders().is_empty());
}

#[tokio::test]
async fn test_close_position_moves_it_to_history() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let receipt = api
        .place_order(AccountType::Demo, &OrderDraft::default())
        .await
        .unwrap();
    let position_id = receipt.position_id.unwrap();

    let closed = api.close_position(&position_id).await.unwrap();
    assert_eq!(closed.status, "closed");
    assert!(closed.close_price.is_some());

    assert!(api.positions(AccountType::Demo).await.unwrap().is_empty());
    let history = api.history(AccountType::Demo).await.unwrap();
    assert_eq!(history.first().unwrap().position_id, position_id);
}

#[tokio::test]
async fn test_close_unknown_position_reports_detail() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let result = api.close_position(&PositionId::new("pos-404")).await;

    match result {
        Err(ClientError::Api { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Position not found");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

// =============================================================================
// Dashboard
// =============================================================================

fn fast_intervals() -> RefreshIntervals {
    RefreshIntervals {
        quotes: Duration::from_millis(20),
        account: Duration::from_millis(50),
        positions: Duration::from_millis(30),
    }
}

#[tokio::test]
async fn test_dashboard_follows_backend_changes() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let handle = Dashboard::new(Arc::new(api.clone()), AccountType::Demo)
        .with_intervals(fast_intervals())
        .start();
    let mut views = handle.views().clone();

    tokio::time::timeout(WAIT, views.quotes.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(WAIT, views.account.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();

    let receipt = api
        .place_order(AccountType::Demo, &OrderDraft::default())
        .await
        .unwrap();
    tokio::time::timeout(
        WAIT,
        views
            .positions
            .wait_for(|p| p.as_ref().is_some_and(|p| p.len() == 1)),
    )
    .await
    .unwrap()
    .unwrap();

    api.close_position(&receipt.position_id.unwrap()).await.unwrap();
    tokio::time::timeout(
        WAIT,
        views
            .history
            .wait_for(|h| h.as_ref().is_some_and(|h| h.len() == 1)),
    )
    .await
    .unwrap()
    .unwrap();

    handle.shutdown().await;
}

#[tokio::test]
async fn test_dashboard_refresh_all_refetches_ledger() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session);

    let handle = Dashboard::new(Arc::new(api), AccountType::Demo)
        .with_intervals(RefreshIntervals {
            quotes: Duration::from_secs(60),
            account: Duration::from_secs(60),
            positions: Duration::from_secs(60),
        })
        .start();
    let mut views = handle.views().clone();
    tokio::time::timeout(WAIT, views.transactions.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
    let before = BackendState::count(&backend.state.transaction_calls);

    handle.refresh_all();
    tokio::time::timeout(WAIT, async {
        while BackendState::count(&backend.state.transaction_calls) == before {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    handle.shutdown().await;
}

#[tokio::test]
async fn test_dashboard_keeps_last_values_after_session_expires() {
    let backend = FakeBackend::start().await;
    let (session, _) = logged_in(&backend).await;
    let api = TradingApi::new(session.clone());

    let handle = Dashboard::new(Arc::new(api), AccountType::Demo)
        .with_intervals(fast_intervals())
        .start();
    let mut views = handle.views().clone();
    tokio::time::timeout(WAIT, views.account.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();

    backend.state.expire_sessions();
    tokio::time::timeout(WAIT, async {
        while session.is_authenticated() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(views.account.borrow().is_some());
    assert_eq!(BackendState::count(&backend.state.logout_calls), 1);

    handle.shutdown().await;
}
