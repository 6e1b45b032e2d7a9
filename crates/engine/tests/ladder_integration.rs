//! End-to-end ladder scenarios through `LadderEngine`.
//!
//! Covers:
//! - The reference 0.52 level (0.50 / 0.47 asks, 0.4% fee)
//! - Tier sizing of a $250 stake
//! - Idempotent auto ticks and redeploys on price changes
//! - Manual click, quick deploy, paired and cancel-all paths
//! - Gateway failures and live snapshots driving the ladder

use arb_ladder_core::{MarketSnapshot, TokenSide};
use arb_ladder_engine::{
    DeployAck, DeployError, DeployMode, DeployRejection, EngineControls, GatewayError, LadderBuilder,
    LadderEngine, LevelQuote, LevelQuoteSource, OrderGateway, PaperGateway, PaperGatewayConfig,
    ReconcileOutcome, SelectionRejection, SnapshotLadderSource, SyntheticLadderSource, TieredSizer,
    ActiveLadderOrder,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

/// Asks per level shared with the test so prices can move between ticks.
/// Levels not in the table cost $1.01.
#[derive(Clone, Default)]
struct SharedTable(Arc<Mutex<HashMap<Decimal, (Decimal, Decimal)>>>);

impl SharedTable {
    fn set(&self, level: Decimal, yes: Decimal, no: Decimal) {
        self.0.lock().insert(level, (yes, no));
    }
}

struct TableSource {
    table: SharedTable,
}

impl LevelQuoteSource for TableSource {
    fn reference_price(&self) -> Option<Decimal> {
        Some(dec!(0.50))
    }

    fn quote_level(&mut self, level_price: Decimal, _reference_price: Decimal) -> LevelQuote {
        let (yes, no) = self
            .table
            .0
            .lock()
            .get(&level_price)
            .copied()
            .unwrap_or((level_price, dec!(1.01) - level_price));
        LevelQuote {
            yes_bid_size: dec!(500),
            yes_ask_size: dec!(500),
            yes_ask_price: yes,
            no_bid_size: dec!(500),
            no_ask_size: dec!(500),
            no_ask_price: no,
        }
    }
}

/// Ten profitable levels 0.45..=0.54, net edge rising with price.
fn ten_level_table() -> SharedTable {
    let table = SharedTable::default();
    for i in 0..10 {
        table.set(
            dec!(0.45) + Decimal::new(i, 2),
            dec!(0.50),
            dec!(0.48) - Decimal::new(i, 3),
        );
    }
    table
}

fn build_engine(table: &SharedTable, gateway: Arc<dyn OrderGateway>) -> LadderEngine {
    LadderEngine::new(
        LadderBuilder::default(),
        Box::new(TableSource {
            table: table.clone(),
        }),
        gateway,
        EngineControls::default(),
    )
}

fn paper() -> Arc<PaperGateway> {
    Arc::new(PaperGateway::new(PaperGatewayConfig::instant()))
}

/// Gateway that replays scripted answers, then accepts.
#[derive(Default)]
struct ScriptedGateway {
    answers: Mutex<VecDeque<Result<DeployAck, GatewayError>>>,
    calls: Mutex<Vec<(usize, DeployMode)>>,
}

impl ScriptedGateway {
    fn with(answers: Vec<Result<DeployAck, GatewayError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: Mutex::default(),
        }
    }
}

#[async_trait]
impl OrderGateway for ScriptedGateway {
    async fn deploy(&self, orders: &[ActiveLadderOrder], mode: DeployMode) -> Result<DeployAck, GatewayError> {
        self.calls.lock().push((orders.len(), mode));
        self.answers.lock().pop_front().unwrap_or(Ok(DeployAck::Accepted))
    }

    async fn cancel_all(&self) -> Result<u32, GatewayError> {
        Err(GatewayError::Unavailable("scripted".into()))
    }
}

// =============================================================================
// Reference scenarios
// =============================================================================

#[tokio::test]
async fn test_reference_level_is_profitable() {
    let table = SharedTable::default();
    table.set(dec!(0.52), dec!(0.50), dec!(0.47));
    let mut engine = build_engine(&table, paper());

    let ladder = engine.refresh();
    let edge = ladder.edge_for(dec!(0.52)).unwrap();

    assert_eq!(edge.total_cost, dec!(0.97));
    assert_eq!(edge.gross_edge_pct, dec!(3.0));
    assert_eq!(edge.net_edge_pct, dec!(2.2));
    assert!(edge.is_profitable);
    assert_eq!(ladder.profitable().count(), 1);
}

#[test]
fn test_250_stake_over_five_levels() {
    let tiers = TieredSizer::allocate(dec!(250), 5);
    let total: Decimal = tiers.iter().map(|t| t.dollars).sum();

    assert!((total - dec!(250.00)).abs() <= dec!(0.01));
    assert!(tiers.windows(2).all(|w| w[0].dollars >= w[1].dollars));
}

#[tokio::test]
async fn test_auto_tick_is_idempotent() {
    let table = ten_level_table();
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());

    engine.refresh();
    assert_eq!(
        engine.on_tick().await,
        ReconcileOutcome::Redeployed { count: 14, levels: 7 }
    );
    let first = engine.active_orders();

    engine.refresh();
    assert_eq!(engine.on_tick().await, ReconcileOutcome::Unchanged);
    assert!(Arc::ptr_eq(&first, &engine.active_orders()));
    assert_eq!(gateway.deploys_submitted(), 1);
}

#[tokio::test]
async fn test_price_change_at_selected_level_redeploys() {
    let table = ten_level_table();
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());

    engine.refresh();
    engine.on_tick().await;
    let first = engine.active_orders();

    table.set(dec!(0.50), dec!(0.495), dec!(0.475));
    engine.refresh();
    assert!(matches!(engine.on_tick().await, ReconcileOutcome::Redeployed { .. }));
    assert!(!Arc::ptr_eq(&first, &engine.active_orders()));

    let moved = engine
        .active_orders()
        .iter()
        .find(|o| o.level_price == dec!(0.50) && o.side == TokenSide::Yes)
        .map(|o| o.price);
    assert_eq!(moved, Some(dec!(0.495)));
    assert_eq!(gateway.deploys_submitted(), 2);
}

#[tokio::test]
async fn test_change_outside_selection_is_ignored() {
    let table = ten_level_table();
    let mut engine = build_engine(&table, paper());
    engine.refresh();
    engine.on_tick().await;

    // 0.45 ranks below the top seven; a small move there changes nothing.
    table.set(dec!(0.45), dec!(0.50), dec!(0.479));
    engine.refresh();
    assert_eq!(engine.on_tick().await, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn test_click_above_one_dollar_rejected() {
    let table = SharedTable::default();
    table.set(dec!(0.52), dec!(0.50), dec!(0.47));
    table.set(dec!(0.51), dec!(0.53), dec!(0.48));
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();
    engine.on_tick().await;
    let before = engine.active_orders();

    let err = engine.deploy_level(dec!(0.51)).await.unwrap_err();
    match err {
        DeployError::Rejected(DeployRejection::NotProfitable {
            yes_ask,
            no_ask,
            total_cost,
            ..
        }) => {
            assert_eq!(yes_ask, dec!(0.53));
            assert_eq!(no_ask, dec!(0.48));
            assert_eq!(total_cost, dec!(1.01));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(Arc::ptr_eq(&before, &engine.active_orders()));
    assert_eq!(gateway.deploys_submitted(), 1);
}

// =============================================================================
// Manual paths
// =============================================================================

#[tokio::test]
async fn test_click_forces_weak_level_in() {
    let table = ten_level_table();
    let mut engine = build_engine(&table, paper());
    engine.set_auto_enabled(false);
    engine.refresh();

    let count = engine.deploy_level(dec!(0.46)).await.unwrap();
    assert_eq!(count, 14);

    let active = engine.active_orders();
    assert!(active.iter().any(|o| o.level_price == dec!(0.46)));
    assert!(!active.iter().any(|o| o.level_price == dec!(0.48)));
}

#[tokio::test]
async fn test_quick_deploy_ignores_fingerprint() {
    let table = ten_level_table();
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();
    engine.on_tick().await;

    assert_eq!(engine.quick_deploy().await.unwrap(), 14);
    assert_eq!(gateway.deploys_submitted(), 2);
}

#[tokio::test]
async fn test_paired_flow_appends() {
    let table = ten_level_table();
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();
    engine.on_tick().await;

    let selection = engine.select_pair(dec!(0.45)).unwrap();
    assert_eq!(selection.yes_allocation, dec!(125));
    assert!(engine.view().selection.is_some());

    let orders = engine.confirm_pair().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(engine.selection().is_none());
    assert_eq!(engine.active_orders().len(), 16);
    assert_eq!(gateway.resting_orders().len(), 16);

    // Appending does not move the fingerprint.
    engine.refresh();
    assert_eq!(engine.on_tick().await, ReconcileOutcome::Unchanged);
}

#[tokio::test]
async fn test_paired_selection_rejections() {
    let table = ten_level_table();
    let mut engine = build_engine(&table, paper());
    engine.refresh();

    assert!(matches!(
        engine.select_pair(dec!(0.60)),
        Err(SelectionRejection::NotProfitable { .. })
    ));
    assert!(matches!(
        engine.confirm_pair().await,
        Err(DeployError::Selection(SelectionRejection::NothingStaged))
    ));

    engine.select_pair(dec!(0.50)).unwrap();
    assert!(engine.cancel_pair().is_some());
    assert!(engine.selection().is_none());
}

#[tokio::test]
async fn test_rejected_confirm_keeps_selection() {
    let table = ten_level_table();
    let gateway = Arc::new(ScriptedGateway::with(vec![Ok(DeployAck::rejected("halted"))]));
    let mut engine = build_engine(&table, gateway.clone());
    engine.set_auto_enabled(false);
    engine.refresh();

    engine.select_pair(dec!(0.50)).unwrap();
    let err = engine.confirm_pair().await.unwrap_err();
    assert_eq!(err, DeployError::GatewayRejected("halted".into()));
    assert!(engine.selection().is_some());
    assert!(engine.active_orders().is_empty());

    engine.confirm_pair().await.unwrap();
    assert_eq!(engine.active_orders().len(), 2);
    assert_eq!(gateway.calls.lock().last(), Some(&(2, DeployMode::Append)));
}

#[tokio::test]
async fn test_cancel_all_clears_everything() {
    let table = ten_level_table();
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();
    engine.on_tick().await;
    engine.select_pair(dec!(0.50)).unwrap();

    let cancelled = engine.cancel_all().await.unwrap();
    assert_eq!(cancelled, 14);
    assert!(engine.active_orders().is_empty());
    assert!(engine.selection().is_none());
    assert!(!engine.is_busy());
    assert_eq!(gateway.cancel_calls(), 1);

    // Fingerprint was reset, so the same ladder deploys again.
    engine.refresh();
    assert!(matches!(engine.on_tick().await, ReconcileOutcome::Redeployed { .. }));
}

#[tokio::test]
async fn test_cancel_all_gateway_error_still_clears() {
    let table = ten_level_table();
    let mut engine = build_engine(&table, Arc::new(ScriptedGateway::default()));
    engine.refresh();
    engine.on_tick().await;

    assert!(engine.cancel_all().await.is_err());
    assert!(engine.active_orders().is_empty());
    assert!(!engine.is_busy());
}

// =============================================================================
// Failures and sources
// =============================================================================

#[tokio::test]
async fn test_gateway_error_retried_next_tick() {
    let table = ten_level_table();
    let gateway = Arc::new(ScriptedGateway::with(vec![Err(GatewayError::Unavailable(
        "down".into(),
    ))]));
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();

    let outcome = engine.on_tick().await;
    assert_eq!(
        outcome,
        ReconcileOutcome::GatewayFailed {
            reason: "Gateway unavailable: down".into()
        }
    );
    assert!(engine.active_orders().is_empty());

    engine.refresh();
    assert!(matches!(engine.on_tick().await, ReconcileOutcome::Redeployed { .. }));
    assert_eq!(gateway.calls.lock().len(), 2);
}

#[tokio::test]
async fn test_profitable_levels_vanish_clears() {
    let table = SharedTable::default();
    table.set(dec!(0.52), dec!(0.50), dec!(0.47));
    let gateway = paper();
    let mut engine = build_engine(&table, gateway.clone());
    engine.refresh();
    engine.on_tick().await;
    assert_eq!(engine.active_orders().len(), 2);
    assert_eq!(gateway.resting_orders().len(), 2);

    table.set(dec!(0.52), dec!(0.52), dec!(0.49));
    engine.refresh();
    assert_eq!(engine.on_tick().await, ReconcileOutcome::Cleared { removed: 2 });
    assert!(engine.active_orders().is_empty());
    assert!(gateway.resting_orders().is_empty());
    assert_eq!(gateway.cancel_calls(), 1);
}

#[tokio::test]
async fn test_failed_clear_keeps_orders_and_retries() {
    let table = SharedTable::default();
    table.set(dec!(0.52), dec!(0.50), dec!(0.47));
    let mut engine = build_engine(&table, Arc::new(ScriptedGateway::default()));
    engine.refresh();
    engine.on_tick().await;
    assert_eq!(engine.active_orders().len(), 2);

    table.set(dec!(0.52), dec!(1.01), dec!(0.49));
    engine.refresh();
    for _ in 0..2 {
        assert_eq!(
            engine.on_tick().await,
            ReconcileOutcome::GatewayFailed {
                reason: "Gateway unavailable: scripted".into()
            }
        );
        assert_eq!(engine.active_orders().len(), 2);
        assert!(!engine.is_busy());
    }
}

#[tokio::test]
async fn test_snapshot_source_drives_ladder() {
    let mut engine = LadderEngine::new(
        LadderBuilder::default(),
        Box::new(SnapshotLadderSource::new(dec!(500))),
        paper(),
        EngineControls::default(),
    );

    let partial = MarketSnapshot {
        yes_ask: Some(dec!(0.50)),
        ..Default::default()
    };
    assert!(engine.on_market_update(&partial).is_empty());

    let snapshot = MarketSnapshot {
        yes_bid: Some(dec!(0.48)),
        yes_ask: Some(dec!(0.50)),
        no_bid: Some(dec!(0.45)),
        no_ask: Some(dec!(0.47)),
        observed_at: Some(chrono::Utc::now()),
    };
    let ladder = engine.on_market_update(&snapshot);
    assert_eq!(ladder.reference_price(), dec!(0.49));
    assert_eq!(ladder.len(), 41);
    // Shifting both asks by the same offset keeps the pair cost.
    assert!(ladder.levels().iter().all(|l| l.edge.total_cost == dec!(0.97)));
    assert!(!engine.is_out_of_range());

    assert!(matches!(engine.on_tick().await, ReconcileOutcome::Redeployed { levels: 7, .. }));
}

#[tokio::test]
async fn test_synthetic_source_simulation_runs() {
    let mut engine = LadderEngine::new(
        LadderBuilder::default(),
        Box::new(SyntheticLadderSource::new(dec!(0.50), dec!(500), Some(3))),
        paper(),
        EngineControls::default(),
    );

    let mut deploys = 0;
    for _ in 0..50 {
        engine.refresh();
        if let ReconcileOutcome::Redeployed { count, levels } = engine.on_tick().await {
            assert_eq!(count, levels * 2);
            assert!(levels <= 7);
            deploys += 1;
        }
    }
    assert!(deploys > 0);
    let view = engine.view();
    assert!(view.committed() <= dec!(250));
}

#[tokio::test]
async fn test_still_synthetic_book_deploys_once() {
    let gateway = paper();
    let mut engine = LadderEngine::new(
        LadderBuilder::default(),
        Box::new(SyntheticLadderSource::new(dec!(0.50), dec!(500), Some(3)).with_walk_probability(0.0)),
        gateway.clone(),
        EngineControls::default(),
    );

    let mut redeployed = 0;
    let mut unchanged = 0;
    for _ in 0..50 {
        engine.refresh();
        match engine.on_tick().await {
            ReconcileOutcome::Redeployed { .. } => redeployed += 1,
            ReconcileOutcome::Unchanged => unchanged += 1,
            other => panic!("unexpected outcome {other}"),
        }
    }
    assert_eq!(redeployed, 1);
    assert_eq!(unchanged, 49);
    assert_eq!(gateway.deploys_submitted(), 1);
}
