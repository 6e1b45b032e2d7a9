use arb_ladder_core::ConfigLoader;
use arb_ladder_engine::{
    EngineControls, LadderBuilder, LadderEngine, PaperGateway, PaperGatewayConfig,
    ReconcileOutcome, SyntheticLadderSource,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn engine_from_toml(toml: &str) -> (LadderEngine, Arc<PaperGateway>) {
    let config = ConfigLoader::from_toml_str(toml).unwrap();
    let source = SyntheticLadderSource::new(dec!(0.50), config.ladder.default_depth, Some(42))
        .with_tick_size(config.ladder.tick_size);
    let gateway = Arc::new(PaperGateway::new(
        PaperGatewayConfig::from(&config.gateway).latency_ms(0),
    ));
    let engine = LadderEngine::new(
        LadderBuilder::from(&config.ladder),
        Box::new(source),
        gateway.clone(),
        EngineControls::from_settings(&config.engine, &config.ladder),
    );
    (engine, gateway)
}

#[tokio::test]
async fn test_config_drives_synthetic_session() {
    let (mut engine, gateway) = engine_from_toml(
        r#"
        [ladder]
        ticks_each_side = 10

        [engine]
        total_stake = "400"

        [gateway]
        latency_ms = 0
        seed = 5
        "#,
    );

    engine.refresh();
    assert_eq!(engine.ladder().len(), 21);

    let outcome = engine.on_tick().await;
    assert!(matches!(outcome, ReconcileOutcome::Redeployed { .. }));

    let committed: Decimal = engine.active_orders().iter().map(|o| o.notional()).sum();
    assert!(committed > Decimal::ZERO);
    assert!(committed <= dec!(400));
    assert_eq!(gateway.resting_orders().len(), engine.active_orders().len());

    assert_eq!(engine.on_tick().await, ReconcileOutcome::Unchanged);

    let resting = gateway.resting_orders().len();
    let cancelled = engine.cancel_all().await.unwrap();
    assert_eq!(cancelled as usize, resting);
    assert!(engine.active_orders().is_empty());
    assert!(gateway.resting_orders().is_empty());
}

#[tokio::test]
async fn test_paused_config_never_deploys() {
    let (mut engine, gateway) = engine_from_toml(
        r#"
        [engine]
        paused = true
        "#,
    );

    for _ in 0..5 {
        engine.refresh();
        let outcome = engine.on_tick().await;
        assert!(matches!(outcome, ReconcileOutcome::Skipped(_)));
    }
    assert_eq!(gateway.deploys_submitted(), 0);
}

#[tokio::test]
async fn test_unreachable_edge_threshold_clears() {
    let (mut engine, gateway) = engine_from_toml(
        r#"
        [engine]
        min_net_edge_pct = "50"
        "#,
    );

    engine.refresh();
    assert!(engine.ladder().profitable().next().is_none());
    assert!(matches!(engine.on_tick().await, ReconcileOutcome::Cleared { removed: 0 }));
    assert_eq!(gateway.deploys_submitted(), 0);
}
