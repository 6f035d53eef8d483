//! Scenario: failures stay inside the unit or operation that hit them.
//!
//! # Invariants under test
//!
//! 1. Latest-value errors and values that are not a 32-bit mask abandon the
//!    unit before any write.
//! 2. A failed close is counted; the remaining closes and creates go ahead.
//! 3. Failed existence checks and creates skip only their own bit.

use chrono::Duration;
use fw_reconcile::{
    reconcile_field, BitMap, EpisodeKey, FieldKind, FieldUnit, GatewayError, ReconcileError,
};
use fw_testkit::{at_min, bit, t0, MemoryFaultLog, ScriptedGateway};

const SITE: &str = "7797";
const FIELD: &str = "SEQ03.OLI.A.PC1";
const EQP: &str = "Variateur HC2";

fn map() -> BitMap {
    BitMap::from_pairs(&[
        (0, "PC00 - RIO no fault communication"),
        (1, "PC01 - Battery bank no fault communication"),
        (2, "PC02 - Preload fuses"),
        (3, "PC03 - Discordance DC line contactor"),
    ])
}

fn unit(bits: &BitMap) -> FieldUnit<'_> {
    FieldUnit {
        site_code: SITE,
        site_name: "Charleval",
        equipment: EQP,
        field_name: FIELD,
        kind: FieldKind::Pc,
        bits,
    }
}

fn key() -> EpisodeKey {
    EpisodeKey::new("Charleval", FIELD, EQP)
}

fn lookback() -> Duration {
    Duration::days(30)
}

#[tokio::test]
async fn latest_errors_abort_the_unit() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    store.seed_open(key(), bit(0), "PC00 - RIO no fault communication", at_min(-60));

    let err = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Gateway(GatewayError::NoData)));

    gw.set_latest_null(SITE, FIELD);
    let err = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Gateway(GatewayError::NullValue)));

    for bad in [-1.0, f64::NAN, 4_294_967_296.0] {
        gw.set_latest(SITE, FIELD, bad);
        let err = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::ValueOutOfRange(_)));
    }

    assert_eq!(store.open_count(), 1);
    assert_eq!(store.create_calls(), 0);
}

#[tokio::test]
async fn open_episode_read_failure_aborts_the_unit() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    gw.set_latest(SITE, FIELD, 1.0);
    store.fail_open_episodes_for_site("Charleval");

    let err = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Store(_)));
    assert!(store.episodes().is_empty());
}

#[tokio::test]
async fn failed_close_does_not_stop_the_cycle() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    let stuck = store.seed_open(key(), bit(0), "PC00 - RIO no fault communication", at_min(-60));
    let other = store.seed_open(key(), bit(1), "PC01 - Battery bank no fault communication", at_min(-60));
    store.fail_close(stuck);
    gw.set_latest(SITE, FIELD, 4.0);

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
        .await
        .unwrap();
    assert_eq!(out.closed, 1);
    assert_eq!(out.failed_ops, 1);
    assert_eq!(out.created, 1);
    assert!(store.episode(stuck).unwrap().is_open());
    assert_eq!(store.episode(other).unwrap().end, Some(t0()));
}

#[tokio::test]
async fn failed_bit_operations_skip_only_that_bit() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    store.fail_exists_for_bit(bit(1));
    store.fail_create_for_bit(bit(2));
    gw.set_latest(SITE, FIELD, 15.0);

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), lookback())
        .await
        .unwrap();
    assert_eq!(out.failed_ops, 2);
    assert_eq!(out.created, 2);

    let mut logged: Vec<_> = store.episodes().into_iter().map(|r| r.bit.get()).collect();
    logged.sort_unstable();
    assert_eq!(logged, vec![0, 3]);
}
