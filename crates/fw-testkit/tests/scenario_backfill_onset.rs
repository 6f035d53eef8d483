//! Scenario: start time of a newly opened episode.
//!
//! # Invariants under test
//!
//! 1. The start is the most recent 0->1 transition within the lookback.
//! 2. No transition in history: the start is the processing time.
//! 3. History unavailable: the bit is skipped this cycle and recovered on
//!    the next one.
//! 4. A failed history read is not retried for the other new bits of the
//!    same unit within the cycle.

use chrono::Duration;
use fw_reconcile::{reconcile_field, BitMap, EpisodeKey, FieldKind, FieldUnit};
use fw_testkit::{at_min, bit, history, t0, MemoryFaultLog, ScriptedGateway};

const SITE: &str = "7796";
const FIELD: &str = "SEQ12.OLI.A.PC1";
const EQP: &str = "PDC1";

fn map() -> BitMap {
    BitMap::from_pairs(&[(9, "PC09 : Over voltage"), (13, "PC13 : EVI Emergency stop")])
}

fn unit(bits: &BitMap) -> FieldUnit<'_> {
    FieldUnit {
        site_code: SITE,
        site_name: "Meru",
        equipment: EQP,
        field_name: FIELD,
        kind: FieldKind::Pc,
        bits,
    }
}

fn key() -> EpisodeKey {
    EpisodeKey::new("Meru", FIELD, EQP)
}

const B9: f64 = 512.0;

#[tokio::test]
async fn latest_rising_edge_is_the_start() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    gw.set_latest(SITE, FIELD, B9);
    // on at t-300, off at t-200, on again at t-100
    gw.set_history(
        SITE,
        FIELD,
        history(&[(-400, 0.0), (-300, B9), (-200, 0.0), (-100, B9), (-50, B9)]),
    );

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(out.backfilled, 1);

    let rows = store.episodes_for(&key());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start, at_min(-100));
}

#[tokio::test]
async fn samples_outside_lookback_are_not_considered() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    gw.set_latest(SITE, FIELD, B9);
    gw.set_history(SITE, FIELD, history(&[(-180, 0.0), (-150, B9)]));

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), Duration::minutes(60))
        .await
        .unwrap();
    assert_eq!(out.fallback_now, 1);
    assert_eq!(store.episodes_for(&key())[0].start, t0());
}

#[tokio::test]
async fn no_edge_falls_back_to_now() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    gw.set_latest(SITE, FIELD, B9);
    gw.set_history(SITE, FIELD, history(&[(-60, 0.0), (-30, 0.0)]));

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(out.created, 1);
    assert_eq!(out.fallback_now, 1);
    assert_eq!(out.backfilled, 0);
    assert_eq!(store.episodes_for(&key())[0].start, t0());
}

#[tokio::test]
async fn history_failure_defers_creation() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    gw.set_latest(SITE, FIELD, B9);
    gw.fail_history(SITE, FIELD, "timeout");

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(out.created, 0);
    assert_eq!(out.failed_ops, 1);
    assert!(store.episodes().is_empty());

    gw.set_history(SITE, FIELD, history(&[(-90, 0.0), (-45, B9)]));
    let out = reconcile_field(&gw, &store, &unit(&bits), at_min(5), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(out.backfilled, 1);
    assert_eq!(store.episodes_for(&key())[0].start, at_min(-45));
    assert_eq!(store.episodes_for(&key())[0].bit, bit(9));
}

#[tokio::test]
async fn failed_history_is_read_once_per_cycle() {
    let bits = map();
    let gw = ScriptedGateway::new();
    let store = MemoryFaultLog::new();
    // bits 9 and 13, both described, both new
    gw.set_latest(SITE, FIELD, B9 + 8192.0);
    gw.fail_history(SITE, FIELD, "timeout");

    let out = reconcile_field(&gw, &store, &unit(&bits), t0(), Duration::days(30))
        .await
        .unwrap();
    assert_eq!(gw.history_calls(), 1);
    assert_eq!(out.failed_ops, 1);
    assert_eq!(out.created, 0);
    assert!(store.episodes().is_empty());
}
