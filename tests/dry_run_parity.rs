//! A dry run must rehearse exactly what a measure run does, minus contact and
//! result output.

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;
use wafer_probe::config::{ProbeConfig, RunMode, TimingConfig};
use wafer_probe::instrument::mock::{CallKind, InstrumentCall, MockInstruments};
use wafer_probe::timing::{NoDelay, TrackingDelay};
use wafer_probe::Session;

const MIXED: &str = "\
x,y,material,structure,block
0,0,Pt,LW300,1
250,0,Ag,LW600,1
500,0,Ag_Cl,GC20_SC300,2
750,-100,Pt,CROSSBRIDGE,2
";

fn config(dir: &tempfile::TempDir, mode: RunMode) -> ProbeConfig {
    let coordinates = dir.path().join("coordinates.csv");
    fs::write(&coordinates, MIXED).unwrap();

    let mut config = ProbeConfig::default();
    config.run.mode = mode;
    config.run.wafer = Some(1);
    config.run.die = Some(1);
    config.run.coordinates = coordinates;
    config.run.output = Some(dir.path().join(format!("{:?}.csv", mode)));
    config
}

async fn run(mode: RunMode) -> (MockInstruments, bool) {
    let dir = tempdir().unwrap();
    let config = config(&dir, mode);
    let output = config.run.output.clone().unwrap();
    let mock = MockInstruments::new();

    Session::new(config)
        .with_instruments(mock.instruments())
        .with_delay(Arc::new(NoDelay))
        .run()
        .await
        .unwrap();

    (mock, output.exists())
}

fn without_contact(calls: Vec<InstrumentCall>) -> Vec<InstrumentCall> {
    calls
        .into_iter()
        .filter(|call| call.kind() != CallKind::Contact)
        .collect()
}

#[tokio::test]
async fn dry_run_matches_measure_run_except_contact() {
    let (dry, dry_output) = run(RunMode::Dry).await;
    let (measure, measure_output) = run(RunMode::Measure).await;

    assert_eq!(dry.count(CallKind::Contact), 0);
    assert_eq!(measure.count(CallKind::Contact), 4);
    for kind in [
        CallKind::Translate,
        CallKind::Clear,
        CallKind::Connect,
        CallKind::ForceCurrent,
        CallKind::ReadVoltage,
        CallKind::Separate,
    ] {
        assert_eq!(dry.count(kind), measure.count(kind), "{:?}", kind);
    }
    assert_eq!(dry.calls(), without_contact(measure.calls()));

    assert!(!dry_output);
    assert!(measure_output);
}

#[tokio::test]
async fn recipe_lengths_drive_sample_count() {
    let (dry, _) = run(RunMode::Dry).await;
    // LW300 2 + LW600 2 + GC20_SC300 6 + CROSSBRIDGE 6
    assert_eq!(dry.count(CallKind::ReadVoltage), 16);
    assert_eq!(dry.count(CallKind::Connect), 64);
}

#[tokio::test]
async fn crossbridge_uses_milliamp_currents() {
    let (dry, _) = run(RunMode::Dry).await;
    let currents: Vec<f64> = dry
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            InstrumentCall::ForceCurrent(current) => Some(current.amps()),
            _ => None,
        })
        .collect();
    assert_eq!(&currents[10..14], &[100e-3, 100e-3, 100e-3, 100e-3]);
    assert_eq!(&currents[14..], &[30e-3, 30e-3]);
}

#[tokio::test]
async fn production_waits_are_requested() {
    let dir = tempdir().unwrap();
    let mut config = config(&dir, RunMode::Dry);
    config.timing = TimingConfig::default();
    let mock = MockInstruments::new();
    let delay = TrackingDelay::new();

    Session::new(config)
        .with_instruments(mock.instruments())
        .with_delay(Arc::new(delay.clone()))
        .run()
        .await
        .unwrap();

    // 4 x (2500 + 500) settle + 16 x 200 sampling, no grace period in dry mode
    assert_eq!(delay.total().as_millis(), 4 * 3000 + 16 * 200);
}
