use kestrel_deck::cli::CliOverrides;
use kestrel_deck::config::DeckConfig;
use kestrel_deck::xr::XrStatus;
use kestrel_deck::{run_scripted, run_with_overrides};

const DT: f32 = 1.0 / 60.0;

#[test]
fn pointer_only_run_activates_and_settles() {
    let summary = run_scripted(DeckConfig::default(), 120, DT, false).expect("headless run");
    assert_eq!(summary.frames, 120);
    assert_eq!(summary.xr_status, Some(XrStatus::PointerOnly));
    assert!(summary.activations > 0);
    assert!(summary.started > 0);
    assert!(summary.reverted > 0);
    assert!(summary.in_flight_at_end <= summary.started);
}

#[test]
fn simulated_xr_adds_controller_activations() {
    let pointer = run_scripted(DeckConfig::default(), 120, DT, false).expect("pointer run");
    let immersive = run_scripted(DeckConfig::default(), 120, DT, true).expect("xr run");
    assert_eq!(immersive.xr_status, Some(XrStatus::Immersive));
    assert!(immersive.activations >= pointer.activations);
}

#[test]
fn cli_overrides_drive_the_run() {
    let cli = CliOverrides::parse(["deck", "--config", "does/not/exist.json", "--frames", "30", "--policy", "restart"])
        .expect("parse cli");
    let summary = run_with_overrides(&cli).expect("headless run");
    assert_eq!(summary.frames, 30);
    assert!(summary.activations > 0);
}

#[test]
fn zero_frames_is_a_no_op() {
    let summary = run_scripted(DeckConfig::default(), 0, DT, false).expect("headless run");
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.activations, 0);
    assert_eq!(summary.in_flight_at_end, 0);
}
