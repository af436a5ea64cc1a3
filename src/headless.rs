use crate::cli::CliOverrides;
use crate::config::DeckConfig;
use crate::deck::{Deck, FrameReport};
use crate::ecs::{EntityId, Ray};
use crate::effects::EffectOutcome;
use crate::events::ControllerId;
use crate::xr::{NoXrRuntime, SimulatedXrRuntime, XrEvent, XrRuntime, XrStatus};
use anyhow::{Context, Result};
use glam::Vec3;

/// Frames between scripted activations.
const PICK_INTERVAL: u32 = 15;
const CONTROLLER: ControllerId = ControllerId(0);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessSummary {
    pub frames: u32,
    pub elapsed: f64,
    pub xr_status: Option<XrStatus>,
    pub activations: usize,
    pub started: usize,
    pub restarted: usize,
    pub dropped: usize,
    pub reverted: usize,
    pub cleared: usize,
    pub in_flight_at_end: usize,
}

impl HeadlessSummary {
    fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.elapsed = report.now;
        self.activations += report.activations.len();
        for (_, outcome) in &report.outcomes {
            match outcome {
                EffectOutcome::Started => self.started += 1,
                EffectOutcome::Restarted => self.restarted += 1,
                EffectOutcome::Dropped => self.dropped += 1,
                EffectOutcome::Cancelled => {}
            }
        }
        self.reverted += report.reverted.len();
        self.cleared += report.cleared.len();
    }
}

/// Loads config, applies CLI overrides and runs the scripted deck.
pub fn run_with_overrides(cli: &CliOverrides) -> Result<HeadlessSummary> {
    let mut config = DeckConfig::load_or_default(cli.config_path());
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        tracing::info!(target: "headless", "CLI overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }
    run_scripted(config, cli.frames(), cli.dt(), cli.simulate_xr())
}

/// Builds the demo deck and activates each interactive entity in turn, by pointer and (when
/// `simulate_xr` is set) by a simulated controller.
pub fn run_scripted(config: DeckConfig, frames: u32, dt: f32, simulate_xr: bool) -> Result<HeadlessSummary> {
    let mut deck = Deck::with_default_backends(config);
    let targets = deck.build_environment().context("Failed to build deck environment")?.interactive();
    tracing::info!(
        target: "headless",
        "running {frames} frames at dt={dt:.4}, policy={}",
        deck.config().retrigger_policy.label()
    );
    if simulate_xr {
        let mut runtime = SimulatedXrRuntime::supported();
        runtime.push_frame(vec![XrEvent::ControllerConnected(CONTROLLER)]);
        drive(&mut deck, &mut runtime, &targets, frames, dt, Some(SimulatedXrRuntime::push_frame))
    } else {
        drive(&mut deck, &mut NoXrRuntime, &targets, frames, dt, None)
    }
}

fn drive<R: XrRuntime>(
    deck: &mut Deck,
    runtime: &mut R,
    targets: &[EntityId],
    frames: u32,
    dt: f32,
    inject: Option<fn(&mut R, Vec<XrEvent>)>,
) -> Result<HeadlessSummary> {
    let mut summary = HeadlessSummary { xr_status: Some(deck.initialize_blocking(runtime)), ..Default::default() };
    let mut controller_script = Vec::new();
    for frame in 0..frames {
        if !targets.is_empty() && frame % PICK_INTERVAL == 0 {
            let target = targets[(frame / PICK_INTERVAL) as usize % targets.len()];
            match deck.screen_position(target) {
                Some(screen) => deck.queue_pick(screen),
                None => tracing::debug!(target: "headless", "{target} is off screen"),
            }
            if inject.is_some() {
                controller_script = controller_events(deck, target);
            }
        }
        let report = deck.frame(dt, runtime);
        summary.record(&report);
        // Scripted controller input lands in the runtime's next frame.
        if let Some(inject) = inject {
            if !controller_script.is_empty() {
                inject(runtime, std::mem::take(&mut controller_script));
            }
        }
    }
    summary.in_flight_at_end = deck.effects().in_flight_count();
    if let Some(last) = deck.effects().audio().recent_triggers().last() {
        tracing::debug!(target: "headless", "last audio trigger: {last}");
    }
    Ok(summary)
}

fn controller_events(deck: &Deck, target: EntityId) -> Vec<XrEvent> {
    let origin = Vec3::new(0.3, 1.3, 1.0);
    let Ok(aim) = deck.registry().world_position(target) else {
        return Vec::new();
    };
    let Some(ray) = Ray::new(origin, aim - origin) else {
        return Vec::new();
    };
    vec![
        XrEvent::Pose { id: CONTROLLER, ray },
        XrEvent::Trigger { id: CONTROLLER, pressed: true },
        XrEvent::Trigger { id: CONTROLLER, pressed: false },
    ]
}
