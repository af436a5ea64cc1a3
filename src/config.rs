use anyhow::{Context, Result};
use glam::{Vec3, Vec4};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// What happens when an entity is activated again while its feedback or effect is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// The second activation is ignored until the entity returns to idle.
    #[default]
    Drop,
    /// The live effect is repositioned and restarted; feedback keeps its original snapshot.
    Restart,
}

impl RetriggerPolicy {
    pub fn label(self) -> &'static str {
        match self {
            RetriggerPolicy::Drop => "drop",
            RetriggerPolicy::Restart => "restart",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "drop" | "ignore" => Some(Self::Drop),
            "restart" | "replace" => Some(Self::Restart),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaletteConfig {
    #[serde(default = "PaletteConfig::default_metal")]
    pub metal: [f32; 4],
    #[serde(default = "PaletteConfig::default_accent")]
    pub accent: [f32; 4],
    #[serde(default = "PaletteConfig::default_panel")]
    pub panel: [f32; 4],
    #[serde(default = "PaletteConfig::default_button")]
    pub button: [f32; 4],
    #[serde(default = "PaletteConfig::default_radar")]
    pub radar: [f32; 4],
    #[serde(default = "PaletteConfig::default_ground")]
    pub ground: [f32; 4],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonGridConfig {
    /// Button centers in panel-local XY space.
    #[serde(default = "ButtonGridConfig::default_positions")]
    pub positions: Vec<[f32; 2]>,
    #[serde(default = "ButtonGridConfig::default_button_size")]
    pub button_size: [f32; 3],
    /// How far a button travels into the panel while pressed.
    #[serde(default = "ButtonGridConfig::default_press_depth")]
    pub press_depth: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    /// Period of the looping mechanical clips, in seconds.
    #[serde(default = "AnimationConfig::default_clip_duration")]
    pub clip_duration: f32,
    /// How long transient feedback stays applied before it reverts.
    #[serde(default = "AnimationConfig::default_feedback_duration")]
    pub feedback_duration: f64,
    /// Scale multiplier added on top of 1.0 for the mechanical pulse.
    #[serde(default = "AnimationConfig::default_pulse_scale")]
    pub pulse_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticleConfig {
    #[serde(default = "ParticleConfig::default_rate")]
    pub rate: f32,
    #[serde(default = "ParticleConfig::default_lifetime_min")]
    pub lifetime_min: f32,
    #[serde(default = "ParticleConfig::default_lifetime_max")]
    pub lifetime_max: f32,
    #[serde(default = "ParticleConfig::default_size_min")]
    pub size_min: f32,
    #[serde(default = "ParticleConfig::default_size_max")]
    pub size_max: f32,
    #[serde(default = "ParticleConfig::default_speed")]
    pub speed: f32,
    #[serde(default = "ParticleConfig::default_color_start")]
    pub color_start: [f32; 4],
    #[serde(default = "ParticleConfig::default_color_end")]
    pub color_end: [f32; 4],
    #[serde(default = "ParticleConfig::default_max_spawn_per_frame")]
    pub max_spawn_per_frame: u32,
    #[serde(default = "ParticleConfig::default_max_total")]
    pub max_total: u32,
    #[serde(default = "ParticleConfig::default_max_emitter_backlog")]
    pub max_emitter_backlog: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// A disabled audio layer still hands out handles; effects then clear through `effect_timeout`.
    #[serde(default = "AudioConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "AudioConfig::default_ring_capacity")]
    pub ring_capacity: usize,
    /// Length assumed for every cue when the audio layer reports completion itself.
    #[serde(default = "AudioConfig::default_cue_duration")]
    pub cue_duration: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_position")]
    pub position: [f32; 3],
    #[serde(default = "CameraConfig::default_target")]
    pub target: [f32; 3],
    #[serde(default = "CameraConfig::default_fov_y_degrees")]
    pub fov_y_degrees: f32,
    #[serde(default = "CameraConfig::default_near")]
    pub near: f32,
    #[serde(default = "CameraConfig::default_far")]
    pub far: f32,
    #[serde(default = "CameraConfig::default_viewport")]
    pub viewport: [u32; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeckConfig {
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub button_grid: ButtonGridConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub particles: ParticleConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    /// Upper bound on how long an effect counts as in flight without a completion signal.
    #[serde(default = "DeckConfig::default_effect_timeout")]
    pub effect_timeout: f64,
    #[serde(default)]
    pub retrigger_policy: RetriggerPolicy,
}

#[derive(Debug, Clone, Default)]
pub struct DeckConfigOverrides {
    pub retrigger_policy: Option<RetriggerPolicy>,
    pub feedback_duration: Option<f64>,
    pub effect_timeout: Option<f64>,
}

impl PaletteConfig {
    const fn default_metal() -> [f32; 4] {
        [0.62, 0.64, 0.68, 1.0]
    }
    const fn default_accent() -> [f32; 4] {
        [0.95, 0.55, 0.12, 1.0]
    }
    const fn default_panel() -> [f32; 4] {
        [0.16, 0.18, 0.22, 1.0]
    }
    const fn default_button() -> [f32; 4] {
        [0.85, 0.12, 0.10, 1.0]
    }
    const fn default_radar() -> [f32; 4] {
        [0.10, 0.85, 0.35, 1.0]
    }
    const fn default_ground() -> [f32; 4] {
        [0.30, 0.30, 0.32, 1.0]
    }

    pub fn color(&self, slot: PaletteSlot) -> Vec4 {
        let raw = match slot {
            PaletteSlot::Metal => self.metal,
            PaletteSlot::Accent => self.accent,
            PaletteSlot::Panel => self.panel,
            PaletteSlot::Button => self.button,
            PaletteSlot::Radar => self.radar,
            PaletteSlot::Ground => self.ground,
        };
        Vec4::from_array(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteSlot {
    Metal,
    Accent,
    Panel,
    Button,
    Radar,
    Ground,
}

impl PaletteSlot {
    pub fn label(self) -> &'static str {
        match self {
            PaletteSlot::Metal => "palette::metal",
            PaletteSlot::Accent => "palette::accent",
            PaletteSlot::Panel => "palette::panel",
            PaletteSlot::Button => "palette::button",
            PaletteSlot::Radar => "palette::radar",
            PaletteSlot::Ground => "palette::ground",
        }
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            metal: Self::default_metal(),
            accent: Self::default_accent(),
            panel: Self::default_panel(),
            button: Self::default_button(),
            radar: Self::default_radar(),
            ground: Self::default_ground(),
        }
    }
}

impl ButtonGridConfig {
    fn default_positions() -> Vec<[f32; 2]> {
        let mut positions = Vec::with_capacity(6);
        for row in 0..2 {
            for col in 0..3 {
                positions.push([-0.3 + col as f32 * 0.3, 0.1 - row as f32 * 0.2]);
            }
        }
        positions
    }
    const fn default_button_size() -> [f32; 3] {
        [0.16, 0.12, 0.06]
    }
    const fn default_press_depth() -> f32 {
        0.03
    }
}

impl Default for ButtonGridConfig {
    fn default() -> Self {
        Self {
            positions: Self::default_positions(),
            button_size: Self::default_button_size(),
            press_depth: Self::default_press_depth(),
        }
    }
}

impl AnimationConfig {
    const fn default_clip_duration() -> f32 {
        4.0
    }
    const fn default_feedback_duration() -> f64 {
        0.2
    }
    const fn default_pulse_scale() -> f32 {
        0.15
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            clip_duration: Self::default_clip_duration(),
            feedback_duration: Self::default_feedback_duration(),
            pulse_scale: Self::default_pulse_scale(),
        }
    }
}

impl ParticleConfig {
    const fn default_rate() -> f32 {
        120.0
    }
    const fn default_lifetime_min() -> f32 {
        0.3
    }
    const fn default_lifetime_max() -> f32 {
        1.2
    }
    const fn default_size_min() -> f32 {
        0.02
    }
    const fn default_size_max() -> f32 {
        0.08
    }
    const fn default_speed() -> f32 {
        1.5
    }
    const fn default_color_start() -> [f32; 4] {
        [1.0, 0.85, 0.3, 1.0]
    }
    const fn default_color_end() -> [f32; 4] {
        [0.9, 0.2, 0.05, 0.0]
    }
    const fn default_max_spawn_per_frame() -> u32 {
        256
    }
    const fn default_max_total() -> u32 {
        2_000
    }
    const fn default_max_emitter_backlog() -> f32 {
        64.0
    }

    pub fn lifetime_range(&self) -> (f32, f32) {
        ordered_range(self.lifetime_min, self.lifetime_max, 0.01)
    }

    pub fn size_range(&self) -> (f32, f32) {
        ordered_range(self.size_min, self.size_max, 0.001)
    }
}

fn ordered_range(a: f32, b: f32, floor: f32) -> (f32, f32) {
    let lo = a.min(b).max(floor);
    let hi = a.max(b).max(lo);
    (lo, hi)
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            rate: Self::default_rate(),
            lifetime_min: Self::default_lifetime_min(),
            lifetime_max: Self::default_lifetime_max(),
            size_min: Self::default_size_min(),
            size_max: Self::default_size_max(),
            speed: Self::default_speed(),
            color_start: Self::default_color_start(),
            color_end: Self::default_color_end(),
            max_spawn_per_frame: Self::default_max_spawn_per_frame(),
            max_total: Self::default_max_total(),
            max_emitter_backlog: Self::default_max_emitter_backlog(),
        }
    }
}

impl AudioConfig {
    const fn default_enabled() -> bool {
        true
    }
    const fn default_ring_capacity() -> usize {
        32
    }
    const fn default_cue_duration() -> f32 {
        0.8
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            ring_capacity: Self::default_ring_capacity(),
            cue_duration: Self::default_cue_duration(),
        }
    }
}

impl CameraConfig {
    const fn default_position() -> [f32; 3] {
        [0.0, 1.6, 4.0]
    }
    const fn default_target() -> [f32; 3] {
        [0.0, 1.0, 0.0]
    }
    const fn default_fov_y_degrees() -> f32 {
        60.0
    }
    const fn default_near() -> f32 {
        0.05
    }
    const fn default_far() -> f32 {
        200.0
    }
    const fn default_viewport() -> [u32; 2] {
        [1280, 720]
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Self::default_position(),
            target: Self::default_target(),
            fov_y_degrees: Self::default_fov_y_degrees(),
            near: Self::default_near(),
            far: Self::default_far(),
            viewport: Self::default_viewport(),
        }
    }
}

impl DeckConfig {
    const fn default_effect_timeout() -> f64 {
        1.5
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(target: "config", "config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &DeckConfigOverrides) {
        if let Some(policy) = overrides.retrigger_policy {
            self.retrigger_policy = policy;
        }
        if let Some(duration) = overrides.feedback_duration {
            self.animation.feedback_duration = duration.max(0.0);
        }
        if let Some(timeout) = overrides.effect_timeout {
            self.effect_timeout = timeout.max(0.0);
        }
    }
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            palette: PaletteConfig::default(),
            button_grid: ButtonGridConfig::default(),
            animation: AnimationConfig::default(),
            particles: ParticleConfig::default(),
            audio: AudioConfig::default(),
            camera: CameraConfig::default(),
            effect_timeout: Self::default_effect_timeout(),
            retrigger_policy: RetriggerPolicy::default(),
        }
    }
}

impl DeckConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.retrigger_policy.is_none() && self.feedback_duration.is_none() && self.effect_timeout.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.retrigger_policy.is_some() {
            fields.push("retrigger_policy");
        }
        if self.feedback_duration.is_some() {
            fields.push("feedback_duration");
        }
        if self.effect_timeout.is_some() {
            fields.push("effect_timeout");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: DeckConfig = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(cfg.retrigger_policy, RetriggerPolicy::Drop);
        assert_eq!(cfg.button_grid.positions.len(), 6);
        assert_eq!(cfg.animation.feedback_duration, 0.2);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let cfg: DeckConfig = serde_json::from_str(
            r#"{"particles":{"rate":10.0},"retrigger_policy":"restart","animation":{"clip_duration":100.0}}"#,
        )
        .expect("parse partial config");
        assert_eq!(cfg.retrigger_policy, RetriggerPolicy::Restart);
        assert!((cfg.particles.rate - 10.0).abs() < f32::EPSILON);
        assert_eq!(cfg.particles.max_total, 2_000);
        assert!((cfg.animation.clip_duration - 100.0).abs() < f32::EPSILON);
        assert!((cfg.animation.pulse_scale - 0.15).abs() < f32::EPSILON);
    }

    #[test]
    fn inverted_ranges_are_reordered() {
        let cfg = ParticleConfig { lifetime_min: 2.0, lifetime_max: 0.5, ..ParticleConfig::default() };
        assert_eq!(cfg.lifetime_range(), (0.5, 2.0));
    }

    #[test]
    fn overrides_apply_and_report_fields() {
        let mut cfg = DeckConfig::default();
        let overrides = DeckConfigOverrides {
            retrigger_policy: Some(RetriggerPolicy::Restart),
            feedback_duration: None,
            effect_timeout: Some(-3.0),
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.retrigger_policy, RetriggerPolicy::Restart);
        assert_eq!(cfg.effect_timeout, 0.0);
        assert_eq!(overrides.applied_fields(), vec!["retrigger_policy", "effect_timeout"]);
    }
}
