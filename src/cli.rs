use crate::config::{DeckConfigOverrides, RetriggerPolicy};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/deck.json";
pub const DEFAULT_FRAMES: u32 = 240;
pub const DEFAULT_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    frames: Option<u32>,
    dt: Option<f32>,
    policy: Option<RetriggerPolicy>,
    xr: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --config/--frames/--dt/--policy/--xr with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "frames" => {
                    overrides.frames =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid frame count '{value}'"))?);
                }
                "dt" => {
                    let dt = value.parse::<f32>().with_context(|| format!("Invalid dt '{value}'"))?;
                    if !dt.is_finite() || dt <= 0.0 {
                        bail!("Invalid dt '{value}'. Use a positive number of seconds.");
                    }
                    overrides.dt = Some(dt);
                }
                "policy" => {
                    let policy = RetriggerPolicy::parse(&value)
                        .ok_or_else(|| anyhow!("Invalid policy '{value}'. Use drop or restart."))?;
                    overrides.policy = Some(policy);
                }
                "xr" => overrides.xr = Some(parse_bool_flag("xr", &value)?),
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --frames, --dt, --policy, --xr."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn frames(&self) -> u32 {
        self.frames.unwrap_or(DEFAULT_FRAMES)
    }

    pub fn dt(&self) -> f32 {
        self.dt.unwrap_or(DEFAULT_DT)
    }

    /// Whether to run against the simulated XR runtime instead of the unavailable one.
    pub fn simulate_xr(&self) -> bool {
        self.xr.unwrap_or(false)
    }

    pub fn config_overrides(&self) -> DeckConfigOverrides {
        DeckConfigOverrides { retrigger_policy: self.policy, ..DeckConfigOverrides::default() }
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
