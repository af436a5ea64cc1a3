pub mod animation;
pub mod audio;
pub mod camera3d;
pub mod cli;
pub mod config;
pub mod control_panel;
pub mod deck;
pub mod ecs;
pub mod effects;
pub mod environment;
pub mod events;
pub mod headless;
pub mod input;
pub mod material_registry;
pub mod mesh;
pub mod particles;
pub mod time;
pub mod xr;

pub use deck::{Deck, FrameReport};
pub use headless::{run_scripted, run_with_overrides, HeadlessSummary};
