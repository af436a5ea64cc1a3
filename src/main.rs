use kestrel_deck::cli::CliOverrides;
use kestrel_deck::run_with_overrides;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();

    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    match run_with_overrides(&cli) {
        Ok(summary) => tracing::info!(
            target: "headless",
            "{} frames ({:.2}s, xr={}): {} activations, {} started, {} restarted, {} dropped, {} reverted, {} cleared",
            summary.frames,
            summary.elapsed,
            summary.xr_status.map_or("n/a", |status| status.label()),
            summary.activations,
            summary.started,
            summary.restarted,
            summary.dropped,
            summary.reverted,
            summary.cleared
        ),
        Err(err) => {
            tracing::error!("Deck error: {err:?}");
            std::process::exit(1);
        }
    }
}
