use std::process;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use smarthome_dpi_core::config::{AppConfig, Cli};
use smarthome_dpi_core::queue::interaction::InteractionData;
use smarthome_dpi_core::queue::runtime::{self, QueueConfig};
use smarthome_dpi_core::utils::logger::init_logger;

#[cfg(feature = "example-policy")]
use smarthome_dpi_core::dns_cache::DnsCache;
#[cfg(feature = "example-policy")]
use smarthome_dpi_core::policy_example::DnsGatedPolicy;
#[cfg(feature = "example-policy")]
use smarthome_dpi_core::queue::runtime::PacketObservation;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logger("smarthome_dpi_core", cli.verbosity) {
        eprintln!("failed to initialize logger: {e}");
        process::exit(1);
    }

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config {:?}: {e}", cli.config);
            process::exit(1);
        }
    };

    if let Err(e) = runtime::preflight_bind(config.queue_id) {
        error!("queue preflight failed: {e}");
        process::exit(1);
    }

    info!("starting DPI core on queue {}", config.queue_id);

    let interaction = Arc::new(InteractionData::new(config.queue_id, 1, 2, config.default_timeout_secs));
    let queue_config = QueueConfig { queue_id: config.queue_id, ..QueueConfig::default() };

    #[cfg(feature = "example-policy")]
    {
        let dns_cache = Arc::new(DnsCache::new());
        let policy = Arc::new(DnsGatedPolicy::new("example.com", dns_cache));
        let callback = Arc::new(move |interaction: &InteractionData, payload: &[u8], obs: Option<&PacketObservation>| {
            policy.evaluate(interaction, payload, obs)
        });
        let handle = runtime::spawn_worker(queue_config, interaction, callback);
        handle.join().expect("queue worker panicked");
    }

    #[cfg(not(feature = "example-policy"))]
    {
        let _ = interaction;
        let _ = queue_config;
        error!("no policy wired: build with --features example-policy to run the demonstration harness");
        process::exit(1);
    }
}
