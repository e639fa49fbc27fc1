use pfp_rotator::config;
use pfp_rotator::rotator::{shutdown_channel, Pipeline, PollScheduler, SchedulerOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Slack profile picture rotator");

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    log::debug!("Loaded configuration: {:?}", config);

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            log::error!("Failed to set up clients: {}", e);
            std::process::exit(1);
        }
    };

    let (handle, signal) = shutdown_channel();

    // First Ctrl+C stops the loop, a second one kills the process
    if let Err(e) = ctrlc::set_handler(move || {
        if handle.is_triggered() {
            log::warn!("Received second Ctrl+C, exiting immediately");
            std::process::exit(130);
        }
        log::info!("Received Ctrl+C, stopping...");
        handle.trigger();
    }) {
        log::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let scheduler = PollScheduler::from_config(&config);
    log::info!(
        "Rotating the avatar of {} every {:?}",
        config.slack_user_id,
        config.interval
    );

    match scheduler.run(&pipeline, signal).await {
        Ok(SchedulerOutcome::Cancelled { cycles }) => {
            log::info!("Stopped on request after {} cycles", cycles);
        }
        Ok(SchedulerOutcome::CycleLimitReached { cycles }) => {
            log::info!("Finished {} cycles, exiting", cycles);
        }
        Err(failure) => {
            log::error!("{}", failure);
            std::process::exit(1);
        }
    }
}
