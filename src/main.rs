use course_slot_scheduler::config::SchedulerConfig;
use course_slot_scheduler::server;
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::var("SCHEDULER_CONFIG") {
        Ok(path) => {
            info!("Loading configuration from {}", path);
            SchedulerConfig::load(path)?
        }
        Err(_) => SchedulerConfig::default(),
    };

    server::run_server(config).await?;
    Ok(())
}
