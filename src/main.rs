use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use skywatch::config::Config;
use skywatch::log_format::TargetFirstFormat;
use skywatch::supervisor::Supervisor;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .event_format(TargetFirstFormat)
        .init();

    let config = Config::load();

    let supervisor = match Supervisor::bootstrap(config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    if let Err(e) = supervisor.run().await {
        tracing::error!(error = %e, "pipeline exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
