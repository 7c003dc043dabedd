use log::{error, info};
use scheduler::{library::cattle::CattleCredentials, services};
use std::process::ExitCode;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> ExitCode {
    let options = services::Options::from_args();

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&options.log)
        .init();

    info!("scheduler {}", env!("CARGO_PKG_VERSION"));

    let credentials = match CattleCredentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Every termination cause is fatal, including clean worker exits
    services::supervisor(&options, credentials).run().await;

    ExitCode::FAILURE
}
