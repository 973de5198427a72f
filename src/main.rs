use clap::Parser;
use tracing::{error, info};

use user_sheet::app_system::setup_tracing;
use user_sheet::config::{Cli, Command, ServeConfig};
use user_sheet::store::sheet;

#[tokio::main]
async fn main() -> Result<(), String> {
    // Values already in the environment win over .env.
    dotenv::dotenv().ok();
    setup_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Init(args) => {
            sheet::init(&args.file, args.force).map_err(|e| {
                error!(error = %e, "Init failed");
                e.to_string()
            })?;
            info!(file = %args.file.display(), "Created empty user sheet");
        }
        Command::Serve(args) => {
            let config = ServeConfig::try_from(args).map_err(|e| e.to_string())?;
            user_sheet::http::serve(config).await.map_err(|e| {
                error!(error = %e, "Server failed");
                e.to_string()
            })?;
            info!("Application completed successfully");
        }
    }

    Ok(())
}
