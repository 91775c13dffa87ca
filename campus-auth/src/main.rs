use campus_auth::config::{Args, DatabaseSecret};
use campus_auth::{Config, MySqlAccessorFactory, migrator, telemetry};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args)?;
    config.validate()?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry()?;
    tracing::debug!("{:?}", args);

    let secret = DatabaseSecret::load(&args)?;
    let factory = MySqlAccessorFactory::connect(&config.database, &secret).await?;

    migrator().run(factory.pool()).await?;
    tracing::info!(database = %config.database.name, "account schema is up to date");

    Ok(())
}
