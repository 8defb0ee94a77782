use calendar_mcp::{config::Config, launcher, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    logging::init_logging(config.debug);

    launcher::launch(config).await?;
    Ok(())
}
