use voip_lib::{logger, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let config = Config::from_env();
    voip_lib::run(config).await?;
    Ok(())
}
