use vidsub_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = vidsub_api::setup::initialize_app(config.clone()).await?;
    vidsub_api::setup::server::start_server(&config, state, router).await?;

    Ok(())
}
