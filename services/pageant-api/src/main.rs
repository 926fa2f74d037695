use pageant_api::config::Config;
use pageant_core::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_with(config.log_format);
    config.log_summary();

    pageant_api::serve(config).await
}
