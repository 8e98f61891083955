use anyhow::Context;

use stockroom_app::{AppServices, Application};
use stockroom_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    stockroom_observability::init(&config.logging);

    let services = AppServices::build(config);
    let app = Application::bootstrap(services).context("failed to start event subscriptions")?;

    app.run_until(stockroom_app::shutdown_signal()).await
}
