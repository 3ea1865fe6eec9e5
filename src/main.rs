use anyhow::Context;
use readlog_app::App;
use readlog_kernel::{settings::Settings, InitCtx};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load readlog settings")?;
    readlog_telemetry::init(&settings.telemetry).context("failed to initialize telemetry")?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.path.display(),
        "readlog bootstrap starting"
    );

    let app = App::open(&settings).await?;
    let ctx = InitCtx {
        settings: &settings,
    };

    app.registry.init_modules(&ctx).await?;
    app.registry.start_modules(&ctx).await?;

    tracing::info!("readlog bootstrap complete");

    let served = readlog_http::start_server(&app.registry, &settings).await;

    app.registry.stop_modules().await?;
    app.db.close().await;
    served
}
