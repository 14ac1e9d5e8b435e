use anyhow::Result;
use huaweicloud::HuaweiCloudProvider;
use tf_provider::serve;
use tracing::level_filters::LevelFilter;

/// Log to stderr when the plugin host does not redirect logs to a file
fn init_logging() {
    if std::env::var_os("PLUGIN_LOG_FILE").is_some() {
        return;
    }
    let level = std::env::var("HUAWEICLOUD_LOG")
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::WARN);
    _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let provider = HuaweiCloudProvider::default();
    let cancel = provider.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling pending operations");
            cancel.cancel();
        }
    });

    serve("huaweicloud", provider).await
}
