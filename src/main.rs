/// Blob Storage Service
///
/// Stores blobs in memory, on disk, in S3/Azure/GCS or on IPFS and serves
/// their metadata entries over HTTP.
use blob_storage_service::{config::ServerConfig, context::AppContext, error::BlobResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> BlobResult<()> {
    // Load configuration first so the log level can come from it
    let config = ServerConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    __    __      __
   / /_  / /___  / /_     _____/ /_____  ________
  / __ \/ / __ \/ __ \   / ___/ __/ __ \/ ___/ _ \
 / /_/ / / /_/ / /_/ /  (__  ) /_/ /_/ / /  /  __/
/_.___/_/\____/_.___/  /____/\__/\____/_/   \___/

        Blob Storage Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
