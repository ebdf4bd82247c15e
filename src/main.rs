use clap::Parser;
use phai_lib::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; default to info for this crate only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("phai_lib=info,phai=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = phai_lib::run(cli).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
