use pollhttpd::access_log::AccessLog;
use pollhttpd::config::Config;
use pollhttpd::server::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let access_log = match &cfg.access_log {
        Some(path) => AccessLog::open(path)?,
        None => AccessLog::disabled(),
    };

    let server = Server::bind(&cfg.server, access_log)?;
    let shutdown = server.shutdown_handle();
    let mut event_loop = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        res = &mut event_loop => {
            res??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.shutdown()?;
            event_loop.await??;
        }
    }

    Ok(())
}
