use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use member_directory::config::CONFIG;
use member_directory::{db, web};
use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

const ALLOWED_FAILURES: u32 = 10;

static STARTED: AtomicBool = AtomicBool::new(false);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    // Fail on a bad config before anything binds
    Lazy::force(&CONFIG);
    run_daemon("server", serve, || STARTED.load(Ordering::SeqCst));
}

#[tokio::main]
async fn serve() -> anyhow::Result<()> {
    let store = db::init(&CONFIG)
        .await
        .context("Error setting up member store")?;
    let state = web::AppState::from_config(&CONFIG, store);
    let app = web::router(state, &CONFIG.assets_dir);

    let server = axum::Server::try_bind(&CONFIG.listen)
        .with_context(|| format!("Error binding {}", CONFIG.listen))?
        .serve(app.into_make_service());
    STARTED.store(true, Ordering::SeqCst);
    tracing::info!("member directory listening on {}", CONFIG.listen);
    server.await?;
    Ok(())
}

fn run_daemon(name: &'static str, f: impl Fn() -> anyhow::Result<()>, started: impl Fn() -> bool) {
    let mut fails = 0;
    loop {
        if let Err(e) = f() {
            if started() {
                if fails <= ALLOWED_FAILURES {
                    tracing::error!("{name} failed <restarting>: {e:#}");
                    fails += 1;
                } else {
                    tracing::error!(
                        "{name} failed more than {ALLOWED_FAILURES} times <exiting>: {e:#}"
                    );
                    std::process::exit(1);
                }
            } else {
                tracing::error!("{name} failed to start <exiting>: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
