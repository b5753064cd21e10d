use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pameran::app::feed::LoadOutcome;
use pameran::app::screen::{GalleryScreen, ScreenSettings};
use pameran::app::session::Session;
use pameran::config::ClientConfig;
use pameran::domain::gallery::GalleryId;
use pameran::infra::api::{GalleryApi, HttpGalleryApi};
use pameran::infra::session_store::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;

    let session = Session::load(SessionStore::new(&config.session_path)).await?;
    let viewer = session.viewer_id();
    let api: Arc<dyn GalleryApi> = Arc::new(HttpGalleryApi::new(&config, session)?);

    let screen = match config.app_mode.as_str() {
        "feed" => GalleryScreen::new(api, viewer, ScreenSettings::grid(&config)),
        "detail" => {
            let id = config
                .gallery_id
                .ok_or_else(|| anyhow!("GALLERY_ID is required in detail mode"))?;
            let screen = GalleryScreen::new(api, viewer, ScreenSettings::detail(&config));
            screen.open_anchor(GalleryId(id)).await?;
            screen
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    };

    tokio::select! {
        result = drain_feed(&screen) => result?,
        _ = shutdown_signal() => {}
    }

    screen.close();
    Ok(())
}

/// Pages through the whole feed, logging every item.
async fn drain_feed(screen: &GalleryScreen) -> Result<()> {
    loop {
        match screen.load_next_page().await {
            LoadOutcome::Appended(count) => tracing::info!(count, "loaded page"),
            LoadOutcome::Skipped | LoadOutcome::Discarded => break,
            LoadOutcome::Failed => return Err(anyhow!("failed to load gallery page")),
        }
    }

    let items = screen.items().await;
    for item in &items {
        let like = screen.like_state(item.id).await;
        tracing::info!(
            gallery_id = %item.id,
            caption = item.caption.as_deref().unwrap_or(""),
            media = item.media.len(),
            likes = like.map_or(item.likes_count, |like| like.count),
            comments = item.comments.len(),
            "gallery"
        );
    }
    tracing::info!(total = items.len(), "feed exhausted");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
