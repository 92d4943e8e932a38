pub mod handlers;
pub mod quill;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, middleware::Logger, web};
use anyhow::{Context, Result};
use log::info;

use crate::quill::collection::{CollectionSource, ContentCollections};
use crate::quill::config::SiteConfig;
use crate::quill::feed::build_feed;

pub const FEED_FILE: &str = "rss.xml";

pub async fn run(config: SiteConfig) -> io::Result<()> {
    let server_cfg = config.server.clone();

    info!(
        "Quill is listening on: http://{}:{}",
        server_cfg.host, server_cfg.port
    );
    info!("Feed available at http://{}:{}/{FEED_FILE}", server_cfg.host, server_cfg.port);

    let source: Arc<dyn CollectionSource> =
        Arc::new(ContentCollections::new(config.content_root()));
    let source = web::Data::from(source);
    let config = web::Data::new(config);
    let cors_origins = server_cfg.cors_origins.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(source.clone())
            .wrap(build_cors(&cors_origins))
            .configure(handlers::config)
    })
    .bind((server_cfg.host.as_str(), server_cfg.port))?
    .run()
    .await
}

/// Render the feed once and write it to `<out_dir>/rss.xml`.
pub fn build(config: &SiteConfig, out_dir: Option<&Path>) -> Result<PathBuf> {
    let out_dir = out_dir.map(Path::to_path_buf).unwrap_or_else(|| config.out_dir());
    let source = ContentCollections::new(config.content_root());

    let xml = build_feed(config, &source)?;

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output dir at {}", out_dir.display()))?;
    let feed_path = out_dir.join(FEED_FILE);
    fs::write(&feed_path, xml)
        .with_context(|| format!("writing feed to {}", feed_path.display()))?;

    info!("rss feed written to {}", feed_path.display());
    Ok(feed_path)
}

fn build_cors(origins: &[String]) -> Cors {
    let base = Cors::default()
        .allowed_methods(vec!["GET"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_any_origin();
    }

    origins
        .iter()
        .fold(base, |c, origin| c.allowed_origin(origin))
}
