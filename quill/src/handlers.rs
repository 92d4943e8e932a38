use actix_web::{HttpResponse, Responder, get, http::header, web};
use log::error;
use serde_json::json;

use crate::quill::collection::CollectionSource;
use crate::quill::feed::build_feed;
use crate::quill::SiteConfig;

pub fn config(conf: &mut web::ServiceConfig) {
    let api_scope = web::scope("/api").service(healthcheck_handler);

    conf.service(api_scope);
    conf.service(rss_handler);
}

#[get("/health")]
pub async fn healthcheck_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "pong" }))
}

#[get("/rss.xml")]
pub async fn rss_handler(
    config: web::Data<SiteConfig>,
    source: web::Data<dyn CollectionSource>,
) -> impl Responder {
    let rendered = web::block(move || build_feed(&config, source.get_ref())).await;

    match rendered {
        Ok(Ok(xml)) => HttpResponse::Ok()
            .insert_header((header::CONTENT_TYPE, "application/xml; charset=utf-8"))
            .body(xml),
        Ok(Err(err)) => {
            error!("failed to build rss feed: {err:#}");
            HttpResponse::InternalServerError().finish()
        }
        Err(err) => {
            error!("rss feed task failed: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
