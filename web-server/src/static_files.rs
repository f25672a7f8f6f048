// web-server/src/static_files.rs
use std::path::Path;

use actix_files::{Files, NamedFile};
use actix_web::http::header;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, Error, HttpRequest, HttpResponse, Result};
use common::{CacheConfig, StaticFilesConfig};

/// `Cache-Control` value for the hashed build assets
pub fn cache_control(cache: &CacheConfig) -> String {
    let mut value = format!("public, max-age={}", cache.max_age);
    if cache.immutable {
        value.push_str(", immutable");
    }
    if cache.must_revalidate {
        value.push_str(", must-revalidate");
    }
    value
}

/// SPA shell: every client-side route is answered with the index file
pub async fn spa_index(req: HttpRequest, config: web::Data<StaticFilesConfig>) -> Result<HttpResponse, Error> {
    // Unknown API paths must not fall through to the shell
    if req.path().starts_with("/api/") {
        return Ok(HttpResponse::NotFound().finish());
    }

    let index_path = Path::new(&config.path).join(&config.index);
    let file = NamedFile::open_async(index_path).await?;
    let mut res = file.into_response(&req);
    res.headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
    Ok(res)
}

/// Serve `/assets` from the build output and fall back to the shell for
/// anything else that no route claimed
pub fn configure(cfg: &mut web::ServiceConfig, config: &StaticFilesConfig) {
    let assets = Path::new(&config.path).join("assets");

    cfg.app_data(web::Data::new(config.clone()))
        .service(
            web::scope("/assets")
                .wrap(DefaultHeaders::new().add((header::CACHE_CONTROL, cache_control(&config.cache))))
                .service(Files::new("", assets).prefer_utf8(true).use_etag(true).use_last_modified(true)),
        )
        .default_service(web::route().to(spa_index));
}
