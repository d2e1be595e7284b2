use actix_web::HttpResponse;

/// Liveness only; broker reachability is checked once at startup.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
