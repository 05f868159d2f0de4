use actix_web::{web, App, HttpServer};
use metacatalog::{Catalog, Config};

mod handlers;

/// Shared application state
pub struct AppState {
    pub catalog: Catalog,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();
    log::info!("Starting metadata catalog server");

    let config = Config::load(None).map_err(std::io::Error::other)?;
    let catalog = Catalog::open(&config).map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState { catalog });
    let host = config.server.host.clone();
    let port = config.server.port;

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
