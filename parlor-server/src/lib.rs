use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
};

use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod context;
mod errors;
mod logging;
mod rooms;
mod schemas;
mod topics;

pub use context::*;
pub use logging::init_logger;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9700;

pub type Router = axum::Router<ServerContext>;

/// Starts the parlor server
pub async fn run_server(context: ServerContext) {
    let port = env::var("PARLOR_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let root_router = axum::Router::new()
        .nest("/v1/topics", topics::router())
        .nest("/v1/rooms", rooms::router())
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Parlor listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .unwrap();
}
