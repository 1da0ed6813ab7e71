use std::net::SocketAddr;

pub mod adapters;
pub mod auth;
pub mod config;
pub mod ports;
pub mod store;
pub mod types;

mod app;
mod push;
mod state;
mod timer;

pub use app::app;
pub use push::{VapidCredentials, generate_vapid_credentials};
pub use timer::{PhaseCompletion, TimerState};

pub async fn serve(addr: SocketAddr, config: config::AppConfig) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app(config)).await.expect("server error");
}
