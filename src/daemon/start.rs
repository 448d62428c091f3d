use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::commons::error::Error;
use crate::constants::{EPHCA_SERVER_APP, EPHCA_VERSION};
use crate::daemon::config::Config;
use crate::server::CaRegistry;
use crate::storage;
use super::http::server::HttpServer;

/// Starts the daemon and serves requests until the listener fails.
///
/// If given, `signal_running` is sent once the listener is bound and
/// requests will be accepted.
pub async fn start_ephca_daemon(
    config: Arc<Config>,
    signal_running: Option<oneshot::Sender<()>>,
) -> Result<(), Error> {
    let store = storage::open_store(config.storage_type, config.data_dir())?;
    info!(
        "{} {} using {} storage{}",
        EPHCA_SERVER_APP,
        EPHCA_VERSION,
        config.storage_type,
        match config.storage_type {
            storage::StorageType::Disk => format!(" under {}", config.data_dir().display()),
            storage::StorageType::Memory => String::new(),
        }
    );

    let registry = Arc::new(CaRegistry::new(store));
    let server = HttpServer::new(registry, &config);

    single_http_listener(server, config.socket_addr(), signal_running).await
}

/// Runs an HTTP listener on a single socket.
async fn single_http_listener(
    server: Arc<HttpServer>,
    addr: SocketAddr,
    signal_running: Option<oneshot::Sender<()>>,
) -> Result<(), Error> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| Error::custom(format!("Could not bind to {}: {}", addr, err)))?;

    info!("Listening on http://{}", addr);
    if let Some(tx) = signal_running {
        let _ = tx.send(());
    }

    loop {
        let stream = match listener.accept().await {
            Ok((stream, _addr)) => stream,
            Err(err) => {
                error!("Fatal error in HTTP server {}: {}", addr, err);
                return Err(Error::custom(format!("HTTP server {} stopped: {}", addr, err)));
            }
        };
        let server = server.clone();
        tokio::task::spawn(async move {
            let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(
                    TokioIo::new(stream),
                    service_fn(move |req| {
                        let server = server.clone();
                        async move { server.process_request(req).await }
                    }),
                )
                .await;
        });
    }
}
