use bytes::Bytes;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::codec::{self, LineCodec, DEFAULT_MAX_LINE_LENGTH};
use crate::config::{Backend, Config};
use crate::connection::Connection;
use crate::frame::{self, Frame};
use crate::store::{MemoryStore, PgStore, RecordStore};
use crate::Error;

/// Prepares the store, binds the listener and serves clients until Ctrl-C is received.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let store = open_store(&config).await?;

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let server = Server::new(listener, store).max_line_length(config.max_line_length);

    info!("Server listening on {}", server.local_addr()?);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    server.run(shutdown).await;

    info!("Server stopped");
    Ok(())
}

/// Cancels `shutdown` once `signal` fires. If the signal can't be listened for, the server
/// keeps running and has to be stopped some other way.
async fn cancel_on_signal(
    signal: impl Future<Output = io::Result<()>>,
    shutdown: CancellationToken,
) {
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, Error> {
    match config.backend()? {
        Backend::Memory => {
            info!(items = config.seed_items, "Using in-memory store");
            Ok(Arc::new(MemoryStore::seeded(config.seed_items)))
        }
        Backend::Postgres(options) => {
            let store = PgStore::connect(options, config.db_max_connections).await?;
            store.init_schema().await?;
            store.seed(config.seed_items).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Accepts connections and runs one session task per client.
pub struct Server {
    listener: TcpListener,
    store: Arc<dyn RecordStore>,
    max_line_length: usize,
}

impl Server {
    pub fn new(listener: TcpListener, store: Arc<dyn RecordStore>) -> Server {
        Server {
            listener,
            store,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    pub fn max_line_length(mut self, max_line_length: usize) -> Server {
        self.max_line_length = max_line_length;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until `shutdown` is cancelled, then waits for every session to
    /// finish. Sessions stop at their next read once shutdown begins.
    pub async fn run(self, shutdown: CancellationToken) {
        let sessions = TaskTracker::new();

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (socket, client_address) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            info!("Accepted connection from {:?}", client_address);

            let store = self.store.clone();
            let shutdown = shutdown.clone();
            let codec = LineCodec::with_max_length(self.max_line_length);

            sessions.spawn(async move {
                if let Err(e) =
                    handle_connection(socket, client_address, store, codec, shutdown).await
                {
                    error!(client_address = %client_address, error = %e, "Connection failed");
                }
            });
        }

        drop(self.listener);
        sessions.close();
        info!(sessions = sessions.len(), "Waiting for open sessions to finish");
        sessions.wait().await;
    }
}

#[instrument(
    name = "connection",
    skip(stream, client_address, store, codec, shutdown),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    store: Arc<dyn RecordStore>,
    codec: LineCodec,
    shutdown: CancellationToken,
) -> Result<(), codec::Error> {
    let mut conn = Connection::with_codec(stream, client_address, codec);

    tracing::Span::current()
        .record("connection_id", tracing::field::display(conn.id))
        .record("client_address", tracing::field::display(client_address));

    info!(client_id = conn.client_identity(), "Client connected");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Closing connection on shutdown");
                break;
            }
            line = conn.read_line() => line,
        };

        let Some(line) = line? else {
            info!("Client disconnected");
            break;
        };

        match Frame::parse(&line) {
            Ok(Frame::GetData) => {
                debug!("Received GET_DATA");
                send_items(&mut conn, store.as_ref()).await;
            }
            Ok(Frame::Record(payload)) => {
                store_record(conn.client_identity(), payload, store.as_ref()).await;
            }
            Err(e) => warn!(error = %e, "Discarding malformed line"),
        }
    }

    Ok(())
}

/// Streams the whole catalog to the client, one flushed line per item.
///
/// Items that cannot be encoded are skipped. A failed write ends the dump; the client is
/// never told, as the protocol has no error frame.
async fn send_items(conn: &mut Connection, store: &dyn RecordStore) {
    let items = match store.list_items().await {
        Ok(items) => items,
        Err(e) => {
            error!(error = %e, "Failed to load items");
            return;
        }
    };

    let mut sent = 0;
    for item in &items {
        let line = match frame::encode_item(item) {
            Ok(line) => line,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "Skipping item");
                continue;
            }
        };

        if let Err(e) = conn.write_line(line).await {
            error!(sent, error = %e, "Failed to send items to client");
            return;
        }
        sent += 1;
    }

    debug!(sent, total = items.len(), "Items sent");
}

async fn store_record(client_id: &str, payload: Bytes, store: &dyn RecordStore) {
    let size = payload.len();

    match store.append_record(client_id, payload).await {
        Ok(()) => info!(client_id, size, "Stored client record"),
        Err(e) => error!(client_id, error = %e, "Failed to store client record"),
    }
}
