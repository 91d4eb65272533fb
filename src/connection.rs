use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{self, LineCodec};

pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    // Fixed at accept time; every record this connection uploads is stored under it.
    client_identity: String,
    // Lines are read from the socket into the codec's read buffer and removed once a full
    // line has been split off. Writes go through the same codec and are flushed per line.
    framed: Framed<TcpStream, LineCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr) -> Connection {
        Connection::with_codec(stream, client_address, LineCodec::new())
    }

    pub fn with_codec(
        stream: TcpStream,
        client_address: SocketAddr,
        codec: LineCodec,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            client_identity: client_address.to_string(),
            framed: Framed::new(stream, codec),
        }
    }

    /// The identity records from this connection are stored under.
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    /// Reads the next line, without its newline. Returns `None` once the peer has closed the
    /// connection.
    pub async fn read_line(&mut self) -> Result<Option<Bytes>, codec::Error> {
        self.framed.next().await.transpose()
    }

    /// Writes one line and flushes it to the socket before returning.
    pub async fn write_line(&mut self, line: Bytes) -> Result<(), codec::Error> {
        self.framed.send(line).await
    }
}
