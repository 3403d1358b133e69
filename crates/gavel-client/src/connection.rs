//! Request/reply channel to the front-end.

use async_trait::async_trait;
use gavel_core::{read_frame, write_frame};
use gavel_proto::{Reply, Request};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpStream, ToSocketAddrs},
};

use crate::error::ClientError;

/// Something that answers marketplace requests.
///
/// [`Connection`] is the network implementation; tests plug in-process
/// coordinators in here.
#[async_trait]
pub trait Remote: Send {
    /// Send one request and wait for its reply.
    ///
    /// [`Reply::Unavailable`] surfaces as [`ClientError::Unavailable`].
    async fn call(&mut self, request: Request) -> Result<Reply, ClientError>;
}

/// Framed connection over any byte stream.
pub struct Connection<S> {
    stream: S,
}

impl Connection<TcpStream> {
    /// Connect to a front-end over TCP.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(gavel_core::TransportError::from)?;
        stream.set_nodelay(true).map_err(gavel_core::TransportError::from)?;
        Ok(Self::new(stream))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an established stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Give the stream back.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> Remote for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn call(&mut self, request: Request) -> Result<Reply, ClientError> {
        let op = request.name();
        write_frame(&mut self.stream, &request).await?;
        let reply = read_frame::<_, Reply>(&mut self.stream).await?.ok_or(ClientError::ConnectionClosed)?;
        tracing::trace!(op, "reply received");

        match reply {
            Reply::Unavailable { reason } => Err(ClientError::Unavailable { reason }),
            reply => Ok(reply),
        }
    }
}
