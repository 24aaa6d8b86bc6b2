//! WebSocket listener that feeds sockets into the [`RealtimeGateway`].
//!
//! Unauthenticated sockets receive a policy-violation close frame straight
//! after the handshake and are never registered.

use super::{ConnectionId, GatewayError, GatewayResult, RealtimeGateway, ServerFrame};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::{borrow::Cow, io, net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{
    Message as WsMessage,
    handshake::server::{ErrorResponse, Request, Response},
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use tracing::{debug, info, warn};

/// WebSocket front end for a [`RealtimeGateway`].
pub struct GatewayServer {
    listener: TcpListener,
    gateway: Arc<RealtimeGateway>,
}

impl GatewayServer {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while binding `addr`.
    pub async fn bind(addr: SocketAddr, gateway: Arc<RealtimeGateway>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, gateway })
    }

    /// Returns the bound address, useful when binding to port 0.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the listener fails, serving each on its
    /// own task.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the accept loop.
    pub async fn run(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "realtime gateway listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let gateway = Arc::clone(&self.gateway);
            tokio::spawn(async move {
                if let Err(err) = serve_socket(stream, peer, &gateway).await {
                    debug!(%peer, error = %err, "connection ended with error");
                }
            });
        }
    }
}

/// Extracts the bearer credential from the `Authorization` header or, for
/// browsers that cannot set headers on a WebSocket, the `token` query
/// parameter.
#[must_use]
pub fn bearer_credential(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_owned());
    from_header.or_else(|| {
        request.uri().query().and_then(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "token")
                .map(|(_, token)| token.to_owned())
        })
    })
}

async fn serve_socket(
    stream: TcpStream,
    peer: SocketAddr,
    gateway: &RealtimeGateway,
) -> GatewayResult<()> {
    let mut credential = None;
    let callback = |request: &Request, response: Response| {
        credential = bearer_credential(request);
        Ok::<Response, ErrorResponse>(response)
    };
    let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .map_err(|err| GatewayError::transport(&err))?;

    let (mut session, outbound) = match gateway.connect(credential.as_deref()).await {
        Ok(connected) => connected,
        Err(err) => {
            let close = CloseFrame {
                code: CloseCode::Policy,
                reason: Cow::Owned(err.to_string()),
            };
            return socket
                .send(WsMessage::Close(Some(close)))
                .await
                .map_err(|send_err| GatewayError::transport(&send_err));
        }
    };
    let connection_id = session.connection_id();
    debug!(%peer, %connection_id, "socket attached");

    let (sink, mut incoming) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, outbound, connection_id));

    while let Some(received) = incoming.next().await {
        match received {
            Ok(WsMessage::Text(text)) => {
                if let Some(reply) = gateway.handle_text(&session, &text).await {
                    session.reply(reply).await;
                }
            }
            Ok(WsMessage::Binary(_)) => {
                session
                    .reply(ServerFrame::error("protocol", "binary frames are not supported"))
                    .await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%connection_id, error = %err, "socket read failed");
                break;
            }
        }
    }

    gateway.disconnect(&mut session);
    drop(session);
    if let Err(err) = writer.await {
        warn!(%connection_id, error = %err, "socket writer task failed");
    }
    Ok(())
}

/// Writes queued frames to the socket until every sender is gone.
async fn write_outbound(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    mut outbound: mpsc::Receiver<ServerFrame>,
    connection_id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                warn!(%connection_id, error = %err, "failed to encode frame");
                continue;
            }
        };
        if let Err(err) = sink.send(WsMessage::Text(text)).await {
            debug!(%connection_id, error = %err, "socket write failed");
            return;
        }
    }
    if let Err(err) = sink.close().await {
        debug!(%connection_id, error = %err, "socket close failed");
    }
}
