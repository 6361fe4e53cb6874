// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local server: the bidirectional message channel for first-party clients.
//!
//! One WebSocket connection per client. Frames on a connection are handled
//! sequentially, so a client that deploys and immediately lists sees its own
//! write. Malformed frames are dropped without closing the connection;
//! streaming pushes from subscriptions interleave with replies on the same
//! socket.

use futures_util::{SinkExt, StreamExt};
use sdv_core::ClientId;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{drop_client, Dispatcher, OutboundFrame, RequestContext};

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 256;

/// Accept loop. Runs until cancelled.
pub async fn run_local_server(
    listener: TcpListener,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "local client connected");
                    let dispatcher = dispatcher.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, dispatcher, cancel).await {
                            tracing::debug!(%peer, error = %e, "connection ended");
                        }
                    });
                }
                Err(e) => tracing::error!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();
    let client = ClientId::new();
    let (reply_tx, mut reply_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE);

    let ctx = RequestContext { client: client.clone(), request_from: None, reply_tx };

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break Ok(());
            }
            // Replies and subscription pushes share the socket.
            outbound = reply_rx.recv() => {
                if let Some(outbound) = outbound {
                    if let Err(e) = write.send(Message::text(outbound.frame)).await {
                        break Err(e);
                    }
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = dispatcher.dispatch_text(&text, &ctx).await {
                        if let Err(e) = write.send(Message::text(reply)).await {
                            break Err(e);
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {} // binary frames are ignored
                Some(Err(e)) => break Err(e),
            }
        }
    };

    drop_client(dispatcher.hub(), dispatcher.gateway(), &client);
    dispatcher.forget_sink(&client);
    result
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
