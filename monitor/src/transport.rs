use futures_util::{SinkExt, StreamExt};
use hazard_common::{SessionId, TransportEvent};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::driver::DriverEvent;

pub trait Connector: Send + 'static {
    fn open(
        &self,
        session: SessionId,
        events: mpsc::UnboundedSender<DriverEvent>,
    ) -> mpsc::UnboundedSender<String>;
}

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl Connector for WsConnector {
    fn open(
        &self,
        session: SessionId,
        events: mpsc::UnboundedSender<DriverEvent>,
    ) -> mpsc::UnboundedSender<String> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_session(self.url.clone(), session, events, outbound_rx));
        outbound_tx
    }
}

async fn run_session(
    url: String,
    session: SessionId,
    events: mpsc::UnboundedSender<DriverEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |event: TransportEvent| {
        // The driver is gone once the monitor shuts down.
        let _ = events.send(DriverEvent::Transport(event));
    };

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            emit(TransportEvent::Error(session, err.to_string()));
            emit(TransportEvent::Closed(session));
            return;
        }
    };
    emit(TransportEvent::Opened(session));

    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEvent::Message(session, text.to_string()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    emit(TransportEvent::Message(session, text));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    emit(TransportEvent::Error(session, err.to_string()));
                    break;
                }
            },
            outgoing = outbound.recv() => match outgoing {
                Some(frame) => {
                    if let Err(err) = sink.send(Message::Text(frame.into())).await {
                        emit(TransportEvent::Error(session, err.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }

    emit(TransportEvent::Closed(session));
}
