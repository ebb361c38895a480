//! Socket faces for rNFD: TCP, UDP, and Unix-domain transports.
//!
//! Each face is a pair of tokio tasks: a reader that decodes frames and
//! pushes them into the forwarder's event channel, and a writer that
//! drains the face's egress queue. The forwarder itself never touches a
//! socket.

pub mod codec;
pub mod uri;

use anyhow::{Context, Result};
use bytes::BytesMut;
use log::{debug, warn};
use rust_rnfd_common::packet::Packet;
use rust_rnfd_common::types::FaceId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket, UnixListener, UnixStream};
use tokio::sync::mpsc;

pub use uri::{FaceUri, Scheme, NDN_PORT};

/// What a face's I/O tasks report back to the daemon.
#[derive(Debug)]
pub enum FaceEvent {
    Packet(FaceId, Packet),
    Closed(FaceId),
}

/// A connected transport endpoint, before it is wired to a face.
pub enum Endpoint {
    Tcp(TcpStream),
    Unix(UnixStream),
    Udp(UdpSocket),
}

/// A bound listener accepting inbound stream faces.
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

/// Connects an outbound endpoint for `uri`.
pub async fn connect(uri: &FaceUri) -> Result<Endpoint> {
    match uri.scheme {
        Scheme::Unix => {
            let stream = UnixStream::connect(&uri.host)
                .await
                .with_context(|| format!("connecting {}", uri))?;
            Ok(Endpoint::Unix(stream))
        }
        scheme if scheme.is_tcp() => {
            let stream = TcpStream::connect(uri.authority())
                .await
                .with_context(|| format!("connecting {}", uri))?;
            Ok(Endpoint::Tcp(stream))
        }
        _ => {
            // a connected UDP socket gives the face two fixed endpoints
            let local = if uri.scheme == Scheme::Udp6 || uri.host.contains(':') {
                "[::]:0"
            } else {
                "0.0.0.0:0"
            };
            let socket = UdpSocket::bind(local).await?;
            socket
                .connect(uri.authority())
                .await
                .with_context(|| format!("connecting {}", uri))?;
            Ok(Endpoint::Udp(socket))
        }
    }
}

/// Binds a listener for `uri`. Datagram listeners are not supported;
/// UDP faces are created by `connect`.
pub async fn bind_listener(uri: &FaceUri) -> Result<Listener> {
    match uri.scheme {
        Scheme::Unix => {
            // a stale socket file from a previous run would block the bind
            let _ = std::fs::remove_file(&uri.host);
            let listener =
                UnixListener::bind(&uri.host).with_context(|| format!("binding {}", uri))?;
            Ok(Listener::Unix(listener))
        }
        scheme if scheme.is_tcp() => {
            let listener = TcpListener::bind(uri.authority())
                .await
                .with_context(|| format!("binding {}", uri))?;
            Ok(Listener::Tcp(listener))
        }
        _ => anyhow::bail!("cannot listen on {}; UDP faces are created by connect", uri),
    }
}

/// Wires an endpoint to a face: spawns the reader and writer tasks.
pub fn spawn_face_io(
    endpoint: Endpoint,
    face: FaceId,
    events: mpsc::UnboundedSender<FaceEvent>,
    egress: mpsc::UnboundedReceiver<Packet>,
) {
    match endpoint {
        Endpoint::Tcp(stream) => spawn_stream_face(stream, face, events, egress),
        Endpoint::Unix(stream) => spawn_stream_face(stream, face, events, egress),
        Endpoint::Udp(socket) => spawn_datagram_face(socket, face, events, egress),
    }
}

/// Reader + writer tasks over one stream socket.
pub fn spawn_stream_face<S>(
    stream: S,
    face: FaceId,
    events: mpsc::UnboundedSender<FaceEvent>,
    mut egress: mpsc::UnboundedReceiver<Packet>,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(8800);
        loop {
            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while let Some(frame) = codec::extract_frame(&mut buf) {
                        match Packet::from_wire(&mut frame.clone()) {
                            Ok(packet) => {
                                if events.send(FaceEvent::Packet(face, packet)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("{} undecodable frame: {}", face, e),
                        }
                    }
                }
                Err(e) => {
                    debug!("{} read error: {}", face, e);
                    break;
                }
            }
        }
        let _ = events.send(FaceEvent::Closed(face));
    });

    tokio::spawn(async move {
        while let Some(packet) = egress.recv().await {
            if let Err(e) = writer.write_all(&packet.to_wire()).await {
                debug!("{} write error: {}", face, e);
                break;
            }
        }
        // dropping the write half cancels outstanding sends
    });
}

/// Reader + writer tasks over one connected datagram socket; each
/// datagram carries exactly one frame.
pub fn spawn_datagram_face(
    socket: UdpSocket,
    face: FaceId,
    events: mpsc::UnboundedSender<FaceEvent>,
    mut egress: mpsc::UnboundedReceiver<Packet>,
) {
    let socket = std::sync::Arc::new(socket);

    let recv_socket = socket.clone();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        loop {
            match recv_socket.recv(&mut buf).await {
                Ok(n) => {
                    let mut frame = bytes::Bytes::copy_from_slice(&buf[..n]);
                    match Packet::from_wire(&mut frame) {
                        Ok(packet) => {
                            if events.send(FaceEvent::Packet(face, packet)).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("{} undecodable datagram: {}", face, e),
                    }
                }
                Err(e) => {
                    debug!("{} recv error: {}", face, e);
                    break;
                }
            }
        }
        let _ = events.send(FaceEvent::Closed(face));
    });

    tokio::spawn(async move {
        while let Some(packet) = egress.recv().await {
            if let Err(e) = socket.send(&packet.to_wire()).await {
                debug!("{} send error: {}", face, e);
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_rnfd_common::packet::Interest;
    use rust_rnfd_common::Name;

    #[tokio::test]
    async fn tcp_face_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (egress_tx, egress_rx) = mpsc::unbounded_channel();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            stream
        });

        let client = TcpStream::connect(addr).await.unwrap();
        let server = accept.await.unwrap();
        spawn_face_io(Endpoint::Tcp(server), FaceId(300), events_tx, egress_rx);

        // frame sent by the peer arrives as a decoded event
        let interest = Interest::new(Name::from_uri("/ping").unwrap())
            .with_nonce(7)
            .with_pit_token(0xABCD);
        let (mut client_read, mut client_write) = client.into_split();
        client_write
            .write_all(&Packet::Interest(interest.clone()).to_wire())
            .await
            .unwrap();

        match events_rx.recv().await.unwrap() {
            FaceEvent::Packet(face, Packet::Interest(received)) => {
                assert_eq!(face, FaceId(300));
                assert_eq!(received.name, interest.name);
                assert_eq!(received.tags.pit_token, Some(0xABCD));
            }
            other => panic!("unexpected event {:?}", other),
        }

        // packet queued on the egress channel reaches the peer
        let reply = Packet::Interest(Interest::new(Name::from_uri("/pong").unwrap()).with_nonce(8));
        egress_tx.send(reply.clone()).unwrap();
        let expected = reply.to_wire();
        let mut received = vec![0u8; expected.len()];
        client_read.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected.as_ref());

        // closing the peer surfaces a Closed event
        drop(client_write);
        drop(client_read);
        match events_rx.recv().await.unwrap() {
            FaceEvent::Closed(face) => assert_eq!(face, FaceId(300)),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
