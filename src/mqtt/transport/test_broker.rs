//! Minimal MQTT 3.1.1 broker on a loopback socket.
//!
//! Serves a single client. CONNECT gets a CONNACK, every SUBSCRIBE gets a
//! SUBACK followed by one QoS 0 PUBLISH of `"1"` on the subscribed topic, and
//! PINGREQ gets a PINGRESP. Everything the client sends is reported as
//! [`Seen`].

use super::{MqttTransport, TransportEvent};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const PINGRESP: [u8; 2] = [0xD0, 0x00];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Connect,
    Subscribe(String),
    Publish(String, String),
}

/// Binds an ephemeral port and serves the first client on it.
pub async fn spawn() -> (u16, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let _ = serve(stream, seen_tx).await;
        }
    });

    (port, seen_rx)
}

/// Waits for the next `count` packets the broker saw.
pub async fn collect(seen: &mut mpsc::UnboundedReceiver<Seen>, count: usize) -> Vec<Seen> {
    let mut packets = Vec::with_capacity(count);
    while packets.len() < count {
        let packet = tokio::time::timeout(Duration::from_secs(5), seen.recv())
            .await
            .expect("broker saw too few packets")
            .expect("broker stopped");
        packets.push(packet);
    }
    packets
}

/// Polls `transport` until it reports an event.
pub async fn next_event(transport: &mut dyn MqttTransport) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(event) = transport.next_event() {
                break event;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no transport event")
}

async fn serve(mut stream: TcpStream, seen: mpsc::UnboundedSender<Seen>) -> io::Result<()> {
    loop {
        let (header, body) = read_packet(&mut stream).await?;
        match header >> 4 {
            1 => {
                stream.write_all(&CONNACK_ACCEPTED).await?;
                let _ = seen.send(Seen::Connect);
            }
            3 => {
                let (topic, rest) = split_topic(&body);
                // QoS 1 and 2 carry a packet id before the payload
                let payload = if (header >> 1) & 0x03 == 0 { rest } else { &rest[2..] };
                let _ = seen.send(Seen::Publish(
                    topic,
                    String::from_utf8_lossy(payload).into_owned(),
                ));
            }
            8 => {
                let (packet_id, filters) = body.split_at(2);
                let (topic, _) = split_topic(filters);
                stream
                    .write_all(&[0x90, 0x03, packet_id[0], packet_id[1], 0x00])
                    .await?;
                stream.write_all(&publish_packet(&topic, b"1")).await?;
                let _ = seen.send(Seen::Subscribe(topic));
            }
            12 => stream.write_all(&PINGRESP).await?,
            14 => return Ok(()),
            _ => {}
        }
    }
}

async fn read_packet(stream: &mut TcpStream) -> io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;

    let mut length = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        length |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; length];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

fn split_topic(bytes: &[u8]) -> (String, &[u8]) {
    let length = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    let topic = String::from_utf8_lossy(&bytes[2..2 + length]).into_owned();
    (topic, &bytes[2 + length..])
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload);

    let mut packet = vec![0x30];
    let mut length = body.len();
    loop {
        let mut byte = (length % 128) as u8;
        length /= 128;
        if length > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if length == 0 {
            break;
        }
    }
    packet.extend(body);
    packet
}
