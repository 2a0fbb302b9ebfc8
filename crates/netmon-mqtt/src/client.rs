//! Minimal MQTT client session over TCP.
//!
//! One [`MqttClient`] owns one broker connection. All traffic is QoS 0,
//! so nothing is acknowledged or retransmitted after the handshake.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::codec::{Connect, Packet, Publish, SUBACK_FAILURE};
use crate::error::{MqttError, MqttResult};

/// Session parameters sent in CONNECT.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub keep_alive: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectOptions {
    pub fn new(client_id: &str, keep_alive: Duration) -> Self {
        Self {
            client_id: client_id.to_string(),
            keep_alive,
            username: None,
            password: None,
        }
    }

    fn to_packet(&self) -> Packet {
        Packet::Connect(Connect {
            client_id: self.client_id.clone(),
            keep_alive: u16::try_from(self.keep_alive.as_secs()).unwrap_or(u16::MAX),
            clean_session: true,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// An established broker session.
pub struct MqttClient {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    next_packet_id: u16,
    broker: String,
}

impl MqttClient {
    /// Open a TCP connection, send CONNECT and wait for a successful CONNACK.
    ///
    /// `timeout` bounds the TCP connect and the CONNACK wait separately.
    pub async fn connect(broker: &str, options: &ConnectOptions, timeout: Duration) -> MqttResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(broker))
            .await
            .map_err(|_| MqttError::Timeout("TCP connect"))??;
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            read_buf: BytesMut::with_capacity(1024),
            write_buf: BytesMut::with_capacity(256),
            next_packet_id: 1,
            broker: broker.to_string(),
        };

        client.send(&options.to_packet()).await?;
        let reply = tokio::time::timeout(timeout, client.read_packet())
            .await
            .map_err(|_| MqttError::Timeout("CONNACK"))??;
        match reply {
            Packet::ConnAck { code: 0, .. } => {}
            Packet::ConnAck { code, .. } => return Err(MqttError::Refused(code)),
            other => {
                return Err(MqttError::Unexpected {
                    expected: "CONNACK",
                    got: other.name(),
                });
            }
        }

        debug!(broker = %client.broker, client_id = %options.client_id, "mqtt session established");
        Ok(client)
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Fire-and-forget QoS 0 publish.
    pub async fn publish(&mut self, topic: &str, payload: impl Into<Bytes>) -> MqttResult<()> {
        let packet = Packet::Publish(Publish {
            topic: topic.to_string(),
            payload: payload.into(),
            retain: false,
        });
        self.send(&packet).await
    }

    /// Subscribe to one filter at QoS 0 and wait for the SUBACK.
    ///
    /// Publishes that arrive before the SUBACK are dropped.
    pub async fn subscribe(&mut self, filter: &str, timeout: Duration) -> MqttResult<()> {
        let packet_id = self.take_packet_id();
        self.send(&Packet::Subscribe {
            packet_id,
            filter: filter.to_string(),
        })
        .await?;

        let wait = async {
            loop {
                match self.read_packet().await? {
                    Packet::SubAck { packet_id: id, codes } if id == packet_id => {
                        if codes.first().is_none_or(|c| *c == SUBACK_FAILURE) {
                            return Err(MqttError::SubscribeRejected(filter.to_string()));
                        }
                        return Ok(());
                    }
                    other => trace!(packet = other.name(), "ignoring packet while awaiting SUBACK"),
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| MqttError::Timeout("SUBACK"))?
    }

    pub async fn ping(&mut self) -> MqttResult<()> {
        self.send(&Packet::PingReq).await
    }

    /// Wait for the next inbound PUBLISH, skipping control packets.
    ///
    /// Cancel-safe: partially received frames stay buffered.
    pub async fn next_publish(&mut self) -> MqttResult<Publish> {
        loop {
            match self.read_packet().await? {
                Packet::Publish(publish) => return Ok(publish),
                Packet::Disconnect => return Err(MqttError::Closed),
                other => trace!(packet = other.name(), "skipping control packet"),
            }
        }
    }

    /// Read one whole packet. Cancel-safe.
    pub async fn read_packet(&mut self) -> MqttResult<Packet> {
        loop {
            if let Some(packet) = Packet::decode(&mut self.read_buf)? {
                return Ok(packet);
            }
            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(MqttError::Closed);
            }
        }
    }

    /// Send DISCONNECT and close the socket.
    pub async fn disconnect(mut self) -> MqttResult<()> {
        self.send(&Packet::Disconnect).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, packet: &Packet) -> MqttResult<()> {
        self.write_buf.clear();
        packet.encode(&mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        trace!(packet = packet.name(), bytes = self.write_buf.len(), "sent");
        Ok(())
    }

    fn take_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        // Packet id 0 is not allowed.
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }
}

impl std::fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("broker", &self.broker)
            .field("buffered", &self.read_buf.len())
            .finish()
    }
}
