//! MQTT 3.1.1 packet codec.
//!
//! Covers the subset netmon needs: session setup, QoS 0 publish and
//! subscribe, and keep-alive.
//!
//! # Frame layout
//!
//! ```text
//! [type:4 | flags:4] [remaining length: 1-4 bytes, 7 bits each, MSB = more]
//! [variable header] [payload]
//!
//! Strings are [len: u16 BE] [utf-8 bytes].
//! ```
//!
//! [`Packet::decode`] is incremental: it returns `Ok(None)` and leaves the
//! buffer untouched until a whole frame is available.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MqttError, MqttResult};

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;

/// Largest value the 4-byte remaining-length field can carry.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// SUBACK return code for a rejected filter.
pub const SUBACK_FAILURE: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub client_id: String,
    pub keep_alive: u16,
    pub clean_session: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck { session_present: bool, code: u8 },
    Publish(Publish),
    Subscribe { packet_id: u16, filter: String },
    SubAck { packet_id: u16, codes: Vec<u8> },
    PingReq,
    PingResp,
    Disconnect,
    /// A valid packet type netmon does not act on (PUBACK, UNSUBACK, ...).
    Unsupported(u8),
}

impl Packet {
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "CONNECT",
            Packet::ConnAck { .. } => "CONNACK",
            Packet::Publish(_) => "PUBLISH",
            Packet::Subscribe { .. } => "SUBSCRIBE",
            Packet::SubAck { .. } => "SUBACK",
            Packet::PingReq => "PINGREQ",
            Packet::PingResp => "PINGRESP",
            Packet::Disconnect => "DISCONNECT",
            Packet::Unsupported(_) => "UNSUPPORTED",
        }
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> MqttResult<()> {
        let mut body = BytesMut::new();
        let header = match self {
            Packet::Connect(c) => {
                put_str(&mut body, PROTOCOL_NAME)?;
                body.put_u8(PROTOCOL_LEVEL);
                let mut flags = 0u8;
                if c.clean_session {
                    flags |= FLAG_CLEAN_SESSION;
                }
                if c.username.is_some() {
                    flags |= FLAG_USERNAME;
                }
                if c.password.is_some() {
                    flags |= FLAG_PASSWORD;
                }
                body.put_u8(flags);
                body.put_u16(c.keep_alive);
                put_str(&mut body, &c.client_id)?;
                if let Some(username) = &c.username {
                    put_str(&mut body, username)?;
                }
                if let Some(password) = &c.password {
                    put_str(&mut body, password)?;
                }
                CONNECT << 4
            }
            Packet::ConnAck {
                session_present,
                code,
            } => {
                body.put_u8(u8::from(*session_present));
                body.put_u8(*code);
                CONNACK << 4
            }
            Packet::Publish(p) => {
                put_str(&mut body, &p.topic)?;
                body.put_slice(&p.payload);
                (PUBLISH << 4) | u8::from(p.retain)
            }
            Packet::Subscribe { packet_id, filter } => {
                body.put_u16(*packet_id);
                put_str(&mut body, filter)?;
                // Requested QoS 0.
                body.put_u8(0);
                (SUBSCRIBE << 4) | 0x02
            }
            Packet::SubAck { packet_id, codes } => {
                body.put_u16(*packet_id);
                body.put_slice(codes);
                SUBACK << 4
            }
            Packet::PingReq => PINGREQ << 4,
            Packet::PingResp => PINGRESP << 4,
            Packet::Disconnect => DISCONNECT << 4,
            Packet::Unsupported(kind) => {
                return Err(MqttError::Malformed(format!(
                    "cannot encode packet type {kind}"
                )));
            }
        };

        if body.len() > MAX_REMAINING_LENGTH {
            return Err(MqttError::Malformed(format!(
                "packet body of {} bytes exceeds protocol limit",
                body.len()
            )));
        }

        dst.reserve(1 + 4 + body.len());
        dst.put_u8(header);
        put_remaining_length(dst, body.len());
        dst.extend_from_slice(&body);
        Ok(())
    }

    /// Take one complete frame off the front of `src`.
    pub fn decode(src: &mut BytesMut) -> MqttResult<Option<Packet>> {
        if src.len() < 2 {
            return Ok(None);
        }
        let header = src[0];
        let Some((remaining, len_bytes)) = read_remaining_length(&src[1..])? else {
            return Ok(None);
        };
        let total = 1 + len_bytes + remaining;
        if src.len() < total {
            return Ok(None);
        }

        let mut frame = src.split_to(total).freeze();
        frame.advance(1 + len_bytes);

        let kind = header >> 4;
        let flags = header & 0x0f;
        let packet = match kind {
            CONNECT => Packet::Connect(decode_connect(&mut frame)?),
            CONNACK => {
                need(&frame, 2, "CONNACK")?;
                Packet::ConnAck {
                    session_present: frame.get_u8() & 0x01 == 0x01,
                    code: frame.get_u8(),
                }
            }
            PUBLISH => {
                let qos = (flags >> 1) & 0x03;
                let topic = get_str(&mut frame)?;
                if qos > 0 {
                    need(&frame, 2, "PUBLISH packet id")?;
                    frame.get_u16();
                }
                Packet::Publish(Publish {
                    topic,
                    payload: frame,
                    retain: flags & 0x01 == 0x01,
                })
            }
            SUBSCRIBE => {
                need(&frame, 2, "SUBSCRIBE")?;
                let packet_id = frame.get_u16();
                let filter = get_str(&mut frame)?;
                need(&frame, 1, "SUBSCRIBE qos")?;
                frame.get_u8();
                Packet::Subscribe { packet_id, filter }
            }
            SUBACK => {
                need(&frame, 2, "SUBACK")?;
                let packet_id = frame.get_u16();
                Packet::SubAck {
                    packet_id,
                    codes: frame.to_vec(),
                }
            }
            PINGREQ => Packet::PingReq,
            PINGRESP => Packet::PingResp,
            DISCONNECT => Packet::Disconnect,
            0 | 15 => {
                return Err(MqttError::Malformed(format!("reserved packet type {kind}")));
            }
            other => Packet::Unsupported(other),
        };
        Ok(Some(packet))
    }
}

fn decode_connect(frame: &mut Bytes) -> MqttResult<Connect> {
    let protocol = get_str(frame)?;
    if protocol != PROTOCOL_NAME {
        return Err(MqttError::Malformed(format!("unknown protocol {protocol:?}")));
    }
    need(frame, 4, "CONNECT header")?;
    let _level = frame.get_u8();
    let flags = frame.get_u8();
    let keep_alive = frame.get_u16();
    let client_id = get_str(frame)?;
    let username = if flags & FLAG_USERNAME != 0 {
        Some(get_str(frame)?)
    } else {
        None
    };
    let password = if flags & FLAG_PASSWORD != 0 {
        Some(get_str(frame)?)
    } else {
        None
    };
    Ok(Connect {
        client_id,
        keep_alive,
        clean_session: flags & FLAG_CLEAN_SESSION != 0,
        username,
        password,
    })
}

/// Returns `(value, bytes used)`, or `None` if more bytes are needed.
fn read_remaining_length(src: &[u8]) -> MqttResult<Option<(usize, usize)>> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in src.iter().take(4).enumerate() {
        value += usize::from(byte & 0x7f) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if src.len() >= 4 {
        Err(MqttError::Malformed("remaining length longer than 4 bytes".to_string()))
    } else {
        Ok(None)
    }
}

fn put_remaining_length(dst: &mut BytesMut, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

fn put_str(dst: &mut BytesMut, s: &str) -> MqttResult<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| MqttError::Malformed(format!("string of {} bytes too long", s.len())))?;
    dst.put_u16(len);
    dst.put_slice(s.as_bytes());
    Ok(())
}

fn get_str(src: &mut Bytes) -> MqttResult<String> {
    need(src, 2, "string length")?;
    let len = usize::from(src.get_u16());
    need(src, len, "string body")?;
    let raw = src.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| MqttError::Malformed("string is not utf-8".to_string()))
}

fn need(src: &Bytes, n: usize, what: &str) -> MqttResult<()> {
    if src.remaining() < n {
        return Err(MqttError::Malformed(format!("truncated {what}")));
    }
    Ok(())
}
