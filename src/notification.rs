//! Notification listener: traps and informs on UDP 162.
//!
//! [`NotificationListener`] receives v1 Trap, v2 Trap and Inform
//! packets from any source. Informs are acknowledged automatically
//! with a Response carrying the same request-id and the notification's
//! two header varbinds back to the sender. Community versions only;
//! USM-secured notifications are out of scope here.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::ber::{tag, Decoder};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::message::CommunityMessage;
use crate::pdu::{NotificationV2, TrapV1Pdu};
use crate::util::bind_udp_socket;
use crate::version::Version;

/// Default trap-listener port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// A received notification.
#[derive(Debug, Clone)]
pub enum Notification {
    /// SNMPv1 trap (RFC 1157 layout).
    TrapV1 {
        community: Bytes,
        trap: TrapV1Pdu,
    },
    /// SNMPv2 trap.
    TrapV2 {
        version: Version,
        community: Bytes,
        notification: NotificationV2,
    },
    /// Inform (already acknowledged by the listener).
    Inform {
        version: Version,
        community: Bytes,
        notification: NotificationV2,
    },
}

/// UDP listener for traps and informs.
pub struct NotificationListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl NotificationListener {
    /// Bind the listener; "0.0.0.0:162" is the conventional address.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let bind_addr: SocketAddr = addr.as_ref().parse().map_err(|_| {
            Error::Config(format!("invalid bind address: {}", addr.as_ref()))
        })?;

        let socket = bind_udp_socket(bind_addr).map_err(|e| Error::Io {
            target: Some(bind_addr),
            source: e,
        })?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(bind_addr),
            source: e,
        })?;

        tracing::debug!(target: "usnmp::notification", local = %local_addr, "trap listener bound");

        Ok(Self { socket, local_addr })
    }

    /// Local bind address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive the next notification.
    ///
    /// Undecodable and non-notification datagrams are dropped with a
    /// debug log; the call only returns a well-formed notification or
    /// a socket error.
    pub async fn recv(&self) -> Result<(Notification, SocketAddr)> {
        let mut buf = vec![0u8; 65535];

        loop {
            let (len, source) = self.socket.recv_from(&mut buf).await.map_err(|e| Error::Io {
                target: None,
                source: e,
            })?;

            match decode_notification(&buf[..len]) {
                Ok(notification) => {
                    if let Notification::Inform {
                        version,
                        community,
                        notification: inform,
                    } = &notification
                    {
                        self.acknowledge_inform(*version, community, inform, source)
                            .await?;
                    }
                    return Ok((notification, source));
                }
                Err(e) => {
                    tracing::debug!(target: "usnmp::notification", %source, error = %e, "dropping undecodable datagram");
                    continue;
                }
            }
        }
    }

    /// Send the Response acknowledging an Inform.
    async fn acknowledge_inform(
        &self,
        version: Version,
        community: &Bytes,
        inform: &NotificationV2,
        source: SocketAddr,
    ) -> Result<()> {
        let response = inform.to_pdu().inform_response();
        let message = CommunityMessage::new(version, community.clone(), response);
        let data = message.encode();

        tracing::debug!(target: "usnmp::notification", %source, request_id = inform.request_id, "acknowledging inform");

        self.socket
            .send_to(&data, source)
            .await
            .map_err(|e| Error::Io {
                target: Some(source),
                source: e,
            })?;
        Ok(())
    }
}

/// Parse one datagram into a notification.
///
/// The v1 trap layout differs from every other PDU, so the envelope is
/// unpacked by hand: version, community, then the PDU by tag.
fn decode_notification(data: &[u8]) -> Result<Notification> {
    let mut decoder = Decoder::from_slice(data);
    let mut seq = decoder.read_sequence()?;

    let version_num = seq.read_integer()?;
    let version = Version::from_i32(version_num).ok_or_else(|| {
        Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num))
    })?;
    if version == Version::V3 {
        // USM notifications are not handled by this listener
        return Err(Error::decode(
            seq.offset(),
            DecodeErrorKind::UnknownSecurityModel(3),
        ));
    }

    let community = seq.read_octet_string()?;

    match seq.peek_byte() {
        Some(tag::pdu::TRAP_V1) => {
            let trap = TrapV1Pdu::decode(&mut seq)?;
            Ok(Notification::TrapV1 { community, trap })
        }
        Some(tag::pdu::TRAP_V2) => {
            let notification = NotificationV2::decode(&mut seq)?;
            Ok(Notification::TrapV2 {
                version,
                community,
                notification,
            })
        }
        Some(tag::pdu::INFORM_REQUEST) => {
            let notification = NotificationV2::decode(&mut seq)?;
            Ok(Notification::Inform {
                version,
                community,
                notification,
            })
        }
        Some(other) => Err(Error::UnexpectedPduType { tag: other }),
        None => Err(Error::decode(seq.offset(), DecodeErrorKind::MissingPdu)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::{GenericTrap, Pdu, PduType};
    use crate::value::Value;
    use crate::varbind::VarBind;

    fn encode_v1_trap() -> Bytes {
        let trap = TrapV1Pdu::new(
            oid!(1, 3, 6, 1, 4, 1, 9999),
            [192, 0, 2, 10],
            GenericTrap::LinkUp,
            0,
            4242,
            vec![],
        );
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            trap.encode(buf);
            buf.push_octet_string(b"public");
            buf.push_integer(Version::V1.as_i32());
        });
        buf.finish()
    }

    fn encode_v2_notification(pdu_type: PduType, request_id: i32) -> Bytes {
        let notification = NotificationV2 {
            pdu_type,
            request_id,
            sys_up_time: 9000,
            trap_oid: oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 3),
            varbinds: vec![VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 7),
                Value::Integer(7),
            )],
        };
        CommunityMessage::v2c(b"public".as_slice(), notification.to_pdu()).encode()
    }

    #[test]
    fn test_decode_v1_trap() {
        let data = encode_v1_trap();
        match decode_notification(&data).unwrap() {
            Notification::TrapV1 { community, trap } => {
                assert_eq!(community.as_ref(), b"public");
                assert_eq!(trap.generic_trap, GenericTrap::LinkUp.as_i32());
                assert_eq!(trap.time_stamp, 4242);
            }
            other => panic!("expected v1 trap, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_v2_trap() {
        let data = encode_v2_notification(PduType::TrapV2, 0);
        match decode_notification(&data).unwrap() {
            Notification::TrapV2 { notification, .. } => {
                assert_eq!(notification.sys_up_time, 9000);
                assert_eq!(notification.varbinds.len(), 1);
            }
            other => panic!("expected v2 trap, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_inform() {
        let data = encode_v2_notification(PduType::InformRequest, 808);
        match decode_notification(&data).unwrap() {
            Notification::Inform { notification, .. } => {
                assert_eq!(notification.request_id, 808);
            }
            other => panic!("expected inform, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_response_pdu() {
        let pdu = Pdu::get_request(1, &[oid!(1, 3)]);
        let data = CommunityMessage::v2c(b"public".as_slice(), pdu).encode();
        assert!(decode_notification(&data).is_err());
    }

    #[tokio::test]
    async fn test_inform_is_acknowledged() {
        let listener = NotificationListener::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr();

        // A fake agent sends an inform and waits for the Response
        let agent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let inform = encode_v2_notification(PduType::InformRequest, 31001);
        agent.send_to(&inform, listener_addr).await.unwrap();

        let (notification, _source) = listener.recv().await.unwrap();
        match notification {
            Notification::Inform { notification, .. } => {
                assert_eq!(notification.request_id, 31001)
            }
            other => panic!("expected inform, got {:?}", other),
        }

        // The acknowledgement arrives back at the sender
        let mut buf = vec![0u8; 65535];
        let (len, _) = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            agent.recv_from(&mut buf),
        )
        .await
        .expect("no acknowledgement received")
        .unwrap();

        let reply = CommunityMessage::decode(Bytes::copy_from_slice(&buf[..len])).unwrap();
        assert_eq!(reply.pdu.pdu_type, PduType::Response);
        assert_eq!(reply.pdu.request_id, 31001);
        assert_eq!(reply.pdu.varbinds.len(), 2);
    }

    #[tokio::test]
    async fn test_v1_trap_over_socket() {
        let listener = NotificationListener::bind("127.0.0.1:0").await.unwrap();
        let listener_addr = listener.local_addr();

        let agent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        agent.send_to(&encode_v1_trap(), listener_addr).await.unwrap();

        let (notification, _source) = listener.recv().await.unwrap();
        assert!(matches!(notification, Notification::TrapV1 { .. }));
    }
}
