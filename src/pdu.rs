//! SNMP Protocol Data Units.
//!
//! [`Pdu`] covers the uniform request/response operations. The two
//! notification shapes get their own types: [`TrapV1Pdu`] because the
//! RFC 1157 trap has a completely different field layout, and
//! [`NotificationV2`] because V2Trap/Inform pin sysUpTime.0 and
//! snmpTrapOID.0 to the first two varbind positions.

use crate::ber::{tag, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::{decode_varbind_list, encode_varbind_list, VarBind};

/// Well-known OIDs fixed by the protocol.
pub mod well_known {
    use crate::oid::Oid;

    /// sysUpTime.0 (1.3.6.1.2.1.1.3.0) - first varbind of every v2 notification.
    pub fn sys_up_time() -> Oid {
        crate::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
    }

    /// snmpTrapOID.0 (1.3.6.1.6.3.1.1.4.1.0) - second varbind of every v2 notification.
    pub fn snmp_trap_oid() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
    }
}

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from a tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Generic PDU for the uniform operations.
///
/// For GETBULK the two middle integers carry non-repeaters and
/// max-repetitions instead of error-status and error-index; the
/// [`non_repeaters`](Self::non_repeaters) /
/// [`max_repetitions`](Self::max_repetitions) accessors name that
/// aliasing.
///
/// Equality is positional over the varbind list.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request ID correlating requests and responses
    pub request_id: i32,
    /// Error status (or non-repeaters for GETBULK)
    pub error_status: i32,
    /// Error index, 1-based (or max-repetitions for GETBULK)
    pub error_index: i32,
    /// Variable bindings, order significant
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET request.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a GETNEXT request.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type: PduType::GetNextRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Create a SET request from OID/value pairs.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Create a GETBULK request.
    pub fn get_bulk_request(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().map(|oid| VarBind::null(oid.clone())).collect(),
        }
    }

    /// Non-repeaters field of a GETBULK request.
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// Max-repetitions field of a GETBULK request.
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// Assign a random request ID if the caller left it zero.
    ///
    /// Request IDs are drawn uniformly from `[1, 2^31)` so replies can
    /// always be matched. Called by the engine before every encode.
    pub fn ensure_request_id(&mut self) {
        if self.request_id == 0 {
            self.request_id = crate::util::random_request_id();
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    ///
    /// TrapV1 (0xA4) has a different field layout and is rejected here;
    /// use [`TrapV1Pdu::decode`].
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let t = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(t)
            .ok_or_else(|| Error::decode(decoder.offset(), DecodeErrorKind::UnknownPduType(t)))?;
        if pdu_type == PduType::TrapV1 {
            return Err(Error::UnexpectedPduType { tag: t });
        }

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Get the error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Build the Response acknowledging this Inform.
    ///
    /// Per RFC 3416 the acknowledgement reuses the request-id; the
    /// body carries the notification's header varbinds back.
    pub fn inform_response(&self) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds: self.varbinds.iter().take(2).cloned().collect(),
        }
    }
}

/// SNMPv1 generic trap codes (RFC 1157 Section 4.1.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    /// Vendor-specific; see the specific-trap field.
    EnterpriseSpecific = 6,
}

impl GenericTrap {
    /// Create from integer value.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ColdStart),
            1 => Some(Self::WarmStart),
            2 => Some(Self::LinkDown),
            3 => Some(Self::LinkUp),
            4 => Some(Self::AuthenticationFailure),
            5 => Some(Self::EgpNeighborLoss),
            6 => Some(Self::EnterpriseSpecific),
            _ => None,
        }
    }

    /// Get the integer value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv1 Trap PDU (RFC 1157 Section 4.1.6).
///
/// Tag 0xA4. Unlike every other PDU it carries no request-id or error
/// fields; it names the reporting enterprise and agent directly.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// Enterprise OID (sysObjectID of the reporting entity)
    pub enterprise: Oid,
    /// IP address of the reporting agent
    pub agent_addr: [u8; 4],
    /// Generic trap code
    pub generic_trap: i32,
    /// Specific trap code (meaningful for enterpriseSpecific)
    pub specific_trap: i32,
    /// sysUpTime at trap generation, hundredths of a second
    pub time_stamp: u32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Create a new SNMPv1 Trap PDU.
    pub fn new(
        enterprise: Oid,
        agent_addr: [u8; 4],
        generic_trap: GenericTrap,
        specific_trap: i32,
        time_stamp: u32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            enterprise,
            agent_addr,
            generic_trap: generic_trap.as_i32(),
            specific_trap,
            time_stamp,
            varbinds,
        }
    }

    /// The RFC 3584 translation of this trap to a v2 snmpTrapOID value.
    ///
    /// Generic traps 0-5 map to snmpTraps.{n+1}; enterprise-specific
    /// traps map to enterprise.0.specificTrap.
    pub fn v2_trap_oid(&self) -> Oid {
        if self.generic_trap == GenericTrap::EnterpriseSpecific.as_i32() {
            self.enterprise.append(&[0, self.specific_trap as u32])
        } else {
            crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 5).child((self.generic_trap + 1) as u32)
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;

        let enterprise = pdu.read_oid()?;

        let agent_len = pdu.expect_tag(tag::application::IP_ADDRESS)?;
        if agent_len != 4 {
            return Err(Error::decode(
                pdu.offset(),
                DecodeErrorKind::InvalidIpAddressLength { length: agent_len },
            ));
        }
        let agent_bytes = pdu.read_bytes(4)?;
        let agent_addr = [
            agent_bytes[0],
            agent_bytes[1],
            agent_bytes[2],
            agent_bytes[3],
        ];

        let generic_trap = pdu.read_integer()?;
        let specific_trap = pdu.read_integer()?;
        let time_stamp = pdu.read_unsigned32(tag::application::TIMETICKS)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}

/// SNMPv2 notification body (V2Trap and Inform).
///
/// RFC 3416 pins the first two varbinds of a v2 notification to
/// sysUpTime.0 and snmpTrapOID.0. This type keeps those as dedicated
/// fields: encoding injects them at positions 0 and 1, decoding
/// extracts and removes them, so `varbinds` holds only the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationV2 {
    /// Whether this is a TrapV2 (unacknowledged) or Inform (acknowledged).
    pub pdu_type: PduType,
    /// Request ID (informs are acknowledged by it).
    pub request_id: i32,
    /// sysUpTime.0 at generation, hundredths of a second.
    pub sys_up_time: u32,
    /// snmpTrapOID.0 naming the notification type.
    pub trap_oid: Oid,
    /// Payload varbinds (without the two header varbinds).
    pub varbinds: Vec<VarBind>,
}

impl NotificationV2 {
    /// Create a V2Trap notification.
    pub fn trap(sys_up_time: u32, trap_oid: Oid, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::TrapV2,
            request_id: 0,
            sys_up_time,
            trap_oid,
            varbinds,
        }
    }

    /// Create an Inform notification.
    pub fn inform(sys_up_time: u32, trap_oid: Oid, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::InformRequest,
            request_id: 0,
            sys_up_time,
            trap_oid,
            varbinds,
        }
    }

    /// Lower into a generic [`Pdu`] with the header varbinds injected
    /// at positions 0 and 1.
    pub fn to_pdu(&self) -> Pdu {
        let mut varbinds = Vec::with_capacity(self.varbinds.len() + 2);
        varbinds.push(VarBind::new(
            well_known::sys_up_time(),
            Value::TimeTicks(self.sys_up_time),
        ));
        varbinds.push(VarBind::new(
            well_known::snmp_trap_oid(),
            Value::ObjectIdentifier(self.trap_oid.clone()),
        ));
        varbinds.extend(self.varbinds.iter().cloned());

        Pdu {
            pdu_type: self.pdu_type,
            request_id: self.request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Lift a decoded TrapV2/Inform [`Pdu`] back into the dedicated form.
    ///
    /// The first two varbinds must be sysUpTime.0 (TimeTicks) and
    /// snmpTrapOID.0 (OID); they are removed from the payload list.
    pub fn from_pdu(pdu: Pdu) -> Result<Self> {
        if !matches!(pdu.pdu_type, PduType::TrapV2 | PduType::InformRequest) {
            return Err(Error::UnexpectedPduType {
                tag: pdu.pdu_type.tag(),
            });
        }

        let mut varbinds = pdu.varbinds.into_iter();

        let sys_up_time = match varbinds.next() {
            Some(vb) if vb.oid == well_known::sys_up_time() => match vb.value {
                Value::TimeTicks(t) => t,
                _ => {
                    return Err(Error::decode(0, DecodeErrorKind::MissingNotificationHeader));
                }
            },
            _ => return Err(Error::decode(0, DecodeErrorKind::MissingNotificationHeader)),
        };

        let trap_oid = match varbinds.next() {
            Some(vb) if vb.oid == well_known::snmp_trap_oid() => match vb.value {
                Value::ObjectIdentifier(oid) => oid,
                _ => {
                    return Err(Error::decode(0, DecodeErrorKind::MissingNotificationHeader));
                }
            },
            _ => return Err(Error::decode(0, DecodeErrorKind::MissingNotificationHeader)),
        };

        Ok(Self {
            pdu_type: pdu.pdu_type,
            request_id: pdu.request_id,
            sys_up_time,
            trap_oid,
            varbinds: varbinds.collect(),
        })
    }

    /// Encode to BER via the generic PDU form.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        self.to_pdu().encode(buf);
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        Self::from_pdu(Pdu::decode(decoder)?)
    }
}
