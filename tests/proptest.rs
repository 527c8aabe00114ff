//! Property tests: decode(encode(x)) = x across the codec stack.

use bytes::Bytes;
use proptest::prelude::*;
use usnmp::ber::{Decoder, EncodeBuf};
use usnmp::message::CommunityMessage;
use usnmp::oid::Oid;
use usnmp::pdu::{Pdu, PduType};
use usnmp::value::Value;
use usnmp::varbind::VarBind;
use usnmp::version::Version;

fn arb_oid() -> impl Strategy<Value = Oid> {
    // Valid X.690 shapes: arc1 in 0..3, arc2 bounded for arc1 < 2
    (0u32..3, 0u32..40, prop::collection::vec(any::<u32>(), 0..10)).prop_map(
        |(arc1, arc2, rest)| {
            let mut arcs = vec![arc1, arc2];
            arcs.extend(rest);
            Oid::from_slice(&arcs)
        },
    )
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        prop::collection::vec(any::<u8>(), 0..128)
            .prop_map(|v| Value::OctetString(Bytes::from(v))),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(|v| Value::Opaque(Bytes::from(v))),
        any::<u64>().prop_map(Value::Counter64),
        Just(Value::NoSuchObject),
        Just(Value::NoSuchInstance),
        Just(Value::EndOfMibView),
    ]
}

fn arb_varbinds() -> impl Strategy<Value = Vec<VarBind>> {
    prop::collection::vec(
        (arb_oid(), arb_value()).prop_map(|(oid, value)| VarBind::new(oid, value)),
        0..6,
    )
}

fn arb_pdu_type() -> impl Strategy<Value = PduType> {
    prop_oneof![
        Just(PduType::GetRequest),
        Just(PduType::GetNextRequest),
        Just(PduType::Response),
        Just(PduType::SetRequest),
        Just(PduType::GetBulkRequest),
        Just(PduType::InformRequest),
        Just(PduType::TrapV2),
        Just(PduType::Report),
    ]
}

proptest! {
    #[test]
    fn value_roundtrip(value in arb_value()) {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = Value::decode(&mut decoder).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert!(decoder.is_empty());
    }

    #[test]
    fn oid_roundtrip(oid in arb_oid()) {
        let decoded = Oid::from_ber(&oid.to_ber()).unwrap();
        prop_assert_eq!(decoded, oid);
    }

    #[test]
    fn oid_string_roundtrip(oid in arb_oid()) {
        let parsed = Oid::parse(&oid.to_string()).unwrap();
        prop_assert_eq!(parsed, oid);
    }

    #[test]
    fn oid_first_byte_combines_arcs(
        arc1 in 0u32..3,
        arc2 in 0u32..40,
        rest in prop::collection::vec(any::<u32>(), 0..4),
    ) {
        let mut arcs = vec![arc1, arc2];
        arcs.extend(rest);
        let oid = Oid::from_slice(&arcs);
        let ber = oid.to_ber();
        // arc2 < 40 and arc1 < 3 means the first subid fits in one byte
        prop_assert_eq!(ber[0] as u32, 40 * arc1 + arc2);
    }

    #[test]
    fn pdu_roundtrip(
        pdu_type in arb_pdu_type(),
        request_id in 1i32..i32::MAX,
        error_status in 0i32..19,
        error_index in 0i32..10,
        varbinds in arb_varbinds(),
    ) {
        let pdu = Pdu { pdu_type, request_id, error_status, error_index, varbinds };

        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        let decoded = Pdu::decode(&mut decoder).unwrap();

        // Positional equality covers varbind order
        prop_assert_eq!(decoded, pdu);
    }

    #[test]
    fn community_message_roundtrip(
        v1 in any::<bool>(),
        community in prop::collection::vec(any::<u8>(), 0..24),
        request_id in 1i32..i32::MAX,
        varbinds in arb_varbinds(),
    ) {
        let version = if v1 { Version::V1 } else { Version::V2c };
        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        };
        let msg = CommunityMessage::new(version, Bytes::from(community.clone()), pdu.clone());

        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        prop_assert_eq!(decoded.version, version);
        prop_assert_eq!(decoded.community.as_ref(), community.as_slice());
        prop_assert_eq!(decoded.pdu, pdu);
    }

    #[test]
    fn counter32_diff_mod_2_32(a in any::<u32>(), b in any::<u32>()) {
        let earlier = Value::Counter32(a);
        let later = Value::Counter32(b);
        let diff = earlier.counter_diff(&later).unwrap();
        prop_assert_eq!(diff, Value::Counter32(b.wrapping_sub(a)));
    }

    #[test]
    fn counter64_diff_mod_2_64(a in any::<u64>(), b in any::<u64>()) {
        let earlier = Value::Counter64(a);
        let later = Value::Counter64(b);
        let diff = earlier.counter_diff(&later).unwrap();
        prop_assert_eq!(diff, Value::Counter64(b.wrapping_sub(a)));
    }
}
