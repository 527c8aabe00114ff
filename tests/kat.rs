//! Known-answer tests for the USM cryptography, using the RFC 3414
//! appendix vectors, plus end-to-end authenticate/encrypt round trips
//! over real message encodings.

use bytes::Bytes;
use usnmp::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
use usnmp::oid;
use usnmp::pdu::Pdu;
use usnmp::v3::{
    authenticate_message, verify_message, AuthProtocol, LocalizedKey, PrivKey, PrivProtocol,
    UsmSecurityParams,
};

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

const RFC_ENGINE_ID: &str = "000000000000000000000002";

/// RFC 3414 A.3.1: "maplesyrup" localized with MD5.
#[test]
fn test_rfc3414_a3_1_md5() {
    let engine_id = hex(RFC_ENGINE_ID);
    let key = LocalizedKey::from_password(AuthProtocol::Md5, b"maplesyrup", &engine_id).unwrap();

    assert_eq!(key.as_bytes().len(), 16);
    assert_eq!(
        to_hex(key.as_bytes()),
        "526f5eed9fcce26f8964c2930787d82b",
        "MD5 localized key mismatch"
    );
}

/// RFC 3414 A.3.2: "maplesyrup" localized with SHA-1.
#[test]
fn test_rfc3414_a3_2_sha1() {
    let engine_id = hex(RFC_ENGINE_ID);
    let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"maplesyrup", &engine_id).unwrap();

    assert_eq!(key.as_bytes().len(), 20);
    assert_eq!(
        to_hex(key.as_bytes()),
        "6695febc9288e36282235fc7151f128497b38f3f",
        "SHA-1 localized key mismatch"
    );
}

/// RFC 3414 A.5.1: key for the new password "newsyrup" (MD5).
#[test]
fn test_rfc3414_a5_1_md5_new_password() {
    let engine_id = hex(RFC_ENGINE_ID);
    let key = LocalizedKey::from_password(AuthProtocol::Md5, b"newsyrup", &engine_id).unwrap();

    assert_eq!(
        to_hex(key.as_bytes()),
        "87021d7bd9d101ba05ea6e3bf9d9bd4a",
        "MD5 'newsyrup' localized key mismatch"
    );
}

/// RFC 3414 A.5.2: key for the new password "newsyrup" (SHA-1).
#[test]
fn test_rfc3414_a5_2_sha1_new_password() {
    let engine_id = hex(RFC_ENGINE_ID);
    let key = LocalizedKey::from_password(AuthProtocol::Sha1, b"newsyrup", &engine_id).unwrap();

    assert_eq!(
        to_hex(key.as_bytes()),
        "78e2dcce79d59403b58c1bbaa5bff46391f1cd25",
        "SHA-1 'newsyrup' localized key mismatch"
    );
}

fn build_auth_message(key: &LocalizedKey) -> Vec<u8> {
    let global = MsgGlobalData::new(4097, 65535, MsgFlags::new(SecurityLevel::AuthNoPriv, true));
    let usm = UsmSecurityParams::new(
        Bytes::from(hex(RFC_ENGINE_ID)),
        11,
        2500,
        b"authuser".as_slice(),
    )
    .with_auth_placeholder(12);

    let pdu = Pdu::get_request(4097, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
    let scoped = ScopedPdu::new(Bytes::from(hex(RFC_ENGINE_ID)), Bytes::new(), pdu);
    let msg = V3Message::new(global, usm.encode(), scoped);

    let mut encoded = msg.encode().to_vec();
    let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();
    assert_eq!(len, 12);
    authenticate_message(key, &mut encoded, offset, len);
    encoded
}

/// Authenticate a full message, then verify; flipping any byte of the
/// payload or the MAC makes verification fail.
#[test]
fn test_message_mac_roundtrip_and_tamper() {
    for protocol in [AuthProtocol::Md5, AuthProtocol::Sha1] {
        let engine_id = hex(RFC_ENGINE_ID);
        let key = LocalizedKey::from_password(protocol, b"maplesyrup", &engine_id).unwrap();

        let encoded = build_auth_message(&key);
        let (offset, len) = UsmSecurityParams::find_auth_params_offset(&encoded).unwrap();

        assert!(verify_message(&key, &encoded, offset, len));

        // Every single-byte flip must break verification
        for i in 0..encoded.len() {
            let mut tampered = encoded.clone();
            tampered[i] ^= 0x01;
            assert!(
                !verify_message(&key, &tampered, offset, len),
                "flip at byte {} went undetected ({:?})",
                i,
                protocol
            );
        }
    }
}

/// Privacy round trip of a real scoped-PDU encoding for every protocol.
#[test]
fn test_scoped_pdu_privacy_roundtrip() {
    let engine_id = hex(RFC_ENGINE_ID);
    let pdu = Pdu::get_request(7001, &[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)]);
    let scoped = ScopedPdu::new(Bytes::from(engine_id.clone()), Bytes::new(), pdu);
    let plaintext = scoped.encode_to_bytes();

    for protocol in [
        PrivProtocol::Des,
        PrivProtocol::TripleDes,
        PrivProtocol::Aes128,
        PrivProtocol::Aes192,
        PrivProtocol::Aes256,
    ] {
        let mut priv_key = PrivKey::from_password(
            AuthProtocol::Sha1,
            protocol,
            b"privpassword",
            &engine_id,
        )
        .unwrap();

        let (ciphertext, priv_params) = priv_key.encrypt(&plaintext, 11, 2500, None).unwrap();
        assert_ne!(ciphertext.as_ref(), plaintext.as_ref(), "{:?}", protocol);
        assert_eq!(priv_params.len(), 8, "{:?}", protocol);

        let decrypted = priv_key
            .decrypt(&ciphertext, 11, 2500, &priv_params)
            .unwrap();

        // CBC modes may append padding; the scoped PDU decodes from the
        // prefix either way
        let mut decoder = usnmp::ber::Decoder::new(decrypted);
        let recovered = ScopedPdu::decode(&mut decoder).unwrap();
        assert_eq!(recovered.pdu.request_id, 7001, "{:?}", protocol);
        assert_eq!(
            recovered.pdu.varbinds[0].oid,
            oid!(1, 3, 6, 1, 2, 1, 1, 5, 0),
            "{:?}",
            protocol
        );
    }
}

/// The extension rule yields stable keys for protocols that outgrow
/// the auth digest.
#[test]
fn test_extended_privacy_keys_are_deterministic() {
    let engine_id = hex(RFC_ENGINE_ID);

    for protocol in [
        PrivProtocol::TripleDes,
        PrivProtocol::Aes192,
        PrivProtocol::Aes256,
    ] {
        let mut a =
            PrivKey::from_password(AuthProtocol::Md5, protocol, b"privpassword", &engine_id)
                .unwrap();
        let b = PrivKey::from_password(AuthProtocol::Md5, protocol, b"privpassword", &engine_id)
            .unwrap();

        let (ciphertext, priv_params) = a.encrypt(b"determinism check!", 1, 2, None).unwrap();
        let decrypted = b.decrypt(&ciphertext, 1, 2, &priv_params).unwrap();
        assert_eq!(&decrypted[..18], b"determinism check!", "{:?}", protocol);
    }
}
