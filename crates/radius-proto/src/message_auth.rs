//! Message-Authenticator Support (RFC 2869, RFC 3579)
//!
//! Message-Authenticator provides integrity protection using HMAC-MD5.
//!
//! Per RFC 3579 Section 3.2 the HMAC is computed over the entire packet with:
//! - the Message-Authenticator value set to all zeros
//! - the Request Authenticator in the header (for responses, the request's
//!   authenticator replaces the Response Authenticator, which is computed
//!   afterwards)
//!
//! Packets whose exchange can be forged by the Blast-RADIUS attack
//! (Access-Request and every possible reply) carry one whenever a shared
//! secret is in use. Unix socket transports use an empty secret and skip it.

use crate::packet::Code;
use hmac::{Hmac, Mac};
use md5_digest::Md5;

type HmacMd5 = Hmac<Md5>;

/// Message-Authenticator attribute type
pub const MESSAGE_AUTHENTICATOR: u8 = 80;

/// Whether packets of `code` carry a Message-Authenticator under `secret`
pub fn requires_message_authenticator(secret: &[u8], code: Code) -> bool {
    !secret.is_empty()
        && matches!(
            code,
            Code::ACCESS_REQUEST | Code::ACCESS_ACCEPT | Code::ACCESS_REJECT | Code::ACCESS_CHALLENGE
        )
}

fn mac(packet_bytes: &[u8], secret: &[u8], value_offset: usize, authenticator: Option<&[u8; 16]>) -> HmacMd5 {
    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(&packet_bytes[..4]);
    match authenticator {
        Some(authenticator) => mac.update(authenticator),
        None => mac.update(&packet_bytes[4..20]),
    }
    mac.update(&packet_bytes[20..value_offset]);
    mac.update(&[0u8; 16]);
    mac.update(&packet_bytes[value_offset + 16..]);
    mac
}

/// Calculate Message-Authenticator for a RADIUS packet
///
/// # Arguments
/// * `packet_bytes` - The complete RADIUS packet bytes
/// * `secret` - The shared secret
/// * `value_offset` - Byte offset of the Message-Authenticator value (after type+length)
/// * `authenticator` - Replaces the header authenticator (responses use the request's)
///
/// The current content of the value is ignored.
pub fn calculate_message_authenticator(
    packet_bytes: &[u8],
    secret: &[u8],
    value_offset: usize,
    authenticator: Option<&[u8; 16]>,
) -> [u8; 16] {
    let bytes = mac(packet_bytes, secret, value_offset, authenticator)
        .finalize()
        .into_bytes();
    let mut output = [0u8; 16];
    output.copy_from_slice(&bytes);
    output
}

/// Verify Message-Authenticator in a RADIUS packet
///
/// Returns false if the value does not fit in the packet.
pub fn verify_message_authenticator(
    packet_bytes: &[u8],
    secret: &[u8],
    value_offset: usize,
    authenticator: Option<&[u8; 16]>,
) -> bool {
    if value_offset < 20 || value_offset + 16 > packet_bytes.len() {
        return false;
    }

    let received = &packet_bytes[value_offset..value_offset + 16];
    // Constant-time comparison
    mac(packet_bytes, secret, value_offset, authenticator)
        .verify_slice(received)
        .is_ok()
}

/// Find the value offset of the first Message-Authenticator attribute
///
/// `packet_bytes` must be a framed packet; attributes are walked from
/// offset 20 and the walk stops at the first malformed header.
pub fn find_message_authenticator(packet_bytes: &[u8]) -> Option<usize> {
    let mut offset = 20;
    while offset + 2 <= packet_bytes.len() {
        let attr_type = packet_bytes[offset];
        let length = packet_bytes[offset + 1] as usize;
        if length < 2 || offset + length > packet_bytes.len() {
            return None;
        }
        if attr_type == MESSAGE_AUTHENTICATOR && length == 18 {
            return Some(offset + 2);
        }
        offset += length;
    }
    None
}
