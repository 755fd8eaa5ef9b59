//! RADIUS Protocol Implementation
//!
//! Client-side RADIUS codec as defined in RFC 2865, with the RFC 3579
//! Message-Authenticator.
//!
//! # Features
//!
//! - Attribute registry with per-type length bounds
//! - User-Password hiding
//! - Request/Response Authenticator calculation
//! - Packet identifier allocation that avoids requests in flight
//! - Stream framing via [`Packet::bytes_needed`]
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{AttributeSet, AttributeType, Code, Packet};
//!
//! let secret = b"testing123";
//!
//! let mut attrs = AttributeSet::new();
//! attrs.add(AttributeType::UserName.as_u8(), b"alice").unwrap();
//! attrs.add(AttributeType::UserPassword.as_u8(), b"password").unwrap();
//!
//! let none: [&Packet; 0] = [];
//! let request = Packet::new_request(secret, Code::ACCESS_REQUEST, &attrs, none).unwrap();
//! let response = Packet::new_response(secret, Code::ACCESS_ACCEPT, &AttributeSet::new(), &request).unwrap();
//!
//! let outstanding = [request];
//! let (matched, reply) = Packet::decode_response(secret, response.encode(), &outstanding).unwrap();
//! assert!(matched.is_some());
//! assert_eq!(reply.code(), Code::ACCESS_ACCEPT);
//! ```

pub mod attributes;
pub mod auth;
pub mod message_auth;
pub mod packet;

pub use attributes::{
    Attribute, AttributeError, AttributeSet, AttributeType, attribute_name_to_number,
    attribute_number_to_name,
};
pub use auth::{
    calculate_response_authenticator, decrypt_user_password, encrypt_user_password,
    generate_request_authenticator, verify_response_authenticator,
};
pub use message_auth::{calculate_message_authenticator, verify_message_authenticator};
pub use packet::{Code, Packet, PacketError};
