//! Single-attribute validation and wire transforms

use super::types::{MAX_ATTRIBUTE_SIZE, Transform, lookup};
use crate::auth::{decrypt_user_password, encrypt_user_password};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Invalid attribute type: {0}")]
    InvalidType(u8),
    #[error("Invalid length {length} for attribute {attr_type} (allowed {min}..={max})")]
    InvalidLength {
        attr_type: u8,
        length: usize,
        min: usize,
        max: usize,
    },
    #[error("Encoded attribute too long: {0} bytes")]
    BufferTooSmall(usize),
    #[error("Invalid attribute format: {0}")]
    InvalidFormat(String),
    #[error("Attribute section too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("Malformed attribute section: {0}")]
    Malformed(String),
}

/// RADIUS Attribute structure as defined in RFC 2865 Section 5
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `value` always holds the decoded (plain) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type (1 byte)
    pub attr_type: u8,
    /// Attribute value (0-253 bytes)
    pub value: Vec<u8>,
}

impl Attribute {
    /// Type + length header size
    pub const HEADER_LENGTH: usize = 2;
    /// Maximum attribute length (255 bytes including type and length)
    pub const MAX_LENGTH: usize = 255;

    /// Create a validated attribute
    pub fn new(attr_type: u8, value: impl Into<Vec<u8>>) -> Result<Self, AttributeError> {
        let value = value.into();
        is_valid(attr_type, &value)?;
        Ok(Attribute { attr_type, value })
    }

    /// Create an integer attribute (32-bit big-endian)
    pub fn integer(attr_type: u8, value: u32) -> Result<Self, AttributeError> {
        Self::new(attr_type, value.to_be_bytes())
    }

    /// Try to interpret value as a string
    pub fn as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.value.clone())
    }

    /// Try to interpret value as an integer (32-bit big-endian)
    pub fn as_integer(&self) -> Result<u32, AttributeError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            AttributeError::InvalidFormat(format!(
                "Expected 4 bytes for integer, got {}",
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }
}

/// Check that `data` is an acceptable value for `attr_type`
pub fn is_valid(attr_type: u8, data: &[u8]) -> Result<(), AttributeError> {
    let record = lookup(attr_type).ok_or(AttributeError::InvalidType(attr_type))?;
    if data.len() < record.min_length || data.len() > record.max_length {
        return Err(AttributeError::InvalidLength {
            attr_type,
            length: data.len(),
            min: record.min_length,
            max: record.max_length,
        });
    }
    Ok(())
}

/// Produce the wire form of a value
///
/// `authenticator` is the Request Authenticator of the packet being built;
/// it salts the User-Password transform.
pub fn encode(
    attr_type: u8,
    secret: &[u8],
    authenticator: &[u8; 16],
    value: &[u8],
) -> Result<Vec<u8>, AttributeError> {
    is_valid(attr_type, value)?;
    let record = lookup(attr_type).ok_or(AttributeError::InvalidType(attr_type))?;

    let wire = match record.transform {
        Transform::Plain => value.to_vec(),
        Transform::UserPassword => encrypt_user_password(value, secret, authenticator),
    };

    if wire.len() > MAX_ATTRIBUTE_SIZE {
        return Err(AttributeError::BufferTooSmall(wire.len()));
    }
    Ok(wire)
}

/// Recover the plain form of a received value
///
/// User-Password values lose any trailing NUL bytes; see
/// [`decrypt_user_password`].
pub fn decode(
    attr_type: u8,
    secret: &[u8],
    authenticator: &[u8; 16],
    wire: &[u8],
) -> Result<Vec<u8>, AttributeError> {
    let record = lookup(attr_type).ok_or(AttributeError::InvalidType(attr_type))?;

    let value = match record.transform {
        Transform::Plain => wire.to_vec(),
        Transform::UserPassword => decrypt_user_password(wire, secret, authenticator)
            .ok_or_else(|| {
                AttributeError::InvalidFormat(format!(
                    "User-Password length {} is not a positive multiple of 16",
                    wire.len()
                ))
            })?,
    };

    is_valid(attr_type, &value)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeType;

    #[test]
    fn test_integer_attribute() {
        let attr = Attribute::integer(AttributeType::ServiceType.as_u8(), 1234).unwrap();
        assert_eq!(attr.value, vec![0, 0, 0x04, 0xD2]);
        assert_eq!(attr.as_integer().unwrap(), 1234);
    }

    #[test]
    fn test_is_valid_bounds() {
        let password = AttributeType::UserPassword.as_u8();
        assert!(is_valid(password, &[b'x'; 100]).is_ok());
        assert!(matches!(
            is_valid(password, &[b'x'; 200]),
            Err(AttributeError::InvalidLength { length: 200, min: 1, max: 128, .. })
        ));
        assert!(is_valid(password, &[]).is_err());
        assert!(is_valid(AttributeType::NasPort.as_u8(), &[0, 0, 0]).is_err());
        assert!(is_valid(AttributeType::UserName.as_u8(), &[b'a'; 253]).is_ok());
        assert!(is_valid(AttributeType::UserName.as_u8(), &[b'a'; 254]).is_err());
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(is_valid(0, b"x"), Err(AttributeError::InvalidType(0)));
        assert_eq!(is_valid(17, b"x"), Err(AttributeError::InvalidType(17)));
        assert_eq!(
            decode(255, b"s", &[0u8; 16], b"x"),
            Err(AttributeError::InvalidType(255))
        );
    }

    #[test]
    fn test_plain_encode_is_identity() {
        let wire = encode(1, b"secret", &[0u8; 16], b"testUser").unwrap();
        assert_eq!(wire, b"testUser");
        assert_eq!(decode(1, b"secret", &[0u8; 16], &wire).unwrap(), b"testUser");
    }

    #[test]
    fn test_user_password_transform() {
        let auth: [u8; 16] = hex::decode("ac9dc16208c4c78ba12f250ac41d3641")
            .unwrap()
            .try_into()
            .unwrap();
        let wire = encode(2, b"foo", &auth, b"accept").unwrap();
        assert_eq!(hex::encode(&wire), "588dffda37f9e4ca19ae49b7166d5827");
        assert_eq!(decode(2, b"foo", &auth, &wire).unwrap(), b"accept");
    }

    #[test]
    fn test_user_password_bad_wire_length() {
        let result = decode(2, b"foo", &[0u8; 16], &[1u8; 20]);
        assert!(matches!(result, Err(AttributeError::InvalidFormat(_))));
    }
}
