use super::Code;
use super::id::generate_identifier;
use crate::attributes::{AttributeError, AttributeSet};
use crate::auth::{
    calculate_response_authenticator, generate_request_authenticator,
    verify_response_authenticator,
};
use crate::message_auth::{
    calculate_message_authenticator, find_message_authenticator, requires_message_authenticator,
    verify_message_authenticator,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Incomplete packet: {0} more bytes needed")]
    Incomplete(usize),
    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),
    #[error("All 256 packet identifiers are in use")]
    RangeExhausted,
    #[error("Message-Authenticator missing")]
    MissingMessageAuthenticator,
    #[error("Message-Authenticator does not verify")]
    InvalidMessageAuthenticator,
}

/// RADIUS Packet structure as defined in RFC 2865 Section 3
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// |                         Authenticator                         |
/// |                                                               |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A packet is immutable: it holds its validated wire bytes together with
/// the decoded view of its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
    attributes: AttributeSet,
}

const OFFSET_CODE: usize = 0;
const OFFSET_ID: usize = 1;
const OFFSET_LENGTH: usize = 2;
const OFFSET_AUTH: usize = 4;
const OFFSET_ATTRS: usize = 20;

impl Packet {
    /// Minimum RADIUS packet size (20 bytes: 1 code + 1 id + 2 length + 16 authenticator)
    pub const MIN_PACKET_SIZE: usize = 20;
    /// Maximum RADIUS packet size (4096 bytes as per RFC 2865)
    pub const MAX_PACKET_SIZE: usize = 4096;

    /// Build a new request
    ///
    /// The identifier is chosen so it collides with none of `outstanding`,
    /// the packets still awaiting a reply on the same connection. The
    /// Request Authenticator is fresh random data.
    pub fn new_request<'a, I>(
        secret: &[u8],
        code: Code,
        attrs: &AttributeSet,
        outstanding: I,
    ) -> Result<Self, PacketError>
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let identifier = generate_identifier(outstanding)?;
        let authenticator = generate_request_authenticator();
        let signed = requires_message_authenticator(secret, code);

        let section = attrs.encode(secret, &authenticator, signed)?;
        let mut data = assemble(code, identifier, &authenticator, &section)?;
        if signed {
            sign(&mut data, secret, None);
        }

        Self::decode(secret, &data)
    }

    /// Build the reply to `request`
    ///
    /// The identifier is copied from the request and the Response
    /// Authenticator is computed over the encoded reply with the request's
    /// authenticator in the header position. Hidden attributes are salted
    /// with the request's authenticator.
    pub fn new_response(
        secret: &[u8],
        code: Code,
        attrs: &AttributeSet,
        request: &Packet,
    ) -> Result<Self, PacketError> {
        let request_authenticator = request.authenticator();
        let signed = requires_message_authenticator(secret, code);

        let section = attrs.encode(secret, &request_authenticator, signed)?;
        let mut data = assemble(code, request.identifier(), &request_authenticator, &section)?;
        if signed {
            sign(&mut data, secret, None);
        }

        let response_authenticator =
            calculate_response_authenticator(&data, &request_authenticator, secret);
        data[OFFSET_AUTH..OFFSET_ATTRS].copy_from_slice(&response_authenticator);

        let attributes = AttributeSet::decode(&data[OFFSET_ATTRS..], secret, &request_authenticator)?;
        Ok(Packet { data, attributes })
    }

    /// Decode and validate one packet from the start of `data`
    ///
    /// Bytes past the declared length are ignored. No authenticator or
    /// Message-Authenticator check is done here; see [`Packet::decode_request`]
    /// and [`Packet::decode_response`].
    pub fn decode(secret: &[u8], data: &[u8]) -> Result<Self, PacketError> {
        let data = frame(data)?;
        let attributes = AttributeSet::decode(&data[OFFSET_ATTRS..], secret, &header_authenticator(&data))?;
        Ok(Packet { data, attributes })
    }

    /// Decode a received request
    ///
    /// If `outstanding` holds a packet with the same identifier it is
    /// returned as a possible duplicate; the caller decides whether to
    /// replay its cached answer instead of processing the request again.
    pub fn decode_request<'a, I>(
        secret: &[u8],
        data: &[u8],
        outstanding: I,
    ) -> Result<(Self, Option<&'a Packet>), PacketError>
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let packet = Self::decode(secret, data)?;

        if requires_message_authenticator(secret, packet.code()) {
            let offset = find_message_authenticator(&packet.data)
                .ok_or(PacketError::MissingMessageAuthenticator)?;
            if !verify_message_authenticator(&packet.data, secret, offset, None) {
                return Err(PacketError::InvalidMessageAuthenticator);
            }
        }

        let duplicate = outstanding
            .into_iter()
            .find(|candidate| candidate.identifier() == packet.identifier());
        Ok((packet, duplicate))
    }

    /// Decode a received response and match it to the request it answers
    ///
    /// A request matches when its identifier is equal and the Response
    /// Authenticator (and Message-Authenticator, where required) verify
    /// against it. No match means a stale or forged packet, which is not an
    /// error: the first element is `None`. Hidden attributes of a matched
    /// reply are revealed with the request's authenticator.
    pub fn decode_response<'a, I>(
        secret: &[u8],
        data: &[u8],
        outstanding: I,
    ) -> Result<(Option<&'a Packet>, Self), PacketError>
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let data = frame(data)?;
        let request = outstanding
            .into_iter()
            .find(|request| is_reply_to(&data, request, secret));

        let salt = request.map_or_else(|| header_authenticator(&data), Packet::authenticator);
        let attributes = AttributeSet::decode(&data[OFFSET_ATTRS..], secret, &salt)?;
        Ok((request, Packet { data, attributes }))
    }

    /// Whether this packet is an authentic reply to `request`
    pub fn answers(&self, request: &Packet, secret: &[u8]) -> bool {
        is_reply_to(&self.data, request, secret)
    }

    /// How many more bytes must be read before `buffer` can be decoded
    ///
    /// Until the header is complete this is the remainder of the header;
    /// afterwards, the remainder of the declared length. `None` when the
    /// declared length exceeds the protocol maximum, i.e. the stream cannot
    /// be resynchronised.
    pub fn bytes_needed(buffer: &[u8]) -> Option<usize> {
        if buffer.len() < Self::MIN_PACKET_SIZE {
            return Some(Self::MIN_PACKET_SIZE - buffer.len());
        }

        let length = declared_length(buffer);
        if length > Self::MAX_PACKET_SIZE {
            return None;
        }
        Some(length.saturating_sub(buffer.len()))
    }

    /// Wire representation
    pub fn encode(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn code(&self) -> Code {
        Code(self.data[OFFSET_CODE])
    }

    pub fn identifier(&self) -> u8 {
        self.data[OFFSET_ID]
    }

    pub fn length(&self) -> usize {
        self.data.len()
    }

    pub fn authenticator(&self) -> [u8; 16] {
        header_authenticator(&self.data)
    }

    /// Decoded attributes
    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    /// Value of the `index`-th attribute of `attr_type`
    pub fn attribute(&self, attr_type: u8, index: usize) -> Option<&[u8]> {
        self.attributes.get(attr_type, index)
    }
}

/// Validate the header of `data` and cut it to the declared length
fn frame(data: &[u8]) -> Result<Vec<u8>, PacketError> {
    if data.len() < Packet::MIN_PACKET_SIZE {
        return Err(PacketError::Incomplete(Packet::MIN_PACKET_SIZE - data.len()));
    }

    let length = declared_length(data);
    if !(Packet::MIN_PACKET_SIZE..=Packet::MAX_PACKET_SIZE).contains(&length) {
        return Err(PacketError::InvalidLength(length));
    }
    if length > data.len() {
        return Err(PacketError::InvalidLength(length));
    }

    Ok(data[..length].to_vec())
}

fn header_authenticator(data: &[u8]) -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    authenticator.copy_from_slice(&data[OFFSET_AUTH..OFFSET_ATTRS]);
    authenticator
}

fn is_reply_to(data: &[u8], request: &Packet, secret: &[u8]) -> bool {
    if data[OFFSET_ID] != request.identifier() {
        return false;
    }

    let request_authenticator = request.authenticator();
    if !verify_response_authenticator(data, &request_authenticator, secret) {
        return false;
    }

    if requires_message_authenticator(secret, Code(data[OFFSET_CODE])) {
        return find_message_authenticator(data).is_some_and(|offset| {
            verify_message_authenticator(data, secret, offset, Some(&request_authenticator))
        });
    }

    true
}

fn declared_length(buffer: &[u8]) -> usize {
    u16::from_be_bytes([buffer[OFFSET_LENGTH], buffer[OFFSET_LENGTH + 1]]) as usize
}

fn assemble(
    code: Code,
    identifier: u8,
    authenticator: &[u8; 16],
    section: &[u8],
) -> Result<Vec<u8>, PacketError> {
    let length = OFFSET_ATTRS + section.len();
    if length > Packet::MAX_PACKET_SIZE {
        return Err(PacketError::InvalidLength(length));
    }

    let mut data = Vec::with_capacity(length);
    data.push(code.as_u8());
    data.push(identifier);
    data.extend_from_slice(&(length as u16).to_be_bytes());
    data.extend_from_slice(authenticator);
    data.extend_from_slice(section);
    Ok(data)
}

/// Fill in the Message-Authenticator reserved at the start of the attributes
fn sign(data: &mut [u8], secret: &[u8], authenticator: Option<&[u8; 16]>) {
    let offset = OFFSET_ATTRS + 2;
    let mac = calculate_message_authenticator(data, secret, offset, authenticator);
    data[offset..offset + 16].copy_from_slice(&mac);
}
