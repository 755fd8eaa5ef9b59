use super::attribute::{self, Attribute, AttributeError};
use super::types::lookup;
use crate::message_auth::MESSAGE_AUTHENTICATOR;

/// Largest attribute section a packet can carry (4096 - 20 byte header)
pub const MAX_ATTRIBUTE_SECTION: usize = 4096 - 20;

/// Ordered collection of attributes
///
/// Insertion order is preserved and is the order attributes are encoded in.
/// Several attributes of the same type may coexist; they are addressed by
/// their index among attributes of that type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    attributes: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        AttributeSet::default()
    }

    /// Append a copy of `data` as an attribute of `attr_type`
    pub fn add(&mut self, attr_type: u8, data: &[u8]) -> Result<(), AttributeError> {
        self.attributes.push(Attribute::new(attr_type, data)?);
        Ok(())
    }

    /// Append a 32-bit integer attribute in network byte order
    pub fn add_number(&mut self, attr_type: u8, value: u32) -> Result<(), AttributeError> {
        self.add(attr_type, &value.to_be_bytes())
    }

    /// Remove the `index`-th attribute of `attr_type`
    ///
    /// Does nothing if there is no such attribute.
    pub fn remove(&mut self, attr_type: u8, index: usize) {
        if let Some(position) = self.position(attr_type, index) {
            self.attributes.remove(position);
        }
    }

    /// Value of the `index`-th attribute of `attr_type`
    pub fn get(&self, attr_type: u8, index: usize) -> Option<&[u8]> {
        self.position(attr_type, index)
            .map(|position| self.attributes[position].value.as_slice())
    }

    fn position(&self, attr_type: u8, index: usize) -> Option<usize> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, attr)| attr.attr_type == attr_type)
            .nth(index)
            .map(|(position, _)| position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Encode every attribute, in order, into the wire attribute section
    ///
    /// When `message_authenticator` is set, a zeroed Message-Authenticator
    /// is emitted first and any Message-Authenticator already in the set is
    /// skipped; the caller signs it once the packet is complete.
    pub fn encode(
        &self,
        secret: &[u8],
        authenticator: &[u8; 16],
        message_authenticator: bool,
    ) -> Result<Vec<u8>, AttributeError> {
        let mut buffer = Vec::new();

        if message_authenticator {
            buffer.extend_from_slice(&[MESSAGE_AUTHENTICATOR, 18]);
            buffer.extend_from_slice(&[0u8; 16]);
        }

        for attr in &self.attributes {
            if message_authenticator && attr.attr_type == MESSAGE_AUTHENTICATOR {
                continue;
            }

            let wire = attribute::encode(attr.attr_type, secret, authenticator, &attr.value)?;
            let total = buffer.len() + Attribute::HEADER_LENGTH + wire.len();
            if total > MAX_ATTRIBUTE_SECTION {
                return Err(AttributeError::MessageTooLarge(total));
            }

            buffer.push(attr.attr_type);
            buffer.push((wire.len() + Attribute::HEADER_LENGTH) as u8);
            buffer.extend_from_slice(&wire);
        }

        Ok(buffer)
    }

    /// Decode a wire attribute section
    ///
    /// Attributes of unregistered types are skipped (RFC 2865 Section 5
    /// lets a client ignore them); registered ones must satisfy their
    /// length bounds.
    pub fn decode(data: &[u8], secret: &[u8], authenticator: &[u8; 16]) -> Result<Self, AttributeError> {
        let mut set = AttributeSet::new();
        let mut rest = data;

        while !rest.is_empty() {
            if rest.len() < Attribute::HEADER_LENGTH {
                return Err(AttributeError::Malformed(format!(
                    "{} trailing bytes after last attribute",
                    rest.len()
                )));
            }

            let attr_type = rest[0];
            let length = rest[1] as usize;
            if length < Attribute::HEADER_LENGTH || length > rest.len() {
                return Err(AttributeError::Malformed(format!(
                    "attribute {} claims {} bytes, {} available",
                    attr_type,
                    length,
                    rest.len()
                )));
            }

            let wire = &rest[Attribute::HEADER_LENGTH..length];
            if lookup(attr_type).is_none() {
                rest = &rest[length..];
                continue;
            }
            let value = attribute::decode(attr_type, secret, authenticator, wire)?;
            set.add(attr_type, &value)?;
            rest = &rest[length..];
        }

        Ok(set)
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}
