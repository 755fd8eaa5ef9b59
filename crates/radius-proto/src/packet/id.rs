//! Packet identifier allocation
//!
//! An identifier must not collide with any packet still in flight on the
//! same connection, otherwise responses cannot be matched to requests.

use super::packet::{Packet, PacketError};

/// Bitmap of identifiers in use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet([u64; 4]);

impl IdentifierSet {
    pub fn new() -> Self {
        IdentifierSet::default()
    }

    pub fn insert(&mut self, id: u8) {
        self.0[(id >> 6) as usize] |= 1u64 << (id & 63);
    }

    pub fn contains(&self, id: u8) -> bool {
        self.0[(id >> 6) as usize] & (1u64 << (id & 63)) != 0
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(|word| *word == u64::MAX)
    }
}

impl<'a> FromIterator<&'a Packet> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = &'a Packet>>(iter: I) -> Self {
        let mut used = IdentifierSet::new();
        for packet in iter {
            used.insert(packet.identifier());
        }
        used
    }
}

/// Candidate identifiers in the order they are tried
///
/// Starts at `seed` and alternates outwards, wrapping around the byte range.
/// Even seeds step upward first, odd seeds downward first.
fn search_order(seed: u8) -> impl Iterator<Item = u8> {
    let upward_first = seed % 2 == 0;
    std::iter::once(seed).chain((1..=128u16).flat_map(move |step| {
        let up = seed.wrapping_add(step as u8);
        let down = seed.wrapping_sub(step as u8);
        if upward_first { [up, down] } else { [down, up] }
    }))
}

/// First identifier not in `used`, searching from `seed`
pub fn pick_identifier(seed: u8, used: &IdentifierSet) -> Option<u8> {
    search_order(seed).find(|id| !used.contains(*id))
}

/// Allocate an identifier unused by every packet in `outstanding`
///
/// Fails with [`PacketError::RangeExhausted`] when all 256 identifiers are
/// taken.
pub fn generate_identifier<'a, I>(outstanding: I) -> Result<u8, PacketError>
where
    I: IntoIterator<Item = &'a Packet>,
{
    let seed: u8 = rand::random();
    let used: IdentifierSet = outstanding.into_iter().collect();
    pick_identifier(seed, &used).ok_or(PacketError::RangeExhausted)
}
