//! RADIUS packets and identifier allocation

pub mod code;
pub mod id;
pub mod packet;

pub use code::Code;
pub use id::{IdentifierSet, generate_identifier, pick_identifier};
pub use packet::{Packet, PacketError};
