//! RADIUS attributes: registry, per-attribute codec and ordered sets

pub mod attribute;
pub mod set;
pub mod types;

pub use attribute::{Attribute, AttributeError, decode, encode, is_valid};
pub use set::{AttributeSet, MAX_ATTRIBUTE_SECTION};
pub use types::{
    AttributeRecord, AttributeType, MAX_ATTRIBUTE_SIZE, Transform, attribute_name_to_number,
    attribute_number_to_name, lookup,
};
