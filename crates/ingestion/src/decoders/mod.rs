//! Wire decoder implementations

mod array;
mod binary;
mod json;

pub use array::{ArrayDecoder, ArrayReading, PLACEHOLDER_ARRAY};
pub use binary::{BinaryDecoder, TAG_TERMINATOR};
pub use json::JsonDecoder;
