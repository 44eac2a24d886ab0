pub mod wire;
pub mod encoder;
pub mod decoder;

pub use encoder::encode;
pub use decoder::{decode, objlen};

use crate::error::SprotoError;
use crate::pack;
use crate::types::{Sproto, SprotoType};
use crate::value::SprotoValue;

/// `pack(encode(type, value))` in one call.
pub fn pencode(
    sproto: &Sproto,
    sproto_type: &SprotoType,
    value: &SprotoValue,
) -> Result<Vec<u8>, SprotoError> {
    Ok(pack::pack(&encode(sproto, sproto_type, value)?))
}

/// `decode(type, unpack(bytes))` in one call.
pub fn pdecode(
    sproto: &Sproto,
    sproto_type: &SprotoType,
    bytes: &[u8],
) -> Result<SprotoValue, SprotoError> {
    let unpacked = pack::unpack(bytes)?;
    Ok(decode(sproto, sproto_type, &unpacked)?)
}
