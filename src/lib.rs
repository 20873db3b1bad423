pub mod error;
pub mod crc;
pub mod encoding;
pub mod png;
pub mod zip;
pub mod decorator;
pub mod card;
pub mod read;
pub mod write;
pub mod recovery;
pub mod validate;

pub use error::{CardError, ParseError, Result, ValidationError};
pub use crc::crc32;
pub use encoding::{decode_base64, encode_base64};
pub use card::{Asset, CharacterCard, CharacterCardV1, CharacterCardV2, CharacterData, Lorebook, LorebookEntry};
pub use card::normalize::{detect_version, normalize, CardVersion};
pub use decorator::{parse_decorators, serialize_decorators, Decorator};
pub use read::{read_card, read_card_from_charx, read_card_from_json, read_card_from_png, read_lorebook, CardInput, ReadOptions};
pub use write::{
    write_card_to_charx, write_card_to_json, write_card_to_png, write_lorebook_to_json, write_lorebook_to_png,
    AssetData, WriteCharxOptions, WritePngOptions,
};
pub use recovery::{repair_card, RepairResult};
pub use validate::{validate_card, validate_lorebook, ValidateOptions, ValidationResult};
