use rand::seq::IndexedRandom;
use rand::Rng;

use crate::shared::constants::{BODY_TYPES_FEMALE, BODY_TYPES_MALE};

pub const UNKNOWN_BODY_TYPE: &str = "Unknown";

/// Placeholder body-type guess: a uniform pick from the gender's list.
///
/// `gender` is matched case-insensitively; anything other than male or
/// female yields [`UNKNOWN_BODY_TYPE`].
pub fn pick<R: Rng + ?Sized>(gender: &str, rng: &mut R) -> String {
    let choices = match gender.trim().to_ascii_lowercase().as_str() {
        "male" => BODY_TYPES_MALE,
        "female" => BODY_TYPES_FEMALE,
        _ => return UNKNOWN_BODY_TYPE.to_string(),
    };
    choices
        .choose(rng)
        .map_or_else(|| UNKNOWN_BODY_TYPE.to_string(), |s| s.to_string())
}
