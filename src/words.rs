//! Conversions between 16-bit register words and wider values.
//!
//! Multi-register values on the X2 are always sent most significant word first.

/// Combine up to four words, most significant first, into one integer.
///
/// Shifts are relative to the slice's own length, so `[0x0001, 0x0002]` and
/// `[0, 0, 0x0001, 0x0002]` both give `0x0001_0002`. An empty slice gives `0`.
/// More than four words do not fit a `u64` and give `None`.
pub fn combine_words(words: &[u16]) -> Option<u64> {
    if words.len() > 4 {
        return None;
    }
    Some(words.iter().fold(0u64, |acc, &w| (acc << 16) | w as u64))
}

/// Split a value into words, most significant first, without leading zero words.
///
/// `0` splits to `[0]`.
pub fn split_words(value: u64) -> Vec<u16> {
    let limbs = [
        (value >> 48) as u16,
        (value >> 32) as u16,
        (value >> 16) as u16,
        value as u16,
    ];
    let first = limbs.iter().position(|&w| w != 0).unwrap_or(3);
    limbs[first..].to_vec()
}

/// Split a 32-bit value into exactly two words, high word first.
pub const fn split_u32(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, value as u16]
}

/// Decode two registers as an IEEE 754 single, high word first.
pub fn decode_f32(words: &[u16]) -> Option<f32> {
    match words {
        [hi, lo] => Some(f32::from_bits(((*hi as u32) << 16) | *lo as u32)),
        _ => None,
    }
}

/// Round to three decimal places for display and logging.
pub fn round3(value: f32) -> f64 {
    (value as f64 * 1000.0).round() / 1000.0
}

/// Payload of the set-time register: epoch seconds then a zero UTC offset.
///
/// Always four words. Epochs with a zero high word still send it.
pub const fn set_time_payload(epoch_secs: u32) -> [u16; 4] {
    let [hi, lo] = split_u32(epoch_secs);
    [hi, lo, 0, 0]
}

/// Epoch seconds from a read-time reply. The trailing offset words are ignored.
pub fn epoch_from_time_words(words: &[u16]) -> Option<u32> {
    match words {
        [hi, lo, ..] => combine_words(&[*hi, *lo]).map(|t| t as u32),
        _ => None,
    }
}
