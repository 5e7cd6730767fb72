//! Base-36 short ids.
//!
//! The insertion counter is rendered in base 36 (`0-9a-z`) to produce the
//! short id handed back to users. Decoding refuses anything longer than
//! [`MAX_ID_LEN`] characters so a hostile id can never overflow the counter.

/// Longest id accepted by [`decode`].
pub const MAX_ID_LEN: usize = 7;

/// Largest counter value whose encoding still fits in [`MAX_ID_LEN`] characters.
pub const MAX_ID: u64 = 36u64.pow(MAX_ID_LEN as u32) - 1;

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("id must not be empty")]
    Empty,

    #[error("id is {len} characters long, at most {MAX_ID_LEN} are allowed")]
    TooLong { len: usize },

    #[error("id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Render `n` in lowercase base 36 with no leading zeros.
pub fn encode(mut n: u64) -> String {
    if n == 0 {
        return "0".to_owned();
    }

    let mut digits = Vec::with_capacity(13);
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }

    digits.iter().rev().map(|&b| b as char).collect()
}

/// Parse a base-36 id back into its counter value.
///
/// Letters are accepted in either case. The length check runs before any
/// digit is looked at.
pub fn decode(id: &str) -> Result<u64, CodecError> {
    let len = id.chars().count();
    if len > MAX_ID_LEN {
        return Err(CodecError::TooLong { len });
    }
    if len == 0 {
        return Err(CodecError::Empty);
    }

    id.chars().try_fold(0u64, |acc, c| {
        let digit = c.to_digit(36).ok_or(CodecError::InvalidChar(c))?;
        Ok(acc * 36 + u64::from(digit))
    })
}
