use thiserror::Error;

const SEPARATOR: char = ',';

/// A decoded command. Lives only between parsing and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub target: String,
    pub value: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed command (missing ','): {0:?}")]
    MalformedCommand(String),
}

/// Splits `raw` on the first separator into target name and value.
///
/// The name is kept verbatim. The value goes through [`parse_int_lenient`], so
/// `"fan,on"` yields `Command { target: "fan", value: 0 }` instead of an error.
pub fn parse(raw: &str) -> Result<Command, ParseError> {
    let (target, value) = raw
        .split_once(SEPARATOR)
        .ok_or_else(|| ParseError::MalformedCommand(raw.to_string()))?;

    Ok(Command {
        target: target.to_string(),
        value: parse_int_lenient(value),
    })
}

/// Permissive integer conversion in the style of C's `atol`.
///
/// Skips leading whitespace, accepts one optional sign and then consumes ASCII
/// digits until the first non-digit. No digits at all gives `0`. Values outside
/// the `i32` range saturate.
pub fn parse_int_lenient(text: &str) -> i32 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(digit - b'0');
        // past this point the result saturates anyway
        if value > i64::from(i32::MAX) + 1 {
            break;
        }
    }

    let signed = if negative { -value } else { value };
    signed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
