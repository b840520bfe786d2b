//! Number literal decoding.
//!
//! The raw tokenizer hands over the whole glued run (`0x1F`, `1_000`,
//! `3.25`, `12abc`); this module decides what it is and reports the first
//! problem.

use tek_diagnostic::ErrorKind;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Number {
    Uint(u64),
    Float(f64),
}

pub(crate) fn parse_number(text: &[u8]) -> Result<Number, ErrorKind> {
    match text {
        [b'0', b'x', digits @ ..] => parse_radix(digits, 16),
        [b'0', b'o', digits @ ..] => parse_radix(digits, 8),
        [b'0', b'b', digits @ ..] => parse_radix(digits, 2),
        _ => parse_decimal(text),
    }
}

fn parse_radix(digits: &[u8], radix: u64) -> Result<Number, ErrorKind> {
    if digits.contains(&b'.') {
        return Err(match radix {
            16 => ErrorKind::LexerHexLiteralsOnlyAllowForInt,
            8 => ErrorKind::LexerOctalLiteralsOnlyAllowForInt,
            _ => ErrorKind::LexerBinaryLiteralsOnlyAllowForInt,
        });
    }
    if digits.iter().all(|&b| b == b'_') {
        return Err(ErrorKind::LexerExpectedIntValueAfterRadixPrefix);
    }

    let mut value: u64 = 0;
    for &b in digits.iter().filter(|&&b| b != b'_') {
        let digit = match b {
            b'0'..=b'9' => u64::from(b - b'0'),
            b'a'..=b'f' => u64::from(b - b'a' + 10),
            b'A'..=b'F' => u64::from(b - b'A' + 10),
            _ => u64::MAX,
        };
        if digit >= radix {
            return Err(match radix {
                2 if b.is_ascii_digit() => ErrorKind::LexerBinaryIntegerCanOnlyHaveZeroAndOne,
                8 if b.is_ascii_digit() => ErrorKind::LexerOctalIntegerHasAMaxDigitOfSeven,
                _ => ErrorKind::LexerExpectedDelimiterAfterNum,
            });
        }
        value = value
            .checked_mul(radix)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ErrorKind::LexerOverflowUint)?;
    }
    Ok(Number::Uint(value))
}

fn parse_decimal(text: &[u8]) -> Result<Number, ErrorKind> {
    let dots = memchr::memchr_iter(b'.', text).count();
    if dots > 1 {
        return Err(ErrorKind::LexerFloatHasMultipleDecimalPoints);
    }
    if text.iter().any(u8::is_ascii_alphabetic) {
        return Err(ErrorKind::LexerExpectedDelimiterAfterNum);
    }

    if dots == 1 {
        let cleaned: String = text
            .iter()
            .filter(|&&b| b != b'_')
            .map(|&b| char::from(b))
            .collect();
        return match cleaned.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Number::Float(value)),
            _ => Err(ErrorKind::LexerOverflowFloat),
        };
    }

    let mut value: u64 = 0;
    for &b in text.iter().filter(|&&b| b != b'_') {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or(ErrorKind::LexerOverflowUint)?;
    }
    Ok(Number::Uint(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests;
