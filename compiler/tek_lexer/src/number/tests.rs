use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn parse(text: &str) -> Result<Number, ErrorKind> {
    parse_number(text.as_bytes())
}

#[test]
fn test_decimal_and_radix_integers() {
    assert_eq!(parse("0"), Ok(Number::Uint(0)));
    assert_eq!(parse("1_000_000"), Ok(Number::Uint(1_000_000)));
    assert_eq!(parse("0xFf"), Ok(Number::Uint(255)));
    assert_eq!(parse("0o17"), Ok(Number::Uint(15)));
    assert_eq!(parse("0b1010_1010"), Ok(Number::Uint(170)));
    assert_eq!(parse("18446744073709551615"), Ok(Number::Uint(u64::MAX)));
}

#[test]
fn test_floats() {
    assert_eq!(parse("2.5"), Ok(Number::Float(2.5)));
    assert_eq!(parse("1_0.2_5"), Ok(Number::Float(10.25)));
}

#[test]
fn test_errors() {
    assert_eq!(parse("0b102"), Err(ErrorKind::LexerBinaryIntegerCanOnlyHaveZeroAndOne));
    assert_eq!(parse("0o78"), Err(ErrorKind::LexerOctalIntegerHasAMaxDigitOfSeven));
    assert_eq!(parse("0b1.0"), Err(ErrorKind::LexerBinaryLiteralsOnlyAllowForInt));
    assert_eq!(parse("0o1.0"), Err(ErrorKind::LexerOctalLiteralsOnlyAllowForInt));
    assert_eq!(parse("0x1.0"), Err(ErrorKind::LexerHexLiteralsOnlyAllowForInt));
    assert_eq!(parse("1.2.3"), Err(ErrorKind::LexerFloatHasMultipleDecimalPoints));
    assert_eq!(parse("0x"), Err(ErrorKind::LexerExpectedIntValueAfterRadixPrefix));
    assert_eq!(parse("0b__"), Err(ErrorKind::LexerExpectedIntValueAfterRadixPrefix));
    assert_eq!(parse("12abc"), Err(ErrorKind::LexerExpectedDelimiterAfterNum));
    assert_eq!(parse("0xfg"), Err(ErrorKind::LexerExpectedDelimiterAfterNum));
    assert_eq!(parse("18446744073709551616"), Err(ErrorKind::LexerOverflowUint));
    assert_eq!(parse("0x1_0000_0000_0000_0000"), Err(ErrorKind::LexerOverflowUint));
}

#[test]
fn test_float_overflow() {
    let huge = format!("1{}.0", "0".repeat(400));
    assert_eq!(parse(&huge), Err(ErrorKind::LexerOverflowFloat));
}

proptest! {
    #[test]
    fn decimal_integers_decode(value in any::<u64>()) {
        prop_assert_eq!(parse(&value.to_string()), Ok(Number::Uint(value)));
    }

    #[test]
    fn hex_integers_decode(value in any::<u64>()) {
        prop_assert_eq!(parse(&format!("0x{value:x}")), Ok(Number::Uint(value)));
        prop_assert_eq!(parse(&format!("0b{value:b}")), Ok(Number::Uint(value)));
    }
}
