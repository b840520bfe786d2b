use super::*;
use pretty_assertions::assert_eq;

fn decode(body: &[u8]) -> Result<Vec<u8>, ErrorKind> {
    let mut out = Vec::new();
    unescape(body, &mut out).map(|()| out)
}

#[test]
fn test_plain_text_is_copied() {
    assert_eq!(decode(b"hello, world"), Ok(b"hello, world".to_vec()));
    assert_eq!(decode("héllo".as_bytes()), Ok("héllo".as_bytes().to_vec()));
}

#[test]
fn test_simple_escapes() {
    assert_eq!(
        decode(br#"\n\r\t\0\\\"\'"#),
        Ok(b"\n\r\t\0\\\"'".to_vec())
    );
}

#[test]
fn test_hex_escape() {
    assert_eq!(decode(br"\x41\x7e\xFF"), Ok(vec![0x41, 0x7e, 0xff]));
}

#[test]
fn test_bad_escapes() {
    assert_eq!(decode(br"\q"), Err(ErrorKind::LexerInvalidStringEscSequence));
    assert_eq!(decode(b"\\"), Err(ErrorKind::LexerInvalidStringEscSequence));
    assert_eq!(decode(br"\x4"), Err(ErrorKind::LexerInvalidStringAsciiEscCharCodeFmt));
    assert_eq!(decode(br"\xg0"), Err(ErrorKind::LexerInvalidStringAsciiEscCharCodeFmt));
}

#[test]
fn test_output_is_cleared_first() {
    let mut out = b"stale".to_vec();
    unescape(b"new", &mut out).unwrap();
    assert_eq!(out, b"new");
}
