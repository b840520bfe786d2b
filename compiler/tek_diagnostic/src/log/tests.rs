use super::*;
use pretty_assertions::assert_eq;
use std::thread;

fn file(raw: u32) -> FileId {
    FileId::new(raw).unwrap()
}

#[test]
fn test_empty_log() {
    let log = ErrorLog::with_capacity(16).unwrap();
    assert!(!log.has_errors());
    assert!(log.is_empty());
    assert_eq!(log.iter().count(), 0);
}

#[test]
fn test_add_keeps_order_and_args() {
    let log = ErrorLog::with_capacity(16).unwrap();
    let first = Error::at_token(ErrorKind::LexerUnsupportedToken, file(1), 4);
    let second = Error::new(
        ErrorKind::InvalidFilePath,
        ErrorArg::Str(StrId::new(3).unwrap()),
        ErrorArg::Errno(2),
    );
    assert_eq!(log.add(first), 0);
    assert_eq!(log.add(second), 1);

    assert!(log.has_errors());
    assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![first, second]);
    assert_eq!(log.get(1), Some(&second));
    assert_eq!(log.count_of(ErrorKind::InvalidFilePath), 1);
}

#[test]
fn test_error_file() {
    let token = Error::at_tokens(ErrorKind::LexerInvalidCloseBracket, file(2), 5, 1);
    assert_eq!(token.file(), Some(file(2)));
    let path = Error::new(ErrorKind::VirtMem, ErrorArg::Errno(12), ErrorArg::None);
    assert_eq!(path.file(), None);
}

#[test]
fn test_concurrent_adds_get_distinct_slots() {
    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 250;

    let log = ErrorLog::with_capacity(4096).unwrap();
    thread::scope(|s| {
        for t in 0..THREADS {
            let log = &log;
            s.spawn(move || {
                for i in 0..PER_THREAD {
                    log.add(Error::at_token(ErrorKind::LexerUnsupportedToken, file(t + 1), i));
                }
            });
        }
    });

    assert_eq!(log.len(), (THREADS * PER_THREAD) as usize);
    let mut seen: Vec<(u32, u32)> = log
        .iter()
        .map(|error| match error.args[0] {
            ErrorArg::Token { file, token } => (file.raw(), token),
            other => panic!("unexpected arg {other:?}"),
        })
        .collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), (THREADS * PER_THREAD) as usize);
}

#[test]
fn test_errors_are_stored_in_the_log_segment() {
    let log = ErrorLog::with_capacity(16).unwrap();
    assert!(log.capacity >= 16);
    log.add(Error::at_token(ErrorKind::LexerUnsupportedToken, file(1), 0));

    let start = log.segments.addr(ERRORS);
    let end = start + log.segments.capacity(ERRORS);
    let addr = std::ptr::from_ref(log.get(0).unwrap()) as usize;
    assert!((start..end).contains(&addr));
}

#[test]
fn test_reset_empties_the_log() {
    let mut log = ErrorLog::with_capacity(16).unwrap();
    log.add(Error::at_token(ErrorKind::LexerUnsupportedToken, file(1), 0));
    log.add(Error::at_token(ErrorKind::LexerUnsupportedToken, file(1), 1));
    log.reset().unwrap();

    assert!(log.is_empty());
    assert_eq!(log.get(0), None);
    let again = Error::at_token(ErrorKind::LexerInvalidUtf8, file(2), 3);
    assert_eq!(log.add(again), 0);
    assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![again]);
}
