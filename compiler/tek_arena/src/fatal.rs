//! Process abort for exhausted static capacities.

use std::fmt;

/// Logs `args` and aborts the process.
///
/// Used when a table reserved at startup runs out of room. Nothing about
/// the run can be trusted past that point, so unwinding is not attempted.
#[cold]
pub fn abort(args: fmt::Arguments<'_>) -> ! {
    tracing::error!("fatal: {args}");
    eprintln!("fatal: {args}");
    std::process::abort()
}

/// Aborts the process with a formatted message. See [`abort`].
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::abort(::std::format_args!($($arg)*))
    };
}
