//! Fatal panic protocol
//!
//! Unrecoverable runtime errors terminate the process with a fixed text
//! format on the error stream:
//!
//! ```text
//! panic VM<code>: <message>
//! ```
//!
//! followed by `exit(1)`. Tooling scrapes this exact format; do not change
//! the prefix, the code placement, or the separator.

use std::io::Write;

/// Integer overflow / non-representable shift count.
pub const CODE_OVERFLOW: u32 = 1101;

/// A numeric result would exceed the limb-count ceiling.
pub const CODE_SIZE_LIMIT: u32 = 3201;

/// Generic numeric domain error (underflow, negative-to-unsigned, ...).
pub const CODE_NUMERIC: u32 = 3202;

/// Division or modulo by zero.
pub const CODE_DIVIDE_BY_ZERO: u32 = 3203;

/// Report a fatal runtime error and terminate the process.
///
/// Never returns. The message goes to stderr in the fixed
/// `panic VM<code>: <message>` format, then the process exits with
/// status 1.
pub fn raise(code: u32, message: &str) -> ! {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "panic VM{code}: {message}");
    let _ = err.flush();
    std::process::exit(1);
}
