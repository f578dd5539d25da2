//! Open-time configuration of a scanner.
//!
//! [`Options`](Options) collects everything `open` needs to know: the
//! working buffer size, the delimiter byte, and whether the test-only
//! environment override of the buffer size is honored. The override policy
//! is deliberately part of the per-open configuration rather than a
//! process-wide toggle, so one test harness opting in cannot change the
//! behavior of unrelated scanners in the same process.
//!
//! # Example
//!
//! ```no_run
//! use scan_io::Options;
//! use std::io::stdin;
//!
//! // NUL-delimited records, 1 MiB buffer.
//! let mut scanner = Options::new()
//!     .buffer_size(1 << 20)
//!     .delimiter(b'\0')
//!     .open(stdin())
//!     .unwrap();
//! // (...)
//! ```

use std::env;
use std::io;

use crate::scanner::Scanner;

/// Default working buffer size of 64 KiB.
pub(crate) const BUFSIZE: usize = 64 * 1024;

/// Environment variable consulted by [`Options::allow_bufsz_env`].
///
/// Intended for test harnesses only: sweeping tiny buffer sizes over one
/// binary exercises the fussy code where a line ends within a couple of
/// bytes of the buffer top. Values must be decimal integers in
/// `[1, 2 GiB]`; anything else is ignored silently.
pub const FORCE_BUFSZ_ENV: &str = "SCAN_IO_FORCE_BUFSZ";

const ENV_BUFSZ_MAX: u64 = 2 * 1024 * 1024 * 1024;

/// Configuration for opening a [`Scanner`].
#[derive(Debug, Clone)]
pub struct Options {
    bufsz: usize,
    delimiter: u8,
    allow_bufsz_env: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            bufsz: BUFSIZE,
            delimiter: b'\n',
            allow_bufsz_env: false,
        }
    }
}

impl Options {
    /// Newline-delimited lines, 64 KiB buffer, no environment override.
    pub fn new() -> Options {
        Options::default()
    }

    /// Sets the working buffer size in bytes. Lines up to this size
    /// (including the delimiter) are returned in one piece; longer lines
    /// arrive as chunks. The minimum allowed size is 1.
    pub fn buffer_size(mut self, bufsz: usize) -> Options {
        self.bufsz = bufsz;
        self
    }

    /// Sets the byte that terminates a line, e.g. `b'\n'` or `b'\0'`.
    pub fn delimiter(mut self, delimiter: u8) -> Options {
        self.delimiter = delimiter;
        self
    }

    /// Lets [`FORCE_BUFSZ_ENV`] override the configured buffer size.
    /// Off by default; leave it off outside of test harnesses.
    pub fn allow_bufsz_env(mut self, allow: bool) -> Options {
        self.allow_bufsz_env = allow;
        self
    }

    /// Opens a scanner over `reader` with this configuration.
    ///
    /// Fails if the buffer arena cannot be allocated or its sentinel page
    /// cannot be write-protected. No scanner state survives a failure.
    ///
    /// # Panics
    ///
    /// If the configured buffer size is 0.
    pub fn open<R: io::Read>(self, reader: R) -> io::Result<Scanner<R>> {
        let bufsz = if self.allow_bufsz_env {
            env_bufsz().unwrap_or(self.bufsz)
        } else {
            self.bufsz
        };
        Scanner::open(reader, bufsz, self.delimiter)
    }
}

fn env_bufsz() -> Option<usize> {
    let val = env::var(FORCE_BUFSZ_ENV).ok()?;
    match val.trim().parse::<u64>() {
        Ok(n) if n >= 1 && n <= ENV_BUFSZ_MAX => Some(n as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the environment is process-global and the test harness
    // runs threads in parallel.
    #[test]
    fn bufsz_env_override() {
        env::set_var(FORCE_BUFSZ_ENV, "16");
        let s = Options::new()
            .buffer_size(64)
            .allow_bufsz_env(true)
            .open(&b""[..])
            .unwrap();
        assert_eq!(s.buffer_size(), 16);

        // not opted in
        let s = Options::new().buffer_size(64).open(&b""[..]).unwrap();
        assert_eq!(s.buffer_size(), 64);

        // unparsable and out-of-range values are ignored
        for bad in ["zebra", "0", "-3", "9999999999999"] {
            env::set_var(FORCE_BUFSZ_ENV, bad);
            let s = Options::new()
                .buffer_size(64)
                .allow_bufsz_env(true)
                .open(&b""[..])
                .unwrap();
            assert_eq!(s.buffer_size(), 64, "override {:?} not ignored", bad);
        }

        env::remove_var(FORCE_BUFSZ_ENV);
    }
}
