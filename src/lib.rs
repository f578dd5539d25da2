//! This library provides an(other) attempt at reading delimiter-terminated
//! input, line by line, faster than conventional buffered readers.
//!
//! [`Scanner`](Scanner) reads large spans directly from its source into a
//! fixed, page-aligned buffer and returns borrowed byte ranges ending at a
//! configurable delimiter, typically `b'\n'` or `b'\0'`. Returned
//! [`ScanResult`](ScanResult) slices point into that buffer, so the common
//! case involves no copying at all. A partial line at the buffer top is
//! shifted down and completed, which makes the scanner "infrequent copy"
//! rather than zero-copy; lines that do not fit into the buffer even then
//! are delivered safely in chunks.
//!
//! Most of the speed comes from never looking at input one byte at a time.
//! The buffer is followed by a read-only sentinel page whose first byte is
//! the delimiter, so the vectorized [`memchr`](memchr::memchr) scan for the
//! next line end needs no per-call bound and cannot run off the allocation.
//!
//! # Example
//!
//! ```
//! use scan_io::{ScanResult, Scanner};
//!
//! let mut scanner = Scanner::new(&b"alpha\nbeta\ngamma\n"[..]).unwrap();
//! let mut n = 0;
//! loop {
//!     match scanner.getline() {
//!         ScanResult::FullLine(_) => n += 1,
//!         ScanResult::Eof => break,
//!         other => panic!("unexpected result: {:?}", other),
//!     }
//! }
//! assert_eq!(n, 3);
//! ```
//!
//! # Long lines
//!
//! Every line that fits into the buffer (including its delimiter) arrives
//! as a single `FullLine`. A longer line arrives as one `LongLineStart`,
//! any number of `LongLineMid`, then a data-free `LongLineEnd`. Callers
//! that can ignore overly long lines simply skip those three variants.
//! The first chunk is guaranteed to hold at least
//! [`min_first_chunk_len`](Scanner::min_first_chunk_len) bytes unless the
//! input ends sooner; by default that guarantee equals the buffer size.
//!
//! # Buffer invalidation and pausing
//!
//! Results borrow the scanner's buffer and are invalidated by the next
//! call, which the borrow checker enforces. Callers who batch up work per
//! buffer generation instead can [`enable_pause`](Scanner::enable_pause):
//! `getline` then returns [`ScanResult::Paused`] whenever it would have to
//! move or overwrite already-returned bytes, and waits for
//! [`resume_from_pause`](Scanner::resume_from_pause).
//!
//! # Configuration
//!
//! Buffer size, delimiter, and the test-only environment override of the
//! buffer size are set through [`Options`](Options):
//!
//! ```no_run
//! use scan_io::Options;
//! use std::io::stdin;
//!
//! let mut scanner = Options::new()
//!     .buffer_size(1 << 20)
//!     .delimiter(b'\0')
//!     .open(stdin())
//!     .unwrap();
//! // (...)
//! ```
//!
//! # Owned lines
//!
//! Where borrowing is inconvenient, [`Scanner::lines`] yields
//! [`OwnedLine`](OwnedLine)s, copied out of the buffer and with long lines
//! already reassembled:
//!
//! ```
//! use scan_io::Scanner;
//!
//! let mut scanner = Scanner::new(&b"one\ntwo\n"[..]).unwrap();
//! let lines: Result<Vec<_>, _> = scanner.lines().collect();
//! assert_eq!(lines.unwrap().len(), 2);
//! ```

extern crate memchr;

#[macro_use]
extern crate serde_derive;
extern crate serde;

mod arena;
pub mod options;
pub mod scanner;

pub use crate::options::Options;
pub use crate::scanner::{Lines, OwnedLine, ScanResult, Scanner};
