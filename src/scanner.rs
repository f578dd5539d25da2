//! Delimiter-terminated scanning over any [`io::Read`](std::io::Read) source.
//!
//! [`Scanner::getline`](Scanner::getline) drives one protocol step per call
//! and returns a [`ScanResult`](ScanResult). The common case is
//! `FullLine`: a mutable slice of the internal buffer spanning one line
//! including its trailing delimiter. Lines longer than the buffer arrive as
//! a chunk sequence: one `LongLineStart`, any number of `LongLineMid`, then
//! a data-free `LongLineEnd`. Between a start and its end no other variant
//! is emitted.
//!
//! Returned slices borrow the scanner's buffer and are only valid until the
//! next call; the borrow checker enforces this. Every byte of a returned
//! slice is writable, so the delimiter can be overwritten in place (for
//! example with a NUL before handing the line to the kernel as a path).
//! No byte past the end of a returned slice is promised to be writable;
//! sometimes the very next byte is the read-only sentinel.

use std::fs::File;
use std::io;
use std::path::Path;

use memchr::memchr;

use crate::arena::Arena;
use crate::options::Options;

/// Outcome of one [`Scanner::getline`] call.
///
/// Slices are inclusive of the delimiter where one was present and remain
/// valid until the next call on the same scanner.
#[derive(Debug)]
pub enum ScanResult<'a> {
    /// One entire line; the last byte is the delimiter.
    FullLine(&'a mut [u8]),
    /// The final line of an input that did not end with the delimiter;
    /// the last byte is simply the last byte of the input.
    FullLineWithoutEol(&'a mut [u8]),
    /// First chunk of a line too long for the buffer. At least
    /// `min_first_chunk_len` bytes unless the input ended sooner.
    LongLineStart(&'a mut [u8]),
    /// Another chunk of the same long line.
    LongLineMid(&'a mut [u8]),
    /// The long line is complete. Carries no bytes.
    LongLineEnd,
    /// Pause mode is on and the scanner would have to invalidate buffered
    /// data to continue; call [`Scanner::resume_from_pause`] first.
    Paused,
    /// End of input; repeats on every further call.
    Eof,
    /// A read failed. The error is latched and repeats on every further
    /// call once the buffer has drained.
    Err(io::Error),
}

/// Offset form of a result, produced by the state machine before any
/// borrow of the buffer is handed out. Ranges are inclusive.
enum Step {
    FullLine(usize, usize),
    FullLineWithoutEol(usize, usize),
    LongLineStart(usize, usize),
    LongLineMid(usize, usize),
    LongLineEnd,
    Paused,
    Eof,
    ReadErr,
}

/// Delimiter-oriented input scanner.
///
/// Reads large spans from the source directly into a fixed, page-aligned
/// buffer and yields borrowed byte ranges terminated by the configured
/// delimiter. Partial lines at the buffer top are shifted down and
/// completed, so scanning is not zero-copy but "infrequent copy" as long
/// as the buffer is longer than the typical line.
///
/// A scanner is single-threaded by design; `getline` takes `&mut self`
/// and may move buffered bytes under the feet of earlier results, which
/// the borrow rules turn into a compile error instead of a data race.
/// Separate scanners are fully independent. The source is never closed
/// and never seeked; [`Scanner::into_inner`] gives it back.
///
/// # Example
///
/// ```
/// use scan_io::{ScanResult, Scanner};
///
/// let mut scanner = Scanner::new(&b"alpha\nbeta"[..]).unwrap();
/// let mut lines = Vec::new();
/// loop {
///     match scanner.getline() {
///         ScanResult::FullLine(line) => lines.push(line.to_vec()),
///         ScanResult::FullLineWithoutEol(line) => lines.push(line.to_vec()),
///         ScanResult::Eof => break,
///         other => panic!("unexpected result: {:?}", other),
///     }
/// }
/// assert_eq!(lines, vec![b"alpha\n".to_vec(), b"beta".to_vec()]);
/// ```
pub struct Scanner<R> {
    src: R,
    arena: Arena,
    bufsz: usize,
    delim: u8,
    /// Begin and end of buffered bytes not yet returned; `p <= q <= bufsz`.
    p: usize,
    q: usize,
    /// Delimiter position peeked by the previous call, if still buffered.
    next_delim: Option<usize>,
    min_first_chunk: usize,
    in_longline: bool,
    longline_ended: bool,
    eof_seen: bool,
    err: Option<io::Error>,
    pause_on_inval: bool,
    resume_pending: bool,
}

impl<R> Scanner<R>
where
    R: io::Read,
{
    /// Creates a newline-delimited scanner with the default buffer size
    /// of 64 KiB.
    ///
    /// # Example
    ///
    /// ```
    /// use scan_io::{ScanResult, Scanner};
    ///
    /// let mut scanner = Scanner::new(&b"one\ntwo\n"[..]).unwrap();
    /// match scanner.getline() {
    ///     ScanResult::FullLine(line) => assert_eq!(line, b"one\n"),
    ///     other => panic!("unexpected result: {:?}", other),
    /// }
    /// ```
    pub fn new(reader: R) -> io::Result<Scanner<R>> {
        Options::new().open(reader)
    }

    /// Creates a newline-delimited scanner with the given buffer size.
    /// The minimum allowed size is 1. Lines that do not fit into the
    /// buffer in one piece are returned as long-line chunk sequences.
    pub fn with_capacity(reader: R, bufsz: usize) -> io::Result<Scanner<R>> {
        Options::new().buffer_size(bufsz).open(reader)
    }

    pub(crate) fn open(src: R, bufsz: usize, delim: u8) -> io::Result<Scanner<R>> {
        assert!(bufsz >= 1);
        let arena = Arena::new(bufsz, delim)?;
        Ok(Scanner {
            src,
            arena,
            bufsz,
            delim,
            p: 0,
            q: 0,
            next_delim: None,
            min_first_chunk: bufsz,
            in_longline: false,
            longline_ended: false,
            eof_seen: false,
            err: None,
            pause_on_inval: false,
            resume_pending: false,
        })
    }

    /// Returns the next line, chunk, or stream condition.
    ///
    /// One result per call. After the final line of an unterminated input
    /// the next call returns `Eof` (or `Err`), and keeps doing so.
    pub fn getline(&mut self) -> ScanResult<'_> {
        match self.step() {
            Step::FullLine(b, e) => ScanResult::FullLine(self.slice_mut(b, e)),
            Step::FullLineWithoutEol(b, e) => {
                ScanResult::FullLineWithoutEol(self.slice_mut(b, e))
            }
            Step::LongLineStart(b, e) => ScanResult::LongLineStart(self.slice_mut(b, e)),
            Step::LongLineMid(b, e) => ScanResult::LongLineMid(self.slice_mut(b, e)),
            Step::LongLineEnd => ScanResult::LongLineEnd,
            Step::Paused => ScanResult::Paused,
            Step::Eof => ScanResult::Eof,
            Step::ReadErr => ScanResult::Err(self.latched_err()),
        }
    }

    /// Returns an iterator that copies lines out of the buffer,
    /// reassembling long lines from their chunks. Slower than `getline`,
    /// but the yielded [`OwnedLine`]s are independent of the scanner.
    ///
    /// The iterator resumes pauses by itself; manual pause control only
    /// makes sense on the `getline` surface.
    ///
    /// # Example
    ///
    /// ```
    /// use scan_io::Scanner;
    ///
    /// let mut scanner = Scanner::new(&b"one\ntwo\n"[..]).unwrap();
    /// let lines: Result<Vec<_>, _> = scanner.lines().collect();
    /// let lines = lines.unwrap();
    /// assert_eq!(lines[1].content(), b"two");
    /// ```
    pub fn lines(&mut self) -> Lines<'_, R> {
        Lines {
            scanner: self,
            done: false,
        }
    }

    /// Makes `getline` return [`ScanResult::Paused`] instead of
    /// invalidating buffered bytes that were already returned.
    ///
    /// Invalidation happens when the partial line at the buffer top is
    /// shifted down, and when a fully consumed buffer is reset to be
    /// refilled. With pause mode on, each such transition waits for one
    /// [`Scanner::resume_from_pause`] call.
    pub fn enable_pause(&mut self) {
        self.pause_on_inval = true;
    }

    /// Leaves pause mode and forgets a pending resume.
    pub fn disable_pause(&mut self) {
        self.pause_on_inval = false;
        self.resume_pending = false;
    }

    /// Allows the next buffer-invalidating transition to proceed.
    /// Consumed by that transition; benign returns in between (for
    /// example further full lines still in the buffer) do not eat it.
    pub fn resume_from_pause(&mut self) {
        self.resume_pending = true;
    }

    /// Guaranteed minimum length of the first chunk of a long line,
    /// unless the input ends sooner. Defaults to the buffer size.
    pub fn min_first_chunk_len(&self) -> usize {
        self.min_first_chunk
    }

    /// Sets the first-chunk guarantee to `len` bytes, `1..=buffer_size`.
    ///
    /// Values below the buffer size make the scanner shift short partial
    /// lines only as far down as needed for the guarantee, trading copy
    /// volume for buffer utilization. Out-of-range values fail with
    /// `InvalidInput` and leave the setting unchanged.
    pub fn set_min_first_chunk_len(&mut self, len: usize) -> io::Result<()> {
        if len < 1 || len > self.bufsz {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "min_first_chunk_len must be within 1..=buffer_size",
            ));
        }
        self.min_first_chunk = len;
        Ok(())
    }

    /// Size of the working buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.bufsz
    }

    /// The byte that terminates a line.
    pub fn delimiter(&self) -> u8 {
        self.delim
    }

    /// Releases the scan buffer and returns the source, which this crate
    /// never closes.
    pub fn into_inner(self) -> R {
        self.src
    }

    /// One state machine transition, in buffer offsets. Keeping borrows
    /// out of here leaves `getline` and `Lines` free to slice or copy the
    /// resulting range as they see fit.
    fn step(&mut self) -> Step {
        // second half of the two-call long line termination
        if self.longline_ended {
            self.longline_ended = false;
            self.in_longline = false;
            return Step::LongLineEnd;
        }

        if !self.in_longline {
            // fast path A: the previous call already peeked the delimiter
            if let Some(d) = self.next_delim.take() {
                if self.p <= d && d < self.q {
                    return self.emit_full_line(d);
                }
            }
            // fast path B: fresh scan of [p, q)
            if self.p < self.q {
                let d = self.find_delim(self.p);
                if d < self.q {
                    return self.emit_full_line(d);
                }
                // no delimiter buffered; the slow loop resumes above q
                return self.slow(self.q);
            }
        }
        self.slow(self.p)
    }

    /// Everything that is not a buffered full line: refills, shifts,
    /// long-line chunking, end of input, pausing. `scan_from` tracks how
    /// far the delimiter scan has already come, so no byte is scanned
    /// twice within one call.
    fn slow(&mut self, mut scan_from: usize) -> Step {
        loop {
            let more_in_buf = self.p < self.q;
            let mut delim_at = None;
            if more_in_buf {
                // The scan lands on the next delimiter in [scan_from, q),
                // on a stale byte in [q, buftop), or on the sentinel at
                // buftop. Only the first is a hit.
                let d = self.find_delim(scan_from);
                if d < self.q {
                    delim_at = Some(d);
                }
            }
            let end_of_input = self.eof_seen || self.err.is_some();
            let space_above_q = self.q < self.bufsz;
            let space_below_p = self.p > 0;

            if let Some(d) = delim_at {
                if self.in_longline {
                    // final chunk, delimiter included; LongLineEnd follows
                    // on the next call
                    let begin = self.p;
                    self.p = d + 1;
                    self.longline_ended = true;
                    return Step::LongLineMid(begin, d);
                }
                return self.emit_full_line(d);
            }

            if end_of_input {
                if more_in_buf {
                    // Input ended without a trailing delimiter.
                    if space_above_q {
                        let (begin, end) = (self.p, self.q - 1);
                        self.p = self.q;
                        if self.in_longline {
                            self.longline_ended = true;
                            return Step::LongLineMid(begin, end);
                        }
                        return Step::FullLineWithoutEol(begin, end);
                    }
                    if space_below_p {
                        self.shift_down();
                        scan_from = self.q;
                        continue;
                    }
                    // The tail fills the whole buffer. Keep the last byte
                    // back so a later pass can hand it out with writable
                    // space above it. A one-byte buffer has nothing to
                    // split; its tail goes out whole.
                    let begin = self.p;
                    let end = if self.q - self.p > 1 {
                        self.q - 2
                    } else {
                        self.q - 1
                    };
                    self.p = end + 1;
                    return self.long_chunk(begin, end);
                }
                if self.in_longline {
                    self.in_longline = false;
                    return Step::LongLineEnd;
                }
                if self.eof_seen {
                    return Step::Eof;
                }
                return Step::ReadErr;
            }

            if space_above_q {
                if let Some(pre_read_q) = self.fill() {
                    scan_from = pre_read_q;
                }
                continue;
            }

            if more_in_buf {
                if space_below_p {
                    // Freeing space moves bytes already handed out.
                    if self.pause_on_inval && !self.resume_pending {
                        return Step::Paused;
                    }
                    self.shift_down();
                    scan_from = self.q;
                    continue;
                }
                // One line's in-flight bytes fill the buffer entirely.
                let (begin, end) = (self.p, self.q - 1);
                self.p = self.q;
                return self.long_chunk(begin, end);
            }

            // Everything buffered has been returned. Start over from the
            // buffer bottom, or pause first if the caller asked for that.
            if self.pause_on_inval && !self.resume_pending {
                return Step::Paused;
            }
            self.p = 0;
            self.q = 0;
            self.resume_pending = false;
            self.next_delim = None;
            scan_from = 0;
        }
    }

    fn emit_full_line(&mut self, delim_at: usize) -> Step {
        debug_assert!(self.p <= delim_at && delim_at < self.q);
        let begin = self.p;
        self.p = delim_at + 1;
        self.peek();
        Step::FullLine(begin, delim_at)
    }

    fn long_chunk(&mut self, begin: usize, end: usize) -> Step {
        debug_assert!(begin <= end);
        if self.in_longline {
            Step::LongLineMid(begin, end)
        } else {
            self.in_longline = true;
            Step::LongLineStart(begin, end)
        }
    }

    /// Caches the position of the next delimiter if it is already
    /// buffered, arming fast path A for the following call.
    fn peek(&mut self) {
        self.next_delim = None;
        if self.p < self.q {
            let d = self.find_delim(self.p);
            if d < self.q {
                self.next_delim = Some(d);
            }
        }
    }

    /// Position of the first delimiter at or after `from`. The sentinel
    /// guarantees a hit, so the scan runs without a bounds check; hits at
    /// or beyond `q` are stale bytes and mean "none buffered".
    #[inline]
    fn find_delim(&self, from: usize) -> usize {
        from + memchr(self.delim, self.arena.scan_span(from)).unwrap()
    }

    /// One read into `[q, buftop)`. Returns the pre-read `q` on success
    /// so the next delimiter scan can skip the bytes it has already seen;
    /// latches end of input or the error otherwise.
    fn fill(&mut self) -> Option<usize> {
        debug_assert!(self.q < self.bufsz);
        loop {
            let pre_read_q = self.q;
            match self.src.read(self.arena.tail_mut(pre_read_q)) {
                Ok(0) => {
                    self.eof_seen = true;
                    return None;
                }
                Ok(n) => {
                    self.q += n;
                    debug_assert!(self.q <= self.bufsz);
                    return Some(pre_read_q);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.err = Some(e);
                    return None;
                }
            }
        }
    }

    /// Relocates the unread tail `[p, q)` downward to free space above
    /// `q`. Only called with the buffer full to the top and room below.
    /// With the default `min_first_chunk_len` the tail lands at the
    /// buffer bottom; a smaller setting moves short tails only as far
    /// down as the first-chunk guarantee requires.
    fn shift_down(&mut self) {
        debug_assert!(self.q == self.bufsz && self.p > 0);
        let tail = self.q - self.p;
        let dst = if tail < self.min_first_chunk && self.min_first_chunk < self.bufsz {
            self.bufsz - self.min_first_chunk
        } else {
            0
        };
        debug_assert!(dst < self.p);
        self.arena.working_mut().copy_within(self.p..self.q, dst);
        self.p = dst;
        self.q = dst + tail;
        self.resume_pending = false;
        self.next_delim = None;
        debug_assert!(self.q < self.bufsz);
    }

    #[inline]
    fn slice_mut(&mut self, begin: usize, end: usize) -> &mut [u8] {
        &mut self.arena.working_mut()[begin..=end]
    }

    #[inline]
    fn chunk(&self, begin: usize, end: usize) -> &[u8] {
        &self.arena.scan_span(begin)[..end - begin + 1]
    }

    /// Rebuilds the latched read error; `io::Error` is not `Clone`, but
    /// the numeric OS code round-trips exactly.
    fn latched_err(&self) -> io::Error {
        let e = self.err.as_ref().unwrap();
        match e.raw_os_error() {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::from(e.kind()),
        }
    }
}

impl Scanner<File> {
    /// Opens a newline-delimited scanner over a file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use scan_io::Scanner;
    ///
    /// let mut scanner = Scanner::from_path("access.log").unwrap();
    /// for line in scanner.lines() {
    ///     println!("{}", line.unwrap().content().len());
    /// }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Scanner<File>> {
        Scanner::new(File::open(path)?)
    }
}

/// A line copied out of the scanner, independent of its buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedLine {
    /// The line's bytes, including the delimiter if one was present.
    pub bytes: Vec<u8>,
    /// Whether the line ended with the delimiter. Only the final line of
    /// an input can be unterminated.
    pub terminated: bool,
}

impl OwnedLine {
    /// The line without its trailing delimiter.
    pub fn content(&self) -> &[u8] {
        match self.bytes.split_last() {
            Some((_, rest)) if self.terminated => rest,
            _ => &self.bytes,
        }
    }
}

/// Iterator of [`OwnedLine`], returned by [`Scanner::lines`].
pub struct Lines<'a, R>
where
    R: io::Read,
{
    scanner: &'a mut Scanner<R>,
    done: bool,
}

impl<'a, R> Iterator for Lines<'a, R>
where
    R: io::Read,
{
    type Item = io::Result<OwnedLine>;

    fn next(&mut self) -> Option<io::Result<OwnedLine>> {
        if self.done {
            return None;
        }
        let mut long: Option<Vec<u8>> = None;
        loop {
            match self.scanner.step() {
                Step::FullLine(b, e) => {
                    return Some(Ok(OwnedLine {
                        bytes: self.scanner.chunk(b, e).to_vec(),
                        terminated: true,
                    }));
                }
                Step::FullLineWithoutEol(b, e) => {
                    return Some(Ok(OwnedLine {
                        bytes: self.scanner.chunk(b, e).to_vec(),
                        terminated: false,
                    }));
                }
                Step::LongLineStart(b, e) | Step::LongLineMid(b, e) => {
                    long.get_or_insert_with(Vec::new)
                        .extend_from_slice(self.scanner.chunk(b, e));
                }
                Step::LongLineEnd => {
                    let bytes = long.take().unwrap_or_default();
                    let terminated = bytes.last() == Some(&self.scanner.delim);
                    return Some(Ok(OwnedLine { bytes, terminated }));
                }
                Step::Paused => self.scanner.resume_from_pause(),
                Step::Eof => {
                    self.done = true;
                    return None;
                }
                Step::ReadErr => {
                    self.done = true;
                    return Some(Err(self.scanner.latched_err()));
                }
            }
        }
    }
}
