//! Global logging backend.
//!
//! Implements the `log` facade on top of a fixed ring of formatted lines.
//! Every line also goes to an optional byte sink (the debug UART on real
//! hardware). Nothing here allocates, so logging stays usable while the
//! update path is tearing the rest of the firmware down.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Maximum lines kept in the ring.
pub const MAX_LOG_ENTRIES: usize = 64;

/// Longest line kept; longer lines are truncated.
pub const LOG_LINE_LEN: usize = 120;

/// Output sink (e.g. a UART transmit routine).
pub type LogSink = fn(&str);

/// The firmware-wide logger instance.
pub static LOGGER: BufferLogger = BufferLogger::new();

// ═══════════════════════════════════════════════════════════════════════════
// LOG LINE
// ═══════════════════════════════════════════════════════════════════════════

/// One formatted log line.
#[derive(Clone, Copy)]
pub struct LogLine {
    level: Level,
    len: usize,
    bytes: [u8; LOG_LINE_LEN],
}

impl LogLine {
    const EMPTY: Self = Self {
        level: Level::Trace,
        len: 0,
        bytes: [0; LOG_LINE_LEN],
    };

    /// Severity of the line.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Text of the line.
    pub fn as_str(&self) -> &str {
        // Only whole UTF-8 sequences are ever appended
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("")
    }
}

impl fmt::Debug for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogLine")
            .field("level", &self.level)
            .field("text", &self.as_str())
            .finish()
    }
}

impl Write for LogLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            let mut utf8 = [0u8; 4];
            let encoded = ch.encode_utf8(&mut utf8).as_bytes();
            if self.len + encoded.len() > LOG_LINE_LEN {
                break;
            }
            self.bytes[self.len..self.len + encoded.len()].copy_from_slice(encoded);
            self.len += encoded.len();
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RING
// ═══════════════════════════════════════════════════════════════════════════

struct LogRing {
    lines: [LogLine; MAX_LOG_ENTRIES],
    head: usize,
    count: usize,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            lines: [LogLine::EMPTY; MAX_LOG_ENTRIES],
            head: 0,
            count: 0,
        }
    }

    /// Push a line, overwriting the oldest when full.
    fn push(&mut self, line: LogLine) {
        let slot = (self.head + self.count) % MAX_LOG_ENTRIES;
        self.lines[slot] = line;
        if self.count < MAX_LOG_ENTRIES {
            self.count += 1;
        } else {
            self.head = (self.head + 1) % MAX_LOG_ENTRIES;
        }
    }

    fn iter(&self) -> impl Iterator<Item = &LogLine> {
        (0..self.count).map(move |i| &self.lines[(self.head + i) % MAX_LOG_ENTRIES])
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUFFER LOGGER
// ═══════════════════════════════════════════════════════════════════════════

/// `log` backend keeping the most recent lines in memory.
pub struct BufferLogger {
    ring: Mutex<LogRing>,
    sink: Mutex<Option<LogSink>>,
    level: Mutex<LevelFilter>,
}

impl BufferLogger {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(LogRing::new()),
            sink: Mutex::new(None),
            level: Mutex::new(LevelFilter::Info),
        }
    }

    /// Install as the global logger with the given maximum level.
    pub fn register(&'static self, level: LevelFilter) -> Result<(), SetLoggerError> {
        self.set_level(level);
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }

    /// Route every line to `sink` as well as the ring.
    pub fn set_sink(&self, sink: LogSink) {
        *self.sink.lock() = Some(sink);
    }

    /// Change the level this logger accepts.
    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock() = level;
    }

    /// Number of lines currently buffered.
    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every buffered line.
    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        ring.head = 0;
        ring.count = 0;
    }

    /// Visit buffered lines, oldest first.
    pub fn for_each_line<F: FnMut(&LogLine)>(&self, mut f: F) {
        let ring = self.ring.lock();
        for line in ring.iter() {
            f(line);
        }
    }
}

impl Default for BufferLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.lock()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = LogLine::EMPTY;
        line.level = record.level();
        // LogLine truncates instead of failing
        let _ = write!(line, "[{:5}] {}: {}", record.level(), record.target(), record.args());

        // Copy the sink out so it runs without holding the lock
        let sink = *self.sink.lock();
        if let Some(sink) = sink {
            sink(line.as_str());
            sink("\n");
        }
        self.ring.lock().push(line);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn emit(logger: &BufferLogger, level: Level, msg: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target("plm")
                .args(format_args!("{}", msg))
                .build(),
        );
    }

    #[test]
    fn test_lines_are_formatted_with_level_and_target() {
        let logger = BufferLogger::new();
        emit(&logger, Level::Info, "update requested");

        let mut lines = Vec::new();
        logger.for_each_line(|l| lines.push(l.as_str().to_string()));
        assert_eq!(lines, vec!["[INFO ] plm: update requested".to_string()]);
    }

    #[test]
    fn test_level_filter_drops_verbose_lines() {
        let logger = BufferLogger::new();
        logger.set_level(LevelFilter::Warn);
        emit(&logger, Level::Info, "quiet");
        emit(&logger, Level::Error, "loud");
        assert_eq!(logger.len(), 1);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let logger = BufferLogger::new();
        for i in 0..(MAX_LOG_ENTRIES + 3) {
            emit(&logger, Level::Info, &format!("line {}", i));
        }
        assert_eq!(logger.len(), MAX_LOG_ENTRIES);

        let mut first = String::new();
        logger.for_each_line(|l| {
            if first.is_empty() {
                first = l.as_str().to_string();
            }
        });
        assert!(first.ends_with("line 3"));
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let logger = BufferLogger::new();
        let long = "x".repeat(LOG_LINE_LEN * 2);
        emit(&logger, Level::Warn, &long);
        logger.for_each_line(|l| assert_eq!(l.as_str().len(), LOG_LINE_LEN));
    }

    static SINK_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_sink(_s: &str) {
        SINK_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_sink_receives_line_and_newline() {
        let logger = BufferLogger::new();
        logger.set_sink(counting_sink);
        let before = SINK_CALLS.load(Ordering::SeqCst);
        emit(&logger, Level::Error, "boom");
        assert_eq!(SINK_CALLS.load(Ordering::SeqCst) - before, 2);
    }

    #[test]
    fn test_clear_empties_ring() {
        let logger = BufferLogger::new();
        emit(&logger, Level::Info, "a");
        logger.clear();
        assert!(logger.is_empty());
    }
}
