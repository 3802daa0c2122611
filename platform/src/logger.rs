//! Serial logger
//!
//! `log::Log` backend writing `[LEVEL] message` lines to the board's serial
//! port. Formatting goes through a fixed stack buffer so the logger can be
//! used from the timer interrupt without touching the heap.

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Byte sink provided by the board (UART driver)
pub type SerialSink = fn(&[u8]);

/// Longest line emitted; longer messages are truncated
pub const LINE_CAPACITY: usize = 256;

static SINK: Once<SerialSink> = Once::new();

/// Logger that writes to the registered serial sink
struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut buf = [0u8; LINE_CAPACITY];
        let len = format_record(&mut buf, record.level(), record.args());
        write_serial(&buf[..len]);
    }

    fn flush(&self) {}
}

/// Simple buffer writer for formatting without alloc
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }
}

impl<'a> core::fmt::Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

fn level_str(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Render one log line into `buf`, returns the number of bytes written.
///
/// The trailing newline is always kept, even when the message is cut.
pub fn format_record(buf: &mut [u8], level: Level, args: &core::fmt::Arguments) -> usize {
    use core::fmt::Write;

    if buf.is_empty() {
        return 0;
    }
    let body = buf.len() - 1;
    let mut writer = BufferWriter::new(&mut buf[..body]);
    let _ = write!(writer, "[{}] {}", level_str(level), args);
    let pos = writer.pos;
    buf[pos] = b'\n';
    pos + 1
}

fn write_serial(bytes: &[u8]) {
    if let Some(sink) = SINK.get() {
        sink(bytes);
    }
}

/// Print directly to serial (bypass logger for early debug)
pub fn early_print(s: &str) {
    write_serial(s.as_bytes());
}

/// Global logger instance
static LOGGER: SerialLogger = SerialLogger;

/// Initialize the logger
///
/// Call this from the boot sequence once the UART is up. The first sink
/// registered wins.
pub fn init(sink: SerialSink, level: LevelFilter) {
    SINK.call_once(|| sink);
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            early_print("[LOGGER] Logger initialized\n");
        }
        Err(e) => {
            use core::fmt::Write;
            let mut buf = [0u8; 128];
            let mut writer = BufferWriter::new(&mut buf);
            let _ = write!(writer, "[LOGGER] ERROR: {}\n", e);
            write_serial(writer.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_buffer_writer_truncates() {
        let mut buf = [0u8; 8];
        let mut writer = BufferWriter::new(&mut buf);
        write!(writer, "0123456789").unwrap();
        assert_eq!(writer.pos, 8);
        assert_eq!(writer.as_bytes(), b"01234567");
    }

    #[test]
    fn test_format_record_layout() {
        let mut buf = [0u8; 64];
        let len = format_record(&mut buf, Level::Warn, &format_args!("tick {}", 42));
        assert_eq!(&buf[..len], b"[WARN ] tick 42\n");
    }

    #[test]
    fn test_format_record_keeps_newline_when_cut() {
        let mut buf = [0u8; 12];
        let len = format_record(&mut buf, Level::Error, &format_args!("queue corrupted"));
        assert_eq!(len, 12);
        assert_eq!(&buf[..len], b"[ERROR] que\n");
    }
}
