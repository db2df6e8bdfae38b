use std::io;

use parking_lot::Mutex;

/// Forwards verbose/debug strings produced while operating the index to the
/// host's `log` facade at debug level.
///
/// This is a logging shim rather than a text stream: it implements
/// `std::io::Write` only so it can be handed to call sites that want
/// something `write!`-able (writer open/close, merge activity, recovery
/// actions), buffering partial lines until a newline arrives so each
/// `log::debug!` call corresponds to one message rather than one `write`
/// syscall's worth of bytes.
pub struct DebugSink {
    index_name: String,
    pending: Mutex<String>,
}

impl DebugSink {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            pending: Mutex::new(String::new()),
        }
    }

    /// Emits a complete message immediately, bypassing the line buffer.
    pub fn emit(&self, message: &str) {
        debug!("[ INDEX @ {} ] {}", self.index_name, message);
    }
}

impl io::Write for &DebugSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let mut pending = self.pending.lock();
        pending.push_str(&text);

        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            self.emit(line.trim_end());
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            self.emit(&pending);
            pending.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn buffers_until_newline() {
        let sink = DebugSink::new("test-index");
        let mut writer = &sink;
        writer.write_all(b"partial").unwrap();
        writer.write_all(b" line\nsecond").unwrap();
        writer.flush().unwrap();
    }
}
