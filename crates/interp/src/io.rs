//! I/O contracts between the interpreter and its host
//!
//! The core is host-agnostic: `READ` blocks on an [`InputProvider`]
//! (prompt in, line or cancellation out) and `WRITE` appends to an
//! [`OutputSink`]. The sink is buffered and must reach the underlying
//! stream on every exit path, so [`FileSink`] flushes on drop.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Write as _};
use std::path::Path;

/// Blocking "prompt in, line out" provider backing `READ`.
///
/// Returning `None` means the input stream was closed or the host
/// cancelled the request; the interpreter aborts the run.
pub trait InputProvider {
    fn read_line(&mut self, prompt: &str) -> Option<String>;
}

/// Append-only text sink backing `WRITE`.
///
/// Values are written verbatim, with no separators or newlines added.
pub trait OutputSink {
    fn write_text(&mut self, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Console provider: prompt to stderr, line from stdin, `None` at EOF.
///
/// The prompt goes to stderr so it never mixes into redirected program
/// output.
#[derive(Debug, Default)]
pub struct StdinInput;

impl InputProvider for StdinInput {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        eprint!("{}", prompt);
        let _ = io::stderr().flush();
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
        }
    }
}

/// Scripted provider for tests: hands out queued lines, then `None`.
#[derive(Debug, Default)]
pub struct QueuedInput {
    lines: VecDeque<String>,
}

impl QueuedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueuedInput {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl InputProvider for QueuedInput {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.lines.pop_front()
    }
}

/// Sink writing straight to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Buffered file sink for redirected program output.
///
/// Flushes on drop, so the file is complete even when the run aborts
/// with a compile or runtime error.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(FileSink {
            writer: BufWriter::new(file),
        })
    }
}

impl OutputSink for FileSink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// In-memory sink for tests and for hosts that capture output themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: String,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }
}

impl OutputSink for MemorySink {
    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.buffer.push_str(text);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_input_hands_out_lines_then_none() {
        let mut input = QueuedInput::new(["1", "2"]);
        assert_eq!(input.read_line("? "), Some("1".to_string()));
        assert_eq!(input.read_line("? "), Some("2".to_string()));
        assert_eq!(input.read_line("? "), None);
    }

    #[test]
    fn test_memory_sink_appends_without_separators() {
        let mut sink = MemorySink::new();
        sink.write_text("0").unwrap();
        sink.write_text("1").unwrap();
        sink.write_text("2").unwrap();
        assert_eq!(sink.contents(), "012");
    }

    #[test]
    fn test_file_sink_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.write_text("Hello").unwrap();
            // dropped without an explicit flush
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Hello");
    }
}
