//! Bounded tail of the engine's diagnostic output.

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Keeps the last `capacity` non-empty lines written to stderr.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    capacity: usize,
    lines: VecDeque<String>,
    dropped: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines that fell off the front.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// The retained lines joined with newlines.
    pub fn excerpt(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

/// Read `reader` to the end, keeping the tail. Invalid UTF-8 is replaced
/// rather than aborting the read.
pub async fn collect<R>(reader: R, capacity: usize) -> DiagnosticTail
where
    R: AsyncRead + Unpin,
{
    let mut tail = DiagnosticTail::new(capacity);
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => tail.push(&String::from_utf8_lossy(&buf)),
            Err(err) => {
                tail.push(&format!("<failed to read engine diagnostics: {err}>"));
                break;
            }
        }
    }
    tail
}
