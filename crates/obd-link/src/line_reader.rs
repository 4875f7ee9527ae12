//! Line Framing
//!
//! Accumulates raw chunks from the scanner and splits them on line feeds.
//! Lines are trimmed of carriage returns and surrounding whitespace; empty
//! lines are dropped.

use crate::error::LinkError;
use thiserror::Error;

/// Framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// Too many bytes arrived without a line feed
    #[error("Pending line of {len} bytes exceeds limit of {max} bytes")]
    Overflow { len: usize, max: usize },
}

impl From<LineError> for LinkError {
    fn from(err: LineError) -> Self {
        LinkError::IoError(err.to_string())
    }
}

/// Line-feed framer with a bound on the pending partial line
pub struct LineReader {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no line feed
    scanned: usize,
    max_pending: usize,
}

impl LineReader {
    pub fn new(max_pending: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
            scanned: 0,
            max_pending,
        }
    }

    /// Feed a chunk, calling `on_line` for every complete non-empty line
    ///
    /// Complete lines are delivered before the overflow check, so a chunk
    /// that finishes some lines and then overflows still yields them. On
    /// overflow the pending bytes are discarded.
    pub fn push<F>(&mut self, chunk: &[u8], mut on_line: F) -> Result<(), LineError>
    where
        F: FnMut(String),
    {
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start + self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
        {
            let end = start + self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]);
            let line = line.trim();
            if !line.is_empty() {
                on_line(line.to_string());
            }
            start = end + 1;
            self.scanned = 0;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_pending {
            let len = self.buffer.len();
            self.reset();
            return Err(LineError::Overflow {
                len,
                max: self.max_pending,
            });
        }
        Ok(())
    }

    /// Bytes waiting for a line feed
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(reader: &mut LineReader, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        reader.push(chunk, |l| lines.push(l)).unwrap();
        lines
    }

    #[test]
    fn test_lines_simple() {
        let mut reader = LineReader::new(1024);
        assert_eq!(collect(&mut reader, b"rpm=850\nspeed=10\n"), vec!["rpm=850", "speed=10"]);
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut reader = LineReader::new(1024);
        assert!(collect(&mut reader, b"850,1").is_empty());
        assert!(collect(&mut reader, b"0,8").is_empty());
        assert_eq!(collect(&mut reader, b"7\r\n{"), vec!["850,10,87"]);
        assert_eq!(reader.pending(), 1);
    }

    #[test]
    fn test_crlf_and_whitespace_trimmed() {
        let mut reader = LineReader::new(1024);
        assert_eq!(collect(&mut reader, b"  RPM: 900 \r\n"), vec!["RPM: 900"]);
    }

    #[test]
    fn test_empty_lines_dropped() {
        let mut reader = LineReader::new(1024);
        assert_eq!(collect(&mut reader, b"\r\n\n  \r\nOK\n"), vec!["OK"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut reader = LineReader::new(1024);
        let lines = collect(&mut reader, b"rpm=\xff850\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("rpm="));
    }

    #[test]
    fn test_overflow_resets_buffer() {
        let mut reader = LineReader::new(8);
        assert!(collect(&mut reader, b"12345678").is_empty());

        let mut lines = Vec::new();
        let err = reader.push(b"9", |l| lines.push(l)).unwrap_err();
        assert_eq!(err, LineError::Overflow { len: 9, max: 8 });
        assert_eq!(reader.pending(), 0);
        assert!(lines.is_empty());

        assert_eq!(collect(&mut reader, b"ok\n"), vec!["ok"]);
    }

    #[test]
    fn test_complete_lines_delivered_before_overflow() {
        let mut reader = LineReader::new(4);
        let mut lines = Vec::new();
        let result = reader.push(b"a=1\nbbbbbbbb", |l| lines.push(l));
        assert!(result.is_err());
        assert_eq!(lines, vec!["a=1"]);
    }
}
