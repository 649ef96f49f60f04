//! JSON document framing over a byte stream
//!
//! Documents are written back to back with no length prefix. The reader
//! scans incoming bytes once, tracking nesting depth and string state, to
//! find where each top-level object or array ends; only then is the document
//! handed to the JSON parser. A document split across reads and several
//! documents in one read are both handled, and the size limit applies to
//! every document whether or not it arrived in one read.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Incremental search for the end of the document at the head of the buffer
#[derive(Default)]
struct Scanner {
    /// Next buffer offset to examine
    pos: usize,
    /// Offset of the document's opening bracket
    start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Advance over `buf[self.pos..]`; returns the end offset (exclusive) of
    /// the first complete document.
    fn advance(&mut self, buf: &[u8]) -> Result<Option<usize>> {
        while self.pos < buf.len() {
            let b = buf[self.pos];
            self.pos += 1;

            if self.start.is_none() {
                match b {
                    b'{' | b'[' => {
                        self.start = Some(self.pos - 1);
                        self.depth = 1;
                    }
                    b if b.is_ascii_whitespace() => {}
                    _ => {
                        return Err(Error::Protocol(
                            "malformed JSON: expected an object or array".to_string(),
                        ))
                    }
                }
                continue;
            }

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Ok(Some(self.pos));
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    /// Bytes of the current document seen so far
    fn pending(&self) -> usize {
        self.start.map_or(0, |start| self.pos - start)
    }
}

/// A byte stream carrying one JSON document per logical message
pub struct JsonStream<S> {
    stream: S,
    buf: Vec<u8>,
    scanner: Scanner,
    max_document_size: usize,
}

impl<S> JsonStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, max_document_size: usize) -> Self {
        Self {
            stream,
            buf: Vec::new(),
            scanner: Scanner::default(),
            max_document_size,
        }
    }

    /// Read the next complete document.
    ///
    /// Returns `Ok(None)` when the peer closes the stream between documents.
    /// A document larger than the configured limit is refused with
    /// [`Error::FrameTooLarge`] as soon as the limit is crossed.
    pub async fn read_document(&mut self) -> Result<Option<Value>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(value) = self.take_document()? {
                return Ok(Some(value));
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return if self.scanner.start.is_none() {
                    Ok(None)
                } else {
                    Err(Error::Protocol("stream closed mid-document".to_string()))
                };
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Serialize and write one document
    pub async fn write_document<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.stream.write_all(&data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Consume the wrapper, returning the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn take_document(&mut self) -> Result<Option<Value>> {
        let found = self.scanner.advance(&self.buf)?;
        let size = self.scanner.pending();
        if size > self.max_document_size {
            return Err(Error::FrameTooLarge {
                size,
                limit: self.max_document_size,
            });
        }

        let Some(end) = found else {
            if self.scanner.start.is_none() {
                // Only whitespace so far
                self.buf.clear();
                self.scanner = Scanner::default();
            }
            return Ok(None);
        };

        let start = self.scanner.start.unwrap_or(0);
        let value = serde_json::from_slice(&self.buf[start..end])
            .map_err(|e| Error::Protocol(format!("malformed JSON: {}", e)));
        self.buf.drain(..end);
        self.scanner = Scanner::default();
        value.map(Some)
    }
}
