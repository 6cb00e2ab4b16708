//! Byte stream capability used as message body

use crate::errors::{Error, Result};
use std::{fmt, io::SeekFrom};

/// A seekable byte resource used as a message body.
///
/// Every operation on a detached or closed stream, and every operation the
/// stream does not support (reading a write-only stream, ...), fails with
/// [`Error::Stream`].
///
/// Messages own their stream exclusively. Copy-on-write mutators duplicate it
/// through [`clone_box`](Stream::clone_box), cursor position included, so a
/// read on one message never moves the cursor of another.
pub trait Stream: fmt::Debug + Send + Sync {
    /// Reads up to `len` bytes from the current position.
    fn read(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Writes `bytes` at the current position, returning the count written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Moves the cursor, returning the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current cursor position.
    fn tell(&self) -> Result<u64>;

    /// `true` when the cursor is at the end (or the stream is unusable).
    fn eof(&self) -> bool;

    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Total size in bytes, if known.
    fn size(&self) -> Option<u64>;

    fn is_readable(&self) -> bool;
    fn is_writable(&self) -> bool;
    fn is_seekable(&self) -> bool;

    /// Stream metadata such as `mode` or `uri`.
    fn metadata(&self, key: &str) -> Option<String>;

    /// Releases the underlying resource; the stream is unusable afterwards.
    fn close(&mut self);

    /// Separates the underlying buffer from the stream and returns it.
    fn detach(&mut self) -> Option<Vec<u8>>;

    /// Remaining bytes from the current position to the end.
    fn contents(&mut self) -> Result<Vec<u8>>;

    /// Whole contents regardless of the cursor, leaving the cursor in place.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Deep copy, including the cursor position.
    fn clone_box(&self) -> Box<dyn Stream>;
}

impl Clone for Box<dyn Stream> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// In-memory [`Stream`] over a growable buffer.
///
/// # Examples
/// ```
/// use maker_http::{MemoryStream, Stream};
/// use std::io::SeekFrom;
///
/// let mut stream = MemoryStream::new();
/// stream.write(b"hello world").unwrap();
/// assert!(stream.eof());
///
/// stream.seek(SeekFrom::Start(6)).unwrap();
/// assert_eq!(stream.read(5).unwrap(), b"world");
///
/// stream.rewind().unwrap();
/// assert_eq!(stream.contents().unwrap(), b"hello world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStream {
    buffer: Option<Vec<u8>>,
    position: usize,
    readable: bool,
    writable: bool,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStream {
    /// An empty read/write stream.
    #[inline]
    pub fn new() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// A read/write stream over `bytes`, cursor at the start.
    #[inline]
    pub fn from_bytes<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            buffer: Some(bytes.into()),
            position: 0,
            readable: true,
            writable: true,
        }
    }

    /// A stream over `bytes` that rejects writes.
    #[inline]
    pub fn read_only<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            writable: false,
            ..Self::from_bytes(bytes)
        }
    }

    /// An empty stream that rejects reads.
    #[inline]
    pub fn write_only() -> Self {
        Self {
            readable: false,
            ..Self::new()
        }
    }

    fn buffer(&self) -> Result<&Vec<u8>> {
        self.buffer
            .as_ref()
            .ok_or_else(|| Error::stream("stream is detached"))
    }

    fn mode(&self) -> &'static str {
        match (self.readable, self.writable) {
            (true, true) => "r+b",
            (true, false) => "rb",
            (false, true) => "wb",
            (false, false) => "",
        }
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if !self.readable {
            return Err(Error::stream("stream is not readable"));
        }

        let buffer = self.buffer()?;
        let start = self.position.min(buffer.len());
        let end = start.saturating_add(len).min(buffer.len());
        let chunk = buffer[start..end].to_vec();

        self.position = end;
        Ok(chunk)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::stream("stream is not writable"));
        }

        let position = self.position;
        let buffer = self
            .buffer
            .as_mut()
            .ok_or_else(|| Error::stream("stream is detached"))?;

        if buffer.len() < position {
            buffer.resize(position, 0);
        }
        let overlap = (buffer.len() - position).min(bytes.len());
        buffer[position..position + overlap].copy_from_slice(&bytes[..overlap]);
        buffer.extend_from_slice(&bytes[overlap..]);

        self.position += bytes.len();
        Ok(bytes.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.buffer()?.len() as i128;

        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => len + offset as i128,
        };

        let position = usize::try_from(target)
            .map_err(|_| Error::stream(format!("cannot seek to position {target}")))?;

        self.position = position;
        Ok(position as u64)
    }

    fn tell(&self) -> Result<u64> {
        self.buffer()?;
        Ok(self.position as u64)
    }

    fn eof(&self) -> bool {
        self.buffer
            .as_ref()
            .map_or(true, |buffer| self.position >= buffer.len())
    }

    fn size(&self) -> Option<u64> {
        self.buffer.as_ref().map(|buffer| buffer.len() as u64)
    }

    fn is_readable(&self) -> bool {
        self.buffer.is_some() && self.readable
    }

    fn is_writable(&self) -> bool {
        self.buffer.is_some() && self.writable
    }

    fn is_seekable(&self) -> bool {
        self.buffer.is_some()
    }

    fn metadata(&self, key: &str) -> Option<String> {
        self.buffer.as_ref()?;

        match key {
            "mode" => Some(self.mode().to_owned()),
            "seekable" => Some("true".to_owned()),
            "uri" => Some("memory".to_owned()),
            _ => None,
        }
    }

    fn close(&mut self) {
        self.buffer = None;
        self.position = 0;
    }

    fn detach(&mut self) -> Option<Vec<u8>> {
        self.position = 0;
        self.buffer.take()
    }

    fn contents(&mut self) -> Result<Vec<u8>> {
        self.read(usize::MAX)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.readable {
            return Err(Error::stream("stream is not readable"));
        }
        self.buffer().cloned()
    }

    fn clone_box(&self) -> Box<dyn Stream> {
        Box::new(self.clone())
    }
}
