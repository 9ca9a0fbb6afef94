//! Byte source abstraction.

use std::io::{self, Read, Seek, SeekFrom};

/// Seekable byte stream the demuxer reads from.
pub trait ByteSource: Read + Seek + Send {
    /// Total length in bytes.
    fn size(&mut self) -> io::Result<u64> {
        let current = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(current))?;
        Ok(end)
    }

    /// Read up to `buf.len()` bytes at `offset` without moving the cursor.
    fn peek_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let current = self.stream_position()?;
        self.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        self.seek(SeekFrom::Start(current))?;
        Ok(filled)
    }
}

impl<T: Read + Seek + Send> ByteSource for T {}
