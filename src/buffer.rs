//! Receive-side buffering for delimited text.

/// Accumulates inbound bytes and hands out the chunks that end in a delimiter.
///
/// With an empty delimiter every push flushes the whole buffer. Transports use this to turn
/// [`RawData`][crate::Event::RawData] into [`Data`][crate::Event::Data] events.
///
/// A peer that never sends the delimiter cannot grow the buffer without bound: once more than
/// [`limit`][Self::limit] bytes are pending they are handed out as a chunk of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedBuffer {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
    limit: usize,
}

impl Default for DelimitedBuffer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DelimitedBuffer {
    /// Pending bytes kept by default before they are flushed without a delimiter
    pub const DEFAULT_LIMIT: usize = 64 * 1024;

    /// Creates a buffer that splits on `delimiter`
    pub fn new(delimiter: impl Into<Vec<u8>>) -> Self {
        DelimitedBuffer {
            buffer: Vec::new(),
            delimiter: delimiter.into(),
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Sets how many bytes may be pending without a delimiter. Zero is treated as one.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Pending bytes kept before they are flushed without a delimiter
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The current delimiter
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// Replaces the delimiter. Buffered bytes are kept and re-scanned on the next push.
    pub fn set_delimiter(&mut self, delimiter: impl Into<Vec<u8>>) {
        self.delimiter = delimiter.into();
    }

    /// Appends `bytes` and returns every complete chunk, delimiter included, oldest first.
    ///
    /// If the bytes left over exceed the limit, they are returned as a final chunk without a delimiter.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        if self.delimiter.is_empty() {
            return if self.buffer.is_empty() {
                Vec::new()
            } else {
                vec![std::mem::take(&mut self.buffer)]
            };
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        while let Some(pos) = find(&self.buffer[start..], &self.delimiter) {
            let end = start + pos + self.delimiter.len();
            chunks.push(self.buffer[start..end].to_vec());
            start = end;
        }
        self.buffer.drain(..start);
        if self.buffer.len() > self.limit {
            chunks.push(std::mem::take(&mut self.buffer));
        }
        chunks
    }

    /// Bytes buffered without a delimiter yet
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drains and returns everything buffered
    pub fn take_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_delimiter_and_keeps_remainder() {
        let mut buf = DelimitedBuffer::new("\r\n");
        assert!(buf.push(b"OK").is_empty());
        assert_eq!(buf.push(b"\r\nREADY\r\nPART"), vec![b"OK\r\n".to_vec(), b"READY\r\n".to_vec()]);
        assert_eq!(buf.pending(), b"PART");
        assert_eq!(buf.take_all(), b"PART");
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn delimiter_split_across_pushes_is_found() {
        let mut buf = DelimitedBuffer::new("\r\n");
        assert!(buf.push(b"A\r").is_empty());
        assert_eq!(buf.push(b"\nB"), vec![b"A\r\n".to_vec()]);
    }

    #[test]
    fn empty_delimiter_flushes_every_push() {
        let mut buf = DelimitedBuffer::default();
        assert_eq!(buf.push(b"abc"), vec![b"abc".to_vec()]);
        assert!(buf.push(b"").is_empty());
    }

    #[test]
    fn undelimited_bytes_are_flushed_past_the_limit() {
        let mut buf = DelimitedBuffer::new("\n").with_limit(4);
        assert!(buf.push(b"abcd").is_empty());
        assert_eq!(buf.push(b"e"), vec![b"abcde".to_vec()]);
        assert!(buf.pending().is_empty());

        // Complete chunks come first; only the remainder is measured against the limit
        assert_eq!(buf.push(b"x\nyyyyyy"), vec![b"x\n".to_vec(), b"yyyyyy".to_vec()]);
        assert_eq!(buf.push(b"z\n"), vec![b"z\n".to_vec()]);
    }

    #[test]
    fn default_limit_is_64_kib() {
        let mut buf = DelimitedBuffer::new("\n");
        assert_eq!(buf.limit(), DelimitedBuffer::DEFAULT_LIMIT);
        assert!(buf.push(&vec![b'a'; DelimitedBuffer::DEFAULT_LIMIT]).is_empty());
        assert_eq!(buf.push(b"a")[0].len(), DelimitedBuffer::DEFAULT_LIMIT + 1);
        assert_eq!(DelimitedBuffer::default().limit(), 64 * 1024);
    }

    #[test]
    fn changing_the_delimiter_rescans_buffered_bytes() {
        let mut buf = DelimitedBuffer::new("\n");
        assert!(buf.push(b"a;b").is_empty());
        buf.set_delimiter(";");
        assert_eq!(buf.push(b";"), vec![b"a;".to_vec(), b"b;".to_vec()]);
    }
}
