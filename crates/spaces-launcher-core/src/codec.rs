use tokio::io::AsyncRead;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead};

/// Longest line buffered before it is handed out in pieces
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Splits a byte stream into text lines.
///
/// Only the trailing `\n` (and a `\r` right before it) is removed. Invalid UTF-8 is
/// replaced rather than treated as an error, and a final line without a terminator
/// is still produced at end of stream. A line longer than `max_length` bytes comes
/// out as several lines so a child that never writes a newline cannot grow the
/// buffer without bound.
#[derive(Debug)]
pub struct LineCodec {
    next_index: usize,
    max_length: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    pub fn new() -> Self {
        Self::new_with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// `max_length` is clamped to at least one byte
    pub fn new_with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length: max_length.max(1),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Where to cut an overlong line: at `max`, moved back to the start of a
/// character when `max` falls inside one.
fn split_point(bytes: &[u8], max: usize) -> usize {
    let mut cut = max;
    while cut > 0 && max - cut < 3 && (bytes[cut] & 0xC0) == 0x80 {
        cut -= 1;
    }
    if cut == 0 { max } else { cut }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len().min(self.max_length.saturating_add(1));
        let newline = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let line = to_line(&src[..end]);
                src.advance(end + 1);
                Ok(Some(line))
            }
            None if src.len() > self.max_length => {
                let cut = split_point(src, self.max_length);
                self.next_index = 0;
                let line = String::from_utf8_lossy(&src[..cut]).into_owned();
                src.advance(cut);
                Ok(Some(line))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }

        if src.is_empty() {
            return Ok(None);
        }

        self.next_index = 0;
        let line = to_line(src);
        src.clear();
        Ok(Some(line))
    }
}

/// Lazy, finite sequence of lines read from `io`
pub type Lines<R> = FramedRead<R, LineCodec>;

pub fn lines<R: AsyncRead>(io: R) -> Lines<R> {
    FramedRead::with_capacity(io, LineCodec::new(), 1024)
}
