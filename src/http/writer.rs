use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::header::Headers;
use crate::http::status::StatusCode;

pub const DEFAULT_VERSION: &str = "HTTP/1.1";

/// Separator used between multiple values of one header slot.
pub const VALUE_SEPARATOR: &str = ";";

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("empty status in response")]
    MissingStatus,
    #[error("status line already written")]
    StatusLineAlreadyWritten,
    #[error("cannot write {0}: previous section not written")]
    OutOfOrder(&'static str),
    #[error("unable to write body payload (Content-Type header missing)")]
    MissingContentType,
    #[error("unable to write body payload (empty body)")]
    MissingBody,
    #[error("unable to write response: {0}")]
    Io(#[from] io::Error),
}

/// How a body was classified from its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Text,
    Binary,
}

impl BodyEncoding {
    /// `text/*` is text, everything else is opaque bytes.
    pub fn for_content_type(content_type: &str) -> Self {
        let is_text = match content_type.trim().parse::<mime::Mime>() {
            Ok(m) => m.type_() == mime::TEXT,
            Err(_) => content_type.trim_start().starts_with("text"),
        };
        if is_text { BodyEncoding::Text } else { BodyEncoding::Binary }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Empty,
    StatusLine,
    Headers,
    Body,
}

/// Serialization buffer for one response.
///
/// Sections must be appended in wire order: status line, header block,
/// body. Nothing reaches the socket until [`ResponseWriter::write_to_stream`].
#[derive(Debug)]
pub struct ResponseWriter {
    buffer: BytesMut,
    written: usize,
    section: Section,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            written: 0,
            section: Section::Empty,
        }
    }

    pub fn status_line(&mut self, version: &str, status: StatusCode) -> Result<(), WriteError> {
        if self.section != Section::Empty {
            return Err(WriteError::StatusLineAlreadyWritten);
        }
        let version = if version.is_empty() { DEFAULT_VERSION } else { version };

        let line = format!(
            "{} {} {}\r\n",
            version,
            status.as_u16(),
            status.reason_phrase()
        );
        self.buffer.put_slice(line.as_bytes());
        self.section = Section::StatusLine;
        Ok(())
    }

    /// Writes one `Key: v1;v2` line per slot followed by the blank line.
    pub fn header_block(&mut self, headers: &Headers) -> Result<(), WriteError> {
        if self.section != Section::StatusLine {
            return Err(WriteError::OutOfOrder("header block"));
        }

        for (key, values) in headers {
            self.buffer.put_slice(key.as_bytes());
            self.buffer.put_slice(b": ");
            self.buffer.put_slice(values.join(VALUE_SEPARATOR).as_bytes());
            self.buffer.put_slice(b"\r\n");
        }

        // Header/body separator
        self.buffer.put_slice(b"\r\n");
        self.section = Section::Headers;
        Ok(())
    }

    pub fn body(&mut self, content_type: &str, body: &[u8]) -> Result<BodyEncoding, WriteError> {
        if self.section != Section::Headers {
            return Err(WriteError::OutOfOrder("body"));
        }

        // Both encodings go out byte-for-byte; the label is for the caller.
        let encoding = BodyEncoding::for_content_type(content_type);
        self.buffer.put_slice(body);
        tracing::trace!(content_type, ?encoding, len = body.len(), "Body serialized");
        self.section = Section::Body;
        Ok(encoding)
    }

    /// Bytes serialized so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Pushes every buffered byte to `stream` and flushes it.
    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(WriteError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "connection closed while writing",
                )));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_top_level_type() {
        assert_eq!(BodyEncoding::for_content_type("text/html"), BodyEncoding::Text);
        assert_eq!(
            BodyEncoding::for_content_type("text/plain; charset=utf-8"),
            BodyEncoding::Text
        );
        assert_eq!(BodyEncoding::for_content_type("image/png"), BodyEncoding::Binary);
        assert_eq!(
            BodyEncoding::for_content_type("application/octet-stream"),
            BodyEncoding::Binary
        );
    }

    #[test]
    fn sections_must_be_in_order() {
        let mut writer = ResponseWriter::new();
        let headers = Headers::new();

        assert!(matches!(
            writer.header_block(&headers),
            Err(WriteError::OutOfOrder(_))
        ));
        writer.status_line("", StatusCode::Ok).unwrap();
        assert!(matches!(
            writer.body("text/plain", b"x"),
            Err(WriteError::OutOfOrder(_))
        ));
        writer.header_block(&headers).unwrap();
        writer.body("text/plain", b"x").unwrap();

        assert_eq!(writer.as_bytes(), b"HTTP/1.1 200 OK\r\n\r\nx");
    }

    #[test]
    fn multi_value_slots_are_joined() {
        let mut writer = ResponseWriter::new();
        let mut headers = Headers::new();
        headers.add("Accept", "text/html");
        headers.add("Accept", "text/plain");

        writer.status_line("HTTP/1.0", StatusCode::Ok).unwrap();
        writer.header_block(&headers).unwrap();

        assert_eq!(
            writer.as_bytes(),
            b"HTTP/1.0 200 OK\r\nAccept: text/html;text/plain\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn write_to_stream_sends_everything() {
        let mut writer = ResponseWriter::new();
        writer.status_line("HTTP/1.1", StatusCode::NotFound).unwrap();
        writer.header_block(&Headers::new()).unwrap();

        let mut out: Vec<u8> = Vec::new();
        writer.write_to_stream(&mut out).await.unwrap();

        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\n\r\n");
    }
}
