use tokio::io::AsyncWrite;

use crate::http::header::Headers;
use crate::http::request::Request;
use crate::http::status::StatusCode;
use crate::http::writer::{BodyEncoding, ResponseWriter, WriteError};

/// A response under construction for one request.
///
/// Handlers fill in `status`, `headers` and `body`, then serialize the
/// sections in wire order with [`Response::write_status_line`],
/// [`Response::write_header`] and [`Response::write_body`]. The connection
/// pushes the serialized bytes to the socket exactly once, through
/// [`Response::flush`], after the handler returns.
#[derive(Debug)]
pub struct Response {
    /// Protocol version of the request this answers, if it was parsed.
    /// Error pages reply in it when it is HTTP/1.0.
    pub peer_version: Option<String>,
    /// Protocol version written on the status line; empty means HTTP/1.1
    pub version: String,
    /// The HTTP status code
    pub status: Option<StatusCode>,
    /// Response headers
    pub headers: Headers,
    /// Response body as bytes
    pub body: Option<Vec<u8>>,
    writer: Option<ResponseWriter>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            peer_version: None,
            version: String::new(),
            status: None,
            headers: Headers::new(),
            body: None,
            writer: None,
        }
    }

    /// An empty response bound to `request` for context.
    pub fn for_request(request: &Request) -> Self {
        Self {
            peer_version: Some(request.version.clone()),
            ..Self::new()
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Sets the body together with its `Content-Type` and `Content-Length`.
    pub fn set_body(&mut self, content_type: &str, body: impl Into<Vec<u8>>) {
        let body = body.into();
        self.headers.set("Content-Type", content_type);
        self.headers.set("Content-Length", body.len().to_string());
        self.body = Some(body);
    }

    /// Starts serialization. Requires a status to be set.
    pub fn write_status_line(&mut self) -> Result<(), WriteError> {
        let status = self.status.ok_or(WriteError::MissingStatus)?;
        if self.writer.is_some() {
            return Err(WriteError::StatusLineAlreadyWritten);
        }

        let mut writer = ResponseWriter::new();
        writer.status_line(&self.version, status)?;
        self.writer = Some(writer);
        Ok(())
    }

    /// Serializes the header block. Requires the status line.
    pub fn write_header(&mut self) -> Result<(), WriteError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(WriteError::OutOfOrder("header block"))?;
        writer.header_block(&self.headers)
    }

    /// Serializes the body. Requires the header block, a body and a
    /// `Content-Type` header.
    pub fn write_body(&mut self) -> Result<BodyEncoding, WriteError> {
        let writer = self.writer.as_mut().ok_or(WriteError::OutOfOrder("body"))?;
        let body = self.body.as_deref().ok_or(WriteError::MissingBody)?;
        let content_type = self
            .headers
            .get("Content-Type")
            .ok_or(WriteError::MissingContentType)?;
        writer.body(content_type, body)
    }

    /// Sets status and body, then writes all three sections.
    pub fn send(
        &mut self,
        status: StatusCode,
        content_type: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<(), WriteError> {
        self.set_status(status);
        self.set_body(content_type, body);
        self.write_status_line()?;
        self.write_header()?;
        self.write_body()?;
        Ok(())
    }

    /// Whether a handler has begun serializing this response.
    pub fn is_started(&self) -> bool {
        self.writer.is_some()
    }

    /// Bytes serialized so far, without flushing them.
    pub fn serialized(&self) -> &[u8] {
        self.writer.as_ref().map(|w| w.as_bytes()).unwrap_or(&[])
    }

    /// Sends the serialized response to `out`.
    ///
    /// The buffer is consumed on the first call; later calls do nothing.
    pub async fn flush<W>(&mut self, out: &mut W) -> Result<(), WriteError>
    where
        W: AsyncWrite + Unpin,
    {
        match self.writer.take() {
            Some(mut writer) => writer.write_to_stream(out).await,
            None => Ok(()),
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
