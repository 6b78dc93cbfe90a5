use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::header::{Headers, canonical_key};
use crate::http::request::{Method, Request, parse_target};

/// Upper bound on the start line plus all header lines, in bytes.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The peer closed the stream before sending a request.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// The bytes on the wire are not a well-formed request.
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("i/o error while reading request: {0}")]
    Io(#[from] io::Error),
}

impl ParseError {
    fn malformed(msg: impl Into<String>) -> Self {
        ParseError::Malformed(msg.into())
    }
}

/// Reads exactly one request off `reader`.
///
/// The head is consumed one `\n`-terminated line at a time and ends at the
/// first empty line. If the request declares a `Content-Length`, exactly
/// that many body bytes are consumed afterwards and nothing more, so the
/// reader is left positioned at the start of the next request.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = MAX_HEAD_SIZE;

    let start_line = match read_line(reader, &mut budget).await? {
        Line::Text(line) => line,
        Line::Eof => return Err(ParseError::ConnectionClosed),
    };
    let (method, target, version) = parse_start_line(&start_line)?;

    let mut headers = Headers::new();
    let mut content_length: Option<u64> = None;

    loop {
        let line = match read_line(reader, &mut budget).await? {
            Line::Text(line) => line,
            Line::Eof => return Err(ParseError::malformed("stream ended inside header block")),
        };

        if line.is_empty() {
            break;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            ParseError::malformed(format!("header line without separator: {line}"))
        })?;
        let name = canonical_key(name);
        if name.is_empty() {
            return Err(ParseError::malformed("empty header name"));
        }
        let value = value.trim();

        if name == "Content-Length" {
            if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::malformed(format!("invalid Content-Length: {value}")));
            }
            let declared = value
                .parse::<u64>()
                .map_err(|_| ParseError::malformed(format!("invalid Content-Length: {value}")))?;
            if content_length.is_some_and(|prev| prev != declared) {
                return Err(ParseError::malformed("conflicting Content-Length headers"));
            }
            content_length = Some(declared);
            headers.add(&name, value);
        } else {
            for token in value.split(';') {
                headers.add(&name, token);
            }
        }
    }

    let content_length = content_length.unwrap_or(0);
    let body = read_body(reader, content_length).await?;

    Ok(Request {
        method,
        url: target,
        version,
        headers,
        content_length,
        body,
    })
}

enum Line {
    Text(String),
    Eof,
}

/// Reads one line with its terminator (`\r\n` or bare `\n`) stripped.
async fn read_line<R>(reader: &mut R, budget: &mut usize) -> Result<Line, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    // One extra byte so a line that exactly fills the budget is told apart
    // from one that overflows it.
    let n = (&mut *reader)
        .take(*budget as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() != Some(&b'\n') {
        if n > *budget {
            return Err(ParseError::malformed("request head too large"));
        }
        return Err(ParseError::malformed("stream ended mid-line"));
    }
    *budget -= n;

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    String::from_utf8(buf)
        .map(Line::Text)
        .map_err(|_| ParseError::malformed("request head is not valid UTF-8"))
}

fn parse_start_line(line: &str) -> Result<(Method, url::Url, String), ParseError> {
    let (method, rest) = line
        .split_once(' ')
        .ok_or_else(|| ParseError::malformed(format!("no whitespace in start line: {line}")))?;

    let method = Method::from_str(method)
        .ok_or_else(|| ParseError::malformed(format!("unsupported method: {method}")))?;

    let (target, version) = rest
        .split_once(' ')
        .ok_or_else(|| ParseError::malformed(format!("no whitespace in start line: {line}")))?;

    let url = parse_target(target)
        .ok_or_else(|| ParseError::malformed(format!("invalid request URL: {target}")))?;

    let version = version.trim();
    if version.is_empty() {
        return Err(ParseError::malformed("request protocol not found"));
    }
    if version.contains(char::is_whitespace) {
        return Err(ParseError::malformed(format!("extra fields in start line: {line}")));
    }

    Ok((method, url, version.to_string()))
}

async fn read_body<R>(reader: &mut R, content_length: u64) -> Result<Vec<u8>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    if content_length == 0 {
        return Ok(body);
    }

    // Grows with what actually arrives; the declared length is untrusted.
    (&mut *reader)
        .take(content_length)
        .read_to_end(&mut body)
        .await?;

    if (body.len() as u64) < content_length {
        return Err(ParseError::malformed(format!(
            "truncated body: expected {content_length} bytes, got {}",
            body.len()
        )));
    }

    Ok(body)
}
