//! Minimal HTTP/1.1 request parsing and response writing.

use std::collections::HashMap;
use std::io::{Read, Write};

use thiserror::Error;

/// Upper bound on header block plus body.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("connection closed before a request arrived")]
    Empty,
    #[error("malformed request line")]
    BadRequestLine,
    #[error("request larger than {MAX_REQUEST_BYTES} bytes")]
    TooLarge,
    #[error("invalid Content-Length '{0}'")]
    BadContentLength(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

pub fn read_request<R: Read>(stream: &mut R) -> Result<HttpRequest, HttpError> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = find_header_end(&data) {
            break pos;
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(if data.is_empty() {
                HttpError::Empty
            } else {
                HttpError::BadRequestLine
            });
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(HttpError::TooLarge);
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(HttpError::BadRequestLine)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(HttpError::BadRequestLine)?;
    let raw_path = parts.next().ok_or(HttpError::BadRequestLine)?;

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| HttpError::BadContentLength(v.clone()))?,
        None => 0,
    };
    let declared = header_end
        .checked_add(4)
        .and_then(|n| n.checked_add(content_length));
    if declared.map_or(true, |total| total > MAX_REQUEST_BYTES) {
        return Err(HttpError::TooLarge);
    }

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        body,
    })
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

pub fn status_line(status: u16) -> &'static str {
    match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

pub fn write_response<W: Write>(
    stream: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let header = format!(
        "{}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line(status),
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()
}

pub fn write_json_response<W: Write>(
    stream: &mut W,
    status: u16,
    body: &serde_json::Value,
) -> std::io::Result<()> {
    write_response(stream, status, "application/json", body.to_string().as_bytes())
}

/// Header for an open-ended streaming response; no Content-Length.
pub fn write_stream_header<W: Write>(stream: &mut W, content_type: &str) -> std::io::Result<()> {
    let header = format!(
        "{}\r\nContent-Type: {content_type}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        status_line(200)
    );
    stream.write_all(header.as_bytes())?;
    stream.flush()
}
