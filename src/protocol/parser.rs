//! Request/response types and their wire encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Upper bound on the size of a single encoded message.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Client number that asks the server to shut down.
pub const SHUTDOWN_SENTINEL: i64 = 0;

pub const DEFAULT_SERVER_NAME: &str = "Server of Computer Networks";
pub const DEFAULT_SERVER_NUMBER: i64 = 50;

/// A client's request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub client_name: String,
    pub client_number: i64,
}

impl Request {
    pub fn new(client_name: impl Into<String>, client_number: i64) -> Self {
        Self {
            client_name: client_name.into(),
            client_number,
        }
    }

    /// True when this request carries the shutdown sentinel instead of an operand.
    pub fn is_shutdown_request(&self) -> bool {
        self.client_number == SHUTDOWN_SENTINEL
    }
}

/// The server's reply to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub server_name: String,
    pub server_number: i64,
    pub sum: i64,
}

impl Response {
    /// Build the reply for `request`. Sums outside the `i64` range are rejected.
    pub fn for_request(identity: &Identity, request: &Request) -> Result<Self, ProtocolError> {
        let sum = request
            .client_number
            .checked_add(identity.number)
            .ok_or(ProtocolError::Overflow {
                client: request.client_number,
                server: identity.number,
            })?;

        Ok(Self {
            server_name: identity.name.clone(),
            server_number: identity.number,
            sum,
        })
    }
}

/// The server's fixed name and number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub number: i64,
}

impl Identity {
    /// Length of the longest response this identity can encode, taking the
    /// widest possible sum.
    pub fn max_response_len(&self) -> usize {
        self.name.len() + self.number.to_string().len() + i64::MIN.to_string().len() + 3
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            number: DEFAULT_SERVER_NUMBER,
        }
    }
}

/// Parse result.
#[derive(Debug)]
pub enum ParseResult<T> {
    /// Successfully parsed message with bytes consumed.
    Complete(T, usize),
    /// Need more data.
    Incomplete,
    /// Malformed message.
    Error(ProtocolError),
}

/// Parse a request from the input buffer.
pub fn parse_request(input: &[u8]) -> ParseResult<Request> {
    let Some((name, name_len)) = take_line(input) else {
        return ParseResult::Incomplete;
    };
    let Some((number, number_len)) = take_line(&input[name_len..]) else {
        return ParseResult::Incomplete;
    };

    let client_name = match std::str::from_utf8(name) {
        Ok(s) => s.to_string(),
        Err(_) => return ParseResult::Error(ProtocolError::InvalidUtf8),
    };
    let client_number = match parse_number(number) {
        Ok(n) => n,
        Err(e) => return ParseResult::Error(e),
    };

    ParseResult::Complete(
        Request {
            client_name,
            client_number,
        },
        name_len + number_len,
    )
}

/// Parse a response from the input buffer.
pub fn parse_response(input: &[u8]) -> ParseResult<Response> {
    let mut consumed = 0;
    let mut lines: [&[u8]; 3] = [&[]; 3];
    for line in lines.iter_mut() {
        match take_line(&input[consumed..]) {
            Some((l, len)) => {
                *line = l;
                consumed += len;
            }
            None => return ParseResult::Incomplete,
        }
    }

    let server_name = match std::str::from_utf8(lines[0]) {
        Ok(s) => s.to_string(),
        Err(_) => return ParseResult::Error(ProtocolError::InvalidUtf8),
    };
    let (server_number, sum) = match (parse_number(lines[1]), parse_number(lines[2])) {
        (Ok(number), Ok(sum)) => (number, sum),
        (Err(e), _) | (_, Err(e)) => return ParseResult::Error(e),
    };

    ParseResult::Complete(
        Response {
            server_name,
            server_number,
            sum,
        },
        consumed,
    )
}

/// Encode a request. Names that would break line framing are rejected.
pub fn encode_request(request: &Request) -> Result<Bytes, ProtocolError> {
    if contains_line_break(&request.client_name) {
        return Err(ProtocolError::NameContainsNewline);
    }

    let number = request.client_number.to_string();
    let len = request.client_name.len() + number.len() + 2;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge {
            limit: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(len);
    buf.put_slice(request.client_name.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(number.as_bytes());
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

/// Encode a response.
pub fn encode_response(response: &Response) -> Bytes {
    let mut buf = BytesMut::with_capacity(response.server_name.len() + 48);
    buf.put_slice(response.server_name.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(response.server_number.to_string().as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(response.sum.to_string().as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

pub(crate) fn contains_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

/// Split off one `\n`-terminated line, returning it without its terminator
/// (and without a trailing `\r`) along with the bytes consumed.
fn take_line(buffer: &[u8]) -> Option<(&[u8], usize)> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let line = &buffer[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, end + 1))
}

fn parse_number(line: &[u8]) -> Result<i64, ProtocolError> {
    let s = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
    let trimmed = s.trim();
    trimmed
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber(trimmed.to_string()))
}
