//! Reading framed messages from an async stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::parser::{parse_request, parse_response, ParseResult, Request, Response};
use super::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ReadError};

/// Read one request. Returns `Ok(None)` if the peer closed before sending anything.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>, ReadError>
where
    R: AsyncRead + Unpin,
{
    read_message(reader, MAX_MESSAGE_SIZE, parse_request).await
}

/// Read one response. Returns `Ok(None)` if the peer closed before sending anything.
pub async fn read_response<R>(reader: &mut R) -> Result<Option<Response>, ReadError>
where
    R: AsyncRead + Unpin,
{
    read_message(reader, MAX_MESSAGE_SIZE, parse_response).await
}

async fn read_message<R, T>(
    reader: &mut R,
    limit: usize,
    parse: fn(&[u8]) -> ParseResult<T>,
) -> Result<Option<T>, ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(limit);

    loop {
        match parse(&buffer) {
            ParseResult::Complete(message, _) => return Ok(Some(message)),
            ParseResult::Error(e) => return Err(e.into()),
            ParseResult::Incomplete if buffer.len() >= limit => {
                return Err(ProtocolError::TooLarge { limit }.into());
            }
            ParseResult::Incomplete => {}
        }

        let n = reader.read_buf(&mut buffer).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::Truncated.into());
        }
    }
}
