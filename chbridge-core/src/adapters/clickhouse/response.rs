//! Response handling for the ClickHouse HTTP interface.

use crate::adapters::RowStream;
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Server code for `AUTHENTICATION_FAILED`.
const AUTHENTICATION_FAILED: u32 = 516;

/// Extracts the numeric code from a ClickHouse exception body such as
/// `Code: 62. DB::Exception: Syntax error ...`.
pub fn parse_exception_code(body: &str) -> Option<u32> {
    let rest = body.trim_start().strip_prefix("Code: ")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Turns a failed HTTP exchange into an [`AdapterError`].
///
/// HTTP 401/403 and server code 516 mean the credentials were refused;
/// anything else is a rejected statement.
pub fn classify_failure(status: u16, header_code: Option<u32>, body: &str) -> AdapterError {
    let code = header_code.or_else(|| parse_exception_code(body));
    let message = body.trim().to_string();

    if matches!(status, 401 | 403) || code == Some(AUTHENTICATION_FAILED) {
        return AdapterError::Authentication { message };
    }

    AdapterError::Server {
        code,
        message: if message.is_empty() {
            format!("HTTP status {status}")
        } else {
            message
        },
    }
}

/// Accumulates body chunks and hands out complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Appends a body chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        Some(line)
    }

    /// Returns whatever is left once the body has ended, if it is not blank.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.pending);
        if rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(rest)
        }
    }
}

/// Decodes one `JSONEachRow` line.
///
/// ClickHouse reports errors that happen after streaming has started as a
/// plain-text exception in the body; such a line becomes a server error.
pub(crate) fn decode_row(line: &[u8]) -> AdapterResult<Map<String, Value>> {
    serde_json::from_slice(line).map_err(|source| {
        let text = String::from_utf8_lossy(line);
        if let Some(code) = parse_exception_code(&text) {
            AdapterError::Server {
                code: Some(code),
                message: text.trim().to_string(),
            }
        } else {
            AdapterError::Decode {
                context: format!("JSONEachRow line '{}'", text.trim()),
                source,
            }
        }
    })
}

/// Row stream over a `FORMAT JSONEachRow` response body.
///
/// Chunks are pulled from the socket only when no complete line is
/// buffered, so memory stays bounded by the longest row.
pub struct JsonEachRowStream {
    response: reqwest::Response,
    buffer: LineBuffer,
    finished: bool,
}

impl JsonEachRowStream {
    /// Wraps a successful response.
    pub const fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: LineBuffer::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl RowStream for JsonEachRowStream {
    async fn next_row(&mut self) -> AdapterResult<Option<Map<String, Value>>> {
        loop {
            while let Some(line) = self.buffer.next_line() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return decode_row(&line).map(Some);
            }

            if self.finished {
                return match self.buffer.take_remainder() {
                    Some(line) => decode_row(&line).map(Some),
                    None => Ok(None),
                };
            }

            match self.response.chunk().await {
                Ok(Some(chunk)) => self.buffer.push(&chunk),
                Ok(None) => self.finished = true,
                Err(e) => {
                    return Err(AdapterError::Transport {
                        endpoint: self.response.url().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
    }
}
