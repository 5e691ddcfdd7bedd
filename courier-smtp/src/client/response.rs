//! SMTP reply parsing and representation.

use std::{fmt, str::SplitWhitespace};

use super::error::{ClientError, Result};

/// One line of a (possibly multi-line) reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// The SMTP status code (e.g., 220, 250, 550).
    pub code: u16,
    /// `false` for `250-...` continuation lines.
    pub is_last: bool,
    /// The text following the status code.
    pub message: String,
}

/// A complete SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" / "))
    }
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// 2xx: the command was accepted.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// 3xx: the server waits for more input, e.g. the message body after DATA.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// Whether an EHLO reply advertises the extension `keyword`, e.g.
    /// `STARTTLS`. The first line is the server's domain and is skipped.
    #[must_use]
    pub fn advertises(&self, keyword: &str) -> bool {
        self.extension(keyword).is_some()
    }

    /// Whether an EHLO reply lists `mechanism` among its AUTH mechanisms.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.extension("AUTH").is_some_and(|mut parameters| {
            parameters.any(|offered| offered.eq_ignore_ascii_case(mechanism))
        })
    }

    /// The parameters of an advertised extension.
    fn extension(&self, keyword: &str) -> Option<SplitWhitespace<'_>> {
        self.lines.iter().skip(1).find_map(|line| {
            let mut words = line.split_whitespace();
            words
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
                .then_some(words)
        })
    }

    /// Parses a single reply line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line doesn't match SMTP format.
    pub fn parse_line(line: &str) -> Result<ResponseLine> {
        let code = line
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| ClientError::ParseError(format!("Invalid status code in '{line}'")))?
            .parse::<u16>()
            .map_err(|e| ClientError::ParseError(e.to_string()))?;

        let is_last = match line.as_bytes().get(3) {
            None | Some(b' ') => true,
            Some(b'-') => false,
            Some(&c) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator character: '{}'",
                    char::from(c)
                )));
            }
        };

        Ok(ResponseLine {
            code,
            is_last,
            message: line.get(4..).unwrap_or_default().to_string(),
        })
    }

    /// Parses a complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes it occupied, or `None` if the
    /// buffer does not yet hold a final line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the reply is malformed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        // A read may stop in the middle of a multi-byte character; only the
        // complete prefix is inspected.
        let text = match std::str::from_utf8(buffer) {
            Ok(text) => text,
            Err(e) if e.error_len().is_none() => {
                std::str::from_utf8(&buffer[..e.valid_up_to()])?
            }
            Err(e) => return Err(e.into()),
        };

        let mut code = None;
        let mut lines = Vec::new();
        let mut consumed = 0;

        while let Some(end) = text[consumed..].find('\n') {
            let raw = &text[consumed..consumed + end];
            consumed += end + 1;

            let line = raw.strip_suffix('\r').unwrap_or(raw);
            if line.is_empty() {
                continue;
            }

            let parsed = Self::parse_line(line)?;
            match code {
                Some(expected) if expected != parsed.code => {
                    return Err(ClientError::ParseError(format!(
                        "Status code mismatch in multi-line response: expected {expected}, got {}",
                        parsed.code
                    )));
                }
                _ => code = Some(parsed.code),
            }
            lines.push(parsed.message);

            if parsed.is_last {
                return Ok(code.map(|code| (Self::new(code, lines), consumed)));
            }
        }

        Ok(None)
    }
}
