//! RFC 5322 header block parsing: unfolding, encoded-words (RFC 2047),
//! address lists, message-id lists, and dates.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use tracing::warn;

use crate::error::{EmlError, Result};
use crate::model::address::Address;
use crate::model::email::Header;

/// Raw header block, unfolded, in message order.
#[derive(Debug, Default)]
pub struct HeaderBlock {
    /// `(name as written, unfolded value)` pairs, duplicates preserved.
    lines: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Parse the header section of a message (everything before the first blank line).
    ///
    /// A line that is neither `Name: value` nor a continuation is malformed.
    pub fn parse(raw_headers: &[u8]) -> Result<Self> {
        let text = decode_header_bytes(raw_headers);
        let mut lines: Vec<(String, String)> = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                match lines.last_mut() {
                    Some(last) => {
                        last.1.push(' ');
                        last.1.push_str(line.trim());
                    }
                    None => {
                        return Err(EmlError::Parse(format!(
                            "continuation line {} before any header",
                            lineno + 1
                        )))
                    }
                }
                continue;
            }
            let Some(colon) = line.find(':') else {
                return Err(EmlError::Parse(format!(
                    "malformed header line {}: '{}'",
                    lineno + 1,
                    line.chars().take(60).collect::<String>()
                )));
            };
            let name = line[..colon].trim();
            if name.is_empty() || name.contains(' ') {
                return Err(EmlError::Parse(format!(
                    "invalid header name on line {}",
                    lineno + 1
                )));
            }
            lines.push((name.to_string(), line[colon + 1..].trim().to_string()));
        }

        if lines.is_empty() {
            return Err(EmlError::Parse("message has no headers".into()));
        }
        Ok(Self { lines })
    }

    /// First raw value for a header (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every raw value for a header joined as one address list.
    fn joined(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .lines
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    /// Addresses from every occurrence of a header, in order.
    pub fn address_list(&self, name: &str) -> Vec<Address> {
        self.joined(name)
            .map(|raw| Address::parse_list(&decode_encoded_words(&raw)))
            .unwrap_or_default()
    }

    /// The first address of a single-mailbox header such as `Sender`.
    pub fn single_address(&self, name: &str) -> Option<Address> {
        self.first(name)
            .map(|raw| Address::parse(&decode_encoded_words(raw)))
            .filter(|a| !a.address.is_empty())
    }

    /// Message-ids from a header with angle brackets stripped.
    pub fn message_ids(&self, name: &str) -> Vec<String> {
        self.first(name).map(message_id_list).unwrap_or_default()
    }

    /// Date header normalized to UTC.
    ///
    /// Missing header → `Ok(None)`; present but unparseable → `Parse` error.
    pub fn date(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.first(name) {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_date(raw)
                .map(Some)
                .ok_or_else(|| EmlError::Parse(format!("unparseable {name} header: '{raw}'"))),
        }
    }

    /// Convert into the canonical ordered header list.
    pub fn to_header(&self) -> Header {
        let mut header = Header::default();
        for (name, value) in &self.lines {
            header.push(name, value.clone());
        }
        header
    }
}

/// Split a message into its header section and the offset where the body starts.
pub fn split_header_section(data: &[u8]) -> (&[u8], usize) {
    for i in 0..data.len() {
        if data[i..].starts_with(b"\r\n\r\n") {
            return (&data[..i], i + 4);
        }
        if data[i..].starts_with(b"\n\n") {
            return (&data[..i], i + 2);
        }
    }
    (data, data.len())
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Values without encoded-words are returned unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    if !input.contains("=?") {
        return input.to_string();
    }
    // mail-parser already implements RFC 2047, including charset lookup.
    let wrapped = format!("Subject: {input}\n\n");
    MessageParser::default()
        .parse(wrapped.as_bytes())
        .and_then(|msg| msg.subject().map(str::to_string))
        .unwrap_or_else(|| input.to_string())
}

/// Extract every `<id>` token, brackets stripped. A value without
/// brackets is treated as a whitespace-separated list.
pub fn message_id_list(raw: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut remaining = raw;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        let id = remaining[start + 1..start + len].trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
        remaining = &remaining[start + len + 1..];
    }
    if ids.is_empty() {
        ids = raw.split_whitespace().map(str::to_string).collect();
    }
    ids
}

/// Strip surrounding angle brackets from a single id (`<a@b>` → `a@b`).
pub fn strip_angle_brackets(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Parse an email date string and convert it to UTC.
///
/// RFC 2822 and RFC 3339 are tried directly; named zones such as `EST`
/// and other broken real-world variants go through `mail-parser`.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Drop trailing comments: "... +0000 (UTC)".
    let without_comment = match trimmed.find('(') {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };

    for candidate in [trimmed, without_comment] {
        if let Ok(dt) = DateTime::parse_from_rfc2822(candidate) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(candidate) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Parse a date using `mail-parser` by wrapping it in a minimal message.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfold_and_order() {
        let raw = b"Subject: This is a long\n\tsubject line\nFrom: user@example.com\nReceived: a\nReceived: b\n";
        let block = HeaderBlock::parse(raw).unwrap();
        assert_eq!(block.first("subject"), Some("This is a long subject line"));

        let header = block.to_header();
        let names: Vec<&str> = header.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Subject", "From", "Received"]);
        assert_eq!(header.get_all("received"), ["a", "b"]);
    }

    #[test]
    fn test_malformed_line_is_parse_error() {
        let raw = b"Subject: ok\nthis line has no colon\n";
        assert!(matches!(HeaderBlock::parse(raw), Err(EmlError::Parse(_))));
    }

    #[test]
    fn test_no_headers_is_parse_error() {
        assert!(HeaderBlock::parse(b"").is_err());
        assert!(HeaderBlock::parse(b"\n\nbody").is_err());
    }

    #[test]
    fn test_split_header_section() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        let (head, body_start) = split_header_section(data);
        assert_eq!(head, b"From: a@b.com\nSubject: Hi");
        assert_eq!(&data[body_start..], b"Body\n");

        let crlf = b"From: a@b.com\r\n\r\nBody";
        let (head, body_start) = split_header_section(crlf);
        assert_eq!(head, b"From: a@b.com");
        assert_eq!(&crlf[body_start..], b"Body");
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_plain_value_untouched() {
        assert_eq!(decode_encoded_words("Plain subject"), "Plain subject");
    }

    #[test]
    fn test_address_list_joins_repeated_headers() {
        let raw = b"To: A <a@x.com>\nTo: b@x.com, =?UTF-8?B?Sm9zw6k=?= <j@x.com>\n";
        let block = HeaderBlock::parse(raw).unwrap();
        let to = block.address_list("to");
        assert_eq!(to.len(), 3);
        assert_eq!(to[0].name, "A");
        assert_eq!(to[1].address, "b@x.com");
        assert_eq!(to[2].name, "José");
        assert!(block.address_list("cc").is_empty());
    }

    #[test]
    fn test_message_id_list() {
        assert_eq!(
            message_id_list("<a@b.com> <c@d.com>\t<e@f.com>"),
            vec!["a@b.com", "c@d.com", "e@f.com"]
        );
        assert_eq!(message_id_list("bare@id"), vec!["bare@id"]);
        assert!(message_id_list("").is_empty());
        assert_eq!(strip_angle_brackets(" <x@y> "), "x@y");
    }

    #[test]
    fn test_parse_date_normalizes_to_utc() {
        let a = parse_date("Thu, 04 Jan 2024 10:00:00 +0200").unwrap();
        let b = parse_date("Thu, 04 Jan 2024 08:00:00 +0000").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_rfc3339(), "2024-01-04T08:00:00+00:00");
    }

    #[test]
    fn test_parse_date_with_comment() {
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 +0000 (UTC)").is_some());
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_date_missing_is_none() {
        let block = HeaderBlock::parse(b"Subject: x\nDate: Thu, 04 Jan 2024 10:00:00 +0000\n").unwrap();
        assert!(block.date("resent-date").unwrap().is_none());
        assert!(block.date("date").unwrap().is_some());
    }
}
