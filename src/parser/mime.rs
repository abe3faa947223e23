//! MIME parsing: turns raw message bytes into header fields, bodies, and
//! binary parts. Nothing here touches the content store.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};

use crate::error::{EmlError, Result};
use crate::model::address::Addresses;
use crate::model::email::Header;
use crate::parser::header::{self, HeaderBlock};

/// A decoded binary part, still holding its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPart {
    /// Filename for attachments, `Content-ID` (no brackets) for embedded files.
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// `Resent-*` fields as found in the message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResent {
    pub addresses: Addresses,
    pub message_id: String,
    pub date: Option<DateTime<Utc>>,
}

/// Everything the converter needs from one raw message.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub headers: Header,
    pub subject: String,
    pub addresses: Addresses,
    pub date: Option<DateTime<Utc>>,
    pub message_id: String,
    pub in_reply_to: Vec<String>,
    pub references: Vec<String>,
    /// `None` when the message carries no resent address at all.
    pub resent: Option<ParsedResent>,
    pub text_body: String,
    pub html_body: String,
    /// Parts in message order.
    pub attachments: Vec<BinaryPart>,
    /// Inline parts with a `Content-ID`, in message order.
    pub embedded_files: Vec<BinaryPart>,
}

/// Parse a complete raw message (headers + body).
///
/// Fails with [`EmlError::Parse`] on empty input, a malformed header
/// block, an unparseable `Date`, or a body `mail-parser` rejects.
pub fn parse_message(raw_message: &[u8]) -> Result<ParsedMessage> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(EmlError::Parse("empty message".into()));
    }

    let (header_bytes, _) = header::split_header_section(message_bytes);
    let block = HeaderBlock::parse(header_bytes)?;

    let msg = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| EmlError::Parse("MIME structure could not be parsed".into()))?;

    let subject = block
        .first("subject")
        .map(header::decode_encoded_words)
        .unwrap_or_default();

    let addresses = Addresses {
        sender: block.single_address("sender"),
        from: block.address_list("from"),
        reply_to: block.address_list("reply-to"),
        to: block.address_list("to"),
        cc: block.address_list("cc"),
        bcc: block.address_list("bcc"),
    };

    let message_id = block
        .first("message-id")
        .map(header::strip_angle_brackets)
        .unwrap_or_default();

    let mut text_body = String::new();
    for part in msg.text_bodies().filter(|p| !p.is_text_html()) {
        if let Some(text) = part.text_contents() {
            text_body.push_str(text);
        }
    }
    let mut html_body = String::new();
    for part in msg.html_bodies().filter(|p| p.is_text_html()) {
        if let Some(html) = part.text_contents() {
            html_body.push_str(html);
        }
    }

    let (attachments, embedded_files) = split_binary_parts(&msg);

    Ok(ParsedMessage {
        headers: block.to_header(),
        subject,
        addresses,
        date: block.date("date")?,
        message_id,
        in_reply_to: block.message_ids("in-reply-to"),
        references: block.message_ids("references"),
        resent: parse_resent(&block)?,
        text_body,
        html_body,
        attachments,
        embedded_files,
    })
}

/// Collect the `Resent-*` block, or `None` if every resent list is empty.
fn parse_resent(block: &HeaderBlock) -> Result<Option<ParsedResent>> {
    let addresses = Addresses {
        sender: block.single_address("resent-sender"),
        from: block.address_list("resent-from"),
        reply_to: Vec::new(),
        to: block.address_list("resent-to"),
        cc: block.address_list("resent-cc"),
        bcc: block.address_list("resent-bcc"),
    };

    let any_list = !(addresses.from.is_empty()
        && addresses.to.is_empty()
        && addresses.cc.is_empty()
        && addresses.bcc.is_empty());
    if !any_list {
        return Ok(None);
    }

    Ok(Some(ParsedResent {
        addresses,
        message_id: block
            .first("resent-message-id")
            .map(header::strip_angle_brackets)
            .unwrap_or_default(),
        date: block.date("resent-date")?,
    }))
}

/// Sort the message's non-body parts into attachments and embedded files.
///
/// A part with a `Content-ID` that is not explicitly `attachment` is an
/// embedded file; everything else is an attachment.
fn split_binary_parts(msg: &mail_parser::Message<'_>) -> (Vec<BinaryPart>, Vec<BinaryPart>) {
    let mut attachments = Vec::new();
    let mut embedded = Vec::new();

    for part in msg.attachments() {
        let content_type = part
            .content_type()
            .map(|ct: &mail_parser::ContentType| {
                let main = ct.ctype();
                match ct.subtype() {
                    Some(sub) => format!("{main}/{sub}"),
                    None => main.to_string(),
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let is_attachment = part
            .content_disposition()
            .map(|d: &mail_parser::ContentType| d.ctype().eq_ignore_ascii_case("attachment"))
            .unwrap_or(false);

        let content_id = part
            .content_id()
            .map(header::strip_angle_brackets)
            .filter(|cid| !cid.is_empty());

        match content_id {
            Some(cid) if !is_attachment => embedded.push(BinaryPart {
                name: cid,
                content_type,
                data: part.contents().to_vec(),
            }),
            _ => attachments.push(BinaryPart {
                name: part.attachment_name().unwrap_or_default().to_string(),
                content_type,
                data: part.contents().to_vec(),
            }),
        }
    }

    (attachments, embedded)
}

/// Skip an MBOX `From ` separator line (and a UTF-8 BOM) at the start of the data.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
