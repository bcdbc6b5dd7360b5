// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP/1.1 binary message codec (RFC 8010 §3).
//
// ```text
// version-number:   2 bytes (major, minor)
// operation-id / status-code: 2 bytes (big-endian u16)
// request-id:       4 bytes (big-endian u32)
// attribute-groups: variable
//   delimiter-tag:  1 byte
//   attributes:     variable
//     value-tag:    1 byte
//     name-length:  2 bytes (big-endian u16)
//     name:         name-length bytes (empty for additional values)
//     value-length: 2 bytes (big-endian u16)
//     value:        value-length bytes
// end-of-attributes-tag: 1 byte (0x03)
// document-data:    remainder
// ```
//
// The codec knows nothing about printers, jobs or scheduling. It turns an
// [`IppMessage`] into bytes and back, and provides builders for the two
// operations cronprint sends.

pub mod status;
mod value;

use std::borrow::Cow;
use std::collections::HashMap;

use cronprint_core::error::{CronprintError, Result};
use cronprint_core::types::DocumentFormat;

pub use value::IppValue;

/// Media type of an IPP request or response body.
pub const IPP_CONTENT_TYPE: &str = "application/ipp";

/// IPP version 1.1 (major, minor).
pub const IPP_VERSION: (u8, u8) = (0x01, 0x01);

// ---------------------------------------------------------------------------
// Delimiter tags (RFC 8010 §3.5.1)
// ---------------------------------------------------------------------------

pub const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;
pub const TAG_JOB_ATTRIBUTES: u8 = 0x02;
pub const TAG_END_OF_ATTRIBUTES: u8 = 0x03;
pub const TAG_PRINTER_ATTRIBUTES: u8 = 0x04;
pub const TAG_UNSUPPORTED_ATTRIBUTES: u8 = 0x05;

// ---------------------------------------------------------------------------
// Value tags (RFC 8010 §3.5.2)
// ---------------------------------------------------------------------------

pub const VALUE_TAG_UNSUPPORTED: u8 = 0x10;
pub const VALUE_TAG_UNKNOWN: u8 = 0x12;
pub const VALUE_TAG_NO_VALUE: u8 = 0x13;
pub const VALUE_TAG_INTEGER: u8 = 0x21;
pub const VALUE_TAG_BOOLEAN: u8 = 0x22;
pub const VALUE_TAG_ENUM: u8 = 0x23;
pub const VALUE_TAG_OCTET_STRING: u8 = 0x30;
pub const VALUE_TAG_DATE_TIME: u8 = 0x31;
pub const VALUE_TAG_RESOLUTION: u8 = 0x32;
pub const VALUE_TAG_RANGE_OF_INTEGER: u8 = 0x33;
pub const VALUE_TAG_BEG_COLLECTION: u8 = 0x34;
pub const VALUE_TAG_TEXT_WITH_LANGUAGE: u8 = 0x35;
pub const VALUE_TAG_NAME_WITH_LANGUAGE: u8 = 0x36;
pub const VALUE_TAG_END_COLLECTION: u8 = 0x37;
pub const VALUE_TAG_TEXT: u8 = 0x41;
pub const VALUE_TAG_NAME: u8 = 0x42;
pub const VALUE_TAG_KEYWORD: u8 = 0x44;
pub const VALUE_TAG_URI: u8 = 0x45;
pub const VALUE_TAG_URI_SCHEME: u8 = 0x46;
pub const VALUE_TAG_CHARSET: u8 = 0x47;
pub const VALUE_TAG_NATURAL_LANGUAGE: u8 = 0x48;
pub const VALUE_TAG_MIME_MEDIA_TYPE: u8 = 0x49;
pub const VALUE_TAG_MEMBER_ATTR_NAME: u8 = 0x4A;

// ---------------------------------------------------------------------------
// Operations (RFC 8011 §4)
// ---------------------------------------------------------------------------

pub const OP_PRINT_JOB: u16 = 0x0002;
pub const OP_GET_PRINTER_ATTRIBUTES: u16 = 0x000B;

/// `successful-ok`. The only status cronprint treats as success.
pub const STATUS_OK: u16 = 0x0000;

/// Attributes asked for by Get-Printer-Attributes.
pub const REQUESTED_PRINTER_ATTRIBUTES: [&str; 3] = [
    "printer-state",
    "printer-state-reasons",
    "printer-make-and-model",
];

/// Nesting limit for collection values.
const MAX_COLLECTION_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Message model
// ---------------------------------------------------------------------------

/// A named attribute with one or more values.
///
/// All values are written with `value_tag`; on decode it is the tag of the
/// first value.
#[derive(Debug, Clone, PartialEq)]
pub struct IppAttribute {
    pub name: String,
    pub value_tag: u8,
    pub values: Vec<IppValue>,
}

impl IppAttribute {
    pub fn new(name: impl Into<String>, value_tag: u8, value: IppValue) -> Self {
        Self {
            name: name.into(),
            value_tag,
            values: vec![value],
        }
    }

    pub fn first(&self) -> Option<&IppValue> {
        self.values.first()
    }
}

/// Multi-valued attributes render as their values joined by `", "`.
impl std::fmt::Display for IppAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Attributes under one delimiter tag.
#[derive(Debug, Clone, PartialEq)]
pub struct IppAttributeGroup {
    pub delimiter: u8,
    pub attributes: Vec<IppAttribute>,
}

impl IppAttributeGroup {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            attributes: Vec::new(),
        }
    }

    /// First attribute with the given name.
    pub fn get(&self, name: &str) -> Option<&IppAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// First value of the named attribute, if it is string-like.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(IppAttribute::first).and_then(IppValue::as_str)
    }
}

/// One IPP request or response.
///
/// `code` is the operation-id in a request and the status-code in a response.
#[derive(Debug, Clone, PartialEq)]
pub struct IppMessage {
    pub version: (u8, u8),
    pub code: u16,
    pub request_id: u32,
    pub groups: Vec<IppAttributeGroup>,
}

impl IppMessage {
    pub fn new(code: u16, request_id: u32) -> Self {
        Self {
            version: IPP_VERSION,
            code,
            request_id,
            groups: Vec::new(),
        }
    }

    /// First group with the given delimiter.
    pub fn group(&self, delimiter: u8) -> Option<&IppAttributeGroup> {
        self.groups.iter().find(|g| g.delimiter == delimiter)
    }

    pub fn operation_attributes(&self) -> Option<&IppAttributeGroup> {
        self.group(TAG_OPERATION_ATTRIBUTES)
    }

    pub fn is_successful_ok(&self) -> bool {
        self.code == STATUS_OK
    }

    /// Keyword name of the response status.
    pub fn status_name(&self) -> Cow<'static, str> {
        status::status_name(self.code)
    }

    /// The printer's `status-message`, if it sent one.
    pub fn status_message(&self) -> Option<String> {
        self.operation_attributes()
            .and_then(|g| g.get_string("status-message"))
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }

    /// Every attribute of every group as `name -> display string`.
    ///
    /// Groups are visited in order, so a name repeated in a later group
    /// overwrites the earlier one.
    pub fn flatten(&self) -> HashMap<String, String> {
        let mut flat = HashMap::new();
        for group in &self.groups {
            for attr in &group.attributes {
                flat.insert(attr.name.clone(), attr.to_string());
            }
        }
        flat
    }

    // -- Encoding --------------------------------------------------------

    /// Serialise the message, including the end-of-attributes tag.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        buf.push(self.version.0);
        buf.push(self.version.1);
        buf.extend_from_slice(&self.code.to_be_bytes());
        buf.extend_from_slice(&self.request_id.to_be_bytes());

        for group in &self.groups {
            buf.push(group.delimiter);
            for attr in &group.attributes {
                write_attribute(&mut buf, attr, &attr.name)?;
            }
        }

        buf.push(TAG_END_OF_ATTRIBUTES);
        Ok(buf)
    }

    /// Serialise the message followed directly by `document`.
    pub fn encode_with_document(&self, document: &[u8]) -> Result<Vec<u8>> {
        let mut buf = self.encode()?;
        buf.extend_from_slice(document);
        Ok(buf)
    }

    // -- Decoding --------------------------------------------------------

    /// Parse a message, ignoring any document data after it.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with_payload(data).map(|(message, _)| message)
    }

    /// Parse a message and return the bytes that follow the
    /// end-of-attributes tag.
    pub fn decode_with_payload(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 9 {
            return Err(CronprintError::Decode(format!(
                "message too short: {} bytes (minimum 9)",
                data.len()
            )));
        }

        let mut reader = Reader::new(data);
        let version = (reader.u8("version")?, reader.u8("version")?);
        if !matches!(version.0, 1 | 2) {
            return Err(CronprintError::Decode(format!(
                "unsupported IPP version {}.{}",
                version.0, version.1
            )));
        }
        let code = reader.u16("status code")?;
        let request_id = reader.u32("request id")?;

        let mut groups: Vec<IppAttributeGroup> = Vec::new();
        loop {
            let tag = reader
                .u8("tag")
                .map_err(|_| CronprintError::Decode("missing end-of-attributes tag".into()))?;
            match tag {
                TAG_END_OF_ATTRIBUTES => break,
                0x00 => {
                    return Err(CronprintError::Decode(
                        "reserved delimiter tag 0x00".into(),
                    ));
                }
                0x01..=0x0F => groups.push(IppAttributeGroup::new(tag)),
                value_tag => {
                    let (name, value) = read_value(&mut reader, value_tag, 0)?;
                    let group = groups.last_mut().ok_or_else(|| {
                        CronprintError::Decode("attribute before the first group".into())
                    })?;
                    if name.is_empty() {
                        let attr = group.attributes.last_mut().ok_or_else(|| {
                            CronprintError::Decode("additional value without an attribute".into())
                        })?;
                        attr.values.push(value);
                    } else {
                        group.attributes.push(IppAttribute::new(
                            String::from_utf8_lossy(name),
                            value_tag,
                            value,
                        ));
                    }
                }
            }
        }

        let message = Self {
            version,
            code,
            request_id,
            groups,
        };
        Ok((message, reader.rest()))
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

/// Builds a request whose operation group already carries the three
/// mandatory attributes, in order: `attributes-charset`,
/// `attributes-natural-language`, `printer-uri`.
pub struct IppRequestBuilder {
    message: IppMessage,
}

impl IppRequestBuilder {
    pub fn new(operation: u16, request_id: u32, printer_uri: &str) -> Self {
        let mut builder = Self {
            message: IppMessage::new(operation, request_id),
        };
        builder
            .begin_group(TAG_OPERATION_ATTRIBUTES)
            .charset("attributes-charset", "utf-8")
            .natural_language("attributes-natural-language", "en-US")
            .uri("printer-uri", printer_uri);
        builder
    }

    /// Start a new attribute group; later attributes go into it.
    pub fn begin_group(&mut self, delimiter: u8) -> &mut Self {
        self.message.groups.push(IppAttributeGroup::new(delimiter));
        self
    }

    pub fn charset(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_CHARSET, name, value)
    }

    pub fn natural_language(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_NATURAL_LANGUAGE, name, value)
    }

    pub fn uri(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_URI, name, value)
    }

    pub fn name_attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_NAME, name, value)
    }

    pub fn mime_type(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_MIME_MEDIA_TYPE, name, value)
    }

    pub fn keyword(&mut self, name: &str, value: &str) -> &mut Self {
        self.string(VALUE_TAG_KEYWORD, name, value)
    }

    /// A `1setOf keyword` attribute.
    pub fn keywords(&mut self, name: &str, values: &[&str]) -> &mut Self {
        let values = values
            .iter()
            .map(|v| IppValue::String((*v).to_string()))
            .collect();
        self.push(IppAttribute {
            name: name.to_string(),
            value_tag: VALUE_TAG_KEYWORD,
            values,
        })
    }

    pub fn integer(&mut self, name: &str, value: i32) -> &mut Self {
        self.push(IppAttribute::new(name, VALUE_TAG_INTEGER, IppValue::Integer(value)))
    }

    pub fn boolean(&mut self, name: &str, value: bool) -> &mut Self {
        self.push(IppAttribute::new(name, VALUE_TAG_BOOLEAN, IppValue::Boolean(value)))
    }

    fn string(&mut self, value_tag: u8, name: &str, value: &str) -> &mut Self {
        self.push(IppAttribute::new(
            name,
            value_tag,
            IppValue::String(value.to_string()),
        ))
    }

    fn push(&mut self, attr: IppAttribute) -> &mut Self {
        if self.message.groups.is_empty() {
            self.begin_group(TAG_OPERATION_ATTRIBUTES);
        }
        if let Some(group) = self.message.groups.last_mut() {
            group.attributes.push(attr);
        }
        self
    }

    pub fn build(self) -> IppMessage {
        self.message
    }
}

/// Get-Printer-Attributes asking for state, state reasons and model.
pub fn get_printer_attributes_request(request_id: u32, printer_uri: &str) -> IppMessage {
    let mut builder =
        IppRequestBuilder::new(OP_GET_PRINTER_ATTRIBUTES, request_id, printer_uri);
    builder.keywords("requested-attributes", &REQUESTED_PRINTER_ATTRIBUTES);
    builder.build()
}

/// Print-Job header. The document bytes follow the encoded message.
pub fn print_job_request(
    request_id: u32,
    printer_uri: &str,
    user_name: &str,
    job_name: &str,
    format: DocumentFormat,
) -> IppMessage {
    let mut builder = IppRequestBuilder::new(OP_PRINT_JOB, request_id, printer_uri);
    builder
        .name_attr("requesting-user-name", user_name)
        .name_attr("job-name", job_name)
        .mime_type("document-format", format.mime_type());
    builder.build()
}

// ---------------------------------------------------------------------------
// Wire helpers
// ---------------------------------------------------------------------------

/// Write every value of `attr`; the first carries `name`, the rest an empty
/// name (RFC 8010 §3.1.4).
fn write_attribute(buf: &mut Vec<u8>, attr: &IppAttribute, name: &str) -> Result<()> {
    for (i, value) in attr.values.iter().enumerate() {
        let name = if i == 0 { name } else { "" };
        match value {
            IppValue::Collection(members) => {
                write_record(buf, VALUE_TAG_BEG_COLLECTION, name, &[])?;
                for member in members {
                    write_record(
                        buf,
                        VALUE_TAG_MEMBER_ATTR_NAME,
                        "",
                        member.name.as_bytes(),
                    )?;
                    write_attribute(buf, member, "")?;
                }
                write_record(buf, VALUE_TAG_END_COLLECTION, "", &[])?;
            }
            IppValue::OutOfBand(tag) => write_record(buf, *tag, name, &[])?,
            _ => write_record(buf, attr.value_tag, name, &value.encode()?)?,
        }
    }
    Ok(())
}

fn write_record(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) -> Result<()> {
    buf.push(value_tag);
    value::push_short_string(buf, name.as_bytes())?;
    value::push_short_string(buf, value)
}

/// Read one attribute record whose value tag has already been consumed.
/// Collections are read through to their matching end tag.
fn read_value<'a>(
    reader: &mut Reader<'a>,
    value_tag: u8,
    depth: usize,
) -> Result<(&'a [u8], IppValue)> {
    let name = reader.short_string("attribute name")?;
    let raw = reader.short_string("attribute value")?;
    let value = if value_tag == VALUE_TAG_BEG_COLLECTION {
        IppValue::Collection(read_collection(reader, depth + 1)?)
    } else {
        IppValue::decode(value_tag, raw)?
    };
    Ok((name, value))
}

fn read_collection(reader: &mut Reader<'_>, depth: usize) -> Result<Vec<IppAttribute>> {
    if depth > MAX_COLLECTION_DEPTH {
        return Err(CronprintError::Decode("collections nested too deeply".into()));
    }

    let mut members: Vec<IppAttribute> = Vec::new();
    let mut pending: Option<String> = None;
    loop {
        let tag = reader.u8("collection member tag")?;
        if tag <= 0x0F {
            return Err(CronprintError::Decode("unterminated collection".into()));
        }
        if tag == VALUE_TAG_END_COLLECTION || tag == VALUE_TAG_MEMBER_ATTR_NAME {
            let _ = reader.short_string("attribute name")?;
            let raw = reader.short_string("attribute value")?;
            if pending.is_some() {
                return Err(CronprintError::Decode("collection member without a value".into()));
            }
            if tag == VALUE_TAG_END_COLLECTION {
                return Ok(members);
            }
            pending = Some(String::from_utf8_lossy(raw).into_owned());
            continue;
        }

        let (_, value) = read_value(reader, tag, depth)?;
        match pending.take() {
            Some(name) => members.push(IppAttribute::new(name, tag, value)),
            None => members
                .last_mut()
                .ok_or_else(|| {
                    CronprintError::Decode("collection value without a member name".into())
                })?
                .values
                .push(value),
        }
    }
}

/// Bounds-checked cursor over a message body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| CronprintError::Decode(format!("truncated {what}")))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn short_string(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = self.u16(what)? as usize;
        self.take(len, what)
    }

    fn rest(self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled Get-Printer-Attributes response.
    fn printer_response(status: u16) -> Vec<u8> {
        let mut msg = IppMessage::new(status, 7);
        let mut op = IppAttributeGroup::new(TAG_OPERATION_ATTRIBUTES);
        op.attributes.push(IppAttribute::new(
            "attributes-charset",
            VALUE_TAG_CHARSET,
            IppValue::String("utf-8".into()),
        ));
        let mut printer = IppAttributeGroup::new(TAG_PRINTER_ATTRIBUTES);
        printer.attributes.push(IppAttribute::new(
            "printer-state",
            VALUE_TAG_ENUM,
            IppValue::Enum(3),
        ));
        printer.attributes.push(IppAttribute {
            name: "printer-state-reasons".into(),
            value_tag: VALUE_TAG_KEYWORD,
            values: vec![
                IppValue::String("media-low".into()),
                IppValue::String("toner-low".into()),
            ],
        });
        msg.groups = vec![op, printer];
        msg.encode().unwrap()
    }

    #[test]
    fn mandatory_operation_attributes_come_first_in_order() {
        let msg = get_printer_attributes_request(1, "ipp://printer.local/ipp/print");
        let op = msg.operation_attributes().unwrap();
        let names: Vec<&str> = op.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "attributes-charset",
                "attributes-natural-language",
                "printer-uri",
                "requested-attributes"
            ]
        );
        assert_eq!(op.attributes[0].value_tag, VALUE_TAG_CHARSET);
        assert_eq!(op.attributes[1].value_tag, VALUE_TAG_NATURAL_LANGUAGE);
        assert_eq!(op.attributes[2].value_tag, VALUE_TAG_URI);
        assert_eq!(op.get_string("attributes-charset"), Some("utf-8"));
        assert_eq!(op.get_string("attributes-natural-language"), Some("en-US"));
        assert_eq!(
            op.get_string("printer-uri"),
            Some("ipp://printer.local/ipp/print")
        );
    }

    #[test]
    fn get_printer_attributes_requests_state_and_model() {
        let msg = get_printer_attributes_request(1, "ipp://p/ipp/print");
        let requested = msg
            .operation_attributes()
            .unwrap()
            .get("requested-attributes")
            .unwrap();
        assert_eq!(requested.value_tag, VALUE_TAG_KEYWORD);
        assert_eq!(
            requested.to_string(),
            "printer-state, printer-state-reasons, printer-make-and-model"
        );
    }

    #[test]
    fn print_job_carries_user_job_and_format() {
        let msg = print_job_request(
            2,
            "ipp://p/ipp/print",
            "cronprint",
            "daily",
            DocumentFormat::PostScript,
        );
        assert_eq!(msg.code, OP_PRINT_JOB);
        let op = msg.operation_attributes().unwrap();
        assert_eq!(op.get("requesting-user-name").unwrap().value_tag, VALUE_TAG_NAME);
        assert_eq!(op.get_string("requesting-user-name"), Some("cronprint"));
        assert_eq!(op.get_string("job-name"), Some("daily"));
        let format = op.get("document-format").unwrap();
        assert_eq!(format.value_tag, VALUE_TAG_MIME_MEDIA_TYPE);
        assert_eq!(format.to_string(), "application/postscript");
    }

    #[test]
    fn encoded_header_layout() {
        let bytes = get_printer_attributes_request(0x0102_0304, "ipp://p/")
            .encode()
            .unwrap();
        assert_eq!(&bytes[..8], &[0x01, 0x01, 0x00, 0x0B, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(bytes[8], TAG_OPERATION_ATTRIBUTES);
        // attributes-charset, first attribute on the wire
        assert_eq!(bytes[9], VALUE_TAG_CHARSET);
        assert_eq!(&bytes[10..12], &[0x00, 18]);
        assert_eq!(&bytes[12..30], b"attributes-charset");
        assert_eq!(&bytes[30..32], &[0x00, 5]);
        assert_eq!(&bytes[32..37], b"utf-8");
        assert_eq!(*bytes.last().unwrap(), TAG_END_OF_ATTRIBUTES);
    }

    #[test]
    fn additional_values_have_empty_names() {
        let bytes = get_printer_attributes_request(1, "ipp://p/").encode().unwrap();
        // "printer-state-reasons" is the second requested keyword, written
        // as keyword tag + zero name length.
        let needle = b"printer-state-reasons";
        let at = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        assert_eq!(&bytes[at - 5..at - 2], &[VALUE_TAG_KEYWORD, 0x00, 0x00]);
    }

    #[test]
    fn document_follows_end_of_attributes() {
        let msg = print_job_request(3, "ipp://p/", "u", "j", DocumentFormat::Pdf);
        let body = msg.encode_with_document(b"%PDF-1.4 body").unwrap();
        let (decoded, payload) = IppMessage::decode_with_payload(&body).unwrap();
        assert_eq!(payload, b"%PDF-1.4 body");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn decodes_and_flattens_response() {
        let msg = IppMessage::decode(&printer_response(STATUS_OK)).unwrap();
        assert!(msg.is_successful_ok());
        assert_eq!(msg.request_id, 7);
        let flat = msg.flatten();
        assert_eq!(flat["printer-state"], "3");
        assert_eq!(flat["printer-state-reasons"], "media-low, toner-low");
        assert_eq!(flat["attributes-charset"], "utf-8");
    }

    #[test]
    fn flatten_is_last_write_wins() {
        let mut msg = IppMessage::new(STATUS_OK, 1);
        for (delimiter, model) in [(TAG_PRINTER_ATTRIBUTES, "first"), (TAG_JOB_ATTRIBUTES, "second")] {
            let mut group = IppAttributeGroup::new(delimiter);
            group.attributes.push(IppAttribute::new(
                "printer-make-and-model",
                VALUE_TAG_TEXT,
                IppValue::String(model.into()),
            ));
            msg.groups.push(group);
        }
        assert_eq!(msg.flatten()["printer-make-and-model"], "second");
    }

    #[test]
    fn non_ok_status_is_reported_by_name_with_message() {
        let mut msg = IppMessage::decode(&printer_response(0x0507)).unwrap();
        assert!(!msg.is_successful_ok());
        assert_eq!(msg.status_name(), "server-error-busy");
        assert_eq!(msg.status_message(), None);

        msg.groups[0].attributes.push(IppAttribute::new(
            "status-message",
            VALUE_TAG_TEXT,
            IppValue::String("warming up".into()),
        ));
        assert_eq!(msg.status_message().as_deref(), Some("warming up"));
    }

    #[test]
    fn informational_success_codes_are_not_ok() {
        let msg = IppMessage::new(0x0001, 1);
        assert!(!msg.is_successful_ok());
    }

    #[test]
    fn collections_round_trip() {
        let media_size = IppValue::Collection(vec![
            IppAttribute::new("x-dimension", VALUE_TAG_INTEGER, IppValue::Integer(21000)),
            IppAttribute::new("y-dimension", VALUE_TAG_INTEGER, IppValue::Integer(29700)),
        ]);
        let media_col = IppValue::Collection(vec![
            IppAttribute::new("media-size", VALUE_TAG_BEG_COLLECTION, media_size),
            IppAttribute::new(
                "media-source",
                VALUE_TAG_KEYWORD,
                IppValue::String("auto".into()),
            ),
        ]);
        let mut msg = IppMessage::new(STATUS_OK, 1);
        let mut group = IppAttributeGroup::new(TAG_PRINTER_ATTRIBUTES);
        group.attributes.push(IppAttribute::new(
            "media-col-default",
            VALUE_TAG_BEG_COLLECTION,
            media_col,
        ));
        group.attributes.push(IppAttribute::new(
            "printer-state",
            VALUE_TAG_ENUM,
            IppValue::Enum(4),
        ));
        msg.groups.push(group);

        let decoded = IppMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        let flat = decoded.flatten();
        assert_eq!(
            flat["media-col-default"],
            "{media-size={x-dimension=21000 y-dimension=29700} media-source=auto}"
        );
        assert_eq!(flat["printer-state"], "4");
    }

    #[test]
    fn out_of_band_values_encode_without_payload() {
        let mut msg = IppMessage::new(STATUS_OK, 1);
        let mut group = IppAttributeGroup::new(TAG_PRINTER_ATTRIBUTES);
        group.attributes.push(IppAttribute::new(
            "printer-info",
            VALUE_TAG_NO_VALUE,
            IppValue::OutOfBand(VALUE_TAG_NO_VALUE),
        ));
        msg.groups.push(group);
        let decoded = IppMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.flatten()["printer-info"], "no-value");
    }

    #[test]
    fn malformed_bodies_are_decode_errors() {
        let good = printer_response(STATUS_OK);
        let cases: Vec<(&str, Vec<u8>)> = vec![
            ("empty", Vec::new()),
            ("short header", good[..6].to_vec()),
            ("html", b"<html><body>Not Found</body></html>".to_vec()),
            ("missing end tag", good[..good.len() - 1].to_vec()),
            ("truncated value", good[..good.len() - 4].to_vec()),
            (
                "attribute before group",
                vec![1, 1, 0, 0, 0, 0, 0, 1, 0x44, 0, 1, b'a', 0, 1, b'b', 3],
            ),
            (
                "orphan additional value",
                vec![1, 1, 0, 0, 0, 0, 0, 1, 0x04, 0x44, 0, 0, 0, 1, b'b', 3],
            ),
            ("reserved delimiter", vec![1, 1, 0, 0, 0, 0, 0, 1, 0x00, 3]),
        ];
        for (label, bytes) in cases {
            let err = IppMessage::decode(&bytes).unwrap_err();
            assert!(
                matches!(err, CronprintError::Decode(_)),
                "{label}: unexpected {err:?}"
            );
            assert!(err.to_string().starts_with("decode IPP response"), "{label}");
        }
    }

    #[test]
    fn oversized_value_is_an_encode_error() {
        let mut builder = IppRequestBuilder::new(OP_PRINT_JOB, 1, "ipp://p/");
        builder.name_attr("job-name", &"x".repeat(70_000));
        let err = builder.build().encode().unwrap_err();
        assert!(matches!(err, CronprintError::Encode(_)));
    }

    #[test]
    fn request_ids_and_groups_survive_round_trip() {
        let mut builder = IppRequestBuilder::new(OP_PRINT_JOB, 42, "ipp://p/");
        builder
            .begin_group(TAG_JOB_ATTRIBUTES)
            .integer("copies", 2)
            .boolean("page-ranges-supported", true)
            .keyword("sides", "one-sided");
        let msg = builder.build();
        let decoded = IppMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.request_id, 42);
        assert_eq!(decoded.groups.len(), 2);
        assert_eq!(decoded, msg);
    }
}
