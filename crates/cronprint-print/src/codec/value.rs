// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed IPP attribute values and their wire encodings (RFC 8010 §3.9).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Timelike};

use cronprint_core::error::{CronprintError, Result};

use super::*;

/// A single decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum IppValue {
    /// `integer` (0x21).
    Integer(i32),
    /// `boolean` (0x22).
    Boolean(bool),
    /// `enum` (0x23).
    Enum(i32),
    /// Any string-valued tag: text, name, keyword, uri, uriScheme, charset,
    /// naturalLanguage, mimeMediaType, memberAttrName.
    String(String),
    /// `textWithLanguage` / `nameWithLanguage`.
    StringWithLanguage { language: String, text: String },
    /// `dateTime` (RFC 2579 DateAndTime).
    DateTime(DateTime<FixedOffset>),
    /// `resolution`: cross-feed, feed, units (3 = dpi, 4 = dpcm).
    Resolution { cross_feed: i32, feed: i32, units: u8 },
    /// `rangeOfInteger`.
    Range { lower: i32, upper: i32 },
    /// `unsupported`, `unknown`, `no-value` and other out-of-band tags.
    OutOfBand(u8),
    /// `begCollection` ... `endCollection`, members in wire order.
    Collection(Vec<IppAttribute>),
    /// `octetString`, extension and unassigned tags.
    Octets(Vec<u8>),
}

impl IppValue {
    /// Serialise this value's bytes (without the length prefix).
    ///
    /// Collection members are written by the message encoder, not here.
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Integer(v) | Self::Enum(v) => v.to_be_bytes().to_vec(),
            Self::Boolean(v) => vec![u8::from(*v)],
            Self::String(s) => s.as_bytes().to_vec(),
            Self::StringWithLanguage { language, text } => {
                let mut buf = Vec::with_capacity(4 + language.len() + text.len());
                push_short_string(&mut buf, language.as_bytes())?;
                push_short_string(&mut buf, text.as_bytes())?;
                buf
            }
            Self::DateTime(dt) => encode_date_time(dt)?,
            Self::Resolution {
                cross_feed,
                feed,
                units,
            } => {
                let mut buf = Vec::with_capacity(9);
                buf.extend_from_slice(&cross_feed.to_be_bytes());
                buf.extend_from_slice(&feed.to_be_bytes());
                buf.push(*units);
                buf
            }
            Self::Range { lower, upper } => {
                let mut buf = Vec::with_capacity(8);
                buf.extend_from_slice(&lower.to_be_bytes());
                buf.extend_from_slice(&upper.to_be_bytes());
                buf
            }
            Self::OutOfBand(_) | Self::Collection(_) => Vec::new(),
            Self::Octets(bytes) => bytes.clone(),
        };
        Ok(bytes)
    }

    /// Interpret raw value bytes according to `value_tag`.
    pub(crate) fn decode(value_tag: u8, raw: &[u8]) -> Result<Self> {
        let value = match value_tag {
            0x10..=0x1F => Self::OutOfBand(value_tag),
            VALUE_TAG_INTEGER => Self::Integer(read_i32(value_tag, raw)?),
            VALUE_TAG_ENUM => Self::Enum(read_i32(value_tag, raw)?),
            VALUE_TAG_BOOLEAN => match raw {
                [b] => Self::Boolean(*b != 0),
                _ => return Err(bad_length(value_tag, 1, raw.len())),
            },
            VALUE_TAG_DATE_TIME => {
                if raw.len() != 11 {
                    return Err(bad_length(value_tag, 11, raw.len()));
                }
                decode_date_time(raw).map_or_else(|| Self::Octets(raw.to_vec()), Self::DateTime)
            }
            VALUE_TAG_RESOLUTION => {
                if raw.len() != 9 {
                    return Err(bad_length(value_tag, 9, raw.len()));
                }
                Self::Resolution {
                    cross_feed: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
                    feed: i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
                    units: raw[8],
                }
            }
            VALUE_TAG_RANGE_OF_INTEGER => {
                if raw.len() != 8 {
                    return Err(bad_length(value_tag, 8, raw.len()));
                }
                Self::Range {
                    lower: i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
                    upper: i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
                }
            }
            VALUE_TAG_TEXT_WITH_LANGUAGE | VALUE_TAG_NAME_WITH_LANGUAGE => {
                let (language, rest) = read_short_string(raw)?;
                let (text, rest) = read_short_string(rest)?;
                if !rest.is_empty() {
                    return Err(CronprintError::Decode(format!(
                        "{} trailing bytes after string-with-language",
                        rest.len()
                    )));
                }
                Self::StringWithLanguage {
                    language: String::from_utf8_lossy(language).into_owned(),
                    text: String::from_utf8_lossy(text).into_owned(),
                }
            }
            VALUE_TAG_TEXT
            | VALUE_TAG_NAME
            | VALUE_TAG_KEYWORD
            | VALUE_TAG_URI
            | VALUE_TAG_URI_SCHEME
            | VALUE_TAG_CHARSET
            | VALUE_TAG_NATURAL_LANGUAGE
            | VALUE_TAG_MIME_MEDIA_TYPE
            | VALUE_TAG_MEMBER_ATTR_NAME => Self::String(String::from_utf8_lossy(raw).into_owned()),
            _ => Self::Octets(raw.to_vec()),
        };
        Ok(value)
    }

    /// The string payload of string-like values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::StringWithLanguage { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The integer payload of `integer` and `enum` values.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) | Self::Enum(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for IppValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) | Self::Enum(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::StringWithLanguage { text, .. } => f.write_str(text),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Self::Resolution {
                cross_feed,
                feed,
                units,
            } => {
                let unit = match units {
                    3 => "dpi",
                    4 => "dpcm",
                    _ => "",
                };
                write!(f, "{cross_feed}x{feed}{unit}")
            }
            Self::Range { lower, upper } => write!(f, "{lower}-{upper}"),
            Self::OutOfBand(tag) => f.write_str(out_of_band_name(*tag)),
            Self::Collection(members) => {
                f.write_str("{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}={member}", member.name)?;
                }
                f.write_str("}")
            }
            Self::Octets(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) if s.chars().all(|c| !c.is_control()) => f.write_str(s),
                _ => f.write_str(&hex::encode(bytes)),
            },
        }
    }
}

fn out_of_band_name(tag: u8) -> &'static str {
    match tag {
        VALUE_TAG_UNSUPPORTED => "unsupported",
        VALUE_TAG_UNKNOWN => "unknown",
        VALUE_TAG_NO_VALUE => "no-value",
        _ => "out-of-band",
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_i32(value_tag: u8, raw: &[u8]) -> Result<i32> {
    match raw {
        [a, b, c, d] => Ok(i32::from_be_bytes([*a, *b, *c, *d])),
        _ => Err(bad_length(value_tag, 4, raw.len())),
    }
}

fn bad_length(value_tag: u8, expected: usize, actual: usize) -> CronprintError {
    CronprintError::Decode(format!(
        "value tag 0x{value_tag:02x} expects {expected} bytes, got {actual}"
    ))
}

/// Append a 2-byte length prefix followed by `bytes`.
pub(crate) fn push_short_string(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| {
        CronprintError::Encode(format!("{} bytes exceeds the 16-bit length field", bytes.len()))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Split a 2-byte length-prefixed string off the front of `data`.
fn read_short_string(data: &[u8]) -> Result<(&[u8], &[u8])> {
    if data.len() < 2 {
        return Err(CronprintError::Decode("truncated string length".into()));
    }
    let len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    if rest.len() < len {
        return Err(CronprintError::Decode("truncated string value".into()));
    }
    Ok(rest.split_at(len))
}

/// RFC 2579 DateAndTime, 11-octet form.
fn encode_date_time(dt: &DateTime<FixedOffset>) -> Result<Vec<u8>> {
    let year = u16::try_from(dt.year())
        .map_err(|_| CronprintError::Encode(format!("year {} out of range", dt.year())))?;
    let offset_secs = dt.offset().fix().local_minus_utc();
    let direction = if offset_secs < 0 { b'-' } else { b'+' };
    let offset_mins = offset_secs.unsigned_abs() / 60;

    let mut buf = Vec::with_capacity(11);
    buf.extend_from_slice(&year.to_be_bytes());
    buf.push(dt.month() as u8);
    buf.push(dt.day() as u8);
    buf.push(dt.hour() as u8);
    buf.push(dt.minute() as u8);
    buf.push(dt.second() as u8);
    buf.push((dt.nanosecond() / 100_000_000).min(9) as u8);
    buf.push(direction);
    buf.push((offset_mins / 60) as u8);
    buf.push((offset_mins % 60) as u8);
    Ok(buf)
}

fn decode_date_time(raw: &[u8]) -> Option<DateTime<FixedOffset>> {
    let year = i32::from(u16::from_be_bytes([raw[0], raw[1]]));
    let naive = NaiveDate::from_ymd_opt(year, u32::from(raw[2]), u32::from(raw[3]))?
        .and_hms_milli_opt(
            u32::from(raw[4]),
            u32::from(raw[5]),
            u32::from(raw[6]),
            u32::from(raw[7]) * 100,
        )?;
    let offset_secs = (i32::from(raw[9]) * 60 + i32::from(raw[10])) * 60;
    let offset = match raw[8] {
        b'+' => FixedOffset::east_opt(offset_secs)?,
        b'-' => FixedOffset::west_opt(offset_secs)?,
        _ => return None,
    };
    offset.from_local_datetime(&naive).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_four_byte_big_endian() {
        assert_eq!(IppValue::Integer(7).encode().unwrap(), vec![0, 0, 0, 7]);
        assert_eq!(
            IppValue::decode(VALUE_TAG_ENUM, &[0, 0, 0, 3]).unwrap(),
            IppValue::Enum(3)
        );
        assert!(IppValue::decode(VALUE_TAG_INTEGER, &[0, 1]).is_err());
    }

    #[test]
    fn boolean_requires_one_byte() {
        assert_eq!(
            IppValue::decode(VALUE_TAG_BOOLEAN, &[1]).unwrap(),
            IppValue::Boolean(true)
        );
        assert!(IppValue::decode(VALUE_TAG_BOOLEAN, &[]).is_err());
    }

    #[test]
    fn string_with_language_round_trips() {
        let value = IppValue::StringWithLanguage {
            language: "de".into(),
            text: "Papierstau".into(),
        };
        let raw = value.encode().unwrap();
        assert_eq!(&raw[..4], &[0, 2, b'd', b'e']);
        assert_eq!(
            IppValue::decode(VALUE_TAG_TEXT_WITH_LANGUAGE, &raw).unwrap(),
            value
        );
        assert_eq!(value.to_string(), "Papierstau");
    }

    #[test]
    fn date_time_uses_rfc2579_layout() {
        let dt = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .unwrap();
        let raw = IppValue::DateTime(dt).encode().unwrap();
        assert_eq!(raw, vec![0x07, 0xE8, 1, 1, 9, 0, 0, 0, b'-', 5, 0]);
        assert_eq!(
            IppValue::decode(VALUE_TAG_DATE_TIME, &raw).unwrap(),
            IppValue::DateTime(dt)
        );
    }

    #[test]
    fn invalid_calendar_date_falls_back_to_octets() {
        let raw = [0x07, 0xE8, 13, 40, 0, 0, 0, 0, b'+', 0, 0];
        assert!(matches!(
            IppValue::decode(VALUE_TAG_DATE_TIME, &raw).unwrap(),
            IppValue::Octets(_)
        ));
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            IppValue::Resolution {
                cross_feed: 600,
                feed: 600,
                units: 3
            }
            .to_string(),
            "600x600dpi"
        );
        assert_eq!(IppValue::Range { lower: 1, upper: 99 }.to_string(), "1-99");
        assert_eq!(IppValue::OutOfBand(VALUE_TAG_NO_VALUE).to_string(), "no-value");
        assert_eq!(IppValue::Octets(vec![0x00, 0xff]).to_string(), "00ff");
        assert_eq!(IppValue::Octets(b"plain".to_vec()).to_string(), "plain");
    }

    #[test]
    fn out_of_band_ignores_payload() {
        assert_eq!(
            IppValue::decode(VALUE_TAG_UNKNOWN, &[]).unwrap(),
            IppValue::OutOfBand(VALUE_TAG_UNKNOWN)
        );
    }
}
