//! `EVENTLOGRECORD` parsing.
//!
//! A read buffer holds back-to-back records, each starting with a 56-byte
//! little-endian header. Only the header fields the decoder needs are kept;
//! the insertion-string block is copied out as raw UTF-16LE bytes.

use std::fmt;

pub const RECORD_HEADER_LEN: usize = 56;

/// `'LfLe'` record signature.
const RECORD_SIGNATURE: u32 = 0x654c_664c;

const OFF_LENGTH: usize = 0;
const OFF_RESERVED: usize = 4;
const OFF_RECORD_NUMBER: usize = 8;
const OFF_TIME_GENERATED: usize = 12;
const OFF_EVENT_ID: usize = 20;
const OFF_NUM_STRINGS: usize = 26;
const OFF_STRING_OFFSET: usize = 36;
const OFF_DATA_LENGTH: usize = 48;
const OFF_DATA_OFFSET: usize = 52;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub record_number: u32,
    /// Full EventID as stored; the event code is the low 16 bits.
    pub event_id: u32,
    /// Seconds since the Unix epoch.
    pub time_generated: u32,
    pub num_strings: u16,
    /// Insertion strings as UTF-16LE, NUL terminated per entry.
    pub strings: Vec<u8>,
}

impl RawRecord {
    /// Build a record from already-split insertion strings.
    pub fn with_strings(
        record_number: u32,
        event_id: u32,
        time_generated: u32,
        strings: &[&str],
    ) -> Self {
        let mut block = Vec::new();
        for value in strings {
            for unit in value.encode_utf16() {
                block.extend_from_slice(&unit.to_le_bytes());
            }
            block.extend_from_slice(&[0, 0]);
        }

        Self {
            record_number,
            event_id,
            time_generated,
            num_strings: strings.len().min(u16::MAX as usize) as u16,
            strings: block,
        }
    }

    /// Event code without the severity/customer bits.
    pub fn event_code(&self) -> u32 {
        self.event_id & 0xFFFF
    }

    /// Parse the record at the start of `buf`.
    ///
    /// Returns the record and the number of bytes it occupies.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), DecodeSkip> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(DecodeSkip::new(None, SkipReason::HeaderOverrun));
        }

        let length = read_u32(buf, OFF_LENGTH) as usize;
        let record_number = read_u32(buf, OFF_RECORD_NUMBER);
        if length == 0 {
            return Err(DecodeSkip::new(Some(record_number), SkipReason::ZeroLength));
        }
        if length < RECORD_HEADER_LEN {
            return Err(DecodeSkip::new(Some(record_number), SkipReason::ShortLength));
        }
        if length > buf.len() {
            return Err(DecodeSkip::new(Some(record_number), SkipReason::BodyOverrun));
        }
        if read_u32(buf, OFF_RESERVED) != RECORD_SIGNATURE {
            return Err(DecodeSkip::new(Some(record_number), SkipReason::BadSignature));
        }

        let body = &buf[..length];
        let string_offset = read_u32(body, OFF_STRING_OFFSET) as usize;
        let data_length = read_u32(body, OFF_DATA_LENGTH) as usize;
        let data_offset = read_u32(body, OFF_DATA_OFFSET) as usize;

        // Strings run up to the data block, or to the trailing length copy.
        let mut strings_end = length.saturating_sub(4);
        if data_length > 0 && data_offset > string_offset && data_offset < strings_end {
            strings_end = data_offset;
        }
        let strings = if string_offset >= RECORD_HEADER_LEN && string_offset < strings_end {
            body[string_offset..strings_end].to_vec()
        } else {
            Vec::new()
        };

        let record = Self {
            record_number,
            event_id: read_u32(body, OFF_EVENT_ID),
            time_generated: read_u32(body, OFF_TIME_GENERATED),
            num_strings: read_u16(body, OFF_NUM_STRINGS),
            strings,
        };
        Ok((record, length))
    }
}

/// A record that failed length or offset sanity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSkip {
    /// Known when the header itself was readable.
    pub record_number: Option<u32>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    HeaderOverrun,
    ZeroLength,
    ShortLength,
    BodyOverrun,
    BadSignature,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderOverrun => "header overruns buffer",
            Self::ZeroLength => "zero record length",
            Self::ShortLength => "record length shorter than header",
            Self::BodyOverrun => "record overruns buffer",
            Self::BadSignature => "bad record signature",
        }
    }
}

impl DecodeSkip {
    fn new(record_number: Option<u32>, reason: SkipReason) -> Self {
        Self {
            record_number,
            reason,
        }
    }
}

impl fmt::Display for DecodeSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record_number {
            Some(n) => write!(f, "record {n} skipped: {}", self.reason.as_str()),
            None => write!(f, "record skipped: {}", self.reason.as_str()),
        }
    }
}

/// Iterates the records packed in one read buffer.
///
/// Iteration ends after the first record whose length cannot be trusted,
/// since the next record boundary is unknown from that point on.
pub struct RecordIter<'a> {
    buf: &'a [u8],
    done: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, done: false }
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<RawRecord, DecodeSkip>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.buf.is_empty() {
            return None;
        }

        match RawRecord::parse(self.buf) {
            Ok((record, consumed)) => {
                self.buf = &self.buf[consumed..];
                Some(Ok(record))
            }
            Err(skip) => {
                let length = if self.buf.len() >= 4 {
                    read_u32(self.buf, OFF_LENGTH) as usize
                } else {
                    0
                };
                // A bad signature inside a well-sized record can be stepped over.
                if skip.reason == SkipReason::BadSignature && length <= self.buf.len() {
                    self.buf = &self.buf[length..];
                } else {
                    self.done = true;
                }
                Some(Err(skip))
            }
        }
    }
}

pub fn parse_records(buf: &[u8]) -> RecordIter<'_> {
    RecordIter::new(buf)
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buf[offset..offset + 2]);
    u16::from_le_bytes(raw)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Serialise a record the way the event log service lays it out.
    pub(crate) fn encode_record(record_number: u32, event_id: u32, strings: &[&str]) -> Vec<u8> {
        let mut tail = Vec::new();
        for name in ["Microsoft-Windows-Sysmon", "HOST-01"] {
            for unit in name.encode_utf16() {
                tail.extend_from_slice(&unit.to_le_bytes());
            }
            tail.extend_from_slice(&[0, 0]);
        }
        while (RECORD_HEADER_LEN + tail.len()) % 4 != 0 {
            tail.push(0);
        }
        let string_offset = RECORD_HEADER_LEN + tail.len();
        let block = RawRecord::with_strings(record_number, event_id, 0, strings).strings;
        tail.extend_from_slice(&block);
        while (RECORD_HEADER_LEN + tail.len()) % 4 != 0 {
            tail.push(0);
        }
        let length = RECORD_HEADER_LEN + tail.len() + 4;

        let mut out = Vec::with_capacity(length);
        out.extend_from_slice(&(length as u32).to_le_bytes());
        out.extend_from_slice(&RECORD_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&record_number.to_le_bytes());
        out.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        out.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        out.extend_from_slice(&event_id.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&(strings.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(string_offset as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(length as u32 - 4).to_le_bytes());
        out.extend_from_slice(&tail);
        out.extend_from_slice(&(length as u32).to_le_bytes());
        out
    }

    #[test]
    fn parses_header_fields_and_string_block() {
        let bytes = encode_record(42, 0x4000_0001, &["rule", "C:\\a.exe"]);
        let (record, consumed) = RawRecord::parse(&bytes).expect("record parses");

        assert_eq!(consumed, bytes.len());
        assert_eq!(record.record_number, 42);
        assert_eq!(record.event_code(), 1);
        assert_eq!(record.time_generated, 1_700_000_000);
        assert_eq!(record.num_strings, 2);
        let expected = RawRecord::with_strings(42, 1, 0, &["rule", "C:\\a.exe"]).strings;
        assert!(record.strings.starts_with(&expected));
    }

    #[test]
    fn iterates_back_to_back_records() {
        let mut buf = encode_record(7, 1, &["a"]);
        buf.extend(encode_record(8, 11, &["b"]));
        buf.extend(encode_record(9, 15, &["c"]));

        let numbers: Vec<u32> = parse_records(&buf)
            .map(|r| r.expect("valid").record_number)
            .collect();
        assert_eq!(numbers, vec![7, 8, 9]);
    }

    #[test]
    fn zero_length_record_is_skipped_and_stops_iteration() {
        let mut buf = encode_record(10, 1, &["a"]);
        let mut bad = encode_record(11, 1, &["b"]);
        bad[0..4].copy_from_slice(&0u32.to_le_bytes());
        buf.extend(bad);
        buf.extend(encode_record(12, 1, &["c"]));

        let items: Vec<_> = parse_records(&buf).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let skip = items[1].clone().expect_err("second record is malformed");
        assert_eq!(skip.record_number, Some(11));
        assert_eq!(skip.reason, SkipReason::ZeroLength);
    }

    #[test]
    fn record_overrunning_buffer_is_skipped() {
        let bytes = encode_record(5, 1, &["a", "b"]);
        let truncated = &bytes[..bytes.len() - 8];

        let skip = RawRecord::parse(truncated).expect_err("truncated record");
        assert_eq!(skip.record_number, Some(5));
        assert_eq!(skip.reason, SkipReason::BodyOverrun);

        let skip = RawRecord::parse(&bytes[..20]).expect_err("short header");
        assert_eq!(skip.record_number, None);
    }

    #[test]
    fn bad_signature_is_stepped_over() {
        let mut bad = encode_record(20, 1, &["a"]);
        bad[4..8].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        let mut buf = bad;
        buf.extend(encode_record(21, 1, &["b"]));

        let items: Vec<_> = parse_records(&buf).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert_eq!(items[1].as_ref().expect("valid").record_number, 21);
    }
}
