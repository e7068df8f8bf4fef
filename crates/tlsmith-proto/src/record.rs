//! Record layer framing.
//!
//! Records are `type (1) | version (2) | length (2) | fragment`. Parsing is
//! lenient: any byte string decodes to some sequence of records, with a flag
//! for a final record whose fragment is shorter than declared and a slot for
//! trailing bytes too short to form a header. Every loop iteration consumes a
//! full header, so parsing terminates for every input.

use bytes::{Bytes, BytesMut};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16},
};

use crate::constants::{MAX_FRAGMENT_LENGTH, ProtocolVersion};

/// Fixed 5-byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RecordHeader {
    content_type: u8,
    version: U16<BigEndian>,
    length: U16<BigEndian>,
}

impl RecordHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 5;

    /// Build a header.
    pub fn new(content_type: u8, version: ProtocolVersion, length: u16) -> Self {
        Self { content_type, version: U16::new(version.0), length: U16::new(length) }
    }

    /// Decode the header at the start of `bytes`, `None` if too short.
    pub fn read(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    /// Content type byte.
    pub fn content_type(&self) -> u8 {
        self.content_type
    }

    /// Protocol version.
    pub fn version(&self) -> ProtocolVersion {
        ProtocolVersion(self.version.get())
    }

    /// Declared fragment length.
    pub fn length(&self) -> u16 {
        self.length.get()
    }
}

/// One record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Content type byte, kept raw
    pub content_type: u8,
    /// Record version
    pub version: ProtocolVersion,
    /// Length written to (or read from) the header. May disagree with the
    /// fragment for malformed records.
    pub declared_length: u16,
    /// Payload bytes
    pub fragment: Bytes,
}

impl Record {
    /// Record whose declared length matches its fragment.
    pub fn new(content_type: u8, version: ProtocolVersion, fragment: Bytes) -> Self {
        Self { content_type, version, declared_length: fragment.len() as u16, fragment }
    }

    /// Header for this record.
    pub fn header(&self) -> RecordHeader {
        RecordHeader::new(self.content_type, self.version, self.declared_length)
    }

    /// Size on the wire.
    pub fn wire_len(&self) -> usize {
        RecordHeader::SIZE + self.fragment.len()
    }
}

/// Result of lenient record parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecords {
    /// Decoded records in wire order
    pub records: Vec<Record>,
    /// The last record declared more bytes than were present
    pub truncated: bool,
    /// Bytes after the last record, too short for a header
    pub trailing: Bytes,
}

impl ParsedRecords {
    /// True if every byte of the input formed a complete record.
    pub fn is_clean(&self) -> bool {
        !self.truncated && self.trailing.is_empty()
    }
}

/// Message-level stream reassembled from consecutive records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStream {
    /// Content type shared by the records
    pub content_type: u8,
    /// Version shared by the records
    pub version: ProtocolVersion,
    /// Concatenated fragments
    pub data: Bytes,
}

/// Stateless record framer and parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayer {
    version: ProtocolVersion,
    max_fragment_length: usize,
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new(ProtocolVersion::TLS12, MAX_FRAGMENT_LENGTH)
    }
}

impl RecordLayer {
    /// Record layer writing `version` and splitting at `max_fragment_length`.
    /// A zero fragment length is treated as one.
    pub fn new(version: ProtocolVersion, max_fragment_length: usize) -> Self {
        Self { version, max_fragment_length: max_fragment_length.clamp(1, usize::from(u16::MAX)) }
    }

    /// Version written into outbound records.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Largest fragment emitted by [`RecordLayer::frame`].
    pub fn max_fragment_length(&self) -> usize {
        self.max_fragment_length
    }

    /// Decode any byte string into records.
    pub fn parse_records(&self, bytes: &[u8]) -> ParsedRecords {
        let mut parsed = ParsedRecords::default();
        let mut pos = 0;

        while let Some(header) = RecordHeader::read(&bytes[pos..]) {
            pos += RecordHeader::SIZE;
            let declared = usize::from(header.length());
            let available = bytes.len() - pos;
            let take = declared.min(available);

            parsed.records.push(Record {
                content_type: header.content_type(),
                version: header.version(),
                declared_length: header.length(),
                fragment: Bytes::copy_from_slice(&bytes[pos..pos + take]),
            });
            pos += take;

            if take < declared {
                parsed.truncated = true;
                break;
            }
        }

        parsed.trailing = Bytes::copy_from_slice(&bytes[pos..]);
        parsed
    }

    /// Decode only complete records, returning them and the bytes consumed.
    ///
    /// Used to reassemble records split across several transport reads.
    pub fn parse_complete_records(&self, bytes: &[u8]) -> (Vec<Record>, usize) {
        let mut records = Vec::new();
        let mut pos = 0;

        while let Some(header) = RecordHeader::read(&bytes[pos..]) {
            let end = pos + RecordHeader::SIZE + usize::from(header.length());
            if end > bytes.len() {
                break;
            }
            records.push(Record {
                content_type: header.content_type(),
                version: header.version(),
                declared_length: header.length(),
                fragment: Bytes::copy_from_slice(&bytes[pos + RecordHeader::SIZE..end]),
            });
            pos = end;
        }

        (records, pos)
    }

    /// Split `data` into records of at most `max_fragment_length` bytes.
    ///
    /// Empty input yields one empty record.
    pub fn frame(&self, content_type: u8, data: &[u8]) -> Vec<Record> {
        if data.is_empty() {
            return vec![Record::new(content_type, self.version, Bytes::new())];
        }
        data.chunks(self.max_fragment_length)
            .map(|chunk| Record::new(content_type, self.version, Bytes::copy_from_slice(chunk)))
            .collect()
    }

    /// Write records to wire bytes, using each record's declared length.
    pub fn encode(&self, records: &[Record]) -> Bytes {
        let total = records.iter().map(Record::wire_len).sum();
        let mut out = BytesMut::with_capacity(total);
        for record in records {
            out.extend_from_slice(record.header().as_bytes());
            out.extend_from_slice(&record.fragment);
        }
        out.freeze()
    }
}

/// Concatenate fragments of consecutive records with equal type and version.
pub fn defragment(records: &[Record]) -> Vec<RecordStream> {
    let mut streams: Vec<(u8, ProtocolVersion, BytesMut)> = Vec::new();

    for record in records {
        match streams.last_mut() {
            Some((content_type, version, data))
                if *content_type == record.content_type && *version == record.version =>
            {
                data.extend_from_slice(&record.fragment);
            },
            _ => streams.push((
                record.content_type,
                record.version,
                BytesMut::from(record.fragment.as_ref()),
            )),
        }
    }

    streams
        .into_iter()
        .map(|(content_type, version, data)| RecordStream { content_type, version, data: data.freeze() })
        .collect()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn header_layout_is_five_bytes() {
        assert_eq!(std::mem::size_of::<RecordHeader>(), RecordHeader::SIZE);

        let header = RecordHeader::new(22, ProtocolVersion::TLS12, 0x0102);
        assert_eq!(header.as_bytes(), &hex!("16 0303 0102"));
    }

    #[test]
    fn parses_concatenated_records() {
        let layer = RecordLayer::default();
        let parsed = layer.parse_records(&hex!("16 0303 0002 0e00 15 0301 0002 0128"));

        assert!(parsed.is_clean());
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].fragment.as_ref(), &hex!("0e00"));
        assert_eq!(parsed.records[1].content_type, 21);
        assert_eq!(parsed.records[1].version, ProtocolVersion::TLS10);
    }

    #[test]
    fn short_fragment_is_flagged() {
        let layer = RecordLayer::default();
        let parsed = layer.parse_records(&hex!("17 0303 00ff 0102 03"));

        assert!(parsed.truncated);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].declared_length, 0xff);
        assert_eq!(parsed.records[0].fragment.as_ref(), &hex!("0102 03"));
    }

    #[test]
    fn short_tail_is_kept_as_trailing() {
        let layer = RecordLayer::default();
        assert_eq!(layer.parse_records(&[]), ParsedRecords::default());

        let parsed = layer.parse_records(&hex!("16 0303 0000 aabb"));
        assert_eq!(parsed.records.len(), 1);
        assert!(!parsed.truncated);
        assert_eq!(parsed.trailing.as_ref(), &hex!("aabb"));
    }

    #[test]
    fn complete_records_stop_before_partial() {
        let layer = RecordLayer::default();
        let (records, consumed) = layer.parse_complete_records(&hex!("16 0303 0001 00 16 0303 0004 0102"));

        assert_eq!(records.len(), 1);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn frame_splits_and_defragment_rejoins() {
        let layer = RecordLayer::new(ProtocolVersion::TLS12, 4);
        let data: Vec<u8> = (0..10).collect();
        let records = layer.frame(22, &data);

        assert_eq!(records.iter().map(|r| r.fragment.len()).collect::<Vec<_>>(), vec![4, 4, 2]);

        let streams = defragment(&records);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].data.as_ref(), data.as_slice());
    }

    #[test]
    fn frame_empty_yields_one_empty_record() {
        let layer = RecordLayer::default();
        let records = layer.frame(23, &[]);

        assert_eq!(records.len(), 1);
        assert_eq!(layer.encode(&records).as_ref(), &hex!("17 0303 0000"));
    }

    #[test]
    fn defragment_splits_on_type_change() {
        let layer = RecordLayer::default();
        let mut records = layer.frame(22, &[1, 2]);
        records.extend(layer.frame(20, &[1]));
        records.extend(layer.frame(22, &[3]));

        let streams = defragment(&records);
        assert_eq!(
            streams.iter().map(|s| s.content_type).collect::<Vec<_>>(),
            vec![22, 20, 22]
        );
    }

    #[test]
    fn declared_length_is_written_verbatim() {
        let layer = RecordLayer::default();
        let mut record = Record::new(21, ProtocolVersion::TLS12, Bytes::from_static(&[2, 40]));
        record.declared_length = 9;

        assert_eq!(layer.encode(&[record]).as_ref(), &hex!("15 0303 0009 0228"));
    }
}
