use crate::archive::format::{
    align_up, ArchiveHeader, FileEntry, Generation, DICTIONARY_MAGIC, HEADER_SIZE, MAGIC_NUMBER,
    PAYLOAD_ALIGNMENT,
};
use crate::error::{FpkError, Result};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// One application file inside an archive: its table row and stored bytes
#[derive(Debug, Clone, Copy)]
pub struct ArchiveFile<'a> {
    pub entry: &'a FileEntry,
    pub data: &'a [u8],
}

/// In-memory view of one FPK container.
///
/// The whole container is read up front; every payload slice is validated
/// against the buffer while parsing, so accessors never go out of bounds.
pub struct ArchiveReader {
    data: Vec<u8>,
    header: ArchiveHeader,
    generation: Generation,
    entries: Vec<FileEntry>,
    table_end: u64,
    dictionary: Option<usize>,
}

impl ArchiveReader {
    /// Read an archive file. With `generation` unset the table layout is
    /// auto-detected.
    pub fn open<P: AsRef<Path>>(path: P, generation: Option<Generation>) -> Result<Self> {
        // File handle is dropped once the bytes are in memory
        let data = std::fs::read(path)?;
        Self::from_bytes(data, generation)
    }

    /// Parse an archive already held in memory
    pub fn from_bytes(data: Vec<u8>, generation: Option<Generation>) -> Result<Self> {
        let header = read_header(&data)?;

        let generation = match generation {
            Some(generation) => generation,
            None => detect_generation(&data, &header)?,
        };

        let (entries, table_end) = parse_table(&data, &header, generation)?;
        validate_layout(&entries, table_end, data.len() as u64)?;

        let mut reader = Self {
            data,
            header,
            generation,
            entries,
            table_end,
            dictionary: None,
        };
        reader.classify_entries()?;

        debug!(
            generation = %reader.generation,
            entries = reader.entries.len(),
            table_end = reader.table_end,
            dictionary = reader.dictionary.is_some(),
            "parsed archive table"
        );

        Ok(reader)
    }

    /// Find the shared dictionary (NGS only) and reject duplicate hashes
    /// among the remaining entries.
    fn classify_entries(&mut self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());

        for (index, entry) in self.entries.iter().enumerate() {
            let data = self.slice(entry);

            if self.generation == Generation::Ngs && is_dictionary(data) {
                if let Some(first) = self.dictionary {
                    return Err(FpkError::MultipleDictionaries {
                        first: self.entries[first].hash_hex(),
                        second: entry.hash_hex(),
                    });
                }
                self.dictionary = Some(index);
                continue;
            }

            if !seen.insert(entry.hash()) {
                return Err(FpkError::DuplicateHash(entry.hash_hex()));
            }
        }

        Ok(())
    }

    fn slice(&self, entry: &FileEntry) -> &[u8] {
        let start = (self.table_end + entry.offset() as u64) as usize;
        let end = start + entry.compressed_size() as usize;
        &self.data[start..end]
    }

    /// Get archive header information
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Table layout this archive was parsed with
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Byte offset immediately after the last table row
    pub fn table_end(&self) -> u64 {
        self.table_end
    }

    /// Every table row in stored order, dictionary included
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Number of application files (dictionary excluded)
    pub fn file_count(&self) -> usize {
        self.entries.len() - usize::from(self.dictionary.is_some())
    }

    /// Application files in table order, dictionary excluded
    pub fn files(&self) -> impl Iterator<Item = ArchiveFile<'_>> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(index, _)| Some(*index) != self.dictionary)
            .map(move |(_, entry)| ArchiveFile {
                entry,
                data: self.slice(entry),
            })
    }

    /// Stored bytes of an entry of this archive
    pub fn payload(&self, entry: &FileEntry) -> &[u8] {
        self.slice(entry)
    }

    /// Look up a file by hash, dictionary excluded
    pub fn find(&self, hash: u64) -> Option<ArchiveFile<'_>> {
        self.files().find(|file| file.entry.hash() == hash)
    }

    /// Raw bytes of the shared dictionary, if the archive has one
    pub fn dictionary(&self) -> Option<&[u8]> {
        self.dictionary.map(|index| self.slice(&self.entries[index]))
    }

    /// Hash of the shared dictionary entry
    pub fn dictionary_hash(&self) -> Option<u64> {
        self.dictionary.map(|index| self.entries[index].hash())
    }
}

fn is_dictionary(data: &[u8]) -> bool {
    data.len() >= 4 && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == DICTIONARY_MAGIC
}

fn read_header(data: &[u8]) -> Result<ArchiveHeader> {
    if data.len() >= 4 && data.len() < HEADER_SIZE {
        // Still report a foreign file as such
        let found = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if found != MAGIC_NUMBER {
            return Err(FpkError::HeaderMismatch {
                expected: MAGIC_NUMBER,
                found,
            });
        }
    }
    if data.len() < HEADER_SIZE {
        return Err(FpkError::TruncatedTable {
            entry_count: 0,
            needed: HEADER_SIZE as u64,
            available: data.len() as u64,
        });
    }
    ArchiveHeader::read_from(&data[..HEADER_SIZE])
}

/// Read `header.entry_count` rows; the table must fit in `data`
fn parse_table(
    data: &[u8],
    header: &ArchiveHeader,
    generation: Generation,
) -> Result<(Vec<FileEntry>, u64)> {
    let table_end = generation.table_end(header.entry_count);
    if table_end > data.len() as u64 {
        return Err(FpkError::TruncatedTable {
            entry_count: header.entry_count,
            needed: table_end,
            available: data.len() as u64,
        });
    }

    let mut cursor = Cursor::new(&data[HEADER_SIZE..table_end as usize]);
    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for _ in 0..header.entry_count {
        entries.push(FileEntry::read_from(&mut cursor, generation)?);
    }

    Ok((entries, table_end))
}

/// Payloads must lie inside the buffer and never start before the previous
/// payload ends.
fn validate_layout(entries: &[FileEntry], table_end: u64, available: u64) -> Result<()> {
    let mut previous_end = table_end;

    for entry in entries {
        let offset = table_end + entry.offset() as u64;
        let length = entry.compressed_size() as u64;

        if offset + length > available {
            return Err(FpkError::TruncatedPayload {
                hash: entry.hash_hex(),
                offset,
                length,
                available,
            });
        }
        if offset < previous_end {
            return Err(FpkError::OffsetAnomaly {
                hash: entry.hash_hex(),
                offset,
                previous_end,
            });
        }

        previous_end = offset + length;
    }

    Ok(())
}

/// Both generations share the header, so pick the table layout that
/// describes the buffer consistently. A layout whose last payload ends at
/// the end of the buffer (modulo alignment) wins; NGS is tried first.
fn detect_generation(data: &[u8], header: &ArchiveHeader) -> Result<Generation> {
    let available = data.len() as u64;
    let mut plausible = None;
    let mut legacy_error = None;

    for generation in [Generation::Ngs, Generation::Legacy] {
        let checked = parse_table(data, header, generation).and_then(|(entries, table_end)| {
            validate_layout(&entries, table_end, available)?;
            Ok((entries, table_end))
        });

        let (entries, table_end) = match checked {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(%generation, error = %err, "table layout rejected");
                if generation == Generation::Legacy {
                    legacy_error = Some(err);
                }
                continue;
            }
        };

        if !entries.iter().all(row_is_plausible) {
            debug!(%generation, "row with impossible field values, layout rejected");
            continue;
        }

        let data_end = entries
            .iter()
            .map(|entry| table_end + entry.offset() as u64 + entry.compressed_size() as u64)
            .max()
            .unwrap_or(table_end);

        if align_up(data_end, PAYLOAD_ALIGNMENT) >= available {
            return Ok(generation);
        }
        plausible.get_or_insert(generation);
    }

    match (plausible, legacy_error) {
        (Some(generation), _) => Ok(generation),
        (None, Some(err)) => Err(err),
        (None, None) => Err(FpkError::GenerationUndetected),
    }
}

/// Padding and reserved words are always zero, and an empty NGS payload
/// cannot expand into anything.
fn row_is_plausible(entry: &FileEntry) -> bool {
    match entry {
        FileEntry::Legacy(row) => row.padding == 0,
        FileEntry::Ngs(row) => {
            row.reserved == 0 && (row.compressed_size != 0 || row.uncompressed_size == 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::format::{LegacyEntry, NgsEntry, LEGACY_ENTRY_SIZE, NGS_ENTRY_SIZE};

    fn header_bytes(count: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        ArchiveHeader::new(count).write_to(&mut buf).unwrap();
        buf
    }

    fn ngs_archive(rows: &[(u64, &[u8])]) -> Vec<u8> {
        let mut buf = header_bytes(rows.len() as u32);
        let mut offset = 0u32;
        let mut body = Vec::new();
        for (hash, data) in rows {
            let entry = NgsEntry {
                hash: *hash,
                compressed_size: data.len() as u32,
                offset,
                uncompressed_size: data.len() as u32,
                reserved: 0,
            };
            entry.write_to(&mut buf).unwrap();
            body.extend_from_slice(data);
            while body.len() % 4 != 0 {
                body.push(0);
            }
            offset = body.len() as u32;
        }
        buf.extend_from_slice(&body);
        buf
    }

    #[test]
    fn test_truncated_legacy_table() {
        let data = header_bytes(1);

        match ArchiveReader::from_bytes(data, Some(Generation::Legacy)) {
            Err(FpkError::TruncatedTable {
                entry_count,
                needed,
                available,
            }) => {
                assert_eq!(entry_count, 1);
                assert_eq!(needed, (HEADER_SIZE + LEGACY_ENTRY_SIZE) as u64);
                assert_eq!(available, HEADER_SIZE as u64);
            }
            other => panic!("Expected TruncatedTable, got: {:?}", other.err()),
        }
    }

    #[test]
    fn test_truncated_table_autodetect() {
        let data = header_bytes(1);
        assert!(matches!(
            ArchiveReader::from_bytes(data, None),
            Err(FpkError::TruncatedTable { .. })
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            ArchiveReader::from_bytes(b"fpk\0\0\0".to_vec(), None),
            Err(FpkError::TruncatedTable { .. })
        ));
        assert!(matches!(
            ArchiveReader::from_bytes(b"PK\x03\x04\0\0".to_vec(), None),
            Err(FpkError::HeaderMismatch { .. })
        ));
    }

    #[test]
    fn test_payload_past_end() {
        let mut data = header_bytes(1);
        LegacyEntry {
            hash: 0x11,
            length: 64,
            offset: 0,
            padding: 0,
        }
        .write_to(&mut data)
        .unwrap();
        data.extend_from_slice(&[0xAA; 8]);

        match ArchiveReader::from_bytes(data, Some(Generation::Legacy)) {
            Err(FpkError::TruncatedPayload { hash, length, .. }) => {
                assert_eq!(hash, "00000011");
                assert_eq!(length, 64);
            }
            other => panic!("Expected TruncatedPayload, got: {:?}", other.err()),
        }
    }

    #[test]
    fn test_overlapping_offsets_are_anomalies() {
        let mut data = header_bytes(2);
        for (hash, offset) in [(1u32, 0u32), (2, 2)] {
            LegacyEntry {
                hash,
                length: 4,
                offset,
                padding: 0,
            }
            .write_to(&mut data)
            .unwrap();
        }
        data.extend_from_slice(&[0u8; 8]);

        assert!(matches!(
            ArchiveReader::from_bytes(data, Some(Generation::Legacy)),
            Err(FpkError::OffsetAnomaly { .. })
        ));
    }

    #[test]
    fn test_dictionary_is_diverted() {
        let mut dict = DICTIONARY_MAGIC.to_le_bytes().to_vec();
        dict.extend_from_slice(b"dictionary body");

        let data = ngs_archive(&[(0xA, b"first"), (0xD1C7, &dict), (0xB, b"second")]);
        let reader = ArchiveReader::from_bytes(data, Some(Generation::Ngs)).unwrap();

        assert_eq!(reader.entries().len(), 3);
        assert_eq!(reader.file_count(), 2);
        assert_eq!(reader.dictionary_hash(), Some(0xD1C7));
        assert_eq!(reader.dictionary(), Some(&dict[..]));

        let hashes: Vec<u64> = reader.files().map(|f| f.entry.hash()).collect();
        assert_eq!(hashes, vec![0xA, 0xB]);
        assert_eq!(reader.find(0xB).unwrap().data, b"second");
        assert!(reader.find(0xD1C7).is_none());
    }

    #[test]
    fn test_dictionary_may_share_hash() {
        let mut dict = DICTIONARY_MAGIC.to_le_bytes().to_vec();
        dict.extend_from_slice(b"dict");

        let data = ngs_archive(&[(0x5, &dict), (0x5, b"payload")]);
        let reader = ArchiveReader::from_bytes(data, Some(Generation::Ngs)).unwrap();
        assert_eq!(reader.file_count(), 1);
    }

    #[test]
    fn test_two_dictionaries_rejected() {
        let dict = DICTIONARY_MAGIC.to_le_bytes();
        let data = ngs_archive(&[(0x1, &dict), (0x2, &dict)]);
        assert!(matches!(
            ArchiveReader::from_bytes(data, Some(Generation::Ngs)),
            Err(FpkError::MultipleDictionaries { .. })
        ));
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let data = ngs_archive(&[(0x7, b"one"), (0x7, b"two")]);
        match ArchiveReader::from_bytes(data, Some(Generation::Ngs)) {
            Err(FpkError::DuplicateHash(hash)) => assert_eq!(hash, "0000000000000007"),
            other => panic!("Expected DuplicateHash, got: {:?}", other.err()),
        }
    }

    #[test]
    fn test_detects_ngs_layout() {
        let data = ngs_archive(&[(0x1122_3344_5566_7788, b"abc"), (0x99, b"defgh")]);
        let reader = ArchiveReader::from_bytes(data, None).unwrap();
        assert_eq!(reader.generation(), Generation::Ngs);
        assert_eq!(reader.find(0x99).unwrap().data, b"defgh");
    }

    #[test]
    fn test_detects_small_single_entry_legacy() {
        // Read as NGS, the legacy row plus up to eight payload bytes would
        // form one 24-byte row describing an empty entry
        for payload in [&b"abcd"[..], b"abcdefgh"] {
            let mut data = header_bytes(1);
            LegacyEntry {
                hash: 0x0080_0BCB,
                length: payload.len() as u32,
                offset: 0,
                padding: 0,
            }
            .write_to(&mut data)
            .unwrap();
            data.extend_from_slice(payload);

            let reader = ArchiveReader::from_bytes(data, None).unwrap();
            assert_eq!(reader.generation(), Generation::Legacy);
            assert_eq!(reader.find(0x0080_0BCB).unwrap().data, payload);
        }
    }

    #[test]
    fn test_ngs_table_end_follows_row_size() {
        let data = ngs_archive(&[(0x1, b"abcd"), (0x2, b"efgh")]);
        let reader = ArchiveReader::from_bytes(data, Some(Generation::Ngs)).unwrap();
        assert_eq!(reader.table_end(), (HEADER_SIZE + 2 * NGS_ENTRY_SIZE) as u64);
        assert_eq!(reader.payload(&reader.entries()[0]), b"abcd");
        assert_eq!(reader.payload(&reader.entries()[1]), b"efgh");
    }

    #[test]
    fn test_empty_archive() {
        let reader = ArchiveReader::from_bytes(header_bytes(0), None).unwrap();
        assert_eq!(reader.file_count(), 0);
        assert_eq!(reader.header().magic, MAGIC_NUMBER);
        assert_eq!(reader.table_end(), HEADER_SIZE as u64);
    }
}
