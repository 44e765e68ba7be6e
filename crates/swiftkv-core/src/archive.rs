//! Tar archive codec for bulk uploads
//!
//! The bulk-upload endpoint takes a single tar stream and creates one object
//! per regular-file record. Records are written in ustar layout:
//!
//! ```text
//!   [0..100]    name       NUL-padded
//!   [100..108]  mode       octal "0000644\0"
//!   [108..124]  uid, gid   octal zero
//!   [124..136]  size       11 octal digits + NUL
//!   [136..148]  mtime      octal zero
//!   [148..156]  checksum   6 octal digits + NUL + space
//!   [156]       typeflag   '0' regular, 'x' PAX extended header
//!   [257..265]  magic      "ustar\0" "00"
//!   [345..500]  prefix     NUL-padded, joined to name with '/'
//! ```
//!
//! Bodies are padded to 512-byte blocks; the archive ends with two zero
//! blocks. Names that fit neither `name` nor `prefix/name` get a PAX `path`
//! record in front of the regular header.

use crate::error::{StoreError, StoreResult};

/// Tar block size in bytes
pub const BLOCK_SIZE: usize = 512;

/// Largest body a ustar size field can describe (11 octal digits)
pub const MAX_ENTRY_SIZE: u64 = 0o77777777777;

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;

const TYPE_REGULAR: u8 = b'0';
const TYPE_REGULAR_OLD: u8 = 0;
const TYPE_PAX: u8 = b'x';
const TYPE_PAX_GLOBAL: u8 = b'g';

/// Archive formats understood by the bulk-upload endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// Uncompressed tar
    #[default]
    Tar,
}

impl ArchiveFormat {
    /// Value of the `extract-archive` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
        }
    }
}

/// Appends regular-file records to an in-memory tar stream.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    buf: Vec<u8>,
    records: usize,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one regular-file record.
    pub fn append(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        if name.is_empty() || name.as_bytes().contains(&0) {
            return Err(StoreError::Archive {
                offset: self.buf.len() as u64,
                reason: format!("invalid record name {:?}", name),
            });
        }
        if data.len() as u64 > MAX_ENTRY_SIZE {
            return Err(StoreError::OversizedEntry {
                entry_size: data.len() as u64,
                max_size: MAX_ENTRY_SIZE,
                component: "value".to_string(),
            });
        }

        let header = match split_name(name) {
            Some((prefix, short)) => Header::regular(prefix, short, data.len() as u64),
            None => {
                let record = pax_path_record(name);
                let pax = Header::pax(record.len() as u64);
                self.buf.extend_from_slice(&pax.finish());
                self.write_body(record.as_bytes());
                // Readers without PAX support fall back to the truncated name.
                Header::regular("", truncate(name, NAME_LEN), data.len() as u64)
            }
        };

        self.buf.extend_from_slice(&header.finish());
        self.write_body(data);
        self.records += 1;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// True if no record has been appended.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Bytes buffered so far, excluding the end-of-archive trailer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Write the end-of-archive trailer and return the stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.resize(self.buf.len() + 2 * BLOCK_SIZE, 0);
        self.buf
    }

    fn write_body(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        let padded = padded_len(data.len());
        self.buf.resize(self.buf.len() + (padded - data.len()), 0);
    }
}

/// One regular-file record read back from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry<'a> {
    /// Record name exactly as written (may start with '/')
    pub name: String,
    /// Record body
    pub data: &'a [u8],
}

/// Iterates over the regular-file records of a tar stream.
///
/// Directory, link and other special records are skipped. Iteration ends at
/// the first zero block or at the end of the input.
pub struct ArchiveReader<'a> {
    data: &'a [u8],
    offset: usize,
    pax_path: Option<String>,
    done: bool,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0, pax_path: None, done: false }
    }

    fn corrupt(&mut self, offset: usize, reason: impl Into<String>) -> StoreError {
        self.done = true;
        StoreError::Archive { offset: offset as u64, reason: reason.into() }
    }

    fn read_entry(&mut self) -> StoreResult<Option<ArchiveEntry<'a>>> {
        let data = self.data;
        loop {
            let remaining = data.len() - self.offset;
            if remaining == 0 {
                return Ok(None);
            }
            if remaining < BLOCK_SIZE {
                let offset = self.offset;
                return Err(self.corrupt(offset, format!("truncated header: {} bytes", remaining)));
            }

            let header_at = self.offset;
            let block = &data[header_at..header_at + BLOCK_SIZE];
            if block.iter().all(|&b| b == 0) {
                return Ok(None);
            }

            let stored = parse_octal(&block[148..156])
                .ok_or_else(|| self.corrupt(header_at, "unreadable checksum field"))?;
            let computed = header_checksum(block);
            if stored != computed as u64 {
                return Err(self.corrupt(
                    header_at,
                    format!("checksum mismatch: stored {:o}, computed {:o}", stored, computed),
                ));
            }

            let size = parse_octal(&block[124..136])
                .ok_or_else(|| self.corrupt(header_at, "unreadable size field"))?
                as usize;
            let body_at = header_at + BLOCK_SIZE;
            if data.len() - body_at < size {
                return Err(self.corrupt(
                    header_at,
                    format!("record body needs {} bytes, {} available", size, data.len() - body_at),
                ));
            }
            let body = &data[body_at..body_at + size];
            self.offset = (body_at + padded_len(size)).min(data.len());

            match block[156] {
                TYPE_PAX => {
                    self.pax_path = parse_pax_path(body)
                        .map_err(|reason| self.corrupt(header_at, reason))?;
                }
                TYPE_PAX_GLOBAL => {}
                TYPE_REGULAR | TYPE_REGULAR_OLD => {
                    let name = match self.pax_path.take() {
                        Some(path) => path,
                        None => header_name(block).map_err(|reason| self.corrupt(header_at, reason))?,
                    };
                    return Ok(Some(ArchiveEntry { name, data: body }));
                }
                _ => {
                    self.pax_path = None;
                }
            }
        }
    }
}

impl<'a> Iterator for ArchiveReader<'a> {
    type Item = StoreResult<ArchiveEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// A 512-byte ustar header under construction
struct Header {
    block: [u8; BLOCK_SIZE],
}

impl Header {
    fn regular(prefix: &str, name: &str, size: u64) -> Self {
        let mut header = Self::base(TYPE_REGULAR, size);
        header.block[0..name.len()].copy_from_slice(name.as_bytes());
        header.block[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());
        header
    }

    fn pax(size: u64) -> Self {
        let mut header = Self::base(TYPE_PAX, size);
        let name = b"PaxHeader";
        header.block[0..name.len()].copy_from_slice(name);
        header
    }

    fn base(typeflag: u8, size: u64) -> Self {
        let mut block = [0u8; BLOCK_SIZE];
        write_octal(&mut block[100..108], 0o644);
        write_octal(&mut block[108..116], 0);
        write_octal(&mut block[116..124], 0);
        write_octal(&mut block[124..136], size);
        write_octal(&mut block[136..148], 0);
        block[156] = typeflag;
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        Self { block }
    }

    fn finish(mut self) -> [u8; BLOCK_SIZE] {
        let sum = header_checksum(&self.block);
        // Six digits, NUL, space.
        write_octal(&mut self.block[148..155], sum as u64);
        self.block[155] = b' ';
        self.block
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Split a name into ustar `(prefix, name)` fields, or `None` if it needs PAX.
fn split_name(name: &str) -> Option<(&str, &str)> {
    if name.len() <= NAME_LEN {
        return Some(("", name));
    }
    let bytes = name.as_bytes();
    // The prefix must be as long as possible so the remaining name fits.
    let lowest = name.len() - NAME_LEN - 1;
    (lowest..=PREFIX_LEN.min(name.len() - 1))
        .rev()
        .find(|&i| bytes[i] == b'/' && i > 0 && i + 1 < name.len())
        .map(|i| (&name[..i], &name[i + 1..]))
}

fn truncate(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// `"<len> path=<name>\n"` where `<len>` counts the whole record.
fn pax_path_record(name: &str) -> String {
    let body_len = " path=".len() + name.len() + 1;
    let mut total = body_len + 1;
    while total != body_len + total.to_string().len() {
        total = body_len + total.to_string().len();
    }
    format!("{} path={}\n", total, name)
}

fn parse_pax_path(body: &[u8]) -> Result<Option<String>, String> {
    let mut rest = body;
    let mut path = None;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or("PAX record without length")?;
        let len: usize = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or("PAX record length is not a number")?;
        if len <= space + 1 || len > rest.len() || rest[len - 1] != b'\n' {
            return Err(format!("PAX record length {} out of bounds", len));
        }
        let record = &rest[space + 1..len - 1];
        if let Some(value) = record.strip_prefix(b"path=") {
            let value = String::from_utf8(value.to_vec()).map_err(|_| "PAX path is not UTF-8")?;
            path = Some(value);
        }
        rest = &rest[len..];
    }
    Ok(path)
}

fn header_name(block: &[u8]) -> Result<String, String> {
    let name = nul_terminated(&block[0..100]);
    let prefix = nul_terminated(&block[345..500]);
    let joined = if prefix.is_empty() {
        name.to_vec()
    } else {
        [prefix, b"/", name].concat()
    };
    String::from_utf8(joined).map_err(|_| "record name is not UTF-8".to_string())
}

fn nul_terminated(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Sum of header bytes with the checksum field read as spaces
fn header_checksum(block: &[u8]) -> u32 {
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { b' ' as u32 } else { b as u32 })
        .sum()
}

/// Zero-padded octal, NUL-terminated, filling the whole field.
fn write_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let text = format!("{:0width$o}", value, width = digits);
    field[..digits].copy_from_slice(&text.as_bytes()[text.len() - digits..]);
    field[digits] = 0;
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let text = text.trim_matches(|c| c == '\0' || c == ' ');
    if text.is_empty() {
        return Some(0);
    }
    u64::from_str_radix(text, 8).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(data: &[u8]) -> Vec<(String, Vec<u8>)> {
        ArchiveReader::new(data)
            .map(|e| e.map(|e| (e.name, e.data.to_vec())))
            .collect::<StoreResult<_>>()
            .unwrap()
    }

    #[test]
    fn test_write_read_records() {
        let mut writer = ArchiveWriter::new();
        writer.append("/a", b"a").unwrap();
        writer.append("/a/b", b"ab").unwrap();
        writer.append("/g", b"").unwrap();
        assert_eq!(writer.records(), 3);

        let data = writer.finish();
        assert_eq!(data.len() % BLOCK_SIZE, 0);
        // Two bodies need one block each; the empty one needs none.
        assert_eq!(data.len(), BLOCK_SIZE * (3 + 2 + 2));

        let entries = read_all(&data);
        assert_eq!(entries, vec![
            ("/a".to_string(), b"a".to_vec()),
            ("/a/b".to_string(), b"ab".to_vec()),
            ("/g".to_string(), Vec::new()),
        ]);
    }

    #[test]
    fn test_header_layout() {
        let mut writer = ArchiveWriter::new();
        writer.append("/key", &[7u8; 600]).unwrap();
        let data = writer.finish();

        assert_eq!(&data[0..4], b"/key");
        assert_eq!(&data[124..136], b"00000001130\0");
        assert_eq!(data[156], b'0');
        assert_eq!(&data[257..263], b"ustar\0");
        // Body of 600 bytes spans two blocks.
        assert_eq!(data.len(), BLOCK_SIZE * (1 + 2 + 2));
    }

    #[test]
    fn test_long_name_uses_prefix() {
        let name = format!("/{}/{}", "d".repeat(120), "f".repeat(90));
        assert!(name.len() > NAME_LEN);

        let mut writer = ArchiveWriter::new();
        writer.append(&name, b"payload").unwrap();
        let data = writer.finish();
        // No PAX header was needed.
        assert_eq!(data[156], b'0');
        assert_eq!(read_all(&data), vec![(name, b"payload".to_vec())]);
    }

    #[test]
    fn test_very_long_name_uses_pax() {
        let name = format!("/{}", "x".repeat(300));
        let mut writer = ArchiveWriter::new();
        writer.append(&name, b"v").unwrap();
        writer.append("/short", b"s").unwrap();
        let data = writer.finish();

        assert_eq!(data[156], TYPE_PAX);
        assert_eq!(read_all(&data), vec![
            (name, b"v".to_vec()),
            ("/short".to_string(), b"s".to_vec()),
        ]);
    }

    #[test]
    fn test_pax_record_length_is_self_consistent() {
        for len in 1..400 {
            let name = "n".repeat(len);
            let record = pax_path_record(&name);
            let declared: usize = record.split(' ').next().unwrap().parse().unwrap();
            assert_eq!(declared, record.len(), "name length {}", len);
        }
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut writer = ArchiveWriter::new();
        writer.append("/a", b"a").unwrap();
        let mut data = writer.finish();
        data[0] = b'b';

        let mut reader = ArchiveReader::new(&data);
        match reader.next() {
            Some(Err(StoreError::Archive { offset, reason })) => {
                assert_eq!(offset, 0);
                assert!(reason.contains("checksum"));
            }
            other => panic!("expected Archive error, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_body_detected() {
        let mut writer = ArchiveWriter::new();
        writer.append("/a", &[1u8; 100]).unwrap();
        let data = writer.finish();
        let truncated = &data[..BLOCK_SIZE + 10];

        let result: StoreResult<Vec<_>> = ArchiveReader::new(truncated).collect();
        assert!(matches!(result, Err(StoreError::Archive { .. })));
    }

    #[test]
    fn test_empty_archive() {
        let writer = ArchiveWriter::new();
        assert!(writer.is_empty());
        let data = writer.finish();
        assert_eq!(data.len(), 2 * BLOCK_SIZE);
        assert!(read_all(&data).is_empty());
        assert!(read_all(&[]).is_empty());
    }

    #[test]
    fn test_rejects_invalid_names() {
        let mut writer = ArchiveWriter::new();
        assert!(writer.append("", b"x").is_err());
        assert!(writer.append("/a\0b", b"x").is_err());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("/short"), Some(("", "/short")));
        let long = format!("{}/{}", "p".repeat(150), "n".repeat(99));
        let (prefix, name) = split_name(&long).unwrap();
        assert_eq!(prefix.len(), 150);
        assert_eq!(name.len(), 99);
        // No separator in range.
        assert_eq!(split_name(&"z".repeat(200)), None);
    }
}
