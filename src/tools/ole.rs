//! OLE2 compound files and the property sets stored inside them.
//!
//! Legacy Office documents keep their summary metadata (title, author,
//! timestamps) in two small streams, `\u{5}SummaryInformation` and
//! `\u{5}DocumentSummaryInformation`, encoded as MS-OLEPS property sets.
//! [`CfbReader`] lists the container's streams via the `cfb` crate;
//! [`OlePropertySetDecoder`] decodes the subset of MS-OLEPS those streams use.

use super::{CompoundContainer, CompoundEntry, CompoundFileReader, Properties, PropertySetDecoder};
use crate::error::ToolError;
use chrono::DateTime;
use encoding_rs::Encoding;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Compound-file reader backed by the `cfb` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CfbReader;

impl CompoundFileReader for CfbReader {
    fn open(&self, path: &Path) -> Result<Box<dyn CompoundContainer>, ToolError> {
        let file = File::open(path)?;
        let comp = cfb::CompoundFile::open(file)
            .map_err(|e| ToolError::Malformed(format!("not an OLE compound file: {e}")))?;
        Ok(Box::new(CfbContainer { comp }))
    }
}

struct CfbContainer {
    comp: cfb::CompoundFile<File>,
}

impl CompoundContainer for CfbContainer {
    fn entries(&self) -> Vec<CompoundEntry> {
        self.comp
            .walk()
            .filter(|e| e.is_stream())
            .map(|e| CompoundEntry {
                path: e.path().to_string_lossy().into_owned(),
                initial: e.name().encode_utf16().next().unwrap_or(0),
            })
            .collect()
    }

    fn read_stream(&mut self, entry: &CompoundEntry) -> Result<Vec<u8>, ToolError> {
        let mut stream = self.comp.open_stream(&entry.path)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// First name code unit of every property-set stream.
pub const PROPERTY_SET_INITIAL: u16 = 0x0005;

/// Whether a compound-file entry holds a property set.
pub fn is_property_set(entry: &CompoundEntry) -> bool {
    entry.initial == PROPERTY_SET_INITIAL
}

/// FMTID_SummaryInformation, {F29F85E0-4FF9-1068-AB91-08002B27B3D9}.
pub const FMTID_SUMMARY: [u8; 16] = [
    0xE0, 0x85, 0x9F, 0xF2, 0xF9, 0x4F, 0x68, 0x10, 0xAB, 0x91, 0x08, 0x00, 0x2B, 0x27, 0xB3, 0xD9,
];

/// FMTID_DocSummaryInformation, {D5CDD502-2E9C-101B-9397-08002B2CF9AE}.
pub const FMTID_DOC_SUMMARY: [u8; 16] = [
    0x02, 0xD5, 0xCD, 0xD5, 0x9C, 0x2E, 0x1B, 0x10, 0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE,
];

const VT_I2: u16 = 0x0002;
const VT_I4: u16 = 0x0003;
const VT_R8: u16 = 0x0005;
const VT_BOOL: u16 = 0x000B;
const VT_UI4: u16 = 0x0013;
const VT_LPSTR: u16 = 0x001E;
const VT_LPWSTR: u16 = 0x001F;
const VT_FILETIME: u16 = 0x0040;

const PID_CODEPAGE: u32 = 1;
const PID_EDITTIME: u32 = 10;
const CP_UTF16: u16 = 1200;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;

fn summary_name(pid: u32) -> Option<&'static str> {
    Some(match pid {
        1 => "CodePage",
        2 => "Title",
        3 => "Subject",
        4 => "Author",
        5 => "Keywords",
        6 => "Comments",
        7 => "Template",
        8 => "LastAuthor",
        9 => "RevNumber",
        10 => "EditTime",
        11 => "LastPrinted",
        12 => "CreateTime",
        13 => "LastSaveTime",
        14 => "PageCount",
        15 => "WordCount",
        16 => "CharCount",
        18 => "AppName",
        19 => "DocSecurity",
        _ => return None,
    })
}

fn doc_summary_name(pid: u32) -> Option<&'static str> {
    Some(match pid {
        1 => "CodePage",
        2 => "Category",
        3 => "PresentationFormat",
        4 => "ByteCount",
        5 => "LineCount",
        6 => "ParagraphCount",
        7 => "SlideCount",
        8 => "NoteCount",
        9 => "HiddenCount",
        10 => "MMClipCount",
        11 => "ScaleCrop",
        14 => "Manager",
        15 => "Company",
        16 => "LinksDirty",
        _ => return None,
    })
}

/// Decoder for SummaryInformation and DocumentSummaryInformation streams.
///
/// Property types outside the scalar and string subset (vectors, blobs,
/// clipboard data) and property sets with unknown FMTIDs are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct OlePropertySetDecoder;

impl PropertySetDecoder for OlePropertySetDecoder {
    fn decode(&self, stream: &[u8]) -> Result<Properties, ToolError> {
        let buf = Bytes(stream);
        if buf.u16(0)? != 0xFFFE {
            return Err(ToolError::Malformed("bad property set byte order".into()));
        }
        let sets = buf.u32(24)? as usize;
        let mut props = Properties::new();

        for i in 0..sets.min(2) {
            let header = 28 + i * 20;
            let fmtid = buf.slice(header, 16)?;
            let offset = buf.u32(header + 16)? as usize;
            let names: fn(u32) -> Option<&'static str> = if fmtid == FMTID_SUMMARY {
                summary_name
            } else if fmtid == FMTID_DOC_SUMMARY {
                doc_summary_name
            } else {
                continue;
            };
            decode_set(&buf, offset, names, &mut props)?;
        }
        Ok(props)
    }
}

fn decode_set(
    buf: &Bytes<'_>,
    base: usize,
    names: fn(u32) -> Option<&'static str>,
    out: &mut Properties,
) -> Result<(), ToolError> {
    let count = buf.u32(base + 4)? as usize;
    let mut entries = Vec::with_capacity(count.min(256));
    for i in 0..count {
        let pid = buf.u32(base + 8 + i * 8)?;
        let offset = buf.u32(base + 12 + i * 8)? as usize;
        entries.push((pid, base + offset));
    }

    // The code page governs how every VT_LPSTR in the set is encoded.
    let code_page = entries
        .iter()
        .find(|(pid, _)| *pid == PID_CODEPAGE)
        .and_then(|&(_, at)| match buf.u16(at) {
            Ok(VT_I2) => buf.u16(at + 4).ok(),
            _ => None,
        })
        .unwrap_or(0);

    for (pid, at) in entries {
        let Some(name) = names(pid) else { continue };
        if let Some(value) = decode_value(buf, at, pid, code_page)? {
            out.push((name.to_string(), value));
        }
    }
    Ok(())
}

fn decode_value(
    buf: &Bytes<'_>,
    at: usize,
    pid: u32,
    code_page: u16,
) -> Result<Option<String>, ToolError> {
    let data = at + 4;
    let value = match buf.u16(at)? {
        VT_I2 => (buf.u16(data)? as i16).to_string(),
        VT_I4 => (buf.u32(data)? as i32).to_string(),
        VT_UI4 => buf.u32(data)?.to_string(),
        VT_R8 => f64::from_le_bytes(buf.array::<8>(data)?).to_string(),
        VT_BOOL => (buf.u16(data)? != 0).to_string(),
        VT_LPSTR => {
            let len = buf.u32(data)? as usize;
            let raw = buf.slice(data + 4, len)?;
            if code_page == CP_UTF16 {
                utf16_string(raw)
            } else {
                ansi_string(raw, code_page_encoding(code_page))
            }
        }
        VT_LPWSTR => {
            let chars = buf.u32(data)? as usize;
            utf16_string(buf.slice(data + 4, chars * 2)?)
        }
        VT_FILETIME => {
            let ticks = u64::from_le_bytes(buf.array::<8>(data)?);
            if pid == PID_EDITTIME {
                format!("{}s", ticks / 10_000_000)
            } else {
                match filetime_string(ticks) {
                    Some(s) => s,
                    None => return Ok(None),
                }
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Format a FILETIME as `YYYY-MM-DD hh:mm:ss[.fff] +0000 UTC`.
///
/// Zero means "never set" and yields `None`.
pub fn filetime_string(ticks: u64) -> Option<String> {
    if ticks == 0 {
        return None;
    }
    let secs = (ticks / 10_000_000) as i64 - FILETIME_UNIX_OFFSET;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    let dt = DateTime::from_timestamp(secs, nanos)?;
    Some(dt.format("%Y-%m-%d %H:%M:%S%.f +0000 UTC").to_string())
}

fn utf16_string(raw: &[u8]) -> String {
    let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(raw);
    text.trim_end_matches('\0').to_string()
}

/// Map a Windows code page identifier to its encoding.
///
/// A missing or unrecognised code page falls back to Windows-1252, the
/// ANSI code page Word writes on Western systems.
pub fn code_page_encoding(code_page: u16) -> &'static Encoding {
    use encoding_rs::*;
    let found = match code_page {
        65001 => Some(UTF_8),
        932 => Some(SHIFT_JIS),
        936 => Some(GBK),
        949 => Some(EUC_KR),
        950 => Some(BIG5),
        54936 => Some(GB18030),
        866 => Some(IBM866),
        10000 => Some(MACINTOSH),
        20866 => Some(KOI8_R),
        21866 => Some(KOI8_U),
        20932 | 51932 => Some(EUC_JP),
        50220..=50222 => Some(ISO_2022_JP),
        874 | 1250..=1258 => Encoding::for_label(format!("windows-{code_page}").as_bytes()),
        28591..=28606 => {
            Encoding::for_label(format!("iso-8859-{}", code_page - 28590).as_bytes())
        }
        _ => None,
    };
    found.unwrap_or_else(|| {
        if code_page != 0 {
            tracing::debug!(code_page, "unknown code page, decoding as windows-1252");
        }
        WINDOWS_1252
    })
}

fn ansi_string(raw: &[u8], encoding: &'static Encoding) -> String {
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };
    let (text, _) = encoding.decode_without_bom_handling(raw);
    text.into_owned()
}

/// Bounds-checked little-endian reads.
struct Bytes<'a>(&'a [u8]);

impl<'a> Bytes<'a> {
    fn slice(&self, at: usize, len: usize) -> Result<&'a [u8], ToolError> {
        at.checked_add(len)
            .and_then(|end| self.0.get(at..end))
            .ok_or_else(|| {
                ToolError::Malformed(format!(
                    "property set truncated: need {len} bytes at offset {at}, have {}",
                    self.0.len()
                ))
            })
    }

    fn array<const N: usize>(&self, at: usize) -> Result<[u8; N], ToolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(at, N)?);
        Ok(out)
    }

    fn u16(&self, at: usize) -> Result<u16, ToolError> {
        Ok(u16::from_le_bytes(self.array::<2>(at)?))
    }

    fn u32(&self, at: usize) -> Result<u32, ToolError> {
        Ok(u32::from_le_bytes(self.array::<4>(at)?))
    }
}
