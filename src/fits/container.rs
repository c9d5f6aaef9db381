use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::compressed::{self, Decompressed};
use super::decompress;
use super::header::{padded_len, Header};
use super::storage::Storage;
use super::table::{parse_columns, Column, TableEncoding};
use crate::error::{FitsError, Result};

/// Label prefix used for containers that were not read from a named file.
pub const IN_MEMORY_LABEL: &str = "HDUList";

// ---------------------------------------------------------------------------
// Segment kinds and element layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    Array,
    Table(TableEncoding),
    /// Anything the decoder can frame but not interpret (`XTENSION` values
    /// other than IMAGE/BINTABLE/TABLE, random-groups primaries, compressed
    /// images in an encoding we cannot inflate).
    Unknown(String),
}

/// Element type of an array segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitpix {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Bitpix {
    pub fn from_value(value: i64) -> Option<Self> {
        Some(match value {
            8 => Bitpix::U8,
            16 => Bitpix::I16,
            32 => Bitpix::I32,
            64 => Bitpix::I64,
            -32 => Bitpix::F32,
            -64 => Bitpix::F64,
            _ => return None,
        })
    }

    pub fn value(self) -> i64 {
        match self {
            Bitpix::U8 => 8,
            Bitpix::I16 => 16,
            Bitpix::I32 => 32,
            Bitpix::I64 => 64,
            Bitpix::F32 => -32,
            Bitpix::F64 => -64,
        }
    }

    /// Bytes per element.
    pub fn size(self) -> usize {
        (self.value().unsigned_abs() / 8) as usize
    }
}

/// `BSCALE` / `BZERO` / `BLANK` of an array segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub scale: f64,
    pub zero: f64,
    pub blank: Option<i64>,
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling {
            scale: 1.0,
            zero: 0.0,
            blank: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Array { bitpix: Bitpix, scaling: Scaling },
    Table {
        row_len: usize,
        rows: usize,
        columns: Vec<Column>,
    },
    Opaque,
}

// ---------------------------------------------------------------------------
// Segment – one header + data unit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Segment {
    index: usize,
    name: String,
    kind: SegmentKind,
    header: Header,
    /// Row-major for arrays, `[rows, columns]` for tables.
    shape: Vec<usize>,
    layout: Layout,
    data_offset: usize,
    data_len: usize,
    storage: Storage,
}

impl Segment {
    pub fn index(&self) -> usize {
        self.index
    }

    /// `EXTNAME` as written, `PRIMARY` for an unnamed first segment, or empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used for labels and exclusion; unnamed segments become `HDU{index}`.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("HDU{}", self.index)
        } else {
            self.name.clone()
        }
    }

    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// No elements to expose. Segments of unknown kind are judged by their
    /// data region, since their axes need not describe it (random groups
    /// always carry `NAXIS1 = 0`).
    pub fn is_empty(&self) -> bool {
        match self.kind {
            SegmentKind::Unknown(_) => self.data_len == 0,
            _ => self.shape.is_empty() || self.shape.contains(&0),
        }
    }

    /// Offset of the data region within [`Segment::storage`].
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// The raw (big-endian) data region, borrowed from the container buffer.
    pub fn data(&self) -> &[u8] {
        self.storage
            .range(self.data_offset, self.data_len)
            .unwrap_or_default()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

// ---------------------------------------------------------------------------
// Container – the decoded segment list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Container {
    segments: Vec<Segment>,
    storage: Storage,
    source: Option<PathBuf>,
}

impl Container {
    /// Read a container from disk, inflating gzip input.
    pub fn open(path: &Path) -> Result<Self> {
        let storage = decompress::open(path)?;
        Self::from_storage(storage, Some(path.to_path_buf()))
    }

    /// Decode a container already held in memory. Labels use [`IN_MEMORY_LABEL`].
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_storage(Storage::from_vec(bytes), None)
    }

    pub fn from_storage(storage: Storage, source: Option<PathBuf>) -> Result<Self> {
        let segments = decode_segments(&storage)?;
        Ok(Container {
            segments,
            storage,
            source,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment whose display name is `name`.
    pub fn segment(&self, name: &str) -> Result<&Segment> {
        self.segments
            .iter()
            .find(|s| s.display_name() == name)
            .ok_or_else(|| FitsError::NoSuchSegment(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Default dataset label prefix derived from where the bytes came from.
    pub fn label_prefix(&self) -> String {
        match &self.source {
            Some(path) => label_from_path(path),
            None => IN_MEMORY_LABEL.to_string(),
        }
    }
}

/// `generic.fits` → `generic`, `test.fits.gz` → `test`.
fn label_from_path(path: &Path) -> String {
    let file_name = match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return IN_MEMORY_LABEL.to_string(),
    };
    let stem = if decompress::has_gz_extension(path) {
        &file_name[..file_name.len() - 3]
    } else {
        &file_name[..]
    };
    match stem.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base.to_string(),
        _ if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode_segments(storage: &Storage) -> Result<Vec<Segment>> {
    let bytes = storage.bytes();
    if bytes.is_empty() {
        return Err(FitsError::decode(0, "", "container is empty"));
    }

    let mut segments = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let index = segments.len();
        if index > 0 && !bytes[pos..].starts_with(b"XTENSION") {
            warn!(
                "ignoring {} trailing bytes after segment {}",
                bytes.len() - pos,
                index - 1
            );
            break;
        }
        let segment = decode_segment(storage, index, pos)?;
        pos = segment.data_offset + padded_len(segment.data_len);
        let segment = expand_compressed(segment)?;
        debug!(
            "segment {index} '{}' {:?} shape {:?}",
            segment.name, segment.kind, segment.shape
        );
        segments.push(segment);
    }
    Ok(segments)
}

fn decode_segment(storage: &Storage, index: usize, pos: usize) -> Result<Segment> {
    let bytes = storage.bytes();
    let parsed = Header::parse(&bytes[pos..]).map_err(|r| FitsError::decode(index, "", r))?;
    let header = parsed.header;

    let name = match header.get_str("EXTNAME") {
        Some(n) => n.to_string(),
        None if index == 0 => "PRIMARY".to_string(),
        None => String::new(),
    };
    let err = |reason: String| FitsError::decode(index, &name, reason);

    let first = header.cards().first().map(|c| c.keyword.as_str());
    let groups = header.get_bool("GROUPS") == Some(true);
    let kind = if index == 0 {
        if first != Some("SIMPLE") {
            return Err(err("primary header does not start with SIMPLE".into()));
        }
        if groups {
            SegmentKind::Unknown("GROUPS".into())
        } else {
            SegmentKind::Array
        }
    } else {
        match header.get_str("XTENSION").map(str::trim) {
            Some("IMAGE") => SegmentKind::Array,
            Some("BINTABLE") => SegmentKind::Table(TableEncoding::Binary),
            Some("TABLE") => SegmentKind::Table(TableEncoding::Ascii),
            Some(other) => SegmentKind::Unknown(other.to_string()),
            None => return Err(err("extension header has no XTENSION".into())),
        }
    };

    let raw_bitpix = header
        .get_i64("BITPIX")
        .ok_or_else(|| err("missing BITPIX".into()))?;
    let bitpix =
        Bitpix::from_value(raw_bitpix).ok_or_else(|| err(format!("invalid BITPIX {raw_bitpix}")))?;

    let naxis = header
        .get_i64("NAXIS")
        .ok_or_else(|| err("missing NAXIS".into()))?;
    if !(0..=999).contains(&naxis) {
        return Err(err(format!("invalid NAXIS {naxis}")));
    }
    let mut axes = Vec::with_capacity(naxis as usize);
    for n in 1..=naxis {
        let len = header
            .get_i64(&format!("NAXIS{n}"))
            .ok_or_else(|| err(format!("missing NAXIS{n}")))?;
        let len = usize::try_from(len).map_err(|_| err(format!("negative NAXIS{n}")))?;
        axes.push(len);
    }

    let pcount = header.get_i64("PCOUNT").unwrap_or(0);
    let gcount = header.get_i64("GCOUNT").unwrap_or(1);
    let (pcount, gcount) = match (usize::try_from(pcount), usize::try_from(gcount)) {
        (Ok(p), Ok(g)) => (p, g),
        _ => return Err(err(format!("invalid PCOUNT/GCOUNT {pcount}/{gcount}"))),
    };

    // Random groups carry a zero NAXIS1 that does not count towards the size.
    let counted = if groups && !axes.is_empty() {
        &axes[1..]
    } else {
        &axes[..]
    };
    let elements = if counted.is_empty() {
        Some(0)
    } else {
        counted.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    };
    let data_len = elements
        .and_then(|e| e.checked_add(pcount))
        .and_then(|e| e.checked_mul(gcount))
        .and_then(|e| e.checked_mul(bitpix.size()))
        .ok_or_else(|| err("data size overflows".into()))?;

    let data_offset = pos + parsed.len;
    let remaining = bytes.len().saturating_sub(data_offset);
    if data_len > remaining {
        return Err(err(format!(
            "data region needs {data_len} bytes but only {remaining} remain"
        )));
    }

    let (shape, layout) = match &kind {
        SegmentKind::Array => {
            let scaling = Scaling {
                scale: header.get_f64("BSCALE").unwrap_or(1.0),
                zero: header.get_f64("BZERO").unwrap_or(0.0),
                blank: header.get_i64("BLANK"),
            };
            (
                axes.iter().rev().copied().collect(),
                Layout::Array { bitpix, scaling },
            )
        }
        SegmentKind::Table(encoding) => {
            if axes.len() != 2 {
                return Err(err(format!("table segment has NAXIS = {naxis}, expected 2")));
            }
            let (row_len, rows) = (axes[0], axes[1]);
            let columns = parse_columns(&header, *encoding, row_len).map_err(&err)?;
            (
                vec![rows, columns.len()],
                Layout::Table {
                    row_len,
                    rows,
                    columns,
                },
            )
        }
        SegmentKind::Unknown(_) => (axes.iter().rev().copied().collect(), Layout::Opaque),
    };

    Ok(Segment {
        index,
        name,
        kind,
        header,
        shape,
        layout,
        data_offset,
        data_len,
        storage: storage.clone(),
    })
}

/// Replace a tile-compressed image table with the image it holds. The image
/// gets its own buffer; the container bytes are left untouched.
fn expand_compressed(seg: Segment) -> Result<Segment> {
    let Layout::Table {
        row_len,
        rows,
        columns,
    } = &seg.layout
    else {
        return Ok(seg);
    };
    if seg.kind != SegmentKind::Table(TableEncoding::Binary)
        || !compressed::is_compressed_image(&seg.header)
    {
        return Ok(seg);
    }

    let decoded = compressed::decompress_image(&seg.header, seg.data(), *row_len, *rows, columns)
        .map_err(|r| FitsError::decode(seg.index, &seg.name, r))?;
    Ok(match decoded {
        Decompressed::Image {
            shape,
            bitpix,
            scaling,
            storage,
        } => {
            debug!(
                "segment {} '{}' inflated to {} bytes",
                seg.index,
                seg.name,
                storage.len()
            );
            Segment {
                kind: SegmentKind::Array,
                shape,
                layout: Layout::Array { bitpix, scaling },
                data_offset: 0,
                data_len: storage.len(),
                storage,
                ..seg
            }
        }
        Decompressed::Unsupported(what) => Segment {
            kind: SegmentKind::Unknown(what),
            layout: Layout::Opaque,
            ..seg
        },
    })
}
