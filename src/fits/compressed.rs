//! Tile-compressed images: a `BINTABLE` with `ZIMAGE = T` whose rows each
//! hold one compressed tile of an image described by `ZBITPIX`/`ZNAXISn`.
//!
//! `GZIP_1` and `GZIP_2` tiles are inflated and reassembled into one owned
//! big-endian buffer, so the result reads like any other array segment.
//! Other algorithms, and dithered quantization, are reported as unsupported
//! rather than failing the whole container.

use std::io::Read;

use flate2::read::{MultiGzDecoder, ZlibDecoder};

use super::container::{Bitpix, Scaling};
use super::header::Header;
use super::storage::Storage;
use super::table::{Column, ColumnType};

// ---------------------------------------------------------------------------
// TileGrid – mapping between tiles and image elements
// ---------------------------------------------------------------------------

/// Tiling of an image; axes in header order (`NAXIS1` fastest).
#[derive(Debug, Clone)]
pub(crate) struct TileGrid {
    axes: Vec<usize>,
    tile: Vec<usize>,
}

/// A contiguous stretch of elements shared by a tile and the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run {
    pub image: usize,
    pub tile: usize,
    pub len: usize,
}

impl TileGrid {
    pub(crate) fn new(axes: Vec<usize>, tile: Vec<usize>) -> Self {
        TileGrid { axes, tile }
    }

    fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.axes
            .iter()
            .zip(&self.tile)
            .map(|(&n, &t)| n.div_ceil(t.max(1)))
    }

    /// Number of tiles.
    pub(crate) fn len(&self) -> usize {
        if self.axes.is_empty() {
            0
        } else {
            self.counts().product()
        }
    }

    /// Element runs covering tile `t`, in tile order.
    pub(crate) fn runs(&self, t: usize) -> Vec<Run> {
        let mut origin = Vec::with_capacity(self.axes.len());
        let mut rest = t;
        for (k, count) in self.counts().enumerate() {
            origin.push((rest % count) * self.tile[k]);
            rest /= count;
        }
        let extent: Vec<usize> = origin
            .iter()
            .zip(self.axes.iter().zip(&self.tile))
            .map(|(&o, (&n, &size))| size.min(n - o))
            .collect();
        let mut stride = vec![1usize; self.axes.len()];
        for k in 1..self.axes.len() {
            stride[k] = stride[k - 1] * self.axes[k - 1];
        }

        let mut runs = Vec::new();
        let mut local = vec![0usize; self.axes.len()];
        let mut tile_pos = 0;
        loop {
            let image = (0..self.axes.len())
                .map(|k| (origin[k] + local[k]) * stride[k])
                .sum();
            runs.push(Run {
                image,
                tile: tile_pos,
                len: extent[0],
            });
            tile_pos += extent[0];

            // Odometer over the axes above the first.
            let mut k = 1;
            loop {
                if k == self.axes.len() {
                    return runs;
                }
                local[k] += 1;
                if local[k] < extent[k] {
                    break;
                }
                local[k] = 0;
                k += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub(crate) fn is_compressed_image(header: &Header) -> bool {
    header.get_bool("ZIMAGE") == Some(true)
}

pub(crate) enum Decompressed {
    Image {
        /// Row-major, like every other array segment.
        shape: Vec<usize>,
        bitpix: Bitpix,
        scaling: Scaling,
        storage: Storage,
    },
    /// Framed but not decodable; the string names the encoding.
    Unsupported(String),
}

/// Per-tile linear quantization of floating-point images.
struct Quantization<'a> {
    scale: Option<&'a Column>,
    zero: Option<&'a Column>,
    blank: Option<&'a Column>,
    header_scale: f64,
    header_zero: f64,
    header_blank: Option<i64>,
}

impl Quantization<'_> {
    fn params(&self, row: &[u8]) -> (f64, f64, Option<i64>) {
        let scale = self.scale.and_then(|c| row_number(row, c)).unwrap_or(self.header_scale);
        let zero = self.zero.and_then(|c| row_number(row, c)).unwrap_or(self.header_zero);
        let blank = self
            .blank
            .and_then(|c| row_number(row, c))
            .map(|b| b as i64)
            .or(self.header_blank);
        (scale, zero, blank)
    }
}

/// Inflate the image held by a `ZIMAGE` table.
///
/// `data` is the whole data region (rows followed by the heap). Errors are
/// plain messages; the caller attaches segment context.
pub(crate) fn decompress_image(
    header: &Header,
    data: &[u8],
    row_len: usize,
    rows: usize,
    columns: &[Column],
) -> Result<Decompressed, String> {
    let algorithm = header
        .get_str("ZCMPTYPE")
        .ok_or("compressed image has no ZCMPTYPE")?
        .trim()
        .to_string();
    let shuffled = match algorithm.as_str() {
        "GZIP_1" => false,
        "GZIP_2" => true,
        _ => return Ok(Decompressed::Unsupported(format!("compressed image ({algorithm})"))),
    };

    let raw_bitpix = header.get_i64("ZBITPIX").ok_or("missing ZBITPIX")?;
    let bitpix =
        Bitpix::from_value(raw_bitpix).ok_or_else(|| format!("invalid ZBITPIX {raw_bitpix}"))?;
    let naxis = header.get_i64("ZNAXIS").ok_or("missing ZNAXIS")?;
    if !(0..=999).contains(&naxis) {
        return Err(format!("invalid ZNAXIS {naxis}"));
    }
    let mut axes = Vec::with_capacity(naxis as usize);
    let mut tile = Vec::with_capacity(naxis as usize);
    for n in 1..=naxis {
        let len = header
            .get_i64(&format!("ZNAXIS{n}"))
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| format!("missing or negative ZNAXIS{n}"))?;
        let default = if n == 1 { len } else { 1 };
        let t = match header.get_i64(&format!("ZTILE{n}")) {
            Some(t) if t >= 1 => t as usize,
            Some(t) => return Err(format!("invalid ZTILE{n} {t}")),
            None => default.max(1),
        };
        axes.push(len);
        tile.push(t);
    }
    let elements = axes
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or("compressed image size overflows")?;
    let elements = if axes.is_empty() { 0 } else { elements };

    let grid = TileGrid::new(axes.clone(), tile);
    if grid.len() != rows {
        return Err(format!(
            "image needs {} tiles but the table has {rows} rows",
            grid.len()
        ));
    }

    let find = |name: &str| columns.iter().find(|c| c.name.eq_ignore_ascii_case(name));
    let data_col = find("COMPRESSED_DATA").ok_or("compressed image has no COMPRESSED_DATA column")?;

    let quantized = matches!(bitpix, Bitpix::F32 | Bitpix::F64)
        && (find("ZSCALE").is_some() || header.get_f64("ZSCALE").is_some());
    let quantization = if quantized {
        let method = header.get_str("ZQUANTIZ").unwrap_or("NO_DITHER").trim();
        if method != "NO_DITHER" {
            return Ok(Decompressed::Unsupported(format!(
                "compressed image ({algorithm}, {method})"
            )));
        }
        Some(Quantization {
            scale: find("ZSCALE"),
            zero: find("ZZERO"),
            blank: find("ZBLANK"),
            header_scale: header.get_f64("ZSCALE").unwrap_or(1.0),
            header_zero: header.get_f64("ZZERO").unwrap_or(0.0),
            header_blank: header.get_i64("ZBLANK"),
        })
    } else {
        None
    };

    // Quantized tiles hold 32-bit integers; the image becomes 64-bit floats.
    let (tile_size, out_bitpix) = match quantization {
        Some(_) => (4, Bitpix::F64),
        None => (bitpix.size(), bitpix),
    };
    let out_size = out_bitpix.size();
    let out_len = elements
        .checked_mul(out_size)
        .ok_or("compressed image size overflows")?;
    let mut out = vec![0u8; out_len];

    let table_len = row_len.checked_mul(rows).ok_or("table size overflows")?;
    let theap = match header.get_i64("THEAP") {
        Some(t) => usize::try_from(t).map_err(|_| format!("invalid THEAP {t}"))?,
        None => table_len,
    };
    let heap = data.get(theap..).ok_or("heap starts past the data region")?;

    for t in 0..rows {
        let row = data
            .get(t * row_len..(t + 1) * row_len)
            .ok_or_else(|| format!("row {t} is truncated"))?;
        let (count, offset) = descriptor(row, data_col)
            .ok_or_else(|| format!("tile {t} has an unreadable descriptor"))?;
        let compressed = offset
            .checked_add(count)
            .and_then(|end| heap.get(offset..end))
            .ok_or_else(|| format!("tile {t} points outside the heap"))?;
        let mut bytes = inflate(compressed).map_err(|e| format!("tile {t}: {e}"))?;

        let runs = grid.runs(t);
        let tile_elements: usize = runs.iter().map(|r| r.len).sum();
        if bytes.len() != tile_elements * tile_size {
            return Err(format!(
                "tile {t} inflates to {} bytes, expected {}",
                bytes.len(),
                tile_elements * tile_size
            ));
        }
        if shuffled {
            bytes = unshuffle(&bytes, tile_size);
        }

        match &quantization {
            None => {
                for run in runs {
                    let src = &bytes[run.tile * tile_size..(run.tile + run.len) * tile_size];
                    out[run.image * out_size..(run.image + run.len) * out_size].copy_from_slice(src);
                }
            }
            Some(q) => {
                let (scale, zero, blank) = q.params(row);
                for run in runs {
                    for i in 0..run.len {
                        let at = (run.tile + i) * 4;
                        let raw = i32::from_be_bytes([
                            bytes[at],
                            bytes[at + 1],
                            bytes[at + 2],
                            bytes[at + 3],
                        ]) as i64;
                        let value = if blank == Some(raw) {
                            f64::NAN
                        } else {
                            zero + scale * raw as f64
                        };
                        let dst = (run.image + i) * out_size;
                        out[dst..dst + out_size].copy_from_slice(&value.to_be_bytes());
                    }
                }
            }
        }
    }

    let scaling = match quantization {
        Some(_) => Scaling::default(),
        None => Scaling {
            scale: header.get_f64("BSCALE").unwrap_or(1.0),
            zero: header.get_f64("BZERO").unwrap_or(0.0),
            blank: header.get_i64("BLANK").or(header.get_i64("ZBLANK")),
        },
    };
    Ok(Decompressed::Image {
        shape: axes.iter().rev().copied().collect(),
        bitpix: out_bitpix,
        scaling,
        storage: Storage::from_vec(out),
    })
}

/// `(count, heap offset)` of a `P` or `Q` array descriptor.
fn descriptor(row: &[u8], col: &Column) -> Option<(usize, usize)> {
    let cell = row.get(col.offset..col.offset + col.width)?;
    match col.ty {
        ColumnType::Unsupported('P') => {
            let count = i32::from_be_bytes(cell.get(0..4)?.try_into().ok()?);
            let offset = i32::from_be_bytes(cell.get(4..8)?.try_into().ok()?);
            Some((usize::try_from(count).ok()?, usize::try_from(offset).ok()?))
        }
        ColumnType::Unsupported('Q') => {
            let count = i64::from_be_bytes(cell.get(0..8)?.try_into().ok()?);
            let offset = i64::from_be_bytes(cell.get(8..16)?.try_into().ok()?);
            Some((usize::try_from(count).ok()?, usize::try_from(offset).ok()?))
        }
        _ => None,
    }
}

/// A scalar numeric cell of one row.
fn row_number(row: &[u8], col: &Column) -> Option<f64> {
    let cell = row.get(col.offset..col.offset + col.width)?;
    Some(match col.ty {
        ColumnType::Byte => *cell.first()? as f64,
        ColumnType::Short => i16::from_be_bytes(cell.get(0..2)?.try_into().ok()?) as f64,
        ColumnType::Int => i32::from_be_bytes(cell.get(0..4)?.try_into().ok()?) as f64,
        ColumnType::Long => i64::from_be_bytes(cell.get(0..8)?.try_into().ok()?) as f64,
        ColumnType::Float => f32::from_be_bytes(cell.get(0..4)?.try_into().ok()?) as f64,
        ColumnType::Double => f64::from_be_bytes(cell.get(0..8)?.try_into().ok()?),
        _ => return None,
    })
}

/// Gzip or zlib stream, told apart by the gzip magic.
fn inflate(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    if compressed.starts_with(&[0x1f, 0x8b]) {
        MultiGzDecoder::new(compressed).read_to_end(&mut out)?;
    } else {
        ZlibDecoder::new(compressed).read_to_end(&mut out)?;
    }
    Ok(out)
}

/// `GZIP_2` stores byte `b` of every element before byte `b + 1`.
pub(crate) fn shuffle(bytes: &[u8], size: usize) -> Vec<u8> {
    let n = bytes.len() / size;
    let mut out = vec![0u8; bytes.len()];
    for i in 0..n {
        for b in 0..size {
            out[b * n + i] = bytes[i * size + b];
        }
    }
    out
}

fn unshuffle(bytes: &[u8], size: usize) -> Vec<u8> {
    let n = bytes.len() / size;
    let mut out = vec![0u8; bytes.len()];
    for i in 0..n {
        for b in 0..size {
            out[i * size + b] = bytes[b * n + i];
        }
    }
    out
}
