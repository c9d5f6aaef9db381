//! Small container builder used to synthesise fixtures and sample files.
//!
//! It writes just enough of the format to exercise the decoder: images with
//! any `BITPIX`, binary and ASCII tables with scalar, text and vector columns,
//! gzip tile-compressed images, random-groups primaries and opaque extensions. It is not a general-purpose serializer.

use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use super::compressed::{shuffle, TileGrid};
use super::header::{padded_len, HeaderValue, CARD_SIZE};

type Cards = Vec<(String, HeaderValue)>;

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

pub struct ImageSpec {
    name: Option<String>,
    bitpix: i64,
    /// Row-major, slowest axis first.
    shape: Vec<usize>,
    values: Vec<f64>,
    cards: Cards,
}

impl ImageSpec {
    /// A `BITPIX = -64` image. Missing values are written as zero.
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Self {
        ImageSpec {
            name: None,
            bitpix: -64,
            shape,
            values,
            cards: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn bitpix(mut self, bitpix: i64) -> Self {
        self.bitpix = bitpix;
        self
    }

    pub fn card(mut self, keyword: &str, value: impl Into<HeaderValue>) -> Self {
        self.cards.push((keyword.to_string(), value.into()));
        self
    }

    fn data(&self) -> Vec<u8> {
        let count = if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        };
        let mut out = Vec::with_capacity(count * (self.bitpix.unsigned_abs() as usize / 8));
        for i in 0..count {
            let v = self.values.get(i).copied().unwrap_or(0.0);
            match self.bitpix {
                8 => out.push(v as u8),
                16 => out.extend((v as i16).to_be_bytes()),
                32 => out.extend((v as i32).to_be_bytes()),
                64 => out.extend((v as i64).to_be_bytes()),
                -32 => out.extend((v as f32).to_be_bytes()),
                _ => out.extend(v.to_be_bytes()),
            }
        }
        out
    }

    fn axis_cards(&self, cards: &mut Cards) {
        cards.push(("BITPIX".into(), self.bitpix.into()));
        cards.push(("NAXIS".into(), (self.shape.len() as i64).into()));
        for (n, len) in self.shape.iter().rev().enumerate() {
            cards.push((format!("NAXIS{}", n + 1), (*len as i64).into()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub enum ColData {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Logical(Vec<bool>),
    Text(usize, Vec<String>),
    /// `repeat` doubles per row.
    Vector(usize, Vec<f64>),
}

pub struct Col {
    name: String,
    data: ColData,
    cards: Vec<(&'static str, HeaderValue)>,
}

impl Col {
    fn new(name: &str, data: ColData) -> Self {
        Col {
            name: name.to_string(),
            data,
            cards: Vec::new(),
        }
    }

    pub fn int(name: &str, values: Vec<i32>) -> Self {
        Self::new(name, ColData::Int(values))
    }

    pub fn long(name: &str, values: Vec<i64>) -> Self {
        Self::new(name, ColData::Long(values))
    }

    pub fn float(name: &str, values: Vec<f32>) -> Self {
        Self::new(name, ColData::Float(values))
    }

    pub fn double(name: &str, values: Vec<f64>) -> Self {
        Self::new(name, ColData::Double(values))
    }

    pub fn logical(name: &str, values: Vec<bool>) -> Self {
        Self::new(name, ColData::Logical(values))
    }

    pub fn text(name: &str, width: usize, values: &[&str]) -> Self {
        let values = values.iter().map(|s| s.to_string()).collect();
        Self::new(name, ColData::Text(width, values))
    }

    pub fn vector(name: &str, repeat: usize, values: Vec<f64>) -> Self {
        Self::new(name, ColData::Vector(repeat, values))
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.cards.push(("TUNIT", unit.into()));
        self
    }

    pub fn null(mut self, null: i64) -> Self {
        self.cards.push(("TNULL", null.into()));
        self
    }

    pub fn scaled(mut self, scale: f64, zero: f64) -> Self {
        self.cards.push(("TSCAL", scale.into()));
        self.cards.push(("TZERO", zero.into()));
        self
    }

    fn rows(&self) -> usize {
        match &self.data {
            ColData::Int(v) => v.len(),
            ColData::Long(v) => v.len(),
            ColData::Float(v) => v.len(),
            ColData::Double(v) => v.len(),
            ColData::Logical(v) => v.len(),
            ColData::Text(_, v) => v.len(),
            ColData::Vector(r, v) => v.len() / (*r).max(1),
        }
    }

    fn binary_tform(&self) -> String {
        match &self.data {
            ColData::Int(_) => "J".into(),
            ColData::Long(_) => "K".into(),
            ColData::Float(_) => "E".into(),
            ColData::Double(_) => "D".into(),
            ColData::Logical(_) => "L".into(),
            ColData::Text(w, _) => format!("{w}A"),
            ColData::Vector(r, _) => format!("{r}D"),
        }
    }

    fn binary_cell(&self, row: usize, out: &mut Vec<u8>) {
        match &self.data {
            ColData::Int(v) => out.extend(v.get(row).copied().unwrap_or(0).to_be_bytes()),
            ColData::Long(v) => out.extend(v.get(row).copied().unwrap_or(0).to_be_bytes()),
            ColData::Float(v) => out.extend(v.get(row).copied().unwrap_or(0.0).to_be_bytes()),
            ColData::Double(v) => out.extend(v.get(row).copied().unwrap_or(0.0).to_be_bytes()),
            ColData::Logical(v) => out.push(match v.get(row) {
                Some(true) => b'T',
                Some(false) => b'F',
                None => 0,
            }),
            ColData::Text(w, v) => {
                let s = v.get(row).map(String::as_bytes).unwrap_or_default();
                let mut cell = s[..s.len().min(*w)].to_vec();
                cell.resize(*w, b' ');
                out.extend(cell);
            }
            ColData::Vector(r, v) => {
                for k in 0..*r {
                    let x = v.get(row * r + k).copied().unwrap_or(0.0);
                    out.extend(x.to_be_bytes());
                }
            }
        }
    }

    /// (TFORM, right/left aligned text) for ASCII tables. Vector columns
    /// contribute their first element.
    fn ascii_cell(&self, row: usize) -> (String, String) {
        match &self.data {
            ColData::Int(v) => ("I12".into(), v.get(row).map(|x| x.to_string()).unwrap_or_default()),
            ColData::Long(v) => ("I21".into(), v.get(row).map(|x| x.to_string()).unwrap_or_default()),
            ColData::Float(v) => (
                "E24.16".into(),
                v.get(row).map(|x| format!("{:.16E}", *x as f64)).unwrap_or_default(),
            ),
            ColData::Double(v) => (
                "E24.16".into(),
                v.get(row).map(|x| format!("{x:.16E}")).unwrap_or_default(),
            ),
            ColData::Logical(v) => (
                "A1".into(),
                v.get(row).map(|b| if *b { "T" } else { "F" }.to_string()).unwrap_or_default(),
            ),
            ColData::Text(w, v) => (format!("A{w}"), v.get(row).cloned().unwrap_or_default()),
            ColData::Vector(r, v) => (
                "E24.16".into(),
                v.get(row * r).map(|x| format!("{x:.16E}")).unwrap_or_default(),
            ),
        }
    }
}

pub struct TableSpec {
    name: String,
    ascii: bool,
    columns: Vec<Col>,
    cards: Cards,
}

impl TableSpec {
    /// A binary table extension.
    pub fn new(name: &str) -> Self {
        TableSpec {
            name: name.to_string(),
            ascii: false,
            columns: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// An ASCII table extension.
    pub fn ascii(name: &str) -> Self {
        TableSpec {
            ascii: true,
            ..Self::new(name)
        }
    }

    pub fn column(mut self, col: Col) -> Self {
        self.columns.push(col);
        self
    }

    pub fn card(mut self, keyword: &str, value: impl Into<HeaderValue>) -> Self {
        self.cards.push((keyword.to_string(), value.into()));
        self
    }

    fn rows(&self) -> usize {
        self.columns.iter().map(Col::rows).max().unwrap_or(0)
    }

    fn encode(&self) -> Vec<u8> {
        let rows = self.rows();
        let mut cards: Cards = vec![(
            "XTENSION".into(),
            if self.ascii { "TABLE" } else { "BINTABLE" }.into(),
        )];
        let mut data = Vec::new();
        let mut column_cards: Cards = Vec::new();

        let row_len = if self.ascii {
            // Columns separated by one blank; widths from the TFORMs.
            let mut tbcol = 1usize;
            let mut layout = Vec::new();
            for (n, col) in self.columns.iter().enumerate() {
                let (tform, _) = col.ascii_cell(0);
                let width: usize = tform[1..]
                    .split('.')
                    .next()
                    .and_then(|w| w.parse().ok())
                    .unwrap_or(1);
                column_cards.push((format!("TTYPE{}", n + 1), col.name.as_str().into()));
                column_cards.push((format!("TFORM{}", n + 1), tform.as_str().into()));
                column_cards.push((format!("TBCOL{}", n + 1), (tbcol as i64).into()));
                push_column_cards(&mut column_cards, n, col);
                layout.push((tbcol - 1, width));
                tbcol += width + 1;
            }
            let row_len = tbcol.saturating_sub(2);
            for row in 0..rows {
                let mut line = vec![b' '; row_len];
                for (col, (at, width)) in self.columns.iter().zip(&layout) {
                    let (tform, text) = col.ascii_cell(row);
                    let cell = if tform.starts_with('A') {
                        format!("{text:<width$}")
                    } else {
                        format!("{text:>width$}")
                    };
                    let bytes = &cell.as_bytes()[..cell.len().min(*width)];
                    line[*at..*at + bytes.len()].copy_from_slice(bytes);
                }
                data.extend(line);
            }
            row_len
        } else {
            for (n, col) in self.columns.iter().enumerate() {
                column_cards.push((format!("TTYPE{}", n + 1), col.name.as_str().into()));
                column_cards.push((format!("TFORM{}", n + 1), col.binary_tform().as_str().into()));
                push_column_cards(&mut column_cards, n, col);
            }
            for row in 0..rows {
                for col in &self.columns {
                    col.binary_cell(row, &mut data);
                }
            }
            if rows == 0 {
                let mut row = Vec::new();
                for col in &self.columns {
                    col.binary_cell(0, &mut row);
                }
                row.len()
            } else {
                data.len() / rows
            }
        };

        cards.push(("BITPIX".into(), 8i64.into()));
        cards.push(("NAXIS".into(), 2i64.into()));
        cards.push(("NAXIS1".into(), (row_len as i64).into()));
        cards.push(("NAXIS2".into(), (rows as i64).into()));
        cards.push(("PCOUNT".into(), 0i64.into()));
        cards.push(("GCOUNT".into(), 1i64.into()));
        cards.push(("TFIELDS".into(), (self.columns.len() as i64).into()));
        cards.extend(column_cards);
        cards.push(("EXTNAME".into(), self.name.as_str().into()));
        cards.extend(self.cards.iter().cloned());

        let pad = if self.ascii { b' ' } else { 0 };
        hdu(&cards, data, pad)
    }
}

fn push_column_cards(cards: &mut Cards, n: usize, col: &Col) {
    for (prefix, value) in &col.cards {
        cards.push((format!("{prefix}{}", n + 1), value.clone()));
    }
}

// ---------------------------------------------------------------------------
// FitsBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FitsBuilder {
    hdus: Vec<Vec<u8>>,
}

impl FitsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary segment with `NAXIS = 0`.
    pub fn empty_primary(self) -> Self {
        self.primary(ImageSpec::new(Vec::new(), Vec::new()).bitpix(8))
    }

    pub fn primary(mut self, image: ImageSpec) -> Self {
        let mut cards: Cards = vec![("SIMPLE".into(), true.into())];
        image.axis_cards(&mut cards);
        cards.push(("EXTEND".into(), true.into()));
        if let Some(name) = &image.name {
            cards.push(("EXTNAME".into(), name.as_str().into()));
        }
        cards.extend(image.cards.iter().cloned());
        self.hdus.push(hdu(&cards, image.data(), 0));
        self
    }

    /// Image extension; an empty primary is inserted first when needed.
    pub fn image(mut self, image: ImageSpec) -> Self {
        self = self.ensure_primary();
        let mut cards: Cards = vec![("XTENSION".into(), "IMAGE".into())];
        image.axis_cards(&mut cards);
        cards.push(("PCOUNT".into(), 0i64.into()));
        cards.push(("GCOUNT".into(), 1i64.into()));
        if let Some(name) = &image.name {
            cards.push(("EXTNAME".into(), name.as_str().into()));
        }
        cards.extend(image.cards.iter().cloned());
        self.hdus.push(hdu(&cards, image.data(), 0));
        self
    }

    pub fn table(mut self, table: TableSpec) -> Self {
        self = self.ensure_primary();
        self.hdus.push(table.encode());
        self
    }

    /// Extension of an arbitrary `XTENSION` type holding `len` zero bytes.
    pub fn extension(mut self, xtension: &str, name: &str, len: usize) -> Self {
        self = self.ensure_primary();
        let cards: Cards = vec![
            ("XTENSION".into(), xtension.into()),
            ("BITPIX".into(), 8i64.into()),
            ("NAXIS".into(), 1i64.into()),
            ("NAXIS1".into(), (len as i64).into()),
            ("PCOUNT".into(), 0i64.into()),
            ("GCOUNT".into(), 1i64.into()),
            ("EXTNAME".into(), name.into()),
        ];
        self.hdus.push(hdu(&cards, vec![0; len], 0));
        self
    }

    /// Random-groups primary: `axes` per group (header order, after the zero
    /// `NAXIS1`), `BITPIX = -32`, all values zero.
    pub fn random_groups(mut self, axes: &[usize], pcount: usize, gcount: usize) -> Self {
        let mut cards: Cards = vec![
            ("SIMPLE".into(), true.into()),
            ("BITPIX".into(), (-32i64).into()),
            ("NAXIS".into(), ((axes.len() + 1) as i64).into()),
            ("NAXIS1".into(), 0i64.into()),
        ];
        for (n, len) in axes.iter().enumerate() {
            cards.push((format!("NAXIS{}", n + 2), (*len as i64).into()));
        }
        cards.push(("GROUPS".into(), true.into()));
        cards.push(("PCOUNT".into(), (pcount as i64).into()));
        cards.push(("GCOUNT".into(), (gcount as i64).into()));
        let len = (axes.iter().product::<usize>() + pcount) * gcount * 4;
        self.hdus.push(hdu(&cards, vec![0; len], 0));
        self
    }

    /// Tile-compressed image extension. `tile` is in header order
    /// (`ZTILE1` first); `algorithm` is `GZIP_1` or `GZIP_2`.
    pub fn compressed(mut self, image: ImageSpec, tile: &[usize], algorithm: &str) -> Self {
        self = self.ensure_primary();
        let axes: Vec<usize> = image.shape.iter().rev().copied().collect();
        let size = (image.bitpix.unsigned_abs() / 8) as usize;
        let pixels = image.data();
        let grid = TileGrid::new(axes.clone(), tile.to_vec());

        let mut rows = Vec::new();
        let mut heap = Vec::new();
        for t in 0..grid.len() {
            let mut raw = Vec::new();
            for run in grid.runs(t) {
                raw.extend_from_slice(&pixels[run.image * size..(run.image + run.len) * size]);
            }
            if algorithm == "GZIP_2" {
                raw = shuffle(&raw, size);
            }
            let packed = Self::gzip(&raw).expect("gzip into memory");
            rows.extend((packed.len() as i32).to_be_bytes());
            rows.extend((heap.len() as i32).to_be_bytes());
            heap.extend(packed);
        }

        let mut cards: Cards = vec![
            ("XTENSION".into(), "BINTABLE".into()),
            ("BITPIX".into(), 8i64.into()),
            ("NAXIS".into(), 2i64.into()),
            ("NAXIS1".into(), 8i64.into()),
            ("NAXIS2".into(), (grid.len() as i64).into()),
            ("PCOUNT".into(), (heap.len() as i64).into()),
            ("GCOUNT".into(), 1i64.into()),
            ("TFIELDS".into(), 1i64.into()),
            ("TTYPE1".into(), "COMPRESSED_DATA".into()),
            ("TFORM1".into(), "1PB".into()),
            ("ZIMAGE".into(), true.into()),
            ("ZCMPTYPE".into(), algorithm.into()),
            ("ZBITPIX".into(), image.bitpix.into()),
            ("ZNAXIS".into(), (axes.len() as i64).into()),
        ];
        for (n, len) in axes.iter().enumerate() {
            cards.push((format!("ZNAXIS{}", n + 1), (*len as i64).into()));
        }
        for (n, len) in tile.iter().enumerate() {
            cards.push((format!("ZTILE{}", n + 1), (*len as i64).into()));
        }
        if let Some(name) = &image.name {
            cards.push(("EXTNAME".into(), name.as_str().into()));
        }
        cards.extend(image.cards.iter().cloned());
        rows.extend(heap);
        self.hdus.push(hdu(&cards, rows, 0));
        self
    }

    fn ensure_primary(self) -> Self {
        if self.hdus.is_empty() {
            self.empty_primary()
        } else {
            self
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        if self.hdus.is_empty() {
            return FitsBuilder::new().empty_primary().to_bytes();
        }
        self.hdus.concat()
    }

    pub fn write(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    pub fn write_gz(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, Self::gzip(&self.to_bytes())?)
    }

    pub fn gzip(bytes: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn format_card(keyword: &str, value: &HeaderValue) -> String {
    let field = match value {
        HeaderValue::Text(s) => format!("'{:<8}'", s.replace('\'', "''")),
        HeaderValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        HeaderValue::Integer(i) => format!("{i:>20}"),
        HeaderValue::Float(f) => format!("{:>20}", format!("{f:E}")),
        HeaderValue::Raw(s) => format!("{s:>20}"),
        HeaderValue::Undefined => String::new(),
    };
    let mut card = format!("{keyword:<8}= {field}");
    card.truncate(CARD_SIZE);
    format!("{card:<80}")
}

fn hdu(cards: &[(String, HeaderValue)], mut data: Vec<u8>, pad: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for (keyword, value) in cards {
        out.extend(format_card(keyword, value).into_bytes());
    }
    out.extend(format!("{:<80}", "END").into_bytes());
    out.resize(padded_len(out.len()), b' ');
    if !data.is_empty() {
        data.resize(padded_len(data.len()), pad);
        out.extend(data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::header::{Header, BLOCK_SIZE};

    #[test]
    fn cards_round_trip_through_the_parser() {
        let bytes = hdu(
            &[
                ("SIMPLE".into(), true.into()),
                ("BSCALE".into(), 0.25.into()),
                ("OBJECT".into(), "M 31 'core'".into()),
            ],
            Vec::new(),
            0,
        );
        assert_eq!(bytes.len(), BLOCK_SIZE);
        let h = Header::parse(&bytes).unwrap().header;
        assert_eq!(h.get_bool("SIMPLE"), Some(true));
        assert_eq!(h.get_f64("BSCALE"), Some(0.25));
        assert_eq!(h.get_str("OBJECT"), Some("M 31 'core'"));
    }

    #[test]
    fn empty_builder_still_writes_a_primary() {
        let bytes = FitsBuilder::new().to_bytes();
        assert_eq!(bytes.len(), BLOCK_SIZE);
        assert!(bytes.starts_with(b"SIMPLE  ="));
    }
}
