//! Column schemas for binary (`BINTABLE`) and ASCII (`TABLE`) extensions.

use super::header::Header;

// ---------------------------------------------------------------------------
// Column types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEncoding {
    Binary,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Logical,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
    /// Bits, complex and variable-length descriptors: sized but not exposed.
    Unsupported(char),
}

impl ColumnType {
    /// Width in bytes of one binary element.
    fn binary_size(self) -> usize {
        match self {
            ColumnType::Logical | ColumnType::Byte | ColumnType::Text => 1,
            ColumnType::Short => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Long | ColumnType::Double => 8,
            ColumnType::Unsupported('C') | ColumnType::Unsupported('P') => 8,
            ColumnType::Unsupported('M') | ColumnType::Unsupported('Q') => 16,
            ColumnType::Unsupported(_) => 1,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Byte | ColumnType::Short | ColumnType::Int | ColumnType::Long
        )
    }
}

/// One column of a table segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub encoding: TableEncoding,
    /// Byte offset of the cell within a row.
    pub offset: usize,
    /// Bytes occupied by one cell.
    pub width: usize,
    /// Elements per cell (binary tables); characters for text columns.
    pub repeat: usize,
    pub scale: f64,
    pub zero: f64,
    pub null: Option<i64>,
    pub unit: Option<String>,
}

impl Column {
    /// Whether the column maps onto a one-dimensional component.
    pub fn is_scalar(&self) -> bool {
        match self.encoding {
            TableEncoding::Ascii => true,
            TableEncoding::Binary => self.ty == ColumnType::Text || self.repeat == 1,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.ty, ColumnType::Unsupported(_))
    }

}

// ---------------------------------------------------------------------------
// TFORM parsing
// ---------------------------------------------------------------------------

/// `rTa` → (repeat, type code).
fn parse_binary_tform(tform: &str) -> Option<(usize, char)> {
    let tform = tform.trim();
    let split = tform
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tform.len());
    let repeat = if split == 0 {
        1
    } else {
        tform[..split].parse().ok()?
    };
    let code = tform[split..].chars().next()?;
    Some((repeat, code.to_ascii_uppercase()))
}

fn binary_type(code: char) -> Option<ColumnType> {
    Some(match code {
        'L' => ColumnType::Logical,
        'B' => ColumnType::Byte,
        'I' => ColumnType::Short,
        'J' => ColumnType::Int,
        'K' => ColumnType::Long,
        'E' => ColumnType::Float,
        'D' => ColumnType::Double,
        'A' => ColumnType::Text,
        'X' | 'C' | 'M' | 'P' | 'Q' => ColumnType::Unsupported(code),
        _ => return None,
    })
}

/// `Aw`, `Iw`, `Fw.d`, `Ew.d`, `Dw.d` → (type, field width).
fn parse_ascii_tform(tform: &str) -> Option<(ColumnType, usize)> {
    let tform = tform.trim();
    let code = tform.chars().next()?.to_ascii_uppercase();
    let width: usize = tform.get(1..)?.split('.').next()?.parse().ok()?;
    let ty = match code {
        'A' => ColumnType::Text,
        'I' => ColumnType::Long,
        'F' | 'E' | 'D' => ColumnType::Double,
        _ => return None,
    };
    Some((ty, width))
}

/// Read the column layout of a table header. `row_len` is `NAXIS1`.
///
/// Errors are plain messages; the caller attaches segment context.
pub fn parse_columns(
    header: &Header,
    encoding: TableEncoding,
    row_len: usize,
) -> Result<Vec<Column>, String> {
    let fields = header.get_i64("TFIELDS").unwrap_or(0);
    if !(0..=999).contains(&fields) {
        return Err(format!("invalid TFIELDS {fields}"));
    }

    let mut columns = Vec::with_capacity(fields as usize);
    let mut offset = 0usize;
    for n in 1..=fields as usize {
        let tform = header
            .get_str(&format!("TFORM{n}"))
            .ok_or_else(|| format!("missing TFORM{n}"))?;
        let name = header
            .get_str(&format!("TTYPE{n}"))
            .map(str::to_string)
            .unwrap_or_else(|| format!("COL{n}"));

        let (ty, repeat, width, col_offset) = match encoding {
            TableEncoding::Binary => {
                let (repeat, code) = parse_binary_tform(tform)
                    .ok_or_else(|| format!("unparseable TFORM{n} '{tform}'"))?;
                let ty = binary_type(code)
                    .ok_or_else(|| format!("unknown TFORM{n} type '{code}'"))?;
                let width = match ty {
                    ColumnType::Unsupported('X') => Some(repeat.div_ceil(8)),
                    _ => repeat.checked_mul(ty.binary_size()),
                }
                .ok_or_else(|| format!("TFORM{n} '{tform}' width overflows"))?;
                let at = offset;
                offset = offset
                    .checked_add(width)
                    .ok_or_else(|| format!("TFORM{n} '{tform}' row offset overflows"))?;
                (ty, repeat, width, at)
            }
            TableEncoding::Ascii => {
                let (ty, width) = parse_ascii_tform(tform)
                    .ok_or_else(|| format!("unparseable TFORM{n} '{tform}'"))?;
                let tbcol = header
                    .get_i64(&format!("TBCOL{n}"))
                    .ok_or_else(|| format!("missing TBCOL{n}"))?;
                if tbcol < 1 {
                    return Err(format!("invalid TBCOL{n} {tbcol}"));
                }
                let at = usize::try_from(tbcol - 1)
                    .map_err(|_| format!("invalid TBCOL{n} {tbcol}"))?;
                let end = at
                    .checked_add(width)
                    .ok_or_else(|| format!("TFORM{n} '{tform}' at TBCOL{n} {tbcol} overflows"))?;
                offset = offset.max(end);
                (ty, width, width, at)
            }
        };

        columns.push(Column {
            name,
            ty,
            encoding,
            offset: col_offset,
            width,
            repeat,
            scale: header.get_f64(&format!("TSCAL{n}")).unwrap_or(1.0),
            zero: header.get_f64(&format!("TZERO{n}")).unwrap_or(0.0),
            null: header.get_i64(&format!("TNULL{n}")),
            unit: header.get_str(&format!("TUNIT{n}")).map(str::to_string),
        });
    }

    if offset > row_len {
        return Err(format!(
            "columns need {offset} bytes per row but NAXIS1 is {row_len}"
        ));
    }
    Ok(columns)
}
