use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{ArrayD, IxDyn};
use serde::Serialize;

use crate::error::{FitsError, Result};
use crate::fits::container::{Bitpix, Layout, Scaling, Segment};
use crate::fits::storage::Storage;
use crate::fits::table::{Column, ColumnType, TableEncoding};

// ---------------------------------------------------------------------------
// Cell – a single table value
// ---------------------------------------------------------------------------

/// A decoded table cell after `TSCAL`/`TZERO`/`TNULL` are applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "<null>"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

fn be<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

// ---------------------------------------------------------------------------
// ArrayView – zero-copy window onto an array segment
// ---------------------------------------------------------------------------

/// Typed, shaped window onto big-endian array data inside a [`Storage`].
///
/// Constructing, cloning or slicing a view never copies element data; only
/// the explicit `to_*` methods materialize values.
#[derive(Debug, Clone)]
pub struct ArrayView {
    storage: Storage,
    offset: usize,
    shape: Vec<usize>,
    bitpix: Bitpix,
    scaling: Scaling,
}

impl ArrayView {
    pub(crate) fn of_segment(segment: &Segment) -> Option<Self> {
        match segment.layout() {
            Layout::Array { bitpix, scaling } => Some(ArrayView {
                storage: segment.storage().clone(),
                offset: segment.data_offset(),
                shape: segment.shape().to_vec(),
                bitpix: *bitpix,
                scaling: *scaling,
            }),
            _ => None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        if self.shape.is_empty() {
            0
        } else {
            self.shape.iter().product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bitpix(&self) -> Bitpix {
        self.bitpix
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Views borrow their bytes; the shared [`Storage`] owns them.
    pub fn owns_data(&self) -> bool {
        false
    }

    /// The undecoded big-endian bytes covered by this view.
    pub fn raw_bytes(&self) -> &[u8] {
        self.storage
            .range(self.offset, self.len() * self.bitpix.size())
            .unwrap_or_default()
    }

    /// Physical value at row-major position `flat`; `Some(None)` for `BLANK`.
    fn element(&self, flat: usize) -> Option<Option<f64>> {
        let size = self.bitpix.size();
        let bytes = self.raw_bytes().get(flat * size..(flat + 1) * size)?;
        let Scaling { scale, zero, blank } = self.scaling;
        let int = |raw: i64| {
            if blank == Some(raw) {
                None
            } else {
                Some(zero + scale * raw as f64)
            }
        };
        Some(match self.bitpix {
            Bitpix::U8 => int(bytes[0] as i64),
            Bitpix::I16 => int(i16::from_be_bytes(be(bytes)) as i64),
            Bitpix::I32 => int(i32::from_be_bytes(be(bytes)) as i64),
            Bitpix::I64 => int(i64::from_be_bytes(be(bytes))),
            Bitpix::F32 => Some(zero + scale * f32::from_be_bytes(be(bytes)) as f64),
            Bitpix::F64 => Some(zero + scale * f64::from_be_bytes(be(bytes))),
        })
    }

    /// Value at a multi-dimensional index; `BLANK` reads as NaN.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0usize;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        self.element(flat).map(|v| v.unwrap_or(f64::NAN))
    }

    /// Row-major iterator over physical values (`BLANK` as NaN).
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.element(i).flatten().unwrap_or(f64::NAN))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values().collect()
    }

    /// Materialize into an owned n-dimensional array.
    pub fn to_ndarray(&self) -> Result<ArrayD<f64>> {
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), self.to_vec())?)
    }

    /// Materialize as a flat Arrow array; `BLANK` becomes null.
    pub fn to_arrow(&self) -> ArrayRef {
        let values: Vec<Option<f64>> = (0..self.len())
            .map(|i| self.element(i).flatten())
            .collect();
        Arc::new(Float64Array::from(values))
    }

    /// Plane `i` of the outermost axis, keeping that axis with extent 1.
    pub fn slice_plane(&self, i: usize) -> Option<ArrayView> {
        let (&outer, inner) = self.shape.split_first()?;
        if i >= outer {
            return None;
        }
        let plane: usize = inner.iter().product();
        let mut shape = Vec::with_capacity(self.shape.len());
        shape.push(1);
        shape.extend_from_slice(inner);
        Some(ArrayView {
            storage: self.storage.clone(),
            offset: self.offset + i * plane * self.bitpix.size(),
            shape,
            bitpix: self.bitpix,
            scaling: self.scaling,
        })
    }
}

// ---------------------------------------------------------------------------
// ColumnView – zero-copy window onto one table column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ColumnView {
    storage: Storage,
    data_offset: usize,
    row_len: usize,
    rows: usize,
    column: Column,
}

impl ColumnView {
    pub(crate) fn new(segment: &Segment, column: &Column) -> Option<Self> {
        match segment.layout() {
            Layout::Table { row_len, rows, .. } => Some(ColumnView {
                storage: segment.storage().clone(),
                data_offset: segment.data_offset(),
                row_len: *row_len,
                rows: *rows,
                column: column.clone(),
            }),
            _ => None,
        }
    }

    pub fn column(&self) -> &Column {
        &self.column
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn owns_data(&self) -> bool {
        false
    }

    /// Undecoded bytes of one cell.
    pub fn raw_cell(&self, row: usize) -> Option<&[u8]> {
        if row >= self.rows {
            return None;
        }
        let at = self.data_offset + row * self.row_len + self.column.offset;
        self.storage.range(at, self.column.width)
    }

    /// Integer columns stay integral unless a fractional scaling applies.
    fn integral(&self) -> bool {
        self.column.ty.is_integer() && self.column.scale == 1.0 && self.column.zero.fract() == 0.0
    }

    fn scale_int(&self, raw: i64) -> Cell {
        if self.column.null == Some(raw) {
            return Cell::Null;
        }
        if self.integral() {
            if let Some(v) = raw.checked_add(self.column.zero as i64) {
                return Cell::Int(v);
            }
        }
        Cell::Float(self.column.zero + self.column.scale * raw as f64)
    }

    fn scale_float(&self, raw: f64) -> Cell {
        Cell::Float(self.column.zero + self.column.scale * raw)
    }

    pub fn get(&self, row: usize) -> Option<Cell> {
        let bytes = self.raw_cell(row)?;
        Some(match self.column.encoding {
            TableEncoding::Binary => self.decode_binary(bytes),
            TableEncoding::Ascii => self.decode_ascii(bytes),
        })
    }

    fn decode_binary(&self, bytes: &[u8]) -> Cell {
        if bytes.is_empty() {
            return Cell::Null;
        }
        match self.column.ty {
            ColumnType::Logical => match bytes[0] {
                b'T' => Cell::Bool(true),
                b'F' => Cell::Bool(false),
                _ => Cell::Null,
            },
            ColumnType::Byte => self.scale_int(bytes[0] as i64),
            ColumnType::Short => self.scale_int(i16::from_be_bytes(be(bytes)) as i64),
            ColumnType::Int => self.scale_int(i32::from_be_bytes(be(bytes)) as i64),
            ColumnType::Long => self.scale_int(i64::from_be_bytes(be(bytes))),
            ColumnType::Float => self.scale_float(f32::from_be_bytes(be(bytes)) as f64),
            ColumnType::Double => self.scale_float(f64::from_be_bytes(be(bytes))),
            ColumnType::Text => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Cell::Text(String::from_utf8_lossy(&bytes[..end]).trim_end().to_string())
            }
            ColumnType::Unsupported(_) => Cell::Null,
        }
    }

    fn decode_ascii(&self, bytes: &[u8]) -> Cell {
        let text = String::from_utf8_lossy(bytes);
        if self.column.ty == ColumnType::Text {
            return Cell::Text(text.trim_end().to_string());
        }
        let token = text.trim();
        if token.is_empty() {
            return Cell::Null;
        }
        match self.column.ty {
            ColumnType::Long => token
                .parse::<i64>()
                .map(|raw| self.scale_int(raw))
                .unwrap_or(Cell::Null),
            _ => token
                .replace(['D', 'd'], "E")
                .parse::<f64>()
                .map(|raw| self.scale_float(raw))
                .unwrap_or(Cell::Null),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows).map(move |r| self.get(r).unwrap_or(Cell::Null))
    }

    pub fn data_type(&self) -> DataType {
        match self.column.ty {
            ColumnType::Logical => DataType::Boolean,
            ColumnType::Text => DataType::Utf8,
            _ if self.integral() => DataType::Int64,
            _ => DataType::Float64,
        }
    }

    /// Materialize as an Arrow array; FITS nulls become Arrow nulls.
    pub fn to_arrow(&self) -> ArrayRef {
        match self.data_type() {
            DataType::Boolean => Arc::new(BooleanArray::from(
                self.cells()
                    .map(|c| match c {
                        Cell::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Utf8 => Arc::new(StringArray::from(
                self.cells()
                    .map(|c| match c {
                        Cell::Text(s) => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            DataType::Int64 => Arc::new(Int64Array::from(
                self.cells()
                    .map(|c| match c {
                        Cell::Int(i) => Some(i),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            _ => Arc::new(Float64Array::from(
                self.cells().map(|c| c.as_f64()).collect::<Vec<_>>(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Component – one named view inside a dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ComponentData {
    Array(ArrayView),
    Column(ColumnView),
}

#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    data: ComponentData,
}

impl Component {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    pub fn shape(&self) -> Vec<usize> {
        match &self.data {
            ComponentData::Array(a) => a.shape().to_vec(),
            ComponentData::Column(c) => vec![c.len()],
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn as_array(&self) -> Option<&ArrayView> {
        match &self.data {
            ComponentData::Array(a) => Some(a),
            ComponentData::Column(_) => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnView> {
        match &self.data {
            ComponentData::Column(c) => Some(c),
            ComponentData::Array(_) => None,
        }
    }

    pub fn storage(&self) -> &Storage {
        match &self.data {
            ComponentData::Array(a) => a.storage(),
            ComponentData::Column(c) => c.storage(),
        }
    }

    pub fn owns_data(&self) -> bool {
        false
    }

    pub fn to_arrow(&self) -> ArrayRef {
        match &self.data {
            ComponentData::Array(a) => a.to_arrow(),
            ComponentData::Column(c) => c.to_arrow(),
        }
    }

    fn summary(&self) -> ComponentSummary {
        let (kind, unit) = match &self.data {
            ComponentData::Array(_) => ("array", None),
            ComponentData::Column(c) => ("column", c.column().unit.clone()),
        };
        let dtype = match &self.data {
            ComponentData::Array(a) => format!("bitpix {}", a.bitpix().value()),
            ComponentData::Column(c) => format!("{:?}", c.data_type()),
        };
        ComponentSummary {
            name: self.name.clone(),
            kind,
            dtype,
            unit,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the unit handed to callers
// ---------------------------------------------------------------------------

/// One or more same-shape components, labelled uniquely within one ingestion.
#[derive(Debug, Clone)]
pub struct Dataset {
    label: String,
    shape: Vec<usize>,
    components: Vec<Component>,
    /// Display names of the segments merged into this dataset.
    segments: Vec<String>,
}

impl Dataset {
    pub(crate) fn new(label: String, shape: Vec<usize>) -> Self {
        Dataset {
            label,
            shape,
            components: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// Add a component, suffixing its name if it is already taken.
    pub(crate) fn add_component(&mut self, name: &str, data: ComponentData) {
        let name = unique_name(name, |n| self.components.iter().any(|c| c.name == n));
        let component = Component { name, data };
        debug_assert_eq!(component.shape(), self.shape);
        self.components.push(component);
    }

    pub(crate) fn add_segment(&mut self, name: String) {
        self.segments.push(name);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn get_component(&self, name: &str) -> Result<&Component> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FitsError::NoSuchComponent(name.to_string()))
    }

    /// Keyed access to the view behind a component.
    pub fn view(&self, name: &str) -> Result<&ComponentData> {
        self.get_component(name).map(Component::data)
    }

    /// All components as columns of one Arrow batch (arrays are flattened).
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.components.iter().map(Component::to_arrow).collect();
        let fields: Vec<Field> = self
            .components
            .iter()
            .zip(&arrays)
            .map(|(c, a)| Field::new(c.name.as_str(), a.data_type().clone(), true))
            .collect();
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            label: self.label.clone(),
            shape: self.shape.clone(),
            segments: self.segments.clone(),
            components: self.components.iter().map(Component::summary).collect(),
        }
    }
}

impl Index<&str> for Dataset {
    type Output = Component;

    /// Panics like a map index; use [`Dataset::get_component`] to handle
    /// missing names.
    fn index(&self, name: &str) -> &Component {
        match self.get_component(name) {
            Ok(c) => c,
            Err(e) => panic!("{e} in dataset '{}'", self.label),
        }
    }
}

/// `base`, or `base_2`, `base_3`, … whichever is first not `taken`.
pub(crate) fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

// ---------------------------------------------------------------------------
// Summaries – structural, serializable description of a dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    pub name: String,
    pub kind: &'static str,
    pub dtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub label: String,
    pub shape: Vec<usize>,
    pub segments: Vec<String>,
    pub components: Vec<ComponentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::container::Container;
    use crate::fits::fixture::{Col, FitsBuilder, ImageSpec, TableSpec};
    use arrow::array::Array;

    fn container(builder: FitsBuilder) -> Container {
        Container::from_bytes(builder.to_bytes()).unwrap()
    }

    fn array(c: &Container, name: &str) -> ArrayView {
        ArrayView::of_segment(c.segment(name).unwrap()).unwrap()
    }

    #[test]
    fn array_values_are_scaled_and_blank_aware() {
        let c = container(
            FitsBuilder::new().primary(
                ImageSpec::new(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, -1.0, 5.0])
                    .bitpix(16)
                    .card("BSCALE", 2.0)
                    .card("BZERO", 10.0)
                    .card("BLANK", -1i64),
            ),
        );
        let view = array(&c, "PRIMARY");
        assert_eq!(view.shape(), &[2, 3]);
        assert_eq!(view.get(&[0, 1]), Some(12.0));
        assert_eq!(view.get(&[1, 2]), Some(20.0));
        assert!(view.get(&[1, 1]).unwrap().is_nan());
        assert_eq!(view.get(&[2, 0]), None);
        assert_eq!(view.get(&[0]), None);

        let arrow = view.to_arrow();
        assert_eq!(arrow.len(), 6);
        assert_eq!(arrow.null_count(), 1);
    }

    #[test]
    fn every_bitpix_decodes() {
        for bitpix in [8, 16, 32, 64, -32, -64] {
            let c = container(
                FitsBuilder::new()
                    .primary(ImageSpec::new(vec![3], vec![1.0, 2.0, 100.0]).bitpix(bitpix)),
            );
            let view = array(&c, "PRIMARY");
            assert_eq!(view.bitpix().value(), bitpix);
            assert_eq!(view.to_vec(), vec![1.0, 2.0, 100.0], "bitpix {bitpix}");
        }
    }

    #[test]
    fn views_borrow_the_container_buffer() {
        let c = container(
            FitsBuilder::new().primary(ImageSpec::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])),
        );
        let view = array(&c, "PRIMARY");
        let buf = c.storage().bytes().as_ptr_range();
        assert!(buf.contains(&view.raw_bytes().as_ptr()));
        assert!(!view.owns_data());
        assert!(view.storage().same_buffer(c.storage()));
    }

    #[test]
    fn planes_are_contiguous_slices() {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let c = container(FitsBuilder::new().primary(ImageSpec::new(vec![3, 2, 2], values)));
        let view = array(&c, "PRIMARY");
        let plane = view.slice_plane(1).unwrap();
        assert_eq!(plane.shape(), &[1, 2, 2]);
        assert_eq!(plane.to_vec(), vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(
            plane.raw_bytes().as_ptr(),
            view.raw_bytes()[4 * 8..].as_ptr()
        );
        assert!(view.slice_plane(3).is_none());
    }

    #[test]
    fn ndarray_materialization_keeps_shape() {
        let c = container(
            FitsBuilder::new().primary(ImageSpec::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0])),
        );
        let arr = array(&c, "PRIMARY").to_ndarray().unwrap();
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(arr[[1, 0]], 3.0);
    }

    #[test]
    fn binary_columns_decode_cells() {
        let c = container(
            FitsBuilder::new().table(
                TableSpec::new("CAT")
                    .column(Col::int("id", vec![1, -99, 3]).null(-99))
                    .column(Col::double("flux", vec![0.5, 1.5, 2.5]).unit("Jy"))
                    .column(Col::text("name", 6, &["alpha", "beta", ""]))
                    .column(Col::logical("ok", vec![true, false, true]))
                    .column(Col::int("u", vec![0, 1, 2]).scaled(1.0, 32768.0))
                    .column(Col::int("f", vec![1, 2, 3]).scaled(0.5, 0.0)),
            ),
        );
        let seg = c.segment("CAT").unwrap();
        let Layout::Table { columns, .. } = seg.layout() else {
            panic!("not a table")
        };
        let view = |i: usize| ColumnView::new(seg, &columns[i]).unwrap();

        assert_eq!(view(0).cells().collect::<Vec<_>>(), [Cell::Int(1), Cell::Null, Cell::Int(3)]);
        assert_eq!(view(1).get(2), Some(Cell::Float(2.5)));
        assert_eq!(view(1).column().unit.as_deref(), Some("Jy"));
        assert_eq!(view(2).get(0), Some(Cell::Text("alpha".into())));
        assert_eq!(view(2).get(2), Some(Cell::Text(String::new())));
        assert_eq!(view(3).get(1), Some(Cell::Bool(false)));
        assert_eq!(view(4).get(2), Some(Cell::Int(32770)));
        assert_eq!(view(5).get(1), Some(Cell::Float(1.0)));
        assert_eq!(view(5).data_type(), DataType::Float64);
        assert_eq!(view(0).get(3), None);

        let ids = view(0).to_arrow();
        assert_eq!(ids.data_type(), &DataType::Int64);
        assert_eq!(ids.null_count(), 1);
    }

    #[test]
    fn ascii_columns_decode_text_fields() {
        let c = container(
            FitsBuilder::new().table(
                TableSpec::ascii("ASC")
                    .column(Col::long("n", vec![7, -2]))
                    .column(Col::double("x", vec![1.25, -3.5]))
                    .column(Col::text("tag", 4, &["ab", "cdef"])),
            ),
        );
        let seg = c.segment("ASC").unwrap();
        let Layout::Table { columns, .. } = seg.layout() else {
            panic!("not a table")
        };
        let cells = |i: usize| {
            ColumnView::new(seg, &columns[i])
                .unwrap()
                .cells()
                .collect::<Vec<_>>()
        };
        assert_eq!(cells(0), [Cell::Int(7), Cell::Int(-2)]);
        assert_eq!(cells(1), [Cell::Float(1.25), Cell::Float(-3.5)]);
        assert_eq!(cells(2), [Cell::Text("ab".into()), Cell::Text("cdef".into())]);
    }

    #[test]
    fn dataset_lookup_fails_with_no_such_component() {
        let c = container(FitsBuilder::new().primary(ImageSpec::new(vec![2], vec![1.0, 2.0])));
        let mut ds = Dataset::new("x[PRIMARY]".into(), vec![2]);
        ds.add_component("PRIMARY", ComponentData::Array(array(&c, "PRIMARY")));
        ds.add_component("PRIMARY", ComponentData::Array(array(&c, "PRIMARY")));

        assert_eq!(ds.component_names(), ["PRIMARY", "PRIMARY_2"]);
        assert!(ds.view("PRIMARY").is_ok());
        assert_eq!(ds["PRIMARY_2"].shape(), vec![2]);
        assert!(matches!(
            ds.get_component("MISSING"),
            Err(FitsError::NoSuchComponent(n)) if n == "MISSING"
        ));
    }

    #[test]
    #[should_panic(expected = "no component named 'MISSING'")]
    fn index_panics_on_missing_component() {
        let ds = Dataset::new("x".into(), vec![]);
        let _ = &ds["MISSING"];
    }

    #[test]
    fn record_batch_collects_all_components() {
        let c = container(
            FitsBuilder::new().table(
                TableSpec::new("T")
                    .column(Col::int("a", vec![1, 2]))
                    .column(Col::text("b", 3, &["x", "y"])),
            ),
        );
        let seg = c.segment("T").unwrap();
        let Layout::Table { columns, .. } = seg.layout() else {
            panic!("not a table")
        };
        let mut ds = Dataset::new("t[T]".into(), vec![2]);
        for col in columns {
            ds.add_component(&col.name, ComponentData::Column(ColumnView::new(seg, col).unwrap()));
        }
        let batch = ds.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(1).name(), "b");
    }

    #[test]
    fn unique_names_count_up() {
        let taken = ["A", "A_2"];
        assert_eq!(unique_name("A", |n| taken.contains(&n)), "A_3");
        assert_eq!(unique_name("B", |n| taken.contains(&n)), "B");
    }
}
