//! # Statements
//!
//! A statement splits its SQL once into literal text and placeholders
//! (`?` or `:name`). Values are bound against that split and substituted
//! either as native parameters ([`Statement::native_sql`]) or, for adapters
//! without parameter support, spliced in as quoted literals
//! ([`Statement::assemble_sql`]). The spliced form is only as safe as the
//! adapter's `quote`.

use super::adapter::Adapter;
use super::select::SqlSource;
use super::{DbValue, ResultSet};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::debug;

// Quoted literals and `::` casts are matched so they are skipped whole.
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|::|(?P<param>\?|:[a-z_]+)"#)
        .expect("PLACEHOLDER_REGEX should compile")
});

/// Row layout produced by a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Column name to value
    #[default]
    Assoc,
    /// Values by position
    Num,
    /// Values reachable by name and by position
    Both,
    /// A JSON object, the input for `fetch_object`
    Obj,
    /// A single column; only valid as a per-call mode
    Column,
}

impl FetchMode {
    /// Mode from its numeric code (2 assoc, 3 num, 4 both, 5 obj)
    ///
    /// # Errors
    ///
    /// `Error::InvalidFetchMode` for any other code.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            2 => Ok(Self::Assoc),
            3 => Ok(Self::Num),
            4 => Ok(Self::Both),
            5 => Ok(Self::Obj),
            _ => Err(Error::InvalidFetchMode {
                mode: code.to_string(),
            }),
        }
    }

    /// Numeric code of the mode
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Assoc => 2,
            Self::Num => 3,
            Self::Both => 4,
            Self::Obj => 5,
            Self::Column => 7,
        }
    }
}

impl FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "assoc" => Ok(Self::Assoc),
            "num" => Ok(Self::Num),
            "both" => Ok(Self::Both),
            "obj" => Ok(Self::Obj),
            "column" => Ok(Self::Column),
            _ => Err(Error::InvalidFetchMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// One fetched row in the requested layout
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedRow {
    /// Name/value pairs in column order
    Assoc(Vec<(String, DbValue)>),
    /// Values in column order
    Num(Vec<DbValue>),
    /// Name/value pairs, also addressable by position
    Both(Vec<(String, DbValue)>),
    /// JSON object keyed by column name
    Obj(serde_json::Map<String, serde_json::Value>),
    /// A single column value
    Column(DbValue),
}

impl FetchedRow {
    /// Value by column name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DbValue> {
        match self {
            Self::Assoc(pairs) | Self::Both(pairs) => {
                pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Value by 0-based position
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&DbValue> {
        match self {
            Self::Num(values) => values.get(index),
            Self::Both(pairs) => pairs.get(index).map(|(_, v)| v),
            Self::Column(value) if index == 0 => Some(value),
            _ => None,
        }
    }
}

/// A placeholder reference: 1-based position or name (`id` or `:id`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindParameter {
    /// 1-based position among all placeholders
    Position(i64),
    /// Named placeholder, with or without the leading `:`
    Name(String),
}

impl fmt::Display for BindParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(p) => write!(f, "{p}"),
            Self::Name(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for BindParameter {
    fn from(p: i64) -> Self {
        Self::Position(p)
    }
}

impl From<i32> for BindParameter {
    fn from(p: i32) -> Self {
        Self::Position(i64::from(p))
    }
}

impl From<usize> for BindParameter {
    fn from(p: usize) -> Self {
        Self::Position(i64::try_from(p).unwrap_or(i64::MAX))
    }
}

impl From<&str> for BindParameter {
    fn from(n: &str) -> Self {
        Self::Name(n.to_string())
    }
}

impl From<String> for BindParameter {
    fn from(n: String) -> Self {
        Self::Name(n)
    }
}

/// Result column reference for `bind_column`: 1-based index or name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// 1-based column index
    Index(usize),
    /// Column name
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(n) => write!(f, "{n}"),
        }
    }
}

impl From<usize> for ColumnRef {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for ColumnRef {
    fn from(n: &str) -> Self {
        Self::Name(n.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(n: String) -> Self {
        Self::Name(n)
    }
}

/// Shared, mutable value cell
///
/// Bound as a parameter it is read when the SQL is assembled; bound to a
/// column it is overwritten on every fetch.
#[derive(Debug, Clone, Default)]
pub struct Slot(Arc<Mutex<DbValue>>);

impl Slot {
    /// Slot holding an initial value
    #[must_use]
    pub fn new(value: impl Into<DbValue>) -> Self {
        Self(Arc::new(Mutex::new(value.into())))
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> DbValue {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the value
    pub fn set(&self, value: impl Into<DbValue>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = value.into();
    }

    /// Provider reading this slot, for `bind_param`
    #[must_use]
    pub fn provider(&self) -> impl Fn() -> DbValue + Send + Sync + 'static {
        let slot = self.clone();
        move || slot.get()
    }
}

type Provider<'a> = Box<dyn Fn() -> DbValue + Send + Sync + 'a>;

enum Binding<'a> {
    Value(DbValue),
    Provider(Provider<'a>),
}

impl Binding<'_> {
    fn resolve(&self) -> DbValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::Provider(provider) => provider(),
        }
    }
}

/// A prepared SQL template with bound values and an optional result set
pub struct Statement<'a> {
    adapter: &'a dyn Adapter,
    sql_split: Vec<String>,
    sql_param: Vec<String>,
    param_split_index: Vec<usize>,
    bind_param: BTreeMap<usize, Binding<'a>>,
    bind_column: Vec<(ColumnRef, Slot)>,
    attributes: HashMap<String, DbValue>,
    fetch_mode: FetchMode,
    result: Option<ResultSet>,
    cursor: usize,
    affected_rows: u64,
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql_split", &self.sql_split)
            .field("sql_param", &self.sql_param)
            .field("bound", &self.bind_param.keys().collect::<Vec<_>>())
            .field("fetch_mode", &self.fetch_mode)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<'a> Statement<'a> {
    /// Prepare a statement from SQL text or a query builder
    pub fn new<S: SqlSource + ?Sized>(adapter: &'a dyn Adapter, sql: &S) -> Self {
        let sql = sql.to_sql(adapter);
        let sql_split = split_sql(&sql);

        let param_split_index: Vec<usize> = sql_split
            .iter()
            .enumerate()
            .filter(|(_, part)| part.starts_with(':') || part.starts_with('?'))
            .map(|(i, _)| i)
            .collect();
        let sql_param = param_split_index
            .iter()
            .map(|&i| sql_split[i].clone())
            .collect();

        debug!(sql = %sql, placeholders = param_split_index.len(), "Statement prepared");

        Self {
            adapter,
            sql_split,
            sql_param,
            param_split_index,
            bind_param: BTreeMap::new(),
            bind_column: Vec::new(),
            attributes: HashMap::new(),
            fetch_mode: FetchMode::default(),
            result: None,
            cursor: 0,
            affected_rows: 0,
        }
    }

    pub(crate) fn with_default_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    /// Literal and placeholder segments in source order
    #[must_use]
    pub fn sql_split(&self) -> &[String] {
        &self.sql_split
    }

    /// Placeholder tokens in source order; index + 1 is the bind position
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.sql_param
    }

    /// Bind a provider evaluated each time the SQL is assembled
    ///
    /// # Errors
    ///
    /// `Error::InvalidBindPosition` if the position is outside
    /// `1..=placeholders().len()`, the name is not a placeholder, or the
    /// adapter does not accept that placeholder style.
    pub fn bind_param<P, F>(&mut self, parameter: P, provider: F) -> Result<()>
    where
        P: Into<BindParameter>,
        F: Fn() -> DbValue + Send + Sync + 'a,
    {
        let position = self.position_of(&parameter.into())?;
        self.bind_param
            .insert(position, Binding::Provider(Box::new(provider)));
        Ok(())
    }

    /// Bind a fixed value
    ///
    /// # Errors
    ///
    /// Same as [`bind_param`](Self::bind_param).
    pub fn bind_value<P>(&mut self, parameter: P, value: impl Into<DbValue>) -> Result<()>
    where
        P: Into<BindParameter>,
    {
        let position = self.position_of(&parameter.into())?;
        self.bind_param.insert(position, Binding::Value(value.into()));
        Ok(())
    }

    /// Bind a slot read at assembly time
    ///
    /// # Errors
    ///
    /// Same as [`bind_param`](Self::bind_param).
    pub fn bind_slot<P: Into<BindParameter>>(&mut self, parameter: P, slot: &Slot) -> Result<()> {
        self.bind_param(parameter, slot.provider())
    }

    /// Write a result column into `slot` on every fetch
    pub fn bind_column(&mut self, column: impl Into<ColumnRef>, slot: &Slot) {
        self.bind_column.push((column.into(), slot.clone()));
    }

    fn position_of(&self, parameter: &BindParameter) -> Result<usize> {
        let support = self.adapter.bind_support();
        let invalid = |parameter: String| Error::InvalidBindPosition { parameter };

        match parameter {
            BindParameter::Position(p) => {
                if !support.positional {
                    return Err(invalid(p.to_string()));
                }
                usize::try_from(*p)
                    .ok()
                    .filter(|p| (1..=self.sql_param.len()).contains(p))
                    .map(|p| p - 1)
                    .ok_or_else(|| invalid(p.to_string()))
            }
            BindParameter::Name(name) => {
                if !support.named {
                    return Err(invalid(name.clone()));
                }
                let name = if name.starts_with(':') {
                    name.clone()
                } else {
                    format!(":{name}")
                };
                self.sql_param
                    .iter()
                    .position(|p| *p == name)
                    .ok_or_else(|| invalid(name))
            }
        }
    }

    /// SQL with every bound placeholder replaced by its quoted value
    ///
    /// Unbound placeholders are left as they were written.
    #[must_use]
    pub fn assemble_sql(&self) -> String {
        let mut sql = self.sql_split.clone();
        for (position, binding) in &self.bind_param {
            let index = self.param_split_index[*position];
            sql[index] = self.adapter.quote(&binding.resolve());
        }
        sql.concat()
    }

    /// SQL with native parameter markers plus the values in marker order
    ///
    /// # Errors
    ///
    /// `Error::InvalidBindPosition` naming the first unbound placeholder.
    pub fn native_sql(&self) -> Result<(String, Vec<DbValue>)> {
        let mut sql = self.sql_split.clone();
        let mut values = Vec::with_capacity(self.sql_param.len());

        for (position, &index) in self.param_split_index.iter().enumerate() {
            let binding =
                self.bind_param
                    .get(&position)
                    .ok_or_else(|| Error::InvalidBindPosition {
                        parameter: self.sql_param[position].clone(),
                    })?;
            values.push(binding.resolve());
            sql[index] = self.adapter.placeholder(values.len());
        }

        Ok((sql.concat(), values))
    }

    // ----------------------------------------------------------------
    // Results
    // ----------------------------------------------------------------

    /// Replace the result set and rewind the cursor
    pub fn load_result(&mut self, result: ResultSet) {
        self.affected_rows = result.rows.len() as u64;
        self.result = Some(result);
        self.cursor = 0;
    }

    /// Record the outcome of a statement that returns no rows
    pub fn set_affected_rows(&mut self, rows: u64) {
        self.result = None;
        self.cursor = 0;
        self.affected_rows = rows;
    }

    /// Rows affected, or rows returned for a query
    #[must_use]
    pub const fn row_count(&self) -> u64 {
        self.affected_rows
    }

    /// Columns in the current result set
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.result.as_ref().map_or(0, |r| r.columns.len())
    }

    /// Drop the current result set
    pub fn close_cursor(&mut self) {
        self.result = None;
        self.cursor = 0;
    }

    /// Default fetch mode
    #[must_use]
    pub const fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Change the default fetch mode
    ///
    /// # Errors
    ///
    /// `Error::InvalidFetchMode` for [`FetchMode::Column`].
    pub fn set_fetch_mode(&mut self, mode: FetchMode) -> Result<()> {
        if mode == FetchMode::Column {
            return Err(Error::InvalidFetchMode {
                mode: "column".to_string(),
            });
        }
        self.fetch_mode = mode;
        Ok(())
    }

    /// Change the default fetch mode by numeric code
    ///
    /// # Errors
    ///
    /// `Error::InvalidFetchMode` for codes other than 2, 3, 4 and 5.
    pub fn set_fetch_mode_code(&mut self, code: i64) -> Result<()> {
        self.set_fetch_mode(FetchMode::from_code(code)?)
    }

    /// Statement attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&DbValue> {
        self.attributes.get(key)
    }

    /// Set a statement attribute
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<DbValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Next row in `mode` (or the default mode); `None` once exhausted
    ///
    /// # Errors
    ///
    /// `Error::ColumnNotFound` if a bound column is absent from the result,
    /// `Error::Json` if an `Obj` row cannot be built.
    pub fn fetch(&mut self, mode: Option<FetchMode>) -> Result<Option<FetchedRow>> {
        let Some(values) = self.next_row()? else {
            return Ok(None);
        };

        let row = match mode.unwrap_or(self.fetch_mode) {
            FetchMode::Num => FetchedRow::Num(values),
            FetchMode::Assoc => FetchedRow::Assoc(self.pair_with_columns(values)),
            FetchMode::Both => FetchedRow::Both(self.pair_with_columns(values)),
            FetchMode::Obj => FetchedRow::Obj(self.json_object(values)?),
            FetchMode::Column => FetchedRow::Column(values.into_iter().next().unwrap_or_default()),
        };
        Ok(Some(row))
    }

    /// Every remaining row
    ///
    /// With `column` set (or in `Column` mode, where it defaults to 0) each
    /// entry is a [`FetchedRow::Column`]. Rows holding falsy values do not
    /// stop the loop; only the end of the result does.
    ///
    /// # Errors
    ///
    /// As [`fetch`](Self::fetch) and [`fetch_column`](Self::fetch_column).
    pub fn fetch_all(
        &mut self,
        mode: Option<FetchMode>,
        column: Option<usize>,
    ) -> Result<Vec<FetchedRow>> {
        let mode = mode.unwrap_or(self.fetch_mode);
        let column = match (mode, column) {
            (FetchMode::Column, None) => Some(0),
            (_, column) => column,
        };

        let mut data = Vec::new();
        match column {
            Some(column) => {
                while let Some(value) = self.fetch_column(column)? {
                    data.push(FetchedRow::Column(value));
                }
            }
            None => {
                while let Some(row) = self.fetch(Some(mode))? {
                    data.push(row);
                }
            }
        }
        Ok(data)
    }

    /// One column (0-based) of the next row; `None` once exhausted
    ///
    /// # Errors
    ///
    /// `Error::ColumnNotFound` if the row has no such column.
    pub fn fetch_column(&mut self, column: usize) -> Result<Option<DbValue>> {
        let Some(mut values) = self.next_row()? else {
            return Ok(None);
        };
        if column >= values.len() {
            return Err(Error::ColumnNotFound {
                column: column.to_string(),
            });
        }
        Ok(Some(values.swap_remove(column)))
    }

    /// Next row deserialized into `T` by column name; `None` once exhausted
    ///
    /// # Errors
    ///
    /// `Error::Json` if the row does not deserialize into `T`.
    pub fn fetch_object<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let Some(values) = self.next_row()? else {
            return Ok(None);
        };
        let object = self.json_object(values)?;
        Ok(Some(serde_json::from_value(serde_json::Value::Object(object))?))
    }

    fn next_row(&mut self) -> Result<Option<Vec<DbValue>>> {
        let Some(result) = &self.result else {
            return Ok(None);
        };
        let Some(values) = result.rows.get(self.cursor).cloned() else {
            return Ok(None);
        };

        // Resolve every bound column before the row is consumed.
        let targets = self
            .bind_column
            .iter()
            .map(|(column, slot)| {
                let index = match column {
                    ColumnRef::Index(i) => i.checked_sub(1).filter(|i| *i < values.len()),
                    ColumnRef::Name(name) => result.columns.iter().position(|c| c == name),
                };
                index
                    .map(|index| (index, slot))
                    .ok_or_else(|| Error::ColumnNotFound {
                        column: column.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        for (index, slot) in targets {
            slot.set(values[index].clone());
        }

        self.cursor += 1;
        Ok(Some(values))
    }

    fn columns(&self) -> &[String] {
        self.result.as_ref().map_or(&[][..], |r| r.columns.as_slice())
    }

    fn pair_with_columns(&self, values: Vec<DbValue>) -> Vec<(String, DbValue)> {
        self.columns().iter().cloned().zip(values).collect()
    }

    fn json_object(&self, values: Vec<DbValue>) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.columns()
            .iter()
            .zip(values)
            .map(|(name, value)| -> Result<(String, serde_json::Value)> {
                Ok((name.clone(), serde_json::to_value(value)?))
            })
            .collect()
    }
}

/// Split SQL on placeholders, keeping them as their own segments
///
/// Markers inside quoted strings or identifiers stay literal text.
fn split_sql(sql: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER_REGEX.captures_iter(sql) {
        let Some(m) = caps.name("param") else {
            continue;
        };
        if m.start() > last {
            parts.push(sql[last..m.start()].to_string());
        }
        parts.push(m.as_str().to_string());
        last = m.end();
    }
    if last < sql.len() {
        parts.push(sql[last..].to_string());
    }

    parts
}
