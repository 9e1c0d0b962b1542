//! Quoting and placeholder capabilities a statement needs from its adapter.

use super::DbValue;

/// Which placeholder styles an adapter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindSupport {
    /// `?` placeholders bound by 1-based position
    pub positional: bool,
    /// `:name` placeholders bound by name
    pub named: bool,
}

impl Default for BindSupport {
    fn default() -> Self {
        Self {
            positional: true,
            named: true,
        }
    }
}

/// Literal embedding for a SQL dialect
///
/// `quote` is the only thing standing between a bound value and the
/// assembled SQL text when a statement is executed through
/// [`Statement::assemble_sql`](super::Statement::assemble_sql).
pub trait Adapter: Send + Sync {
    /// Render a value as a SQL literal
    fn quote(&self, value: &DbValue) -> String;

    /// Placeholder styles this adapter binds
    fn bind_support(&self) -> BindSupport {
        BindSupport::default()
    }

    /// Native parameter marker for the 1-based `position`
    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    /// Quote a table or column identifier
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Replace the first `?` in `text` with the quoted value
    fn quote_into(&self, text: &str, value: &DbValue) -> String {
        text.replacen('?', &self.quote(value), 1)
    }
}

/// ANSI-style quoting with no connection behind it
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardQuoter {
    support: BindSupport,
}

impl StandardQuoter {
    /// Quoter accepting both placeholder styles
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quoter with restricted placeholder styles
    #[must_use]
    pub const fn with_bind_support(support: BindSupport) -> Self {
        Self { support }
    }
}

impl Adapter for StandardQuoter {
    fn quote(&self, value: &DbValue) -> String {
        quote_standard(value)
    }

    fn bind_support(&self) -> BindSupport {
        self.support
    }
}

/// Shared by the SQLite pool and [`StandardQuoter`]
pub(crate) fn quote_standard(value: &DbValue) -> String {
    match value {
        DbValue::Null => "NULL".to_string(),
        DbValue::Int(i) => i.to_string(),
        DbValue::Float(f) if f.is_finite() => f.to_string(),
        DbValue::Float(_) => "NULL".to_string(),
        DbValue::String(s) => quote_string(s),
        DbValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        DbValue::Bytes(bytes) => format!("X'{}'", hex::encode_upper(bytes)),
    }
}

pub(crate) fn quote_postgres(value: &DbValue) -> String {
    match value {
        DbValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        DbValue::Bytes(bytes) => format!("'\\x{}'::bytea", hex::encode_upper(bytes)),
        other => quote_standard(other),
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_quoting() {
        let q = StandardQuoter::new();
        assert_eq!(q.quote(&DbValue::Int(5)), "5");
        assert_eq!(q.quote(&DbValue::Float(1.5)), "1.5");
        assert_eq!(q.quote(&DbValue::Null), "NULL");
        assert_eq!(q.quote(&DbValue::Bool(true)), "1");
        assert_eq!(q.quote(&DbValue::from("O'Brien")), "'O''Brien'");
        assert_eq!(q.quote(&DbValue::Bytes(vec![0xde, 0xad])), "X'DEAD'");
    }

    #[test]
    fn test_non_finite_floats_quote_as_null() {
        let q = StandardQuoter::new();
        assert_eq!(q.quote(&DbValue::Float(f64::NAN)), "NULL");
        assert_eq!(q.quote(&DbValue::Float(f64::INFINITY)), "NULL");
        assert_eq!(quote_postgres(&DbValue::Float(f64::NEG_INFINITY)), "NULL");
        assert_eq!(q.quote(&DbValue::Float(-0.25)), "-0.25");
    }

    #[test]
    fn test_postgres_quoting() {
        assert_eq!(quote_postgres(&DbValue::Bool(false)), "FALSE");
        assert_eq!(quote_postgres(&DbValue::Bytes(vec![1, 255])), "'\\x01FF'::bytea");
        assert_eq!(quote_postgres(&DbValue::from("x")), "'x'");
    }

    #[test]
    fn test_quote_into_replaces_first_marker() {
        let q = StandardQuoter::new();
        assert_eq!(
            q.quote_into("name = ? AND id = ?", &DbValue::from("a'b")),
            "name = 'a''b' AND id = ?"
        );
    }

    #[test]
    fn test_quote_identifier() {
        let q = StandardQuoter::new();
        assert_eq!(q.quote_identifier("user"), "\"user\"");
        assert_eq!(q.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
