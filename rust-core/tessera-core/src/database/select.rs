//! SELECT builder and the `SqlSource` seam statements are prepared from.

use super::adapter::Adapter;
use super::DbValue;

/// Anything a statement can be prepared from
pub trait SqlSource {
    /// Render the SQL text, quoting literals through `adapter`
    fn to_sql(&self, adapter: &dyn Adapter) -> String;
}

impl SqlSource for str {
    fn to_sql(&self, _adapter: &dyn Adapter) -> String {
        self.to_string()
    }
}

impl SqlSource for String {
    fn to_sql(&self, _adapter: &dyn Adapter) -> String {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    And,
    Or,
}

#[derive(Debug, Clone)]
struct Condition {
    conjunction: Conjunction,
    text: String,
    value: Option<DbValue>,
}

impl Condition {
    fn render(&self, adapter: &dyn Adapter) -> String {
        match &self.value {
            Some(value) => adapter.quote_into(&self.text, value),
            None => self.text.clone(),
        }
    }
}

/// SELECT query builder
///
/// Conditions are kept as written; placeholders in them are left for the
/// statement to bind unless a value is supplied with `*_value`, in which
/// case the first `?` is quoted in through the adapter.
///
/// ```ignore
/// let select = Select::new()
///     .from("posts", &["id", "title"])
///     .and_where("author_id = :author")
///     .order_by("id DESC")
///     .limit(10, 20);
/// let stmt = pool.prepare(&select);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Select {
    distinct: bool,
    columns: Vec<String>,
    from: Option<String>,
    conditions: Vec<Condition>,
    group_by: Vec<String>,
    having: Vec<Condition>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    /// Empty `SELECT`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `SELECT DISTINCT`
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Table to select from, plus columns (`*` when none are given)
    #[must_use]
    pub fn from(mut self, table: &str, columns: &[&str]) -> Self {
        self.from = Some(table.to_string());
        self.columns(columns)
    }

    /// Additional result columns
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    /// `AND` condition
    #[must_use]
    pub fn and_where(self, condition: &str) -> Self {
        self.push_where(Conjunction::And, condition, None)
    }

    /// `AND` condition with its first `?` quoted in
    #[must_use]
    pub fn and_where_value(self, condition: &str, value: impl Into<DbValue>) -> Self {
        self.push_where(Conjunction::And, condition, Some(value.into()))
    }

    /// `OR` condition
    #[must_use]
    pub fn or_where(self, condition: &str) -> Self {
        self.push_where(Conjunction::Or, condition, None)
    }

    /// `OR` condition with its first `?` quoted in
    #[must_use]
    pub fn or_where_value(self, condition: &str, value: impl Into<DbValue>) -> Self {
        self.push_where(Conjunction::Or, condition, Some(value.into()))
    }

    fn push_where(mut self, conjunction: Conjunction, text: &str, value: Option<DbValue>) -> Self {
        self.conditions.push(Condition {
            conjunction,
            text: text.to_string(),
            value,
        });
        self
    }

    /// `GROUP BY` columns
    #[must_use]
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by.extend(columns.iter().map(|c| (*c).to_string()));
        self
    }

    /// `HAVING` condition, joined with `AND`
    #[must_use]
    pub fn having(mut self, condition: &str) -> Self {
        self.having.push(Condition {
            conjunction: Conjunction::And,
            text: condition.to_string(),
            value: None,
        });
        self
    }

    /// `ORDER BY` term such as `"created DESC"`
    #[must_use]
    pub fn order_by(mut self, term: &str) -> Self {
        self.order_by.push(term.to_string());
        self
    }

    /// `LIMIT count OFFSET offset`; an offset of 0 is omitted
    #[must_use]
    pub fn limit(mut self, count: u64, offset: u64) -> Self {
        self.limit = Some(count);
        self.offset = if offset > 0 { Some(offset) } else { None };
        self
    }

    /// `LIMIT` for the 1-based `page` of `rows_per_page` rows
    #[must_use]
    pub fn limit_page(self, page: u64, rows_per_page: u64) -> Self {
        let page = page.max(1);
        self.limit(rows_per_page, rows_per_page.saturating_mul(page - 1))
    }
}

fn render_conditions(conditions: &[Condition], adapter: &dyn Adapter) -> String {
    let mut sql = String::new();
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            sql.push_str(match condition.conjunction {
                Conjunction::And => " AND ",
                Conjunction::Or => " OR ",
            });
        }
        sql.push('(');
        sql.push_str(&condition.render(adapter));
        sql.push(')');
    }
    sql
}

impl SqlSource for Select {
    fn to_sql(&self, adapter: &dyn Adapter) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        if let Some(table) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(table);
        }

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&render_conditions(&self.conditions, adapter));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&render_conditions(&self.having, adapter));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        sql
    }
}
