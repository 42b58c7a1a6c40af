//! SQL Statement Builders
//!
//! Small builders that accumulate `(column, value)` pairs and emit one
//! parameterized statement. The set of writable columns stays an
//! explicit, enumerable contract instead of ad hoc string assembly, and
//! the value list always lines up with the placeholder list by
//! construction.

use libsql::Value;

/// Builder for a single INSERT statement
///
/// # Examples
///
/// ```
/// use vaultops_core::db::sql::InsertBuilder;
/// use libsql::Value;
///
/// let (sql, params) = InsertBuilder::new("meta")
///     .column("key", Value::Text("k".into()))
///     .column("value", Value::Text("v".into()))
///     .build();
/// assert_eq!(sql, "INSERT INTO meta (key, value) VALUES (?, ?)");
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug)]
pub struct InsertBuilder {
    table: &'static str,
    or_replace: bool,
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            or_replace: false,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Emit `INSERT OR REPLACE` instead of plain `INSERT`
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    pub fn column(mut self, name: &'static str, value: Value) -> Self {
        self.columns.push(name);
        self.values.push(value);
        self
    }

    /// Emit the statement and its positional parameters
    pub fn build(self) -> (String, Vec<Value>) {
        let verb = if self.or_replace {
            "INSERT OR REPLACE INTO"
        } else {
            "INSERT INTO"
        };
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let sql = format!(
            "{} {} ({}) VALUES ({})",
            verb,
            self.table,
            self.columns.join(", "),
            placeholders
        );
        (sql, self.values)
    }
}

/// Builder for a single UPDATE statement with an equality filter
#[derive(Debug)]
pub struct UpdateBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    values: Vec<Value>,
    filter_column: Option<&'static str>,
    filter_value: Option<Value>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
            filter_column: None,
            filter_value: None,
        }
    }

    pub fn set(mut self, name: &'static str, value: Value) -> Self {
        self.columns.push(name);
        self.values.push(value);
        self
    }

    /// Restrict the update to rows where `column = value`
    pub fn where_eq(mut self, column: &'static str, value: Value) -> Self {
        self.filter_column = Some(column);
        self.filter_value = Some(value);
        self
    }

    /// Emit the statement and its positional parameters
    ///
    /// The filter value, when present, comes last in the parameter list,
    /// matching its placeholder position.
    pub fn build(self) -> (String, Vec<Value>) {
        let assignments = self
            .columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut values = self.values;
        let sql = match (self.filter_column, self.filter_value) {
            (Some(column), Some(value)) => {
                values.push(value);
                format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    self.table, assignments, column
                )
            }
            _ => format!("UPDATE {} SET {}", self.table, assignments),
        };
        (sql, values)
    }
}

/// Convert an optional string into a TEXT-or-NULL parameter
pub fn text_or_null(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

/// Convert an optional integer into an INTEGER-or-NULL parameter
pub fn int_or_null(value: Option<i64>) -> Value {
    match value {
        Some(i) => Value::Integer(i),
        None => Value::Null,
    }
}

/// Convert a bool into the 0/1 INTEGER encoding used by the row layout
pub fn bool_to_int(value: bool) -> Value {
    Value::Integer(if value { 1 } else { 0 })
}
