//! Schema object models.
//!
//! These are the validated building blocks DDL statements are composed from.
//! An [`Ident`] or [`DataType`] can only be obtained through its checked
//! constructor, so any value of these types is safe to place into SQL text.

use crate::error::{DbError, DbResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Maximum identifier length (PostgreSQL NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Maximum accepted length of a data type declaration.
pub const MAX_DATA_TYPE_LEN: usize = 128;

/// A checked SQL identifier.
///
/// Matches `^[A-Za-z_][A-Za-z0-9_]{0,62}$`. Always rendered double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    pub fn parse(field: &str, value: &str) -> DbResult<Self> {
        if value.is_empty() {
            return Err(DbError::invalid_argument(field, "must not be empty"));
        }
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(DbError::invalid_argument(
                field,
                format!("must be at most {} characters", MAX_IDENTIFIER_LEN),
            ));
        }
        let mut chars = value.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DbError::invalid_argument(
                field,
                format!(
                    "'{}' is not a valid identifier (letters, digits and underscores, not starting with a digit)",
                    value.escape_debug()
                ),
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Ident,
    pub name: Ident,
}

impl TableRef {
    pub fn new(schema: Ident, name: Ident) -> Self {
        Self { schema, name }
    }

    pub fn quoted(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.name.quoted())
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A checked column type declaration such as `numeric(10, 2)` or `text[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataType(String);

impl DataType {
    /// Validate and normalize a type declaration.
    ///
    /// Accepted: words of letters, digits and underscores, at most one
    /// parenthesized group holding one or two integers, and trailing `[]`
    /// array suffixes.
    pub fn parse(field: &str, value: &str) -> DbResult<Self> {
        let invalid = |reason: &str| DbError::invalid_argument(field, reason.to_string());

        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if trimmed.len() > MAX_DATA_TYPE_LEN {
            return Err(invalid("type declaration is too long"));
        }
        if !trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(invalid("type must start with a letter"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ',' | '[' | ']'))
        {
            return Err(invalid(
                "type may only contain letters, digits, underscores, spaces, (n, m) and []",
            ));
        }

        let mut base = trimmed;
        let mut array_dims = 0;
        while let Some(rest) = base.strip_suffix("[]") {
            base = rest.trim_end();
            array_dims += 1;
        }
        if base.contains(['[', ']']) {
            return Err(invalid("array brackets are only allowed as a trailing []"));
        }

        let mut rendered = match (base.find('('), base.find(')')) {
            (None, None) => words(base),
            (Some(open), Some(close))
                if open < close
                    && base.matches('(').count() == 1
                    && base.matches(')').count() == 1 =>
            {
                let args: Vec<&str> = base[open + 1..close].split(',').map(str::trim).collect();
                let numeric = args
                    .iter()
                    .all(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()));
                if args.len() > 2 || !numeric {
                    return Err(invalid("type arguments must be one or two integers"));
                }
                let before = words(&base[..open]);
                if before.is_empty() {
                    return Err(invalid("type arguments must follow a type name"));
                }
                let after = words(&base[close + 1..]);
                let mut out = format!("{}({})", before, args.join(", "));
                if !after.is_empty() {
                    out.push(' ');
                    out.push_str(&after);
                }
                out
            }
            _ => return Err(invalid("unbalanced parentheses")),
        };
        if base.contains(',') && !base.contains('(') {
            return Err(invalid("commas are only allowed inside type arguments"));
        }
        for _ in 0..array_dims {
            rendered.push_str("[]");
        }
        Ok(Self(rendered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn words(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Foreign key ON DELETE / ON UPDATE behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ReferentialAction {
    #[serde(rename = "CASCADE", alias = "cascade")]
    Cascade,
    #[serde(rename = "SET NULL", alias = "set null")]
    SetNull,
    #[serde(rename = "SET DEFAULT", alias = "set default")]
    SetDefault,
    #[serde(rename = "RESTRICT", alias = "restrict")]
    Restrict,
    #[serde(rename = "NO ACTION", alias = "no action")]
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    #[default]
    Btree,
    Hash,
    Gin,
    Gist,
    Brin,
    Spgist,
}

impl IndexMethod {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Btree => "btree",
            Self::Hash => "hash",
            Self::Gin => "gin",
            Self::Gist => "gist",
            Self::Brin => "brin",
            Self::Spgist => "spgist",
        }
    }
}

/// A validated column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: Ident,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// Canonical SQL rendering of the default expression.
    pub default: Option<String>,
    /// Canonical SQL rendering of the check expression.
    pub check: Option<String>,
}

impl ColumnSpec {
    /// Column definition as it appears inside CREATE TABLE / ADD COLUMN.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name.quoted(), self.data_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" CHECK ({})", check));
        }
        sql
    }
}

/// A validated foreign key reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeySpec {
    pub column: Ident,
    pub references: TableRef,
    pub references_column: Ident,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl ForeignKeySpec {
    /// Constraint clause. SQLite only accepts an unqualified parent table.
    pub fn to_sql(&self, qualify_parent: bool) -> String {
        let parent = if qualify_parent {
            self.references.quoted()
        } else {
            self.references.name.quoted()
        };
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column.quoted(),
            parent,
            self.references_column.quoted()
        );
        if let Some(action) = self.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action.as_sql()));
        }
        if let Some(action) = self.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action.as_sql()));
        }
        sql
    }
}
