//! Table and user-defined type definitions, and the CQL that synchronizes them
//!
//! Synchronization is additive: missing tables and types are created, missing
//! columns are added. Nothing is ever dropped or altered in place.

use std::collections::HashSet;
use std::fmt;
use strum::Display;
use tracing::{debug, info};

use crate::driver::DriverSession;
use crate::error::{CqlError, CqlResult};

/// CQL column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Time,
    Timestamp,
    TimeUuid,
    TinyInt,
    Uuid,
    VarInt,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Frozen(Box<ColumnType>),
    /// User-defined type, by name
    UserType(String),
}

impl ColumnType {
    pub fn list(inner: ColumnType) -> Self {
        ColumnType::List(Box::new(inner))
    }

    pub fn set(inner: ColumnType) -> Self {
        ColumnType::Set(Box::new(inner))
    }

    pub fn map(key: ColumnType, value: ColumnType) -> Self {
        ColumnType::Map(Box::new(key), Box::new(value))
    }

    pub fn frozen(inner: ColumnType) -> Self {
        ColumnType::Frozen(Box::new(inner))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Ascii => f.write_str("ascii"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Counter => f.write_str("counter"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Duration => f.write_str("duration"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Inet => f.write_str("inet"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::SmallInt => f.write_str("smallint"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Time => f.write_str("time"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::TimeUuid => f.write_str("timeuuid"),
            ColumnType::TinyInt => f.write_str("tinyint"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::VarInt => f.write_str("varint"),
            ColumnType::List(inner) => write!(f, "list<{}>", inner),
            ColumnType::Set(inner) => write!(f, "set<{}>", inner),
            ColumnType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ColumnType::Frozen(inner) => write!(f, "frozen<{}>", inner),
            ColumnType::UserType(name) => f.write_str(&quote_ident(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ClusteringOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    fn cql(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.column_type)
    }
}

/// Table definition of a mapped model
///
/// # Example
///
/// ```ignore
/// let table = TableSchema::new("tasks")
///     .column("project_id", ColumnType::Uuid)
///     .column("id", ColumnType::TimeUuid)
///     .column("title", ColumnType::Text)
///     .partition_key("project_id")
///     .clustering_key("id", ClusteringOrder::Desc);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    /// Keyspace override; the manager's default keyspace is used when absent
    pub keyspace: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<(String, ClusteringOrder)>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyspace: None,
            columns: Vec::new(),
            partition_key: Vec::new(),
            clustering_key: Vec::new(),
        }
    }

    pub fn in_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef::new(name, column_type));
        self
    }

    pub fn partition_key(mut self, name: impl Into<String>) -> Self {
        self.partition_key.push(name.into());
        self
    }

    pub fn clustering_key(mut self, name: impl Into<String>, order: ClusteringOrder) -> Self {
        self.clustering_key.push((name.into(), order));
        self
    }

    fn is_primary_key(&self, column: &str) -> bool {
        self.partition_key.iter().any(|k| k == column)
            || self.clustering_key.iter().any(|(k, _)| k == column)
    }

    pub fn validate(&self) -> CqlResult<()> {
        if self.name.trim().is_empty() {
            return Err(CqlError::schema("table name must not be empty"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CqlError::schema(format!(
                    "table '{}' declares column '{}' twice",
                    self.name, column.name
                )));
            }
        }

        if self.partition_key.is_empty() {
            return Err(CqlError::schema(format!(
                "table '{}' has no partition key",
                self.name
            )));
        }

        let keys = self
            .partition_key
            .iter()
            .chain(self.clustering_key.iter().map(|(k, _)| k));
        for key in keys {
            if !seen.contains(key.as_str()) {
                return Err(CqlError::schema(format!(
                    "key '{}' of table '{}' is not a declared column",
                    key, self.name
                )));
            }
        }

        Ok(())
    }

    pub fn create_cql(&self, keyspace: &str) -> String {
        let mut body: Vec<String> = self.columns.iter().map(ColumnDef::cql).collect();

        let partition = self
            .partition_key
            .iter()
            .map(|k| quote_ident(k))
            .collect::<Vec<_>>()
            .join(", ");
        let mut primary = format!("({})", partition);
        for (key, _) in &self.clustering_key {
            primary.push_str(", ");
            primary.push_str(&quote_ident(key));
        }
        body.push(format!("PRIMARY KEY ({})", primary));

        let mut cql = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} ({})",
            quote_ident(keyspace),
            quote_ident(&self.name),
            body.join(", ")
        );

        if !self.clustering_key.is_empty() {
            let order = self
                .clustering_key
                .iter()
                .map(|(k, o)| format!("{} {}", quote_ident(k), o))
                .collect::<Vec<_>>()
                .join(", ");
            cql.push_str(&format!(" WITH CLUSTERING ORDER BY ({})", order));
        }

        cql
    }

    pub fn add_column_cql(&self, keyspace: &str, column: &ColumnDef) -> String {
        format!(
            "ALTER TABLE {}.{} ADD {}",
            quote_ident(keyspace),
            quote_ident(&self.name),
            column.cql()
        )
    }
}

/// User-defined type definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeSchema {
    pub name: String,
    pub keyspace: Option<String>,
    pub fields: Vec<ColumnDef>,
}

impl UserTypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyspace: None,
            fields: Vec::new(),
        }
    }

    pub fn in_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.fields.push(ColumnDef::new(name, column_type));
        self
    }

    pub fn create_cql(&self, keyspace: &str) -> CqlResult<String> {
        if self.fields.is_empty() {
            return Err(CqlError::schema(format!(
                "user type '{}' has no fields",
                self.name
            )));
        }
        let fields = self
            .fields
            .iter()
            .map(ColumnDef::cql)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "CREATE TYPE IF NOT EXISTS {}.{} ({})",
            quote_ident(keyspace),
            quote_ident(&self.name),
            fields
        ))
    }
}

/// Result of synchronizing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub keyspace: String,
    pub table: String,
    pub created: bool,
    pub added_columns: Vec<String>,
}

/// Create the table if it is missing, otherwise add any declared column it lacks.
pub async fn sync_table(
    session: &dyn DriverSession,
    table: &TableSchema,
    default_keyspace: &str,
) -> CqlResult<SyncOutcome> {
    table.validate()?;
    let keyspace = table.keyspace.as_deref().unwrap_or(default_keyspace);

    let existing = session.table_columns(keyspace, &table.name).await?;
    if existing.is_empty() {
        let cql = table.create_cql(keyspace);
        debug!(cql = %cql, "Creating table");
        session.execute(&cql).await?;
        info!(keyspace = %keyspace, table = %table.name, "Table created");
        return Ok(SyncOutcome {
            keyspace: keyspace.to_string(),
            table: table.name.clone(),
            created: true,
            added_columns: Vec::new(),
        });
    }

    let mut added_columns = Vec::new();
    for column in &table.columns {
        if existing.iter().any(|c| c == &column.name) {
            continue;
        }
        if table.is_primary_key(&column.name) {
            return Err(CqlError::schema(format!(
                "primary key column '{}' is missing from existing table '{}.{}'",
                column.name, keyspace, table.name
            )));
        }
        let cql = table.add_column_cql(keyspace, column);
        debug!(cql = %cql, "Adding column");
        session.execute(&cql).await?;
        added_columns.push(column.name.clone());
    }

    info!(
        keyspace = %keyspace,
        table = %table.name,
        added = added_columns.len(),
        "Table synchronized"
    );

    Ok(SyncOutcome {
        keyspace: keyspace.to_string(),
        table: table.name.clone(),
        created: false,
        added_columns,
    })
}

pub async fn sync_type(
    session: &dyn DriverSession,
    user_type: &UserTypeSchema,
    default_keyspace: &str,
) -> CqlResult<()> {
    let keyspace = user_type.keyspace.as_deref().unwrap_or(default_keyspace);
    let cql = user_type.create_cql(keyspace)?;
    debug!(cql = %cql, "Creating user type");
    session.execute(&cql).await?;
    info!(keyspace = %keyspace, user_type = %user_type.name, "User type synchronized");
    Ok(())
}

pub fn create_keyspace_simple_cql(keyspace: &str, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}} AND durable_writes = true",
        quote_ident(keyspace),
        replication_factor
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
