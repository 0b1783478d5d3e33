//! Built-in rules.
//!
//! [`descriptors`] lists them in dispatch order. The last four carry no
//! handler: they exist so their parameters can configure pipeline stages.

mod dml;
mod naming;
mod table;

use std::sync::Arc;

use sqlvet_core::Severity;
use sqlvet_parser::TableName;
use sqlvet_session::{SessionContext, TableDefinition};

use crate::dispatch::is_skippable;
use crate::error::RuleError;
use crate::params::ParamSpec;
use crate::registry::RuleDescriptor;

pub use dml::{AffectedRows, SchemaQualified, SelectStar, WhereExists};
pub use naming::{ObjectNameLength, UniqueIndexNameFormat, UniqueIndexPrefix};
pub use table::{AlterColumnExists, AutoIncrementStart, IndexCount, TableEngine, TablePrimaryKey};

/// Built-in rule names.
pub mod names {
    pub const TABLE_PRIMARY_KEY: &str = "ddl_check_table_primary_key";
    pub const AUTO_INCREMENT_START: &str = "ddl_check_auto_increment_start";
    pub const TABLE_ENGINE: &str = "ddl_check_table_engine";
    pub const OBJECT_NAME_LENGTH: &str = "ddl_check_object_name_length";
    pub const INDEX_COUNT: &str = "ddl_check_index_count";
    pub const UNIQUE_INDEX_PREFIX: &str = "ddl_check_unique_index_prefix";
    pub const UNIQUE_INDEX_NAME_FORMAT: &str = "ddl_check_unique_index_name_format";
    pub const ALTER_COLUMN_EXISTS: &str = "ddl_check_alter_column_exists";
    pub const WHERE_EXISTS: &str = "dml_check_where_exists";
    pub const SELECT_STAR: &str = "dml_check_select_star";
    pub const SCHEMA_QUALIFIED: &str = "dml_check_schema_qualified";
    pub const AFFECTED_ROWS: &str = "dml_check_affected_rows";

    pub const GHOST_MIN_SIZE: &str = "ddl_ghost_min_size";
    pub const OSC_MIN_SIZE: &str = "ddl_osc_min_size";
    pub const OPTIMIZE_INDEX: &str = "optimize_index_enabled";
    pub const EXPLAIN_PRE_CHECK: &str = "dml_explain_pre_check";
}

pub const ENGINES: &[&str] = &["InnoDB", "MyISAM", "Memory"];

pub fn descriptors() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor::new(
            names::TABLE_PRIMARY_KEY,
            "Tables must declare a primary key",
            Severity::Error,
        )
        .with_tags(&["ddl", "integrity"])
        .allow_offline()
        .with_handler(TablePrimaryKey),
        RuleDescriptor::new(
            names::AUTO_INCREMENT_START,
            "AUTO_INCREMENT must start at 0",
            Severity::Warning,
        )
        .with_tags(&["ddl", "integrity"])
        .allow_offline()
        .with_handler(AutoIncrementStart),
        RuleDescriptor::new(
            names::TABLE_ENGINE,
            "Tables must use the configured storage engine",
            Severity::Warning,
        )
        .with_tags(&["ddl", "convention"])
        .with_param(ParamSpec::one_of("engine", "storage engine", ENGINES, "InnoDB"))
        .allow_offline()
        .with_handler(TableEngine),
        RuleDescriptor::new(
            names::OBJECT_NAME_LENGTH,
            "Table, column and index names must not be too long",
            Severity::Notice,
        )
        .with_tags(&["ddl", "naming"])
        .with_param(ParamSpec::int("max_length", "maximum name length", 64))
        .allow_offline()
        .with_handler(ObjectNameLength),
        RuleDescriptor::new(
            names::INDEX_COUNT,
            "Tables must not carry too many indexes",
            Severity::Warning,
        )
        .with_tags(&["ddl", "index"])
        .with_param(ParamSpec::int("max_count", "maximum number of indexes", 5))
        .allow_offline()
        .with_handler(IndexCount),
        RuleDescriptor::new(
            names::UNIQUE_INDEX_PREFIX,
            "Unique index names must start with the configured prefix",
            Severity::Warning,
        )
        .with_tags(&["ddl", "naming", "index"])
        .with_param(ParamSpec::string("prefix", "unique index name prefix", "uniq_"))
        .with_handler(UniqueIndexPrefix),
        RuleDescriptor::new(
            names::UNIQUE_INDEX_NAME_FORMAT,
            "Unique index names must be IDX_UK_<table>_<columns>",
            Severity::Warning,
        )
        .with_tags(&["ddl", "naming", "index"])
        .with_handler(UniqueIndexNameFormat),
        RuleDescriptor::new(
            names::ALTER_COLUMN_EXISTS,
            "ALTER TABLE must reference existing columns",
            Severity::Error,
        )
        .with_tags(&["ddl", "integrity"])
        .allow_offline()
        .with_handler(AlterColumnExists),
        RuleDescriptor::new(
            names::WHERE_EXISTS,
            "UPDATE and DELETE must have a WHERE clause",
            Severity::Error,
        )
        .with_tags(&["dml", "safety"])
        .allow_offline()
        .disabled_for_executed()
        .with_handler(WhereExists),
        RuleDescriptor::new(
            names::SELECT_STAR,
            "Queries should list columns instead of SELECT *",
            Severity::Notice,
        )
        .with_tags(&["dml", "performance"])
        .allow_offline()
        .with_handler(SelectStar),
        RuleDescriptor::new(
            names::SCHEMA_QUALIFIED,
            "Objects should be referenced with an explicit schema",
            Severity::Notice,
        )
        .with_tags(&["dml", "ddl", "convention"])
        .allow_offline()
        .with_handler(SchemaQualified),
        RuleDescriptor::new(
            names::AFFECTED_ROWS,
            "DML must not touch too many rows",
            Severity::Warning,
        )
        .with_tags(&["dml", "safety"])
        .with_param(ParamSpec::int("max_rows", "maximum affected rows", 10_000))
        .disabled_for_executed()
        .with_handler(AffectedRows::default()),
        // Configuration-only rules.
        RuleDescriptor::new(
            names::GHOST_MIN_SIZE,
            "Run ALTER TABLE through gh-ost above this table size (MB)",
            Severity::Notice,
        )
        .with_tags(&["ddl", "online_ddl"])
        .with_param(ParamSpec::int("min_size", "table size in MB", 1024)),
        RuleDescriptor::new(
            names::OSC_MIN_SIZE,
            "Suggest pt-online-schema-change above this table size (MB)",
            Severity::Notice,
        )
        .with_tags(&["ddl", "online_ddl"])
        .with_param(ParamSpec::int("min_size", "table size in MB", 1024))
        .allow_offline(),
        RuleDescriptor::new(
            names::OPTIMIZE_INDEX,
            "Advise on composite index width and selectivity",
            Severity::Notice,
        )
        .with_tags(&["index", "advisor"])
        .with_param(ParamSpec::float(
            "min_selectivity",
            "minimum selectivity of a leading index column",
            0.1,
        ))
        .with_param(ParamSpec::int("max_columns", "maximum composite index width", 3))
        .allow_offline(),
        RuleDescriptor::new(
            names::EXPLAIN_PRE_CHECK,
            "Run EXPLAIN on DML before rule evaluation",
            Severity::Error,
        )
        .with_tags(&["dml"]),
    ]
}

/// Current definition of `table`, or `None` when the session cannot tell.
pub(crate) async fn lookup_table(
    ctx: &SessionContext,
    table: &TableName,
) -> Result<Option<Arc<TableDefinition>>, RuleError> {
    match ctx.get_table_definition(table).await {
        Ok(definition) => Ok(Some(definition)),
        Err(e) if is_skippable(&e) || e.is_show_create_table_unparseable() => {
            tracing::debug!(table = %table, error = %e, "Table shape unavailable");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlvet_core::{AuditResults, RuleConfig};
    use sqlvet_parser::SqlParser;
    use sqlvet_session::SessionContext;

    use crate::dispatch::{DispatchMode, dispatch};
    use crate::registry::{RuleRegistry, RuleSet};

    /// Run one rule against each statement of `sql` in turn, applying DDL
    /// effects between statements. Returns the findings of the last one.
    pub async fn run(ctx: &mut SessionContext, config: RuleConfig, sql: &str) -> Vec<String> {
        let registry = RuleRegistry::builtin();
        let rules = RuleSet::bind(&registry, &[config]).unwrap();
        let statements = SqlParser::new().parse(sql).unwrap();
        let mode = DispatchMode::for_session(ctx, false);

        let mut last = AuditResults::new();
        for stmt in &statements {
            let mut results = AuditResults::new();
            dispatch(stmt, ctx, &rules, mode, &mut results).await.unwrap();
            ctx.apply_ddl_effect(stmt).await.unwrap();
            last = results;
        }
        last.findings().iter().map(|f| f.message.clone()).collect()
    }

    pub async fn offline(config: RuleConfig, sql: &str) -> Vec<String> {
        run(
            &mut SessionContext::offline().with_default_schema("app"),
            config,
            sql,
        )
        .await
    }
}
