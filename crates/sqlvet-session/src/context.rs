//! Session context: the virtual schema rules and the estimator read from.
//!
//! A session starts from either nothing (offline) or a live server. Table
//! definitions are fetched lazily from the server, at most once per table, and
//! DDL audited in the session is applied on top so that later statements see
//! the post-DDL shape without touching the database.
//!
//! Every lookup distinguishes a fact that is known to be absent
//! ([`SessionError::TableNotFound`]) from one that cannot be determined
//! ([`SessionError::is_undetermined`]).

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use sqlvet_parser::{
    AlterOp, CreateTable, RenameTable, StatementEnvelope, StatementKind, TableName,
    parse_create_table,
};

use crate::error::SessionError;
use crate::executor::{ExplainRow, LiveExecutor, QueryRow};

/// Whether the session can reach a live server.
#[derive(Clone)]
pub enum Capability {
    Offline,
    Live(Arc<dyn LiveExecutor>),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "Offline"),
            Self::Live(_) => write!(f, "Live"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionOrigin {
    /// Fetched with `SHOW CREATE TABLE`.
    Live,
    /// Built from DDL audited in this session.
    Synthesized,
}

/// A table as the session currently sees it.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    /// Schema-qualified name.
    pub table: TableName,
    pub create: CreateTable,
    /// Data plus index size in MiB; zero for synthesized tables.
    pub size_mb: f64,
    /// Estimated row count from the catalog.
    pub rows: u64,
    pub origin: DefinitionOrigin,
}

impl TableDefinition {
    pub fn synthesized(create: CreateTable) -> Self {
        Self {
            table: create.table.clone(),
            create,
            size_mb: 0.0,
            rows: 0,
            origin: DefinitionOrigin::Synthesized,
        }
    }
}

/// Cache key; folded to lower case when identifiers are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    fn new(schema: String, table: &str, case_sensitive: bool) -> Self {
        if case_sensitive {
            Self {
                schema,
                table: table.to_string(),
            }
        } else {
            Self {
                schema: schema.to_lowercase(),
                table: table.to_lowercase(),
            }
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[derive(Debug, Clone)]
enum TableSlot {
    Present(Arc<TableDefinition>),
    Absent,
}

type Cell<T> = Arc<OnceCell<T>>;

fn filled<T>(value: T) -> Cell<T> {
    Arc::new(OnceCell::new_with(Some(value)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session-scoped virtual schema.
///
/// Lookups take `&self` and may run concurrently; [`SessionContext::apply_ddl_effect`]
/// takes `&mut self`, so DDL effects are applied strictly between statements.
pub struct SessionContext {
    capability: Capability,
    current_schema: Option<String>,
    case_sensitive: OnceCell<bool>,
    tables: Mutex<HashMap<TableKey, Cell<TableSlot>>>,
    /// Schemas created (`true`) or dropped (`false`) in this session, plus live answers.
    schemas: Mutex<HashMap<String, bool>>,
    variables: Mutex<HashMap<String, Cell<Option<String>>>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("capability", &self.capability)
            .field("current_schema", &self.current_schema)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl SessionContext {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            current_schema: None,
            case_sensitive: OnceCell::new(),
            tables: Mutex::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
            variables: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn offline() -> Self {
        Self::new(Capability::Offline)
    }

    pub fn live(executor: Arc<dyn LiveExecutor>) -> Self {
        Self::new(Capability::Live(executor))
    }

    /// Schema for unqualified names until a `USE` is audited.
    pub fn with_default_schema(mut self, schema: impl Into<String>) -> Self {
        self.current_schema = Some(schema.into());
        self
    }

    /// Fix identifier case sensitivity instead of asking the server.
    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = OnceCell::new_with(Some(case_sensitive));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.capability, Capability::Offline)
    }

    pub fn current_schema(&self) -> Option<&str> {
        self.current_schema.as_deref()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop issuing live queries. Work already sent to the server is not undone.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The live executor, if the session is open, live and not cancelled.
    pub fn executor(&self) -> Result<&Arc<dyn LiveExecutor>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        match &self.capability {
            Capability::Offline => Err(SessionError::Offline),
            Capability::Live(executor) => Ok(executor),
        }
    }

    /// Run a query on the live executor, racing it against cancellation.
    pub async fn query(&self, sql: &str) -> Result<Vec<QueryRow>, SessionError> {
        self.query_on(self.executor()?, sql).await
    }

    /// `EXPLAIN` a statement on the live executor, racing it against cancellation.
    pub async fn explain(&self, sql: &str) -> Result<Vec<ExplainRow>, SessionError> {
        let executor = self.executor()?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            plan = executor.explain(sql) => Ok(plan?),
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Explicit schema of `table`, else the current schema, else empty.
    pub fn resolve_schema_name(&self, table: &TableName) -> String {
        table
            .schema
            .clone()
            .or_else(|| self.current_schema.clone())
            .unwrap_or_default()
    }

    /// Whether identifiers are case-sensitive (`lower_case_table_names = 0`).
    ///
    /// Assumed case-sensitive when the variable cannot be read.
    pub async fn case_sensitive(&self) -> bool {
        *self
            .case_sensitive
            .get_or_init(|| async {
                match self.get_system_variable("lower_case_table_names").await {
                    Ok(value) => value.trim() == "0",
                    Err(e) => {
                        tracing::debug!(error = %e, "Assuming case-sensitive identifiers");
                        true
                    }
                }
            })
            .await
    }

    pub async fn table_key(&self, table: &TableName) -> TableKey {
        let schema = self.resolve_schema_name(table);
        TableKey::new(schema, &table.name, self.case_sensitive().await)
    }

    async fn fold(&self, name: &str) -> String {
        if self.case_sensitive().await {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    fn table_cell(&self, key: &TableKey) -> Cell<TableSlot> {
        lock(&self.tables).entry(key.clone()).or_default().clone()
    }

    /// Current definition of `table`, fetched from the server at most once.
    pub async fn get_table_definition(
        &self,
        table: &TableName,
    ) -> Result<Arc<TableDefinition>, SessionError> {
        let key = self.table_key(table).await;
        let cell = self.table_cell(&key);

        let slot = match cell.get() {
            Some(slot) => slot.clone(),
            None => {
                let schema_dropped = lock(&self.schemas).get(&key.schema) == Some(&false);
                if schema_dropped {
                    TableSlot::Absent
                } else if key.schema.is_empty() {
                    return Err(SessionError::SchemaUnknown(table.name.clone()));
                } else {
                    let executor = match self.executor() {
                        Ok(executor) => executor,
                        Err(SessionError::Offline) => {
                            return Err(SessionError::SchemaUnknown(key.to_string()));
                        }
                        Err(e) => return Err(e),
                    };
                    cell.get_or_try_init(|| self.fetch_table(executor, &key))
                        .await?
                        .clone()
                }
            }
        };

        match slot {
            TableSlot::Present(definition) => Ok(definition),
            TableSlot::Absent => Err(SessionError::TableNotFound {
                schema: key.schema,
                table: key.table,
            }),
        }
    }

    async fn fetch_table(
        &self,
        executor: &Arc<dyn LiveExecutor>,
        key: &TableKey,
    ) -> Result<TableSlot, SessionError> {
        tracing::debug!(table = %key, "Fetching table definition");

        let stats_sql = format!(
            "SELECT ROUND((DATA_LENGTH + INDEX_LENGTH) / 1024 / 1024, 2) AS size_mb, \
             TABLE_ROWS AS table_rows FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
            quote_literal(&key.schema),
            quote_literal(&key.table)
        );
        let stats = self.query_on(executor, &stats_sql).await?;
        let Some(stats) = stats.first() else {
            tracing::debug!(table = %key, "Table not found on server");
            return Ok(TableSlot::Absent);
        };
        let size_mb = stats
            .get("size_mb")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let rows = stats
            .get("table_rows")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        let show_sql = format!(
            "SHOW CREATE TABLE {}.{}",
            quote_ident(&key.schema),
            quote_ident(&key.table)
        );
        let result = self.query_on(executor, &show_sql).await?;
        let text = result
            .first()
            .and_then(|row| row.get("Create Table").or_else(|| row.at(1)))
            .ok_or_else(|| SessionError::ShowCreateTableUnparseable {
                table: key.to_string(),
                message: "no definition returned".to_string(),
            })?;
        let mut create =
            parse_create_table(text).map_err(|e| SessionError::ShowCreateTableUnparseable {
                table: key.to_string(),
                message: e.to_string(),
            })?;
        create.table = TableName::qualified(key.schema.clone(), create.table.name.clone());

        Ok(TableSlot::Present(Arc::new(TableDefinition {
            table: create.table.clone(),
            create,
            size_mb,
            rows,
            origin: DefinitionOrigin::Live,
        })))
    }

    async fn query_on(
        &self,
        executor: &Arc<dyn LiveExecutor>,
        sql: &str,
    ) -> Result<Vec<QueryRow>, SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
            rows = executor.query(sql) => Ok(rows?),
        }
    }

    /// `Ok(false)` when the table is known to be absent.
    pub async fn table_exists(&self, table: &TableName) -> Result<bool, SessionError> {
        match self.get_table_definition(table).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Data plus index size of `table` in MiB.
    pub async fn table_size_mb(&self, table: &TableName) -> Result<f64, SessionError> {
        Ok(self.get_table_definition(table).await?.size_mb)
    }

    /// Value of a system variable, read once per session.
    pub async fn get_system_variable(&self, name: &str) -> Result<String, SessionError> {
        let name = name.to_ascii_lowercase();
        let cell = lock(&self.variables).entry(name.clone()).or_default().clone();

        let value = match cell.get() {
            Some(value) => value.clone(),
            None => {
                let executor = match self.executor() {
                    Ok(executor) => executor,
                    Err(SessionError::Offline) => {
                        return Err(SessionError::VariableUnavailable(name));
                    }
                    Err(e) => return Err(e),
                };
                cell.get_or_try_init(|| async {
                    tracing::debug!(variable = %name, "Fetching system variable");
                    let sql = format!("SHOW VARIABLES LIKE {}", quote_literal(&name));
                    let rows = self.query_on(executor, &sql).await?;
                    Ok::<_, SessionError>(
                        rows.first()
                            .and_then(|row| row.get("Value").or_else(|| row.at(1)))
                            .map(str::to_string),
                    )
                })
                .await?
                .clone()
            }
        };

        value.ok_or(SessionError::VariableUnavailable(name))
    }

    pub async fn schema_exists(&self, name: &str) -> Result<bool, SessionError> {
        let key = self.fold(name).await;
        let cached = lock(&self.schemas).get(&key).copied();
        if let Some(exists) = cached {
            return Ok(exists);
        }
        let executor = match self.executor() {
            Ok(executor) => executor,
            Err(SessionError::Offline) => return Err(SessionError::SchemaUnknown(name.to_string())),
            Err(e) => return Err(e),
        };
        let sql = format!(
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = {}",
            quote_literal(name)
        );
        let exists = !self.query_on(executor, &sql).await?.is_empty();
        lock(&self.schemas).insert(key, exists);
        Ok(exists)
    }

    /// Seed a definition, e.g. from a schema dump.
    pub async fn register_table(&mut self, create: CreateTable, size_mb: f64) {
        let key = self.table_key(&create.table).await;
        let mut definition = TableDefinition::synthesized(create);
        definition.table = TableName::qualified(key.schema.clone(), definition.table.name.clone());
        definition.create.table = definition.table.clone();
        definition.size_mb = size_mb;
        self.commit(Staged {
            tables: vec![(key, TableSlot::Present(Arc::new(definition)))],
            ..Staged::default()
        });
    }

    // =========================================================================
    // DDL effects
    // =========================================================================

    /// Apply the schema effect of an audited statement.
    ///
    /// The new state is computed first and committed in one step, so a failed
    /// lookup leaves the context untouched. Statements without a schema effect,
    /// and changes to tables whose definition cannot be determined, are no-ops.
    pub async fn apply_ddl_effect(&mut self, stmt: &StatementEnvelope) -> Result<(), SessionError> {
        let mut staged = Staged::default();

        match &stmt.kind {
            StatementKind::CreateTable(create) => self.stage_create(create, &mut staged).await?,
            StatementKind::AlterTable(alter) => {
                self.stage_alter(&alter.table, &alter.ops, &mut staged)
                    .await?
            }
            StatementKind::RenameTable(rename) => self.stage_rename(rename, &mut staged).await?,
            StatementKind::DropTable(drop) => {
                for table in &drop.tables {
                    let key = self.table_key(table).await;
                    staged.put(key, TableSlot::Absent);
                }
            }
            StatementKind::CreateIndex(create) => {
                let op = AlterOp::AddIndex(create.index.clone());
                self.stage_alter(&create.table, &[op], &mut staged).await?
            }
            StatementKind::DropIndex(drop) => {
                let op = AlterOp::DropIndex(drop.name.clone());
                self.stage_alter(&drop.table, &[op], &mut staged).await?
            }
            StatementKind::CreateDatabase { name, .. } => {
                staged.schemas.push((self.fold(name).await, true));
            }
            StatementKind::DropDatabase { name, .. } => {
                staged.dropped_schema = Some(self.fold(name).await);
            }
            StatementKind::Use(name) => staged.current_schema = Some(name.clone()),
            StatementKind::Set(assignments) => {
                staged.variables = assignments
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect();
            }
            _ => return Ok(()),
        }

        tracing::debug!(statement = stmt.kind.name(), line = stmt.start_line, "Applying DDL effect");
        self.commit(staged);
        Ok(())
    }

    /// Definition as seen after the staged changes; `None` when absent or unknown.
    async fn lookup(
        &self,
        staged: &Staged,
        table: &TableName,
    ) -> Result<Option<Arc<TableDefinition>>, SessionError> {
        let key = self.table_key(table).await;
        if let Some(slot) = staged.get(&key) {
            return Ok(match slot {
                TableSlot::Present(definition) => Some(definition.clone()),
                TableSlot::Absent => None,
            });
        }
        match self.get_table_definition(table).await {
            Ok(definition) => Ok(Some(definition)),
            Err(e)
                if e.is_undetermined() || e.is_not_found() || e.is_show_create_table_unparseable() =>
            {
                tracing::debug!(table = %key, error = %e, "Table definition unavailable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn stage_create(
        &self,
        create: &CreateTable,
        staged: &mut Staged,
    ) -> Result<(), SessionError> {
        let key = self.table_key(&create.table).await;
        if create.if_not_exists && self.lookup(staged, &create.table).await?.is_some() {
            return Ok(());
        }

        let mut definition = match &create.like {
            Some(source) => match self.lookup(staged, source).await? {
                Some(source) => {
                    let mut copy = source.create.clone();
                    copy.like = None;
                    copy.if_not_exists = false;
                    copy
                }
                None => {
                    tracing::debug!(table = %key, source = %source, "LIKE source unknown, skipping");
                    return Ok(());
                }
            },
            None => create.clone(),
        };
        definition.table = TableName::qualified(key.schema.clone(), create.table.name.clone());

        staged.put(
            key,
            TableSlot::Present(Arc::new(TableDefinition::synthesized(definition))),
        );
        Ok(())
    }

    async fn stage_alter(
        &self,
        table: &TableName,
        ops: &[AlterOp],
        staged: &mut Staged,
    ) -> Result<(), SessionError> {
        let Some(current) = self.lookup(staged, table).await? else {
            tracing::debug!(table = %table, "Table definition unknown, skipping ALTER effect");
            return Ok(());
        };

        let mut create = current.create.clone();
        let mut renamed_to = None;
        for op in ops {
            match op {
                AlterOp::RenameTable(new_name) => renamed_to = Some(new_name.clone()),
                op => apply_alter_op(&mut create, op),
            }
        }

        let old_key = self.table_key(table).await;
        let new_key = match &renamed_to {
            Some(new_name) => {
                staged.put(old_key, TableSlot::Absent);
                let key = self.table_key(new_name).await;
                create.table = TableName::qualified(key.schema.clone(), new_name.name.clone());
                key
            }
            None => old_key,
        };

        let definition = TableDefinition {
            table: create.table.clone(),
            create,
            ..(*current).clone()
        };
        staged.put(new_key, TableSlot::Present(Arc::new(definition)));
        Ok(())
    }

    async fn stage_rename(
        &self,
        rename: &RenameTable,
        staged: &mut Staged,
    ) -> Result<(), SessionError> {
        for (from, to) in &rename.pairs {
            let current = self.lookup(staged, from).await?;
            let from_key = self.table_key(from).await;
            staged.put(from_key, TableSlot::Absent);

            let Some(current) = current else {
                tracing::debug!(table = %from, "Table definition unknown, skipping RENAME effect");
                continue;
            };
            let to_key = self.table_key(to).await;
            let mut definition = (*current).clone();
            definition.table = TableName::qualified(to_key.schema.clone(), to.name.clone());
            definition.create.table = definition.table.clone();
            staged.put(to_key, TableSlot::Present(Arc::new(definition)));
        }
        Ok(())
    }

    fn commit(&mut self, staged: Staged) {
        let tables = self.tables.get_mut().unwrap_or_else(PoisonError::into_inner);
        let schemas = self.schemas.get_mut().unwrap_or_else(PoisonError::into_inner);

        if let Some(dropped) = staged.dropped_schema {
            for (key, cell) in tables.iter_mut() {
                if key.schema == dropped {
                    *cell = filled(TableSlot::Absent);
                }
            }
            if self
                .current_schema
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(&dropped))
            {
                self.current_schema = None;
            }
            schemas.insert(dropped, false);
        }
        for (key, slot) in staged.tables {
            tables.insert(key, filled(slot));
        }
        for (name, exists) in staged.schemas {
            schemas.insert(name, exists);
        }
        if let Some(schema) = staged.current_schema {
            self.current_schema = Some(schema);
        }
        let variables = self
            .variables
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (name, value) in staged.variables {
            variables.insert(name, filled(Some(value)));
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release the live executor. Safe to call more than once.
    pub async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("Closing session");
        if let Capability::Live(executor) = &self.capability {
            executor.close().await?;
        }
        Ok(())
    }
}

/// Changes computed by one statement, committed together.
#[derive(Default)]
struct Staged {
    tables: Vec<(TableKey, TableSlot)>,
    schemas: Vec<(String, bool)>,
    dropped_schema: Option<String>,
    current_schema: Option<String>,
    variables: Vec<(String, String)>,
}

impl Staged {
    fn put(&mut self, key: TableKey, slot: TableSlot) {
        self.tables.retain(|(k, _)| *k != key);
        self.tables.push((key, slot));
    }

    fn get(&self, key: &TableKey) -> Option<&TableSlot> {
        self.tables.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }
}

/// Apply one `ALTER TABLE` operation to a definition. Renames are handled by the caller.
pub fn apply_alter_op(create: &mut CreateTable, op: &AlterOp) {
    match op {
        AlterOp::AddColumn(column) => {
            create
                .columns
                .retain(|c| !c.name.eq_ignore_ascii_case(&column.name));
            create.columns.push(column.clone());
        }
        AlterOp::ModifyColumn(column) => {
            replace_column(create, &column.name, column.clone());
        }
        AlterOp::ChangeColumn { old, column } => {
            replace_column(create, old, column.clone());
            rename_index_columns(create, old, &column.name);
        }
        AlterOp::RenameColumn { old, new } => {
            if let Some(column) = create
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(old))
            {
                *column = column.renamed(new);
            }
            rename_index_columns(create, old, new);
        }
        AlterOp::DropColumn(name) => {
            create.columns.retain(|c| !c.name.eq_ignore_ascii_case(name));
            create.indexes = std::mem::take(&mut create.indexes)
                .into_iter()
                .filter_map(|index| {
                    let remaining: Vec<String> = index
                        .columns
                        .iter()
                        .filter(|c| !c.eq_ignore_ascii_case(name))
                        .cloned()
                        .collect();
                    if remaining.is_empty() {
                        None
                    } else if remaining.len() == index.columns.len() {
                        Some(index)
                    } else {
                        Some(index.with_columns(remaining))
                    }
                })
                .collect();
        }
        AlterOp::AddIndex(index) => create.indexes.push(index.clone()),
        AlterOp::DropIndex(name)
        | AlterOp::DropForeignKey(name)
        | AlterOp::DropConstraint(name) => drop_named(create, name),
        AlterOp::DropPrimaryKey => {
            create
                .indexes
                .retain(|i| i.kind != sqlvet_parser::IndexKind::Primary);
            for column in &mut create.columns {
                column.primary_key = false;
            }
        }
        AlterOp::RenameIndex { old, new } => {
            if let Some(index) = create
                .indexes
                .iter_mut()
                .find(|i| i.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(old)))
            {
                *index = index.renamed(new);
            }
        }
        AlterOp::Options(options) => create.options.merge(options.clone()),
        AlterOp::RenameTable(_) | AlterOp::Other(_) => {}
    }
}

fn replace_column(create: &mut CreateTable, old: &str, column: sqlvet_parser::ColumnDef) {
    match create
        .columns
        .iter_mut()
        .find(|c| c.name.eq_ignore_ascii_case(old))
    {
        Some(slot) => *slot = column,
        None => create.columns.push(column),
    }
}

fn rename_index_columns(create: &mut CreateTable, old: &str, new: &str) {
    for index in &mut create.indexes {
        if index.columns.iter().any(|c| c.eq_ignore_ascii_case(old)) {
            let columns = index
                .columns
                .iter()
                .map(|c| {
                    if c.eq_ignore_ascii_case(old) {
                        new.to_string()
                    } else {
                        c.clone()
                    }
                })
                .collect();
            *index = index.with_columns(columns);
        }
    }
}

/// Drop the index or constraint called `name`; falls back to an inline `UNIQUE`.
fn drop_named(create: &mut CreateTable, name: &str) {
    let before = create.indexes.len();
    create
        .indexes
        .retain(|i| !i.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name)));
    if create.indexes.len() == before
        && let Some(column) = create
            .columns
            .iter_mut()
            .find(|c| c.unique && c.name.eq_ignore_ascii_case(name))
    {
        column.unique = false;
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn quote_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}
