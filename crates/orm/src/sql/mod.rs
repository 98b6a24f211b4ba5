//! SQL Builder - translates resolved metadata and criteria into SQL text
//!
//! Queries and relationship maintenance statements render their values as
//! literals; row inserts, updates and deletes bind them as `?` parameters.
//! Identifiers come from resolved metadata and were validated when that
//! metadata was built.

mod criterion;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::TypeAdapterRegistry;
use crate::backends::{ColumnValue, StatementExecutor, StorageType};
use crate::criteria::CriteriaSpec;
use crate::error::{OrmError, OrmResult};
use crate::model::{EntityType, FieldType, Value};
use crate::policy::{ColumnDef, EntityDescriptor, PersistencePolicy, TypeResolutionPolicy};
use crate::relationships::{ManyToMany, OneToOne, Relationship};
use crate::security::{blob_literal, quote_literal};

use self::criterion::CriterionRenderer;

/// SQL text with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<ColumnValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<ColumnValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlBuilder {
    policy: Arc<PersistencePolicy>,
    types: TypeResolutionPolicy,
    adapters: Arc<TypeAdapterRegistry>,
}

impl SqlBuilder {
    pub fn new(
        policy: Arc<PersistencePolicy>,
        types: TypeResolutionPolicy,
        adapters: Arc<TypeAdapterRegistry>,
    ) -> Self {
        Self {
            policy,
            types,
            adapters,
        }
    }

    pub fn policy(&self) -> &Arc<PersistencePolicy> {
        &self.policy
    }

    /// Storage form of a value destined for a column of `field_type`
    pub fn column_value(&self, field_type: FieldType, value: &Value) -> OrmResult<ColumnValue> {
        self.adapters.adapter(field_type)?.to_column(value)
    }

    /// Literal SQL form of a value compared against a column of `field_type`.
    /// Text columns are quoted, numeric columns are not.
    pub fn literal(&self, field_type: FieldType, value: &Value) -> OrmResult<String> {
        let adapter = self.adapters.adapter(field_type)?;
        let column = match adapter.to_column(value) {
            Ok(column) => column,
            Err(_) if adapter.storage_type() == StorageType::Text => {
                ColumnValue::Text(value.to_string())
            }
            Err(e) => {
                return Err(OrmError::invalid_argument(format!(
                    "{} cannot be compared with a {:?} column: {}",
                    value, field_type, e
                )))
            }
        };
        Ok(match column {
            ColumnValue::Null => "NULL".to_string(),
            ColumnValue::Integer(n) => n.to_string(),
            ColumnValue::Real(f) => f.to_string(),
            ColumnValue::Text(s) => quote_literal(&s),
            ColumnValue::Blob(b) => blob_literal(&b),
        })
    }

    fn key_literal(&self, descriptor: &EntityDescriptor, key: &Value) -> OrmResult<String> {
        self.literal(descriptor.primary_key_type(), key)
    }

    fn column_ddl(&self, column: &ColumnDef) -> OrmResult<String> {
        let mut ddl = format!(
            "{} {}",
            column.name,
            self.types.storage_type(column.field_type)?.sql_type()
        );
        if column.primary_key {
            ddl.push_str(" PRIMARY KEY");
            if column.autoincrement {
                ddl.push_str(" AUTOINCREMENT");
            }
        } else {
            if !column.nullable {
                ddl.push_str(" NOT NULL");
            }
            if column.unique {
                ddl.push_str(" UNIQUE");
            }
        }
        Ok(ddl)
    }

    /// Join tables of every persistent many-to-many relationship, once each
    fn join_tables(&self) -> OrmResult<Vec<ManyToMany>> {
        let mut seen = HashSet::new();
        let mut tables = Vec::new();
        for entity in self.policy.persistent_entities() {
            for relationship in self.policy.many_to_many_relationships(entity)? {
                if seen.insert(relationship.join_table.clone()) {
                    tables.push(relationship);
                }
            }
        }
        Ok(tables)
    }

    /// CREATE TABLE statements for every persistent model and join table
    pub fn create_table_statements(&self) -> OrmResult<Vec<String>> {
        let mut statements = Vec::new();
        for entity in self.policy.persistent_entities() {
            let descriptor = self.policy.descriptor(entity)?;
            let columns = self.policy.table_columns(entity)?;
            if columns.is_empty() {
                return Err(OrmError::model_configuration(format!(
                    "{} has no persistent fields",
                    entity
                )));
            }
            let columns = columns
                .iter()
                .map(|c| self.column_ddl(c))
                .collect::<OrmResult<Vec<_>>>()?;
            statements.push(format!(
                "CREATE TABLE {} ({})",
                descriptor.table,
                columns.join(", ")
            ));
        }

        for join in self.join_tables()? {
            let first = self.policy.descriptor(join.first)?.primary_key_type();
            let second = self.policy.descriptor(join.second)?.primary_key_type();
            statements.push(format!(
                "CREATE TABLE {} ({} {} NOT NULL, {} {} NOT NULL, PRIMARY KEY ({}, {}))",
                join.join_table,
                join.first_column,
                self.types.storage_type(first)?.sql_type(),
                join.second_column,
                self.types.storage_type(second)?.sql_type(),
                join.first_column,
                join.second_column
            ));
        }
        Ok(statements)
    }

    /// Create every table; returns how many were created
    pub fn create_tables(&self, executor: &dyn StatementExecutor) -> OrmResult<usize> {
        let statements = self.create_table_statements()?;
        for statement in &statements {
            executor.execute_batch(statement)?;
        }
        info!("Created {} tables", statements.len());
        Ok(statements.len())
    }

    pub fn drop_table_statements(&self) -> OrmResult<Vec<String>> {
        let mut statements = Vec::new();
        for join in self.join_tables()? {
            statements.push(format!("DROP TABLE IF EXISTS {}", join.join_table));
        }
        for entity in self.policy.persistent_entities() {
            statements.push(format!(
                "DROP TABLE IF EXISTS {}",
                self.policy.table_name(entity)?
            ));
        }
        Ok(statements)
    }

    /// Drop every table that exists; safe to repeat
    pub fn drop_tables(&self, executor: &dyn StatementExecutor) -> OrmResult<usize> {
        let statements = self.drop_table_statements()?;
        for statement in &statements {
            executor.execute_batch(statement)?;
        }
        info!("Dropped {} tables", statements.len());
        Ok(statements.len())
    }

    fn where_clause(
        &self,
        descriptor: &EntityDescriptor,
        criteria: &CriteriaSpec,
    ) -> OrmResult<String> {
        if !criteria.is_restricted() {
            return Ok(String::new());
        }
        let renderer = CriterionRenderer::new(self, descriptor);
        let restriction = renderer.render_all(&criteria.criterions, &criteria.associations)?;
        Ok(format!(" WHERE {}", restriction))
    }

    /// SELECT for a criteria query
    pub fn create_query(&self, criteria: &CriteriaSpec) -> OrmResult<String> {
        let descriptor = self.policy.descriptor(criteria.entity)?;
        let mut sql = format!("SELECT * FROM {}", descriptor.table);
        sql.push_str(&self.where_clause(&descriptor, criteria)?);

        if !criteria.orders.is_empty() {
            let renderer = CriterionRenderer::new(self, &descriptor);
            let orders = criteria
                .orders
                .iter()
                .map(|o| renderer.render_order(o))
                .collect::<OrmResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        match (criteria.limit, criteria.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }
        debug!(sql = %sql, "Rendered criteria query");
        Ok(sql)
    }

    /// `SELECT count(*)` for a criteria query. Order and paging are ignored.
    pub fn create_count_query(&self, criteria: &CriteriaSpec) -> OrmResult<String> {
        let descriptor = self.policy.descriptor(criteria.entity)?;
        Ok(format!(
            "SELECT count(*) FROM {}{}",
            descriptor.table,
            self.where_clause(&descriptor, criteria)?
        ))
    }

    /// Rows of the side opposite `direction` that are joined to the
    /// `direction` row identified by `key`
    pub fn create_many_to_many_join_query(
        &self,
        relationship: &ManyToMany,
        key: &Value,
        direction: EntityType,
    ) -> OrmResult<String> {
        let (own, other) = relationship.columns_from(direction).ok_or_else(|| {
            OrmError::invalid_argument(format!(
                "{} is not part of the many-to-many relationship {}",
                direction, relationship.name
            ))
        })?;
        let target = if direction == relationship.first {
            relationship.second
        } else {
            relationship.first
        };
        let source = self.policy.descriptor(direction)?;
        let target = self.policy.descriptor(target)?;
        Ok(format!(
            "SELECT {target}.* FROM {target}, {join} WHERE {join}.{other} = {target}.{key_column} AND {join}.{own} = {key}",
            target = target.table,
            join = relationship.join_table,
            other = other,
            key_column = target.primary_key().column,
            own = own,
            key = self.key_literal(&source, key)?,
        ))
    }

    /// Rows of `entity` whose `column` holds `value`, where `value` is a key
    /// of `referenced`
    pub fn create_select_by_column_query(
        &self,
        entity: EntityType,
        column: &str,
        referenced: EntityType,
        value: &Value,
    ) -> OrmResult<String> {
        let table = self.policy.table_name(entity)?;
        let referenced = self.policy.descriptor(referenced)?;
        Ok(format!(
            "SELECT * FROM {} WHERE {} = {}",
            table,
            column,
            self.key_literal(&referenced, value)?
        ))
    }

    /// Detach rows no longer related to the `entity` row identified by `key`.
    ///
    /// Many-to-many join rows are deleted; one-to-many and inverse
    /// one-to-one foreign keys are set to NULL. `current` lists the keys
    /// of the still-related rows and may be empty.
    pub fn create_delete_stale_relationship_query(
        &self,
        relationship: &Relationship,
        entity: EntityType,
        key: &Value,
        current: &[Value],
    ) -> OrmResult<String> {
        let source = self.policy.descriptor(entity)?;
        let target_entity = relationship.opposite(entity).ok_or_else(|| {
            OrmError::invalid_argument(format!("{} is not part of {}", entity, relationship))
        })?;
        let target = self.policy.descriptor(target_entity)?;
        let current = current
            .iter()
            .map(|k| self.key_literal(&target, k))
            .collect::<OrmResult<Vec<_>>>()?;
        let key = self.key_literal(&source, key)?;

        let sql = match relationship {
            Relationship::ManyToMany(r) => {
                let (own, other) = r.columns_from(entity).ok_or_else(|| {
                    OrmError::invalid_argument(format!("{} is not part of {}", entity, r.name))
                })?;
                let mut sql = format!("DELETE FROM {} WHERE {} = {}", r.join_table, own, key);
                if !current.is_empty() {
                    sql.push_str(&format!(" AND {} NOT IN ({})", other, current.join(", ")));
                }
                sql
            }
            other if !other.is_owning_side() => {
                let column = other.foreign_key_column().unwrap_or_default();
                let mut sql = format!(
                    "UPDATE {} SET {} = NULL WHERE {} = {}",
                    target.table, column, column, key
                );
                if !current.is_empty() {
                    sql.push_str(&format!(
                        " AND {} NOT IN ({})",
                        target.primary_key().column,
                        current.join(", ")
                    ));
                }
                sql
            }
            other => {
                return Err(OrmError::invalid_argument(format!(
                    "{} keeps its foreign key on {}; nothing to detach",
                    other, entity
                )))
            }
        };
        Ok(sql)
    }

    /// Point the foreign key of the "many" row at the "one" row
    pub fn create_update_foreign_key_query(
        &self,
        relationship: &Relationship,
        one_key: &Value,
        many_key: &Value,
    ) -> OrmResult<String> {
        let (one, many, column) = match relationship {
            Relationship::OneToMany(r) => (r.one, r.many, &r.column),
            Relationship::ManyToOne(r) => (r.one, r.many, &r.column),
            other => {
                return Err(OrmError::invalid_argument(format!(
                    "{} is not a one-to-many relationship",
                    other
                )))
            }
        };
        let one = self.policy.descriptor(one)?;
        let many = self.policy.descriptor(many)?;
        Ok(format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            many.table,
            column,
            self.key_literal(&one, one_key)?,
            many.primary_key().column,
            self.key_literal(&many, many_key)?
        ))
    }

    /// Point the owner's foreign key at the owned row, or clear it when
    /// `owned_key` is NULL
    pub fn create_update_one_to_one_foreign_key_query(
        &self,
        relationship: &OneToOne,
        owner_key: &Value,
        owned_key: &Value,
    ) -> OrmResult<String> {
        let owner = self.policy.descriptor(relationship.owner)?;
        let owned = self.policy.descriptor(relationship.owned())?;
        Ok(format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            owner.table,
            relationship.column,
            self.key_literal(&owned, owned_key)?,
            owner.primary_key().column,
            self.key_literal(&owner, owner_key)?
        ))
    }

    /// Remove every join row of the `entity` row identified by `key`
    pub fn create_many_to_many_delete_query(
        &self,
        relationship: &ManyToMany,
        entity: EntityType,
        key: &Value,
    ) -> OrmResult<String> {
        self.create_delete_stale_relationship_query(
            &Relationship::ManyToMany(relationship.clone()),
            entity,
            key,
            &[],
        )
    }

    /// Join row linking `key` of `entity` with `other_key` of the other side
    pub fn create_many_to_many_insert_query(
        &self,
        relationship: &ManyToMany,
        entity: EntityType,
        key: &Value,
        other_key: &Value,
    ) -> OrmResult<String> {
        let (own, other) = relationship.columns_from(entity).ok_or_else(|| {
            OrmError::invalid_argument(format!(
                "{} is not part of the many-to-many relationship {}",
                entity, relationship.name
            ))
        })?;
        let target = if entity == relationship.first {
            relationship.second
        } else {
            relationship.first
        };
        let source = self.policy.descriptor(entity)?;
        let target = self.policy.descriptor(target)?;
        Ok(format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES ({}, {})",
            relationship.join_table,
            own,
            other,
            self.key_literal(&source, key)?,
            self.key_literal(&target, other_key)?
        ))
    }

    /// INSERT of one row; columns without a value take their defaults
    pub fn create_insert_query(
        &self,
        descriptor: &EntityDescriptor,
        columns: Vec<(String, ColumnValue)>,
    ) -> Statement {
        if columns.is_empty() {
            return Statement::new(
                format!("INSERT INTO {} DEFAULT VALUES", descriptor.table),
                Vec::new(),
            );
        }
        let (names, params): (Vec<String>, Vec<ColumnValue>) = columns.into_iter().unzip();
        let placeholders = vec!["?"; names.len()].join(", ");
        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                descriptor.table,
                names.join(", "),
                placeholders
            ),
            params,
        )
    }

    /// UPDATE of the row identified by `key`
    pub fn create_update_query(
        &self,
        descriptor: &EntityDescriptor,
        columns: Vec<(String, ColumnValue)>,
        key: &Value,
    ) -> OrmResult<Statement> {
        let pk = descriptor.primary_key();
        let key = self.column_value(descriptor.primary_key_type(), key)?;
        if columns.is_empty() {
            // Touch the key so the affected-row count still reports existence
            return Ok(Statement::new(
                format!(
                    "UPDATE {} SET {} = {} WHERE {} = ?",
                    descriptor.table, pk.column, pk.column, pk.column
                ),
                vec![key],
            ));
        }
        let (names, mut params): (Vec<String>, Vec<ColumnValue>) = columns.into_iter().unzip();
        let assignments = names
            .iter()
            .map(|name| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(", ");
        params.push(key);
        Ok(Statement::new(
            format!(
                "UPDATE {} SET {} WHERE {} = ?",
                descriptor.table, assignments, pk.column
            ),
            params,
        ))
    }

    pub fn create_delete_query(
        &self,
        descriptor: &EntityDescriptor,
        key: &Value,
    ) -> OrmResult<Statement> {
        Ok(Statement::new(
            format!(
                "DELETE FROM {} WHERE {} = ?",
                descriptor.table,
                descriptor.primary_key().column
            ),
            vec![self.column_value(descriptor.primary_key_type(), key)?],
        ))
    }

    pub fn create_select_by_key_query(
        &self,
        descriptor: &EntityDescriptor,
        key: &Value,
    ) -> OrmResult<Statement> {
        Ok(Statement::new(
            format!(
                "SELECT * FROM {} WHERE {} = ?",
                descriptor.table,
                descriptor.primary_key().column
            ),
            vec![self.column_value(descriptor.primary_key_type(), key)?],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{and, between, eq, gt, is_in, is_null, like, not, or, Order};
    use crate::model::{DomainRegistry, Lazy, Model, ModelMapping};
    use crate::policy::AnnotationProvider;

    #[derive(Debug, Clone, Default)]
    struct Foo {
        id: i32,
        name: String,
        score: f64,
        bars: Lazy<Vec<Bar>>,
    }

    #[derive(Debug, Clone, Default)]
    struct Bar {
        id: i64,
        code: String,
        foos: Lazy<Vec<Foo>>,
        owner: Lazy<Option<Owner>>,
    }

    #[derive(Debug, Clone, Default)]
    struct Owner {
        id: i64,
        label: Option<String>,
        bars: Lazy<Vec<Bar>>,
    }

    impl Model for Foo {
        const NAME: &'static str = "Foo";
        fn map(m: &mut ModelMapping<Self>) {
            m.field("id", |f| &f.id, |f| &mut f.id).primary_key().autoincrement();
            m.field("name", |f| &f.name, |f| &mut f.name).not_null();
            m.field("score", |f| &f.score, |f| &mut f.score);
            m.relation("bars", |f| &f.bars, |f| &mut f.bars).many_to_many();
        }
    }

    impl Model for Bar {
        const NAME: &'static str = "Bar";
        fn map(m: &mut ModelMapping<Self>) {
            m.field("id", |b| &b.id, |b| &mut b.id);
            m.field("code", |b| &b.code, |b| &mut b.code).unique();
            m.relation("foos", |b| &b.foos, |b| &mut b.foos).many_to_many();
            m.relation("owner", |b| &b.owner, |b| &mut b.owner);
        }
    }

    impl Model for Owner {
        const NAME: &'static str = "Owner";
        fn map(m: &mut ModelMapping<Self>) {
            m.field("id", |o| &o.id, |o| &mut o.id);
            m.field("label", |o| &o.label, |o| &mut o.label);
            m.relation("bars", |o| &o.bars, |o| &mut o.bars);
        }
    }

    fn builder() -> SqlBuilder {
        let registry = Arc::new(DomainRegistry::new());
        registry.register::<Foo>().unwrap();
        registry.register::<Bar>().unwrap();
        registry.register::<Owner>().unwrap();
        let adapters = Arc::new(TypeAdapterRegistry::new());
        let policy = Arc::new(PersistencePolicy::new(
            registry.clone(),
            Box::new(AnnotationProvider),
        ));
        SqlBuilder::new(
            policy,
            TypeResolutionPolicy::new(registry, adapters.clone()),
            adapters,
        )
    }

    fn query(builder: &SqlBuilder, spec: CriteriaSpec) -> String {
        builder.create_query(&spec).unwrap()
    }

    #[test]
    fn test_unrestricted_query() {
        let builder = builder();
        assert_eq!(query(&builder, CriteriaSpec::of::<Foo>()), "SELECT * FROM foo");
    }

    #[test]
    fn test_between_and_in_quote_by_column_type() {
        let builder = builder();
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(between("id", 1, 10))),
            "SELECT * FROM foo WHERE id BETWEEN 1 AND 10"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(is_in("id", [2, 4, 6]))),
            "SELECT * FROM foo WHERE id IN (2, 4, 6)"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(is_in("name", ["a", "b"]))),
            "SELECT * FROM foo WHERE name IN ('a', 'b')"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(between("name", "a", "m"))),
            "SELECT * FROM foo WHERE name BETWEEN 'a' AND 'm'"
        );
    }

    #[test]
    fn test_logical_composition() {
        let builder = builder();
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(and(eq("id", 1), eq("name", "x")))),
            "SELECT * FROM foo WHERE (id = 1) AND (name = 'x')"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(not(eq("id", 1)))),
            "SELECT * FROM foo WHERE NOT (id = 1)"
        );
        assert_eq!(
            query(
                &builder,
                CriteriaSpec::of::<Foo>()
                    .add(eq("name", "x"))
                    .add(or(gt("id", 3), is_null("name")))
            ),
            "SELECT * FROM foo WHERE name = 'x' AND ((id > 3) OR (name IS NULL))"
        );
    }

    #[test]
    fn test_ignore_case_and_escaping() {
        let builder = builder();
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(eq("name", "X").ignore_case())),
            "SELECT * FROM foo WHERE lower(name) = lower('X')"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(like("name", "it's%"))),
            "SELECT * FROM foo WHERE name LIKE 'it''s%'"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().add(eq("name", Value::Null))),
            "SELECT * FROM foo WHERE name IS NULL"
        );
    }

    #[test]
    fn test_order_and_paging() {
        let builder = builder();
        let spec = CriteriaSpec::of::<Foo>()
            .add(gt("score", 1.5))
            .order_by(Order::asc("name").ignore_case())
            .order_by(Order::desc("id"))
            .limit(5)
            .offset(10);
        assert_eq!(
            builder.create_query(&spec).unwrap(),
            "SELECT * FROM foo WHERE score > 1.5 ORDER BY lower(name) ASC, id DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            builder.create_count_query(&spec).unwrap(),
            "SELECT count(*) FROM foo WHERE score > 1.5"
        );
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Foo>().offset(3)),
            "SELECT * FROM foo LIMIT -1 OFFSET 3"
        );
    }

    #[test]
    fn test_unknown_field_is_invalid_argument() {
        let builder = builder();
        let err = builder
            .create_query(&CriteriaSpec::of::<Foo>().add(eq("missing", 1)))
            .unwrap_err();
        assert!(matches!(err, OrmError::InvalidArgument(_)));
        let err = builder
            .create_query(&CriteriaSpec::of::<Foo>().add(eq("id", "abc")))
            .unwrap_err();
        assert!(matches!(err, OrmError::InvalidArgument(_)));
    }

    #[test]
    fn test_association_criteria_render_subqueries() {
        let builder = builder();
        let spec = CriteriaSpec::of::<Foo>()
            .create_criteria("bars", |bars| bars.add(eq("code", "b1")));
        assert_eq!(
            builder.create_query(&spec).unwrap(),
            "SELECT * FROM foo WHERE id IN (SELECT foo_id FROM bar_foo WHERE bar_id IN (SELECT id FROM bar WHERE code = 'b1'))"
        );

        let spec = CriteriaSpec::of::<Bar>()
            .create_criteria("owner", |owner| owner.add(eq("label", "o")));
        assert_eq!(
            builder.create_query(&spec).unwrap(),
            "SELECT * FROM bar WHERE owner_id IN (SELECT id FROM owner WHERE label = 'o')"
        );

        let spec = CriteriaSpec::of::<Owner>().create_criteria("bars", |bars| bars);
        assert_eq!(
            builder.create_query(&spec).unwrap(),
            "SELECT * FROM owner WHERE id IN (SELECT owner_id FROM bar)"
        );
    }

    #[test]
    fn test_to_one_field_compares_foreign_key() {
        let builder = builder();
        assert_eq!(
            query(&builder, CriteriaSpec::of::<Bar>().add(eq("owner", 3))),
            "SELECT * FROM bar WHERE owner_id = 3"
        );
        assert!(builder
            .create_query(&CriteriaSpec::of::<Owner>().add(eq("bars", 3)))
            .is_err());
    }

    #[test]
    fn test_create_table_statements() {
        let builder = builder();
        let statements = builder.create_table_statements().unwrap();
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE foo (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, score REAL)",
                "CREATE TABLE bar (id INTEGER PRIMARY KEY AUTOINCREMENT, code TEXT UNIQUE, owner_id INTEGER)",
                "CREATE TABLE owner (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT)",
                "CREATE TABLE bar_foo (foo_id INTEGER NOT NULL, bar_id INTEGER NOT NULL, PRIMARY KEY (foo_id, bar_id))",
            ]
        );
        assert_eq!(
            builder.drop_table_statements().unwrap(),
            vec![
                "DROP TABLE IF EXISTS bar_foo",
                "DROP TABLE IF EXISTS foo",
                "DROP TABLE IF EXISTS bar",
                "DROP TABLE IF EXISTS owner",
            ]
        );
    }

    #[test]
    fn test_many_to_many_join_query() {
        let builder = builder();
        let relationship = builder
            .policy()
            .many_to_many_relationships(Foo::entity_type())
            .unwrap()
            .remove(0);
        assert_eq!(
            builder
                .create_many_to_many_join_query(&relationship, &Value::Int(5), Foo::entity_type())
                .unwrap(),
            "SELECT bar.* FROM bar, bar_foo WHERE bar_foo.bar_id = bar.id AND bar_foo.foo_id = 5"
        );
        assert_eq!(
            builder
                .create_many_to_many_join_query(&relationship, &Value::Long(2), Bar::entity_type())
                .unwrap(),
            "SELECT foo.* FROM foo, bar_foo WHERE bar_foo.foo_id = foo.id AND bar_foo.bar_id = 2"
        );
        let err = builder
            .create_many_to_many_join_query(&relationship, &Value::Int(5), Owner::entity_type())
            .unwrap_err();
        assert!(matches!(err, OrmError::InvalidArgument(_)));
    }

    #[test]
    fn test_relationship_maintenance_statements() {
        let builder = builder();
        let policy = builder.policy().clone();
        let foo = Foo::entity_type();
        let m2m = policy.relationship(foo, "bars").unwrap().unwrap();
        assert_eq!(
            builder
                .create_delete_stale_relationship_query(
                    &m2m,
                    foo,
                    &Value::Int(1),
                    &[Value::Long(2), Value::Long(3)]
                )
                .unwrap(),
            "DELETE FROM bar_foo WHERE foo_id = 1 AND bar_id NOT IN (2, 3)"
        );

        let owner = Owner::entity_type();
        let o2m = policy.relationship(owner, "bars").unwrap().unwrap();
        assert_eq!(
            builder
                .create_delete_stale_relationship_query(&o2m, owner, &Value::Long(7), &[])
                .unwrap(),
            "UPDATE bar SET owner_id = NULL WHERE owner_id = 7"
        );
        assert_eq!(
            builder
                .create_update_foreign_key_query(&o2m, &Value::Long(7), &Value::Long(9))
                .unwrap(),
            "UPDATE bar SET owner_id = 7 WHERE id = 9"
        );

        let Relationship::ManyToMany(join) = m2m else {
            panic!("expected a many-to-many relationship");
        };
        assert_eq!(
            builder
                .create_many_to_many_insert_query(&join, foo, &Value::Int(1), &Value::Long(2))
                .unwrap(),
            "INSERT OR IGNORE INTO bar_foo (foo_id, bar_id) VALUES (1, 2)"
        );
        assert_eq!(
            builder
                .create_many_to_many_delete_query(&join, Bar::entity_type(), &Value::Long(2))
                .unwrap(),
            "DELETE FROM bar_foo WHERE bar_id = 2"
        );
    }

    #[test]
    fn test_row_statements_bind_parameters() {
        let builder = builder();
        let descriptor = builder.policy().descriptor_of::<Foo>().unwrap();
        let insert = builder.create_insert_query(
            &descriptor,
            vec![("name".into(), ColumnValue::Text("x".into()))],
        );
        assert_eq!(insert.sql, "INSERT INTO foo (name) VALUES (?)");
        assert_eq!(insert.params, vec![ColumnValue::Text("x".into())]);

        let update = builder
            .create_update_query(
                &descriptor,
                vec![
                    ("name".into(), ColumnValue::Text("y".into())),
                    ("score".into(), ColumnValue::Real(2.0)),
                ],
                &Value::Int(4),
            )
            .unwrap();
        assert_eq!(update.sql, "UPDATE foo SET name = ?, score = ? WHERE id = ?");
        assert_eq!(update.params[2], ColumnValue::Integer(4));

        let delete = builder.create_delete_query(&descriptor, &Value::Int(4)).unwrap();
        assert_eq!(delete.sql, "DELETE FROM foo WHERE id = ?");
    }
}
