//! Statements to schema model.

use super::ast::*;
use super::types::normalize_type;
use super::SqlDialect;
use crate::diagnostic::{Diagnostic, DiagnosticKind, ParseResult, Position};
use crate::id::{AttributePath, EntityRef};
use crate::model::{Attribute, Check, Database, Entity, Index, PrimaryKey, Relation, Type};
use tracing::trace;

/// Build a [`Database`] from parsed statements. Queries are skipped, other
/// unmodelled statements leave an info diagnostic.
pub fn import(statements: &[Statement], dialect: SqlDialect) -> ParseResult<Database> {
    let mut importer = Importer {
        dialect,
        db: Database::default(),
        pending: Vec::new(),
        diagnostics: Vec::new(),
    };
    for statement in statements {
        importer.statement(statement);
    }
    importer.finish()
}

struct Importer {
    dialect: SqlDialect,
    db: Database,
    /// Foreign keys resolved once every table is known.
    pending: Vec<(Relation, Position)>,
    diagnostics: Vec<Diagnostic>,
}

fn paths(idents: &[Identifier]) -> Vec<AttributePath> {
    idents.iter().map(|i| AttributePath::name(&i.value)).collect()
}

fn name_of(ident: &Option<Identifier>) -> Option<String> {
    ident.as_ref().map(|i| i.value.clone())
}

impl Importer {
    fn warn(&mut self, kind: DiagnosticKind, message: String, position: Position) {
        self.diagnostics.push(Diagnostic::warning(kind, message, position));
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::CreateTable(table) => self.create_table(table),
            Statement::AlterTable(alter) => self.alter_table(alter),
            Statement::CreateIndex(index) => self.create_index(index),
            Statement::CreateType(typ) => self.create_type(typ),
            Statement::CommentOn(comment) => self.comment_on(comment),
            Statement::Select(_) | Statement::Update(_) => {
                trace!(position = %statement.position(), "query statement ignored for schema import");
            }
            Statement::Unknown(unknown) => {
                trace!(command = %unknown.command(), "unsupported statement");
                self.diagnostics.push(Diagnostic::info(
                    DiagnosticKind::UnsupportedStatement,
                    format!("Ignored {} statement", unknown.command()),
                    unknown.position,
                ));
            }
        }
    }

    /// Takes the entity out of the database for mutation, or warns.
    fn take_entity(&mut self, id: &EntityRef, position: Position) -> Option<(usize, Entity)> {
        match self.db.entities.iter().position(|e| e.is(id)) {
            Some(i) => Some((i, std::mem::take(&mut self.db.entities[i]))),
            None => {
                self.warn(DiagnosticKind::UnknownEntity, format!("Unknown table {}", id), position);
                None
            }
        }
    }

    fn create_table(&mut self, table: &CreateTable) {
        let id = table.name.entity_ref();
        if self.db.entity(&id).is_some() {
            self.warn(
                DiagnosticKind::DuplicateEntity,
                format!("Table {} is already defined, keeping the first definition", id),
                table.name.position(),
            );
            return;
        }
        trace!(table = %id, columns = table.columns.len(), "importing table");
        let mut entity = Entity::new(id.namespace, id.entity);
        for column in &table.columns {
            self.column(&mut entity, column);
        }
        for constraint in &table.constraints {
            self.table_constraint(&mut entity, constraint);
        }
        self.db.entities.push(entity);
    }

    fn column(&mut self, entity: &mut Entity, column: &ColumnDef) {
        let mut attr = Attribute::new(
            column.name.value.clone(),
            normalize_type(&column.data_type.text, self.dialect),
        );
        attr.null = true;
        let path = AttributePath::name(&column.name.value);

        for constraint in &column.constraints {
            let name = name_of(&constraint.name);
            match &constraint.kind {
                ColumnConstraintKind::NotNull => attr.null = false,
                ColumnConstraintKind::Null => attr.null = true,
                ColumnConstraintKind::PrimaryKey => {
                    attr.null = false;
                    entity.pk = Some(PrimaryKey {
                        name,
                        attrs: vec![path.clone()],
                    });
                }
                ColumnConstraintKind::Unique => entity.indexes.push(Index {
                    name,
                    attrs: vec![path.clone()],
                    unique: true,
                    partial: None,
                    definition: None,
                    doc: None,
                }),
                ColumnConstraintKind::AutoIncrement => {
                    attr.extra.insert("autoIncrement".to_string(), serde_json::Value::Bool(true));
                }
                ColumnConstraintKind::Default(expression) => attr.default = Some(expression.text.clone()),
                ColumnConstraintKind::Check(expression) => entity.checks.push(Check {
                    name,
                    attrs: vec![path.clone()],
                    predicate: expression.text.clone(),
                    doc: None,
                }),
                ColumnConstraintKind::References(reference) => {
                    self.foreign_key(entity.id(), vec![path.clone()], name, reference, constraint.position)
                }
                ColumnConstraintKind::Generated(expression) => {
                    attr.generated = true;
                    attr.default = Some(expression.text.clone());
                }
                ColumnConstraintKind::Comment(text) => attr.doc = Some(text.clone()),
            }
        }
        entity.attrs.push(attr);
    }

    fn table_constraint(&mut self, entity: &mut Entity, constraint: &TableConstraint) {
        let name = name_of(&constraint.name);
        match &constraint.kind {
            TableConstraintKind::PrimaryKey(columns) => {
                let attrs = paths(columns);
                for path in &attrs {
                    match entity.attribute_mut(path) {
                        Some(attr) => attr.null = false,
                        None => self.warn(
                            DiagnosticKind::UnknownAttribute,
                            format!("Primary key uses unknown column {}", path),
                            constraint.position,
                        ),
                    }
                }
                entity.pk = Some(PrimaryKey { name, attrs });
            }
            TableConstraintKind::Unique(columns) | TableConstraintKind::Index(columns) => {
                entity.indexes.push(Index {
                    name,
                    attrs: paths(columns),
                    unique: matches!(constraint.kind, TableConstraintKind::Unique(_)),
                    partial: None,
                    definition: None,
                    doc: None,
                });
            }
            TableConstraintKind::ForeignKey { columns, reference } => {
                self.foreign_key(entity.id(), paths(columns), name, reference, constraint.position)
            }
            TableConstraintKind::Check(expression) => {
                let attrs = expression
                    .columns
                    .iter()
                    .filter(|c| c.scope.is_none())
                    .map(|c| AttributePath::name(&c.name))
                    .filter(|path| entity.has_attribute(path))
                    .collect();
                entity.checks.push(Check {
                    name,
                    attrs,
                    predicate: expression.text.clone(),
                    doc: None,
                });
            }
        }
    }

    fn foreign_key(
        &mut self,
        src: EntityRef,
        src_attrs: Vec<AttributePath>,
        name: Option<String>,
        reference: &ForeignKeyRef,
        position: Position,
    ) {
        let mut relation = Relation::many_to_one(src, src_attrs, reference.table.entity_ref(), paths(&reference.columns));
        relation.name = name;
        relation.on_delete = reference.on_delete.clone();
        relation.on_update = reference.on_update.clone();
        self.pending.push((relation, position));
    }

    fn alter_table(&mut self, alter: &AlterTable) {
        let id = alter.table.entity_ref();
        let Some((i, mut entity)) = self.take_entity(&id, alter.table.position()) else {
            return;
        };
        for action in &alter.actions {
            match action {
                AlterAction::AddColumn(column) => self.column(&mut entity, column),
                AlterAction::AddConstraint(constraint) => self.table_constraint(&mut entity, constraint),
                AlterAction::Other { text, position } => self.diagnostics.push(Diagnostic::info(
                    DiagnosticKind::IgnoredConstruct,
                    format!("Ignored ALTER TABLE action: {}", text),
                    *position,
                )),
            }
        }
        self.db.entities[i] = entity;
    }

    fn create_index(&mut self, index: &CreateIndex) {
        let id = index.table.entity_ref();
        let Some((i, mut entity)) = self.take_entity(&id, index.table.position()) else {
            return;
        };
        let simple = index.columns.iter().all(|c| c.as_column().is_some());
        let attrs = index
            .columns
            .iter()
            .flat_map(|c| c.columns.iter())
            .filter(|c| c.scope.is_none())
            .map(|c| AttributePath::name(&c.name))
            .collect();
        let definition = (!simple).then(|| {
            index
                .columns
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        });
        entity.indexes.push(Index {
            name: name_of(&index.name),
            attrs,
            unique: index.unique,
            partial: index.predicate.as_ref().map(|p| p.text.clone()),
            definition,
            doc: None,
        });
        self.db.entities[i] = entity;
    }

    fn create_type(&mut self, create: &CreateType) {
        let id = create.name.entity_ref();
        let mut typ = Type {
            namespace: id.namespace,
            name: id.entity,
            ..Type::default()
        };
        match &create.definition {
            TypeDefinition::Enum(values) => typ.values = Some(values.clone()),
            TypeDefinition::Composite(columns) => {
                let fields: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} {}", c.name.value, normalize_type(&c.data_type.text, self.dialect)))
                    .collect();
                typ.definition = Some(fields.join(", "));
            }
            TypeDefinition::Shell => {}
        }
        self.db.types.push(typ);
    }

    fn comment_on(&mut self, comment: &CommentOn) {
        match &comment.target {
            CommentTarget::Table(name) => {
                let id = name.entity_ref();
                if let Some((i, mut entity)) = self.take_entity(&id, name.position()) {
                    entity.doc = comment.text.clone();
                    self.db.entities[i] = entity;
                }
            }
            CommentTarget::Column(name) => {
                let Some((id, column)) = name.split_column() else {
                    self.warn(
                        DiagnosticKind::UnknownAttribute,
                        format!("Column comment needs a table: {}", name),
                        name.position(),
                    );
                    return;
                };
                let path = AttributePath::name(column);
                if let Some((i, mut entity)) = self.take_entity(&id, name.position()) {
                    match entity.attribute_mut(&path) {
                        Some(attr) => attr.doc = comment.text.clone(),
                        None => self.warn(
                            DiagnosticKind::UnknownAttribute,
                            format!("Unknown column {}.{}", id, path),
                            name.position(),
                        ),
                    }
                    self.db.entities[i] = entity;
                }
            }
        }
    }

    fn finish(mut self) -> ParseResult<Database> {
        for (mut relation, position) in std::mem::take(&mut self.pending) {
            match self.db.entity(&relation.reference.entity) {
                Some(target) => {
                    if relation.reference.attrs.is_empty() {
                        relation.reference.attrs = match &target.pk {
                            Some(pk) => pk.attrs.clone(),
                            None => vec![AttributePath::name("id")],
                        };
                    }
                }
                None => {
                    // Kept as a dangling reference.
                    self.warn(
                        DiagnosticKind::UnknownEntity,
                        format!("Foreign key references unknown table {}", relation.reference.entity),
                        position,
                    );
                    if relation.reference.attrs.is_empty() {
                        relation.reference.attrs = vec![AttributePath::name("id")];
                    }
                }
            }
            self.db.relations.push(relation);
        }
        ParseResult::partial(self.db, self.diagnostics)
    }
}

/// An entity used by a query, with the attributes the query touches.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEntity {
    pub entity: EntityRef,
    pub alias: Option<String>,
    pub attributes: Vec<AttributePath>,
}

/// Entities referenced by a SELECT, aliases resolved to their tables.
/// Unscoped columns are attributed only when the query reads one table.
pub fn select_entities(select: &SelectStatement) -> Vec<QueryEntity> {
    let mut entities: Vec<QueryEntity> = select
        .tables
        .iter()
        .chain(select.joins.iter().map(|j| &j.table))
        .map(|t| QueryEntity {
            entity: t.name.entity_ref(),
            alias: name_of(&t.alias),
            attributes: Vec::new(),
        })
        .collect();

    let mut used: Vec<(Option<String>, String)> = Vec::new();
    for field in &select.fields {
        if let SelectField::Expr { scope, expression, .. } = field {
            for column in &expression.columns {
                let scope = column.scope.clone().or_else(|| name_of(scope));
                used.push((scope, column.name.clone()));
            }
        }
    }
    let clauses = select
        .joins
        .iter()
        .filter_map(|j| j.on.as_ref())
        .chain(select.where_clause.as_ref())
        .chain(select.group_by.iter())
        .chain(select.having.as_ref())
        .chain(select.order_by.iter().map(|o| &o.expression));
    for expression in clauses {
        for column in &expression.columns {
            used.push((column.scope.clone(), column.name.clone()));
        }
    }

    let single = entities.len() == 1;
    for (scope, name) in used {
        let target = match scope.as_deref() {
            Some(scope) => entities.iter_mut().find(|e| match &e.alias {
                Some(alias) => alias == scope,
                None => e.entity.entity == scope,
            }),
            None if single => entities.first_mut(),
            None => None,
        };
        if let Some(entity) = target {
            let path = AttributePath::name(name);
            if !entity.attributes.contains(&path) {
                entity.attributes.push(path);
            }
        }
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Level;
    use crate::id::Namespace;
    use crate::sql::parser::parse_statements;

    fn import_sql(sql: &str) -> ParseResult<Database> {
        parse_statements(sql).and_then(|statements| import(&statements, SqlDialect::PostgreSQL))
    }

    #[test]
    fn test_import_tables_and_foreign_keys() {
        let result = import_sql(
            "CREATE TABLE users (id int4 PRIMARY KEY, email varchar(255) NOT NULL UNIQUE);
             CREATE TABLE posts (
               id serial,
               author_id int REFERENCES users ON DELETE CASCADE,
               title text,
               PRIMARY KEY (id)
             );",
        );
        assert!(result.is_clean(), "{:?}", result.diagnostics);
        let db = result.into_value().unwrap_or_default();
        assert_eq!(db.entities.len(), 2);
        let users = &db.entities[0];
        assert_eq!(users.attrs[0].typ, "int");
        assert!(!users.attrs[0].null);
        assert!(!users.attrs[1].null);
        assert!(users.indexes[0].unique);
        let posts = &db.entities[1];
        assert_eq!(posts.pk.as_ref().map(|pk| pk.attrs.clone()), Some(vec![AttributePath::name("id")]));
        assert!(posts.attrs[2].null);
        assert_eq!(db.relations.len(), 1);
        let rel = &db.relations[0];
        assert_eq!(rel.src.entity, EntityRef::named("posts"));
        assert_eq!(rel.reference.attrs, vec![AttributePath::name("id")]);
        assert_eq!(rel.on_delete.as_deref(), Some("cascade"));
    }

    #[test]
    fn test_dangling_foreign_key_is_a_warning() {
        let result = import_sql("CREATE TABLE posts (author_id int REFERENCES people(id));");
        let warnings: Vec<_> = result.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, DiagnosticKind::UnknownEntity);
        assert_eq!(result.value().map(|db| db.relations.len()), Some(1));
    }

    #[test]
    fn test_alter_index_type_and_comments() {
        let result = import_sql(
            "CREATE TABLE public.users (id int, email text, mood mood);
             ALTER TABLE public.users ADD CONSTRAINT users_pk PRIMARY KEY (id);
             CREATE UNIQUE INDEX users_email_idx ON public.users (email) WHERE email IS NOT NULL;
             CREATE TYPE public.mood AS ENUM ('sad', 'happy');
             COMMENT ON TABLE public.users IS 'people';
             COMMENT ON COLUMN public.users.email IS 'login';
             INSERT INTO public.users VALUES (1, 'a', 'sad');",
        );
        assert!(!result.has_errors());
        let infos: Vec<_> = result.diagnostics.iter().filter(|d| d.level == Level::Info).collect();
        assert_eq!(infos.len(), 1);
        let db = result.into_value().unwrap_or_default();
        let users = &db.entities[0];
        assert_eq!(users.namespace, Namespace::schema("public"));
        assert_eq!(users.pk.as_ref().and_then(|pk| pk.name.as_deref()), Some("users_pk"));
        assert_eq!(users.indexes[0].partial.as_deref(), Some("email IS NOT NULL"));
        assert_eq!(users.doc.as_deref(), Some("people"));
        assert_eq!(users.attrs[1].doc.as_deref(), Some("login"));
        assert_eq!(db.types[0].values, Some(vec!["sad".to_string(), "happy".to_string()]));
    }

    #[test]
    fn test_generated_and_checks() {
        let db = import_sql(
            "CREATE TABLE items (price int CHECK (price > 0), qty int, total int GENERATED ALWAYS AS (price * qty) STORED, CHECK (qty >= 0));",
        )
        .into_value()
        .unwrap_or_default();
        let items = &db.entities[0];
        assert!(items.attrs[2].generated);
        assert_eq!(items.attrs[2].default.as_deref(), Some("price * qty"));
        assert_eq!(items.checks.len(), 2);
        assert_eq!(items.checks[1].attrs, vec![AttributePath::name("qty")]);
    }

    fn select(sql: &str) -> SelectStatement {
        match parse_statements(sql).into_value().unwrap_or_default().into_iter().next() {
            Some(Statement::Select(select)) => *select,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_select_entities_unscoped() {
        let entities = select_entities(&select("SELECT id, name FROM users;"));
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity, EntityRef::named("users"));
        assert_eq!(entities[0].attributes, vec![AttributePath::name("id"), AttributePath::name("name")]);
    }

    #[test]
    fn test_select_entities_resolves_aliases() {
        let entities = select_entities(&select(
            "SELECT u.id, p.title FROM public.users u JOIN posts p ON p.author_id = u.id;",
        ));
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity.to_string(), "public.users");
        assert_eq!(entities[0].alias.as_deref(), Some("u"));
        assert_eq!(entities[0].attributes, vec![AttributePath::name("id")]);
        assert_eq!(
            entities[1].attributes,
            vec![AttributePath::name("title"), AttributePath::name("author_id")]
        );
    }
}
