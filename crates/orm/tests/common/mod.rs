//! Models and session helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tessera_orm::{Cascade, Lazy, Model, ModelMapping, OrmConfig, OrmContext, Session, SqliteSession};

#[derive(Debug, Clone, Default)]
pub struct Foo {
    pub id: i32,
    pub name: String,
    pub score: f64,
    pub bars: Lazy<Vec<Bar>>,
}

impl Model for Foo {
    const NAME: &'static str = "Foo";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |f| &f.id, |f| &mut f.id)
            .primary_key()
            .autoincrement();
        m.field("name", |f| &f.name, |f| &mut f.name).not_null();
        m.field("score", |f| &f.score, |f| &mut f.score);
        m.relation("bars", |f| &f.bars, |f| &mut f.bars)
            .many_to_many();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bar {
    pub id: i64,
    pub code: String,
    pub foos: Lazy<Vec<Foo>>,
    pub owner: Lazy<Option<Owner>>,
}

impl Model for Bar {
    const NAME: &'static str = "Bar";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |b| &b.id, |b| &mut b.id);
        m.field("code", |b| &b.code, |b| &mut b.code).unique();
        m.relation("foos", |b| &b.foos, |b| &mut b.foos)
            .many_to_many();
        m.relation("owner", |b| &b.owner, |b| &mut b.owner);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Owner {
    pub id: i64,
    pub label: Option<String>,
    pub bars: Lazy<Vec<Bar>>,
}

impl Model for Owner {
    const NAME: &'static str = "Owner";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |o| &o.id, |o| &mut o.id);
        m.field("label", |o| &o.label, |o| &mut o.label);
        m.relation("bars", |o| &o.bars, |o| &mut o.bars);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub passport: Lazy<Option<Passport>>,
}

impl Model for Person {
    const NAME: &'static str = "Person";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |p| &p.id, |p| &mut p.id);
        m.field("name", |p| &p.name, |p| &mut p.name);
        m.relation("passport", |p| &p.passport, |p| &mut p.passport)
            .one_to_one();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Passport {
    pub id: i64,
    pub number: String,
    pub person: Lazy<Option<Person>>,
}

impl Model for Passport {
    const NAME: &'static str = "Passport";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |p| &p.id, |p| &mut p.id);
        m.field("number", |p| &p.number, |p| &mut p.number);
        m.relation("person", |p| &p.person, |p| &mut p.person)
            .one_to_one()
            .inverse();
    }
}

/// Relationships of a lazy entity resolve on first access
#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub files: Lazy<Vec<Document>>,
}

impl Model for Folder {
    const NAME: &'static str = "Folder";

    fn map(m: &mut ModelMapping<Self>) {
        m.lazy();
        m.field("id", |f| &f.id, |f| &mut f.id);
        m.field("name", |f| &f.name, |f| &mut f.name);
        m.relation("files", |f| &f.files, |f| &mut f.files);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub id: i64,
    pub title: String,
}

impl Model for Document {
    const NAME: &'static str = "Document";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |d| &d.id, |d| &mut d.id);
        m.field("title", |d| &d.title, |d| &mut d.title);
    }
}

/// Keys-only cascade
#[derive(Debug, Clone, Default)]
pub struct Shelf {
    pub id: i64,
    pub name: String,
    pub books: Lazy<Vec<Book>>,
}

impl Model for Shelf {
    const NAME: &'static str = "Shelf";

    fn map(m: &mut ModelMapping<Self>) {
        m.cascade(Cascade::Keys);
        m.field("id", |s| &s.id, |s| &mut s.id);
        m.field("name", |s| &s.name, |s| &mut s.name);
        m.relation("books", |s| &s.books, |s| &mut s.books);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Book {
    pub id: i64,
    pub title: String,
}

impl Model for Book {
    const NAME: &'static str = "Book";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |b| &b.id, |b| &mut b.id);
        m.field("title", |b| &b.title, |b| &mut b.title);
    }
}

/// No relationship persistence at all
#[derive(Debug, Clone, Default)]
pub struct Carton {
    pub id: i64,
    pub label: String,
    pub items: Lazy<Vec<Item>>,
}

impl Model for Carton {
    const NAME: &'static str = "Carton";

    fn map(m: &mut ModelMapping<Self>) {
        m.cascade(Cascade::None);
        m.field("id", |c| &c.id, |c| &mut c.id);
        m.field("label", |c| &c.label, |c| &mut c.label);
        m.relation("items", |c| &c.items, |c| &mut c.items);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

impl Model for Item {
    const NAME: &'static str = "Item";

    fn map(m: &mut ModelMapping<Self>) {
        m.field("id", |i| &i.id, |i| &mut i.id);
        m.field("name", |i| &i.name, |i| &mut i.name);
    }
}

pub fn context(config: OrmConfig) -> Arc<OrmContext> {
    OrmContext::builder()
        .config(config)
        .register::<Foo>()
        .register::<Bar>()
        .register::<Owner>()
        .register::<Person>()
        .register::<Passport>()
        .register::<Folder>()
        .register::<Document>()
        .register::<Shelf>()
        .register::<Book>()
        .register::<Carton>()
        .register::<Item>()
        .build()
        .expect("context")
}

/// An open session over a fresh in-memory database
pub fn open_session() -> SqliteSession {
    open_session_with(OrmConfig::in_memory())
}

pub fn open_session_with(config: OrmConfig) -> SqliteSession {
    let mut session = context(config).session().expect("session");
    session.open().expect("open");
    session
}

pub fn foo(name: &str, score: f64) -> Foo {
    Foo {
        name: name.to_string(),
        score,
        ..Default::default()
    }
}

pub fn bar(code: &str) -> Bar {
    Bar {
        code: code.to_string(),
        ..Default::default()
    }
}
