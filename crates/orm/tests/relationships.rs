mod common;

use common::{bar, foo, open_session, Bar, Book, Carton, Document, Folder, Foo, Item, Owner, Passport, Person, Shelf};
use tessera_orm::backends::RowReader;
use tessera_orm::{Lazy, OrmError, Session, SqliteSession};

fn count(session: &mut SqliteSession, sql: &str) -> i64 {
    session.query_rows(sql).unwrap()[0].get_long(0).unwrap()
}

fn codes(bars: &[Bar]) -> Vec<String> {
    let mut codes: Vec<_> = bars.iter().map(|b| b.code.clone()).collect();
    codes.sort();
    codes
}

#[test]
fn test_many_to_many_is_visible_from_both_sides() {
    let mut session = open_session();
    let mut model = foo("hub", 0.0);
    model.bars = Lazy::loaded(vec![bar("b1"), bar("b2")]);
    session.save(&mut model).unwrap();

    let saved = model.bars.peek().unwrap();
    assert!(saved.iter().all(|b| b.id > 0));
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar_foo"), 2);

    session.recycle_cache();
    let loaded: Foo = session.load(model.id).unwrap().unwrap();
    assert_eq!(codes(loaded.bars.get().unwrap()), ["b1", "b2"]);

    let other: Bar = session.load(saved[1].id).unwrap().unwrap();
    let foos = other.foos.get().unwrap();
    assert_eq!(foos.len(), 1);
    assert_eq!(foos[0].name, "hub");
}

#[test]
fn test_update_removes_stale_join_rows() {
    let mut session = open_session();
    let mut model = foo("hub", 0.0);
    model.bars = Lazy::loaded(vec![bar("keep"), bar("drop")]);
    session.save(&mut model).unwrap();

    let kept: Vec<Bar> = model
        .bars
        .peek()
        .unwrap()
        .iter()
        .filter(|b| b.code == "keep")
        .cloned()
        .collect();
    model.bars.set(kept);
    assert!(session.update(&mut model).unwrap());

    assert_eq!(count(&mut session, "SELECT count(*) FROM bar_foo"), 1);
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar"), 2);
    session.recycle_cache();
    let loaded: Foo = session.load(model.id).unwrap().unwrap();
    assert_eq!(codes(loaded.bars.get().unwrap()), ["keep"]);
}

#[test]
fn test_delete_removes_join_rows_but_keeps_relatives() {
    let mut session = open_session();
    let mut model = foo("hub", 0.0);
    model.bars = Lazy::loaded(vec![bar("b1"), bar("b2")]);
    session.save(&mut model).unwrap();

    assert!(session.delete(&model).unwrap());
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar_foo"), 0);
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar"), 2);
}

#[test]
fn test_one_to_many_sets_and_clears_foreign_keys() {
    let mut session = open_session();
    let mut owner = Owner {
        label: Some("acme".into()),
        bars: Lazy::loaded(vec![bar("first"), bar("second")]),
        ..Default::default()
    };
    session.save(&mut owner).unwrap();
    let sql = format!("SELECT count(*) FROM bar WHERE owner_id = {}", owner.id);
    assert_eq!(count(&mut session, &sql), 2);

    session.recycle_cache();
    let second_id = owner.bars.peek().unwrap()[1].id;
    let child: Bar = session.load(second_id).unwrap().unwrap();
    let parent = child.owner.get().unwrap().as_ref().unwrap();
    assert_eq!(parent.label.as_deref(), Some("acme"));

    owner.bars.get_mut().unwrap().truncate(1);
    assert!(session.update(&mut owner).unwrap());
    assert_eq!(count(&mut session, &sql), 1);
    let orphaned = format!("SELECT count(*) FROM bar WHERE id = {} AND owner_id IS NULL", second_id);
    assert_eq!(count(&mut session, &orphaned), 1);

    assert!(session.delete(&owner).unwrap());
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar WHERE owner_id IS NOT NULL"), 0);
    assert_eq!(count(&mut session, "SELECT count(*) FROM bar"), 2);
}

#[test]
fn test_many_to_one_is_written_from_the_owning_side() {
    let mut session = open_session();
    let mut child = bar("solo");
    child.owner = Lazy::loaded(Some(Owner {
        label: Some("parent".into()),
        ..Default::default()
    }));
    session.save(&mut child).unwrap();

    let owner_id = child.owner.peek().unwrap().as_ref().unwrap().id;
    assert!(owner_id > 0);

    session.recycle_cache();
    let owner: Owner = session.load(owner_id).unwrap().unwrap();
    assert_eq!(codes(owner.bars.get().unwrap()), ["solo"]);
}

#[test]
fn test_unresolved_relationship_leaves_foreign_key_alone() {
    let mut session = open_session();
    let mut owner = Owner {
        bars: Lazy::loaded(vec![bar("child")]),
        ..Default::default()
    };
    session.save(&mut owner).unwrap();
    session.recycle_cache();

    let loaded: Owner = session.load(owner.id).unwrap().unwrap();
    let mut child = loaded.bars.get().unwrap()[0].clone();
    // Reached through its owner, so the way back is deferred
    assert!(!child.owner.is_loaded());

    child.code = "renamed".into();
    assert!(session.update(&mut child).unwrap());
    let sql = format!("SELECT count(*) FROM bar WHERE owner_id = {}", owner.id);
    assert_eq!(count(&mut session, &sql), 1);
}

#[test]
fn test_one_to_one_from_either_side() {
    let mut session = open_session();
    let mut person = Person {
        name: "Ada".into(),
        passport: Lazy::loaded(Some(Passport {
            number: "P-1".into(),
            ..Default::default()
        })),
        ..Default::default()
    };
    session.save(&mut person).unwrap();
    let passport_id = person.passport.peek().unwrap().as_ref().unwrap().id;
    assert!(passport_id > 0);

    session.recycle_cache();
    let passport: Passport = session.load(passport_id).unwrap().unwrap();
    let holder = passport.person.get().unwrap().as_ref().unwrap();
    assert_eq!(holder.name, "Ada");

    // Written from the inverse side
    let mut passport = Passport {
        number: "P-2".into(),
        person: Lazy::loaded(Some(Person {
            name: "Grace".into(),
            ..Default::default()
        })),
        ..Default::default()
    };
    session.save(&mut passport).unwrap();
    let person_id = passport.person.peek().unwrap().as_ref().unwrap().id;

    session.recycle_cache();
    let grace: Person = session.load(person_id).unwrap().unwrap();
    let document = grace.passport.get().unwrap().as_ref().unwrap();
    assert_eq!(document.number, "P-2");
}

#[test]
fn test_keys_cascade_links_only_saved_relatives() {
    let mut session = open_session();
    let mut saved = Book {
        title: "Dune".into(),
        ..Default::default()
    };
    session.save(&mut saved).unwrap();

    let mut shelf = Shelf {
        name: "scifi".into(),
        books: Lazy::loaded(vec![
            saved.clone(),
            Book {
                title: "unsaved".into(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };
    session.save(&mut shelf).unwrap();

    assert_eq!(count(&mut session, "SELECT count(*) FROM book"), 1);
    let sql = format!("SELECT count(*) FROM book WHERE shelf_id = {}", shelf.id);
    assert_eq!(count(&mut session, &sql), 1);

    session.recycle_cache();
    let loaded: Shelf = session.load(shelf.id).unwrap().unwrap();
    let books = loaded.books.get().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title, "Dune");
}

#[test]
fn test_no_cascade_ignores_relatives() {
    let mut session = open_session();
    let mut carton = Carton {
        label: "fragile".into(),
        items: Lazy::loaded(vec![Item {
            name: "vase".into(),
            ..Default::default()
        }]),
        ..Default::default()
    };
    session.save(&mut carton).unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM item"), 0);

    let mut item = Item {
        name: "lamp".into(),
        ..Default::default()
    };
    session.save(&mut item).unwrap();
    carton.items = Lazy::loaded(vec![item]);
    session.update(&mut carton).unwrap();
    assert_eq!(count(&mut session, "SELECT count(*) FROM item WHERE carton_id IS NOT NULL"), 0);
}

#[test]
fn test_lazy_entity_defers_relationships() {
    let mut session = open_session();
    let mut folder = Folder {
        name: "inbox".into(),
        files: Lazy::loaded(vec![
            Document {
                title: "a".into(),
                ..Default::default()
            },
            Document {
                title: "b".into(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };
    session.save(&mut folder).unwrap();
    session.recycle_cache();

    let loaded: Folder = session.load(folder.id).unwrap().unwrap();
    assert!(!loaded.files.is_loaded());
    let mut titles: Vec<_> = loaded
        .files
        .get()
        .unwrap()
        .iter()
        .map(|d| d.title.clone())
        .collect();
    titles.sort();
    assert_eq!(titles, ["a", "b"]);
    assert!(loaded.files.is_loaded());
}

#[test]
fn test_deferred_relationship_fails_after_close() {
    let mut session = open_session();
    let mut folder = Folder {
        name: "outbox".into(),
        files: Lazy::loaded(vec![Document {
            title: "draft".into(),
            ..Default::default()
        }]),
        ..Default::default()
    };
    session.save(&mut folder).unwrap();
    session.recycle_cache();

    let loaded: Folder = session.load(folder.id).unwrap().unwrap();
    session.close();
    assert!(matches!(loaded.files.get(), Err(OrmError::SessionNotOpen)));

    session.open().unwrap();
    assert!(matches!(loaded.files.get(), Err(OrmError::SessionNotOpen)));
    assert!(!loaded.files.is_loaded());

    let reloaded: Folder = session.load(folder.id).unwrap().unwrap();
    assert_eq!(reloaded.files.get().unwrap().len(), 1);
}

#[test]
fn test_cycles_are_broken_by_deferral() {
    let mut session = open_session();
    let mut model = foo("hub", 0.0);
    model.bars = Lazy::loaded(vec![bar("spoke")]);
    session.save(&mut model).unwrap();
    session.recycle_cache();

    let spoke_id = model.bars.peek().unwrap()[0].id;
    let spoke: Bar = session.load(spoke_id).unwrap().unwrap();
    assert!(spoke.foos.is_loaded());
    let hub = &spoke.foos.get().unwrap()[0];
    assert!(!hub.bars.is_loaded());
    assert_eq!(codes(hub.bars.get().unwrap()), ["spoke"]);
}
