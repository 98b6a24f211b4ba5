mod common;

use common::{bar, foo, open_session, Bar, Foo};
use tessera_orm::criteria::{and, between, eq, gt, is_in, is_null, like, lt, ne, not, or};
use tessera_orm::{Lazy, OrmError, Order, Session, SqliteSession};

/// Foos 1 to 10; even ids are named "x", odd ones "y", and score equals id
fn seeded() -> SqliteSession {
    let mut session = open_session();
    for i in 1..=10 {
        let name = if i % 2 == 0 { "x" } else { "y" };
        session.save(&mut foo(name, f64::from(i))).unwrap();
    }
    session
}

fn ids(foos: &[Foo]) -> Vec<i32> {
    foos.iter().map(|f| f.id).collect()
}

#[test]
fn test_filter_order_and_limit() {
    let mut session = seeded();
    let foos = session
        .criteria::<Foo>()
        .add(eq("name", "x"))
        .add(gt("id", 0))
        .order_by(Order::desc("id"))
        .limit(3)
        .list()
        .unwrap();
    assert_eq!(ids(&foos), [10, 8, 6]);
}

#[test]
fn test_count_ignores_order_and_paging() {
    let mut session = seeded();
    let count = session
        .criteria::<Foo>()
        .add(eq("name", "x"))
        .order_by(Order::asc("score"))
        .limit(2)
        .offset(1)
        .count()
        .unwrap();
    assert_eq!(count, 5);
    assert_eq!(session.criteria::<Foo>().count().unwrap(), 10);
}

#[test]
fn test_unique_result() {
    let mut session = seeded();
    let found = session
        .criteria::<Foo>()
        .add(eq("id", 4))
        .unique()
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "x");

    assert!(session
        .criteria::<Foo>()
        .add(eq("name", "z"))
        .unique()
        .unwrap()
        .is_none());

    let err = session
        .criteria::<Foo>()
        .add(eq("name", "y"))
        .unique()
        .unwrap_err();
    assert!(matches!(err, OrmError::NonUniqueResult(5)), "{err:?}");
}

#[test]
fn test_range_membership_and_patterns() {
    let mut session = seeded();
    let ranged = session
        .criteria::<Foo>()
        .add(between("score", 3.0, 5.0))
        .order_by(Order::asc("id"))
        .list()
        .unwrap();
    assert_eq!(ids(&ranged), [3, 4, 5]);

    let listed = session
        .criteria::<Foo>()
        .add(is_in("id", [2, 7, 42]))
        .order_by(Order::asc("id"))
        .list()
        .unwrap();
    assert_eq!(ids(&listed), [2, 7]);

    assert_eq!(
        session.criteria::<Foo>().add(like("name", "%x%")).count().unwrap(),
        5
    );
    assert_eq!(
        session.criteria::<Foo>().add(eq("name", "X")).count().unwrap(),
        0
    );
    assert_eq!(
        session
            .criteria::<Foo>()
            .add(eq("name", "X").ignore_case())
            .count()
            .unwrap(),
        5
    );
}

#[test]
fn test_logical_combinations() {
    let mut session = seeded();
    let foos = session
        .criteria::<Foo>()
        .add(or(lt("id", 3), gt("id", 8)))
        .add(not(eq("name", "y")))
        .order_by(Order::asc("id"))
        .list()
        .unwrap();
    assert_eq!(ids(&foos), [2, 10]);

    let both = session
        .criteria::<Foo>()
        .add(and(ne("name", "x"), lt("score", 4.0)))
        .count()
        .unwrap();
    assert_eq!(both, 2);
}

#[test]
fn test_offset_paging() {
    let mut session = seeded();
    let page = session
        .criteria::<Foo>()
        .order_by(Order::asc("id"))
        .limit(3)
        .offset(3)
        .list()
        .unwrap();
    assert_eq!(ids(&page), [4, 5, 6]);

    // An offset alone skips rows without capping the result
    let rest = session
        .criteria::<Foo>()
        .order_by(Order::asc("id"))
        .offset(8)
        .list()
        .unwrap();
    assert_eq!(ids(&rest), [9, 10]);

    // Negative paging values are ignored
    let all = session.criteria::<Foo>().limit(-1).offset(-4).list().unwrap();
    assert_eq!(all.len(), 10);
}

#[test]
fn test_association_criteria() {
    let mut session = seeded();
    let mut tagged = foo("tagged", 0.0);
    tagged.bars = Lazy::loaded(vec![bar("red"), bar("blue")]);
    session.save(&mut tagged).unwrap();

    let mut other = foo("other", 0.0);
    other.bars = Lazy::loaded(vec![bar("green")]);
    session.save(&mut other).unwrap();

    let found = session
        .criteria::<Foo>()
        .create_criteria("bars", |bars| bars.add(eq("code", "red")))
        .list()
        .unwrap();
    assert_eq!(ids(&found), [tagged.id]);

    let bars = session
        .criteria::<Bar>()
        .create_criteria("foos", |foos| foos.add(eq("name", "other")))
        .list()
        .unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].code, "green");

    let ownerless = session
        .criteria::<Bar>()
        .add(is_null("owner"))
        .count()
        .unwrap();
    assert_eq!(ownerless, 3);
}

#[test]
fn test_unknown_field_is_rejected() {
    let mut session = seeded();
    let err = session
        .criteria::<Foo>()
        .add(eq("colour", "red"))
        .list()
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)), "{err:?}");

    // Collections have no column of their own
    let err = session.criteria::<Foo>().add(is_null("bars")).to_sql().unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)), "{err:?}");
}

#[test]
fn test_rendered_sql() {
    let mut session = open_session();
    let sql = session
        .criteria::<Foo>()
        .add(eq("name", "x"))
        .order_by(Order::desc("id"))
        .limit(5)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM foo WHERE name = 'x' ORDER BY id DESC LIMIT 5"
    );
}
