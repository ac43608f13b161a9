use corvid_catalog::{ColumnDef, IndexDef, KvEngine, MemKv, PrimaryKey, Range, TableDef};
use corvid_row::{ColumnBuffer, Row};
use corvid_value::{Type, Value};

fn foo_table() -> TableDef {
    TableDef::new(
        "foo",
        vec![
            ColumnDef {
                name: "k".into(),
                ty: Type::Integer,
                nullable: false,
                default: None,
                check: None,
            },
            ColumnDef {
                name: "a".into(),
                ty: Type::Integer,
                nullable: true,
                default: None,
                check: None,
            },
        ],
        Some(PrimaryKey {
            columns: vec!["k".into()],
            desc: vec![false],
        }),
    )
}

fn row(k: i32, a: i32) -> Row {
    let mut buf = ColumnBuffer::new();
    buf.add("k", Value::Integer(k));
    buf.add("a", Value::Integer(a));
    Row::from_buffer(buf)
}

#[test]
fn insert_and_full_scan_round_trip() {
    let table = foo_table();
    let mut kv = MemKv::new();
    for (k, a) in [(1, 10), (2, 20), (3, 30)] {
        table.insert(&mut kv, row(k, a)).unwrap();
    }
    let rows: Vec<_> = table.scan(&kv, &Vec::new(), false).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 3);
    for (_, r) in &rows {
        assert!(matches!(r.get("a").unwrap(), Value::Integer(_)));
    }
}

#[test]
fn exact_range_scan_returns_matching_row() {
    let table = foo_table();
    let mut kv = MemKv::new();
    for (k, a) in [(1, 10), (2, 20), (3, 30)] {
        table.insert(&mut kv, row(k, a)).unwrap();
    }
    let ranges = vec![Range::eq(vec!["k".into()], vec![Value::Integer(2)])];
    let rows: Vec<_> = table.scan(&kv, &ranges, false).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0].1.get("a").unwrap(), Value::Integer(20)));
}

#[test]
fn generate_key_without_primary_key_assigns_rowid() {
    let table = TableDef::new(
        "bar",
        vec![ColumnDef {
            name: "x".into(),
            ty: Type::Integer,
            nullable: true,
            default: None,
            check: None,
        }],
        None,
    );
    let mut kv = MemKv::new();
    let mut buf = ColumnBuffer::new();
    buf.add("x", Value::Integer(1));
    let r1 = table.insert(&mut kv, Row::from_buffer(buf.clone())).unwrap();
    let r2 = table.insert(&mut kv, Row::from_buffer(buf)).unwrap();
    assert_ne!(r1.key(), r2.key());
}

#[test]
fn not_null_violation_is_rejected() {
    let table = foo_table();
    let mut buf = ColumnBuffer::new();
    buf.add("k", Value::Null);
    buf.add("a", Value::Integer(1));
    assert!(table.validate_row(Row::from_buffer(buf)).is_err());
}

#[test]
fn index_scan_dereferences_through_table() {
    let table = foo_table();
    let index = IndexDef {
        name: "idx_foo_a".into(),
        table: "foo".into(),
        columns: vec!["a".into()],
        desc: vec![false],
        unique: false,
    };
    let mut kv = MemKv::new();
    for (k, a) in [(1, 10), (2, 20)] {
        let r = table.insert(&mut kv, row(k, a)).unwrap();
        index.put_entry(&mut kv, &[Value::Integer(a)], r.key().unwrap()).unwrap();
    }
    let ranges = vec![Range::eq(vec!["a".into()], vec![Value::Integer(20)])];
    let keys: Vec<_> = index.scan(&kv, &ranges, false).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(keys.len(), 1);
    let found = table.get_by_key(&kv, &keys[0]).unwrap().unwrap();
    assert!(matches!(found.get("k").unwrap(), Value::Integer(2)));
}

#[test]
fn transient_namespace_allocate_and_drop() {
    let mut kv = MemKv::new();
    let ns = kv.allocate_transient_namespace().unwrap();
    kv.put(&ns, b"x", b"y").unwrap();
    assert_eq!(kv.get(&ns, b"x").unwrap(), Some(b"y".to_vec()));
    kv.drop_namespace(&ns).unwrap();
    assert_eq!(kv.get(&ns, b"x").unwrap(), None);
}
