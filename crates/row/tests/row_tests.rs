use std::sync::Arc;

use corvid_row::{ColumnBuffer, ColumnSpec, EncodedRow, Row, RowSchema};
use corvid_value::{Type, Value};

#[test]
fn column_buffer_duplicate_names_keep_first() {
    let mut buf = ColumnBuffer::new();
    buf.add("a", Value::Integer(1));
    buf.add("a", Value::Integer(2));
    assert_eq!(buf.get("a").unwrap().type_name(), "INTEGER");
    match buf.get("a").unwrap() {
        Value::Integer(1) => {}
        other => panic!("expected first entry, got {other:?}"),
    }
}

#[test]
fn column_buffer_missing_column_errors() {
    let buf = ColumnBuffer::new();
    assert!(buf.get("missing").is_err());
}

#[test]
fn encoded_row_decodes_lazily_in_order() {
    let schema = Arc::new(RowSchema::new(vec![
        ColumnSpec {
            name: "k".into(),
            ty: Type::Integer,
            nullable: false,
        },
        ColumnSpec {
            name: "name".into(),
            ty: Type::Text,
            nullable: true,
        },
    ]));
    let mut bytes = Vec::new();
    Value::Integer(7).encode(&mut bytes).unwrap();
    Value::Text("hi".into()).encode(&mut bytes).unwrap();
    let encoded = EncodedRow::new(schema, Arc::from(bytes.into_boxed_slice()));

    assert!(matches!(encoded.get("name").unwrap(), Value::Text(ref s) if s == "hi"));
    assert!(matches!(encoded.get("k").unwrap(), Value::Integer(7)));

    let buf = encoded.to_column_buffer().unwrap();
    assert_eq!(buf.len(), 2);
}

#[test]
fn row_is_backing_agnostic() {
    let mut buf = ColumnBuffer::new();
    buf.add("x", Value::Integer(1));
    let row = Row::from_buffer(buf).with_table_name("t").with_key(vec![1, 2, 3]);
    assert_eq!(row.table_name(), Some("t"));
    assert_eq!(row.key(), Some(&vec![1, 2, 3]));
    assert!(matches!(row.get("x").unwrap(), Value::Integer(1)));
}
