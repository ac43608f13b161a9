use std::cell::RefCell;

use corvid_catalog::{Catalog, ColumnDef, IndexDef, KvEngine, MemKv, PrimaryKey, TableDef};
use corvid_core::{Engine, TxMode};
use corvid_expr::{AggregateKind, BinaryOp, ColumnRef, Expr, Params};
use corvid_plan::{AggregateSpec, Operator, StreamIterator};
use corvid_row::{ColumnBuffer, Row};
use corvid_value::{Type, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn widgets_table() -> TableDef {
    TableDef::new(
        "widgets",
        vec![
            ColumnDef {
                name: "id".into(),
                ty: Type::Integer,
                nullable: false,
                default: None,
                check: None,
            },
            ColumnDef {
                name: "category".into(),
                ty: Type::Text,
                nullable: true,
                default: None,
                check: None,
            },
            ColumnDef {
                name: "price".into(),
                ty: Type::Integer,
                nullable: true,
                default: None,
                check: None,
            },
        ],
        Some(PrimaryKey {
            columns: vec!["id".into()],
            desc: vec![false],
        }),
    )
}

fn row(id: i32, category: Option<&str>, price: Option<i32>) -> Row {
    let mut buf = ColumnBuffer::new();
    buf.add("id", Value::Integer(id));
    buf.add(
        "category",
        category.map(|c| Value::Text(c.to_string())).unwrap_or(Value::Null),
    );
    buf.add("price", price.map(Value::Integer).unwrap_or(Value::Null));
    Row::from_buffer(buf)
}

fn col(name: &str) -> Expr {
    Expr::Column(ColumnRef::new(name))
}

fn drain(mut it: Box<dyn StreamIterator + '_>) -> Vec<Row> {
    let mut out = Vec::new();
    while it.next().unwrap() {
        out.push(it.row().unwrap());
    }
    it.close().unwrap();
    out
}

// End-to-end S1: the facade's `optimize` rewrites a filter into an index
// scan and `open` executes it, not just rewrites the tree in isolation.
#[test]
fn engine_optimizes_and_executes_an_index_scan() {
    let def = widgets_table();
    let mut kv = MemKv::new();
    for (id, cat, price) in [(1, "a", 10), (2, "b", 20), (3, "a", 30)] {
        def.insert(&mut kv, row(id, Some(cat), Some(price))).unwrap();
    }
    let mut catalog = Catalog::new();
    catalog.add_table(def);
    catalog.add_index(IndexDef {
        name: "idx_category".into(),
        table: "widgets".into(),
        columns: vec!["category".into()],
        desc: vec![false],
        unique: false,
    });

    let engine = Engine::new(catalog);
    let params = Params::default();

    let scan = Operator::TableScan {
        table: "widgets".into(),
        ranges: Vec::new(),
        reverse: false,
    };
    let stream = Operator::Filter {
        prev: Box::new(scan),
        expr: Expr::BinaryOp {
            op: BinaryOp::Eq,
            lhs: Box::new(col("category")),
            rhs: Box::new(Expr::Literal(Value::Text("a".into()))),
        },
    };

    let optimized = engine.optimize(stream, &params).unwrap();
    assert!(optimized.to_text().starts_with("IndexScan(idx_category"));

    let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
    let tx = TxMode::ReadOnly(&kv_cell);
    let rows = drain(engine.open(&optimized, tx, &params).unwrap());
    assert_eq!(rows.len(), 2);
    for r in &rows {
        assert!(matches!(r.get("category").unwrap(), Value::Text(c) if c == "a"));
    }
}

// S5: aggregating an empty table still emits one synthetic row (spec §4.3),
// exercised here through the full facade rather than a bare Operator tree.
#[test]
fn engine_aggregate_over_empty_table_emits_synthetic_row() {
    let def = widgets_table();
    let mut kv = MemKv::new();
    let mut catalog = Catalog::new();
    catalog.add_table(def);

    let engine = Engine::new(catalog);
    let params = Params::default();

    let scan = Operator::TableScan {
        table: "widgets".into(),
        ranges: Vec::new(),
        reverse: false,
    };
    let stream = Operator::GroupAggregate {
        prev: Box::new(scan),
        group_by: None,
        aggregates: vec![AggregateSpec {
            output_name: "n".into(),
            kind: AggregateKind::Count { star: true },
            input: Expr::Literal(Value::Null),
        }],
    };

    let optimized = engine.optimize(stream, &params).unwrap();
    let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
    let tx = TxMode::ReadOnly(&kv_cell);
    let rows = drain(engine.open(&optimized, tx, &params).unwrap());
    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0].get("n").unwrap(), Value::BigInt(0) | Value::Integer(0)));
}

// S6: TempTreeSort orders NULLs first, driven through the facade.
#[test]
fn engine_sort_orders_nulls_first() {
    let def = widgets_table();
    let mut kv = MemKv::new();
    for (id, price) in [(1, Some(30)), (2, None), (3, Some(10))] {
        def.insert(&mut kv, row(id, Some("a"), price)).unwrap();
    }
    let mut catalog = Catalog::new();
    catalog.add_table(def);

    let engine = Engine::new(catalog);
    let params = Params::default();

    let scan = Operator::TableScan {
        table: "widgets".into(),
        ranges: Vec::new(),
        reverse: false,
    };
    let stream = Operator::TempTreeSort {
        prev: Box::new(scan),
        expr: col("price"),
        desc: false,
    };

    let optimized = engine.optimize(stream, &params).unwrap();
    let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
    let tx = TxMode::ReadOnly(&kv_cell);
    let rows = drain(engine.open(&optimized, tx, &params).unwrap());
    let prices: Vec<Value> = rows.iter().map(|r| r.get("price").unwrap()).collect();
    assert!(matches!(prices[0], Value::Null));
    assert!(matches!(prices[1], Value::Integer(10)));
    assert!(matches!(prices[2], Value::Integer(30)));
}

// Property 7: closing an iterator releases its resources even when driven
// through the facade rather than directly through `corvid_plan::open`.
#[test]
fn engine_close_is_idempotent_and_releases_sort_namespace() {
    let def = widgets_table();
    let mut kv = MemKv::new();
    def.insert(&mut kv, row(1, Some("a"), Some(10))).unwrap();
    let mut catalog = Catalog::new();
    catalog.add_table(def);

    let engine = Engine::new(catalog);
    let params = Params::default();
    let stream = Operator::TempTreeSort {
        prev: Box::new(Operator::TableScan {
            table: "widgets".into(),
            ranges: Vec::new(),
            reverse: false,
        }),
        expr: col("price"),
        desc: false,
    };
    let optimized = engine.optimize(stream, &params).unwrap();

    let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
    let tx = TxMode::ReadOnly(&kv_cell);
    let mut it = engine.open(&optimized, tx, &params).unwrap();
    while it.next().unwrap() {}
    it.close().unwrap();
    it.close().unwrap();
}

// A read-only transaction must not be able to drive a write-rooted stream;
// the facade rejects it before any KV access happens.
#[test]
fn read_only_tx_rejects_a_write_statement() {
    let def = widgets_table();
    let mut kv = MemKv::new();
    let mut catalog = Catalog::new();
    catalog.add_table(def);

    let engine = Engine::new(catalog);
    let params = Params::default();
    let stream = Operator::Insert {
        prev: Box::new(Operator::Emit {
            columns: vec!["id".into(), "category".into(), "price".into()],
            rows: vec![vec![
                Expr::Literal(Value::Integer(1)),
                Expr::Literal(Value::Text("a".into())),
                Expr::Literal(Value::Integer(10)),
            ]],
        }),
        table: "widgets".into(),
    };
    let optimized = engine.optimize(stream, &params).unwrap();

    let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
    let tx = TxMode::ReadOnly(&kv_cell);
    assert!(engine.open(&optimized, tx, &params).is_err());
}

fn ids_of(rows: &[Row]) -> Vec<i32> {
    let mut ids: Vec<i32> = rows
        .iter()
        .map(|r| match r.get("id").unwrap() {
            Value::Integer(i) => i,
            _ => panic!("expected integer id"),
        })
        .collect();
    ids.sort();
    ids
}

proptest! {
    // Property 5 (spec §8): for any table/filter, the rows produced by
    // `TableScan | Filter` are the same multiset as the rows produced by
    // `IndexScan(chosen) | Filter(residual)` after `SelectIndex` — asserted
    // here through the full facade (catalog, optimizer, execution) rather
    // than by inspecting the rewritten tree in isolation.
    #[test]
    fn select_index_preserves_row_set(
        categories in proptest::collection::vec(0..3i32, 1..12),
        threshold in 0..3i32,
    ) {
        let def = widgets_table();
        let mut kv = MemKv::new();
        for (id, cat) in categories.iter().enumerate() {
            let cat_str = cat.to_string();
            def.insert(&mut kv, row(id as i32, Some(&cat_str), Some(*cat))).unwrap();
        }
        let mut catalog = Catalog::new();
        catalog.add_table(def);
        catalog.add_index(IndexDef {
            name: "idx_category".into(),
            table: "widgets".into(),
            columns: vec!["category".into()],
            desc: vec![false],
            unique: false,
        });

        let engine = Engine::new(catalog);
        let params = Params::default();
        let filter_expr = Expr::BinaryOp {
            op: BinaryOp::Eq,
            lhs: Box::new(col("category")),
            rhs: Box::new(Expr::Literal(Value::Text(threshold.to_string()))),
        };

        let unoptimized = Operator::Filter {
            prev: Box::new(Operator::TableScan { table: "widgets".into(), ranges: Vec::new(), reverse: false }),
            expr: filter_expr.clone(),
        };
        let optimized = engine.optimize(
            Operator::Filter {
                prev: Box::new(Operator::TableScan { table: "widgets".into(), ranges: Vec::new(), reverse: false }),
                expr: filter_expr,
            },
            &params,
        ).unwrap();

        let kv_cell = RefCell::new(&mut kv as &mut dyn KvEngine);
        let baseline_rows = ids_of(&drain(engine.open(&unoptimized, TxMode::ReadOnly(&kv_cell), &params).unwrap()));
        let optimized_rows = ids_of(&drain(engine.open(&optimized, TxMode::ReadOnly(&kv_cell), &params).unwrap()));
        prop_assert_eq!(baseline_rows, optimized_rows);
    }
}
