//! Scenario-level tests exercising the public API end to end, rather than
//! a single module in isolation.

use std::sync::Arc;

use data_types::{ColumnSchema, DataType, Value};
use read_buffer::aggregate::{aggregate, AggregateColumnDefinition, AggregateFunction};
use read_buffer::chunk::{Chunk, Segment};
use read_buffer::column::Column;
use read_buffer::filter::{Estimate, MinMaxFilter, RangeFilter, StatisticsObject};
use read_buffer::predicate::PredicateCondition;
use read_buffer::table::{InputTable, Table};

fn orders_table() -> Table {
    let schema = vec![
        ColumnSchema::new("region", DataType::String),
        ColumnSchema::new("amount", DataType::Int64),
    ];
    let schema_arc = Arc::new(schema.clone());

    let c0 = Chunk::new(
        schema_arc.clone(),
        vec![
            Segment::Value(Column::from(vec!["west", "east", "west"])),
            Segment::Value(Column::from(vec![10_i64, 20, 30])),
        ],
    );
    let c1 = Chunk::new(
        schema_arc,
        vec![
            Segment::Value(Column::from(vec!["east", "west"])),
            Segment::Value(Column::from(vec![5_i64, 15])),
        ],
    );
    Table::new(schema, vec![c0, c1])
}

#[test]
fn group_by_one_column_across_chunks() {
    let table = orders_table();
    let aggregates = vec![
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Sum),
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Max),
        AggregateColumnDefinition::new(None, AggregateFunction::CountStar),
    ];
    let out = aggregate(&table, &[0], &aggregates, None).unwrap();
    assert_eq!(out.rows(), 2);

    let mut totals = std::collections::HashMap::new();
    for row in 0..out.rows() {
        let region = match out.get("region", row).unwrap() {
            Value::String(s) => s.to_string(),
            _ => unreachable!(),
        };
        let sum = match out.get("amount_sum", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let max = match out.get("amount_max", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let count = match out.get("count_star", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        totals.insert(region, (sum, max, count));
    }

    assert_eq!(totals["west"], (55, 30, 3));
    assert_eq!(totals["east"], (25, 20, 2));
}

#[test]
fn nulls_are_skipped_by_sum_but_counted_by_count_star() {
    let schema = vec![ColumnSchema::new("g", DataType::Int64), ColumnSchema::new("v", DataType::Int64)];
    let schema_arc = Arc::new(schema.clone());
    let chunk = Chunk::new(
        schema_arc,
        vec![
            Segment::Value(Column::Int64(vec![Some(1), Some(1), Some(1)])),
            Segment::Value(Column::Int64(vec![Some(10), None, Some(20)])),
        ],
    );
    let table = Table::new(schema, vec![chunk]);

    let aggregates = vec![
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Sum),
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Count),
        AggregateColumnDefinition::new(None, AggregateFunction::CountStar),
    ];
    let out = aggregate(&table, &[0], &aggregates, None).unwrap();
    assert_eq!(out.rows(), 1);
    assert_eq!(out.get("v_sum", 0), Some(Value::I64(30)));
    assert_eq!(out.get("v_count", 0), Some(Value::I64(2)));
    assert_eq!(out.get("count_star", 0), Some(Value::I64(3)));
}

#[test]
fn range_filter_prunes_a_scan_before_it_happens() {
    let values: Vec<i64> = vec![-1000, 2, 3, 4, 7, 8, 10, 17, 100, 101, 102, 103, 123456];
    let filter = RangeFilter::build(&values, 3).unwrap();

    // A value that falls in the pruned gap is never worth scanning for.
    assert_eq!(filter.estimate_cardinality(PredicateCondition::Equals, 50000, None), Estimate::MatchesNone);
    // A value inside an adopted range still requires a scan to confirm.
    assert_eq!(filter.estimate_cardinality(PredicateCondition::Equals, 17, None), Estimate::MatchesApproximately);

    match filter.slice_with_predicate(PredicateCondition::Equals, 17, None) {
        StatisticsObject::MinMax(mm) => assert_eq!((mm.min(), mm.max()), (17, 17)),
        other => panic!("expected a min/max filter, got {:?}", other),
    }
}

#[test]
fn min_max_filter_shrinks_under_a_between_predicate() {
    let filter = MinMaxFilter::new(0_i64, 1000);
    match filter.slice_with_predicate(PredicateCondition::Between, 200, Some(300)) {
        StatisticsObject::MinMax(mm) => assert_eq!((mm.min(), mm.max()), (200, 300)),
        other => panic!("expected a min/max filter, got {:?}", other),
    }
    assert!(filter
        .slice_with_predicate(PredicateCondition::Between, 2000, Some(3000))
        .is_empty());
}

#[test]
fn empty_group_by_collapses_to_a_single_row() {
    let table = orders_table();
    let aggregates = vec![AggregateColumnDefinition::new(Some(1), AggregateFunction::Sum)];
    let out = aggregate(&table, &[], &aggregates, None).unwrap();
    assert_eq!(out.rows(), 1);
    assert_eq!(out.get("amount_sum", 0), Some(Value::I64(80)));
}

#[test]
fn table_rows_reflects_every_chunk() {
    let table = orders_table();
    assert_eq!(table.rows(), 5);
}

#[test]
fn reordering_rows_and_chunks_leaves_the_aggregate_unchanged() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    let schema = vec![ColumnSchema::new("g", DataType::Int64), ColumnSchema::new("v", DataType::Int64)];
    let rows: Vec<(i64, i64)> = vec![(1, 10), (2, 20), (1, 30), (2, 40), (1, 50), (3, 5), (2, 60), (3, 7)];

    let aggregates = vec![
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Sum),
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Min),
        AggregateColumnDefinition::new(Some(1), AggregateFunction::Max),
        AggregateColumnDefinition::new(None, AggregateFunction::CountStar),
    ];

    let baseline = {
        let table = table_from_rows(&schema, &rows, &[rows.len()]);
        group_totals(&aggregate(&table, &[0], &aggregates, None).unwrap())
    };

    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    for _ in 0..20 {
        let mut shuffled = rows.clone();
        shuffled.shuffle(&mut rng);
        // Split into a random number of chunks of random (non-zero) size.
        let mut chunk_sizes = Vec::new();
        let mut remaining = shuffled.len();
        while remaining > 0 {
            let size = rng.gen_range(1..=remaining);
            chunk_sizes.push(size);
            remaining -= size;
        }
        chunk_sizes.shuffle(&mut rng);

        let table = table_from_rows(&schema, &shuffled, &chunk_sizes);
        let totals = group_totals(&aggregate(&table, &[0], &aggregates, None).unwrap());
        assert_eq!(totals, baseline, "shuffled chunking {chunk_sizes:?} changed the aggregate result");
    }
}

fn table_from_rows(schema: &[ColumnSchema], rows: &[(i64, i64)], chunk_sizes: &[usize]) -> Table {
    let schema_arc = Arc::new(schema.to_vec());
    let mut chunks = Vec::new();
    let mut offset = 0;
    for &size in chunk_sizes {
        let slice = &rows[offset..offset + size];
        offset += size;
        chunks.push(Chunk::new(
            schema_arc.clone(),
            vec![
                Segment::Value(Column::from(slice.iter().map(|(g, _)| *g).collect::<Vec<_>>())),
                Segment::Value(Column::from(slice.iter().map(|(_, v)| *v).collect::<Vec<_>>())),
            ],
        ));
    }
    Table::new(schema.to_vec(), chunks)
}

fn group_totals(out: &read_buffer::table::OutputTable) -> std::collections::BTreeMap<i64, (i64, i64, i64, i64)> {
    let mut totals = std::collections::BTreeMap::new();
    for row in 0..out.rows() {
        let g = match out.get("g", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let sum = match out.get("v_sum", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let min = match out.get("v_min", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let max = match out.get("v_max", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        let count = match out.get("count_star", row).unwrap() {
            Value::I64(x) => x,
            _ => unreachable!(),
        };
        totals.insert(g, (sum, min, max, count));
    }
    totals
}
