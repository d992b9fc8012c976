//! The group-by aggregation operator: groups a chunked [`InputTable`] by a
//! tuple of columns and produces per-group MIN/MAX/SUM/AVG/COUNT/COUNT(*)/
//! COUNT DISTINCT aggregates. See `SPEC_FULL.md` §5.2.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use data_types::{ChunkSchema, ColumnSchema, DataType, RowID, Scalar, Value};
use parking_lot::Mutex;
use rayon::prelude::*;
use snafu::OptionExt;

use crate::chunk::Segment;
use crate::column::ColumnBuilder;
use crate::table::{InputTable, OutputTable};
use crate::{CancelledSnafu, Error, InvalidColumnSnafu, MissingColumnSnafu, Result, UnsupportedAggregateSnafu};

/// `(column, function)`. `column` is `None` only for `CountStar`.
#[derive(Debug, Clone)]
pub struct AggregateColumnDefinition {
    pub column: Option<usize>,
    pub function: AggregateFunction,
}

impl AggregateColumnDefinition {
    pub fn new(column: Option<usize>, function: AggregateFunction) -> Self {
        Self { column, function }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    CountStar,
    CountDistinct,
}

impl AggregateFunction {
    fn name(self) -> &'static str {
        match self {
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::CountStar => "count_star",
            AggregateFunction::CountDistinct => "count_distinct",
        }
    }
}

/// Allows an external caller to abort a long-running aggregation at a
/// chunk boundary. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The group key for a row: a fixed-size sequence of dense integer ids,
/// one per group-by column. `None` is the sentinel used when there are no
/// group-by columns at all (every row collapses into a single group).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    None,
    One(u64),
    Two(u64, u64),
    Many(Vec<u64>),
}

impl GroupKey {
    fn from_ids(ids: Vec<u64>) -> Self {
        match ids.len() {
            0 => GroupKey::None,
            1 => GroupKey::One(ids[0]),
            2 => GroupKey::Two(ids[0], ids[1]),
            _ => GroupKey::Many(ids),
        }
    }
}

/// The id reserved for NULL group-by values. Real dictionary ids start at
/// 0 and increase monotonically, so this is never handed out to a
/// non-null value.
const NULL_GROUP_ID: u64 = u64::MAX;

/// A value wrapper that is `Eq + Hash`, used both for the per-column
/// group-by dictionaries and for `COUNT DISTINCT` sets. Floats are
/// compared by bit pattern — fine here since the engine never treats
/// distinct NaN bit patterns as the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HashableValue {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    Str(String),
}

impl From<Value<'_>> for HashableValue {
    fn from(v: Value<'_>) -> Self {
        match v {
            Value::I32(x) => HashableValue::I32(x),
            Value::I64(x) => HashableValue::I64(x),
            Value::F32(x) => HashableValue::F32(x.to_bits()),
            Value::F64(x) => HashableValue::F64(x.to_bits()),
            Value::String(s) => HashableValue::Str(s.to_owned()),
        }
    }
}

/// One value→id mapping, shared across all chunks for a single group-by
/// column.
#[derive(Default)]
struct Dictionary {
    ids: Mutex<HashMap<HashableValue, u64>>,
    next_id: AtomicU64,
}

impl Dictionary {
    fn new() -> Self {
        Self::default()
    }

    fn id_for(&self, value: Value<'_>) -> u64 {
        let key = HashableValue::from(value);
        let mut ids = self.ids.lock();
        if let Some(&id) = ids.get(&key) {
            return id;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        ids.insert(key, id);
        id
    }
}

fn build_chunk_keys(chunk: &crate::chunk::Chunk, group_by: &[usize], dictionaries: &[Dictionary]) -> Vec<GroupKey> {
    (0..chunk.rows())
        .map(|row| {
            let ids: Vec<u64> = group_by
                .iter()
                .zip(dictionaries)
                .map(|(&col, dict)| match chunk.get(col, row) {
                    Some(v) => dict.id_for(v),
                    None => NULL_GROUP_ID,
                })
                .collect();
            GroupKey::from_ids(ids)
        })
        .collect()
}

/// What a single aggregate column actually does at run time, resolved
/// once from `(AggregateColumnDefinition, input schema)` so the per-row
/// loop never re-inspects types.
#[derive(Debug, Clone, Copy)]
enum AggPlan {
    Min,
    Max,
    SumInt,
    SumFloat,
    Avg,
    Count,
    CountStar,
    CountDistinct,
}

struct ResolvedAggregate {
    plan: AggPlan,
    column: Option<usize>,
    output_type: DataType,
    output_name: String,
}

fn resolve_aggregate(def: &AggregateColumnDefinition, schema: &ChunkSchema) -> Result<ResolvedAggregate> {
    if def.function == AggregateFunction::CountStar {
        return Ok(ResolvedAggregate {
            plan: AggPlan::CountStar,
            column: None,
            output_type: DataType::Int64,
            output_name: "count_star".to_string(),
        });
    }

    let column = def.column.context(MissingColumnSnafu { function: def.function.name() })?;
    let col_schema = schema.get(column).context(InvalidColumnSnafu { index: column })?;
    let input_type = col_schema.data_type;

    let plan = match def.function {
        AggregateFunction::Min => AggPlan::Min,
        AggregateFunction::Max => AggPlan::Max,
        AggregateFunction::Sum => match input_type {
            DataType::Int32 | DataType::Int64 => AggPlan::SumInt,
            DataType::Float | DataType::Double => AggPlan::SumFloat,
            DataType::String => {
                return UnsupportedAggregateSnafu {
                    function: "sum",
                    data_type: input_type,
                }
                .fail()
            }
        },
        AggregateFunction::Avg => {
            if input_type == DataType::String {
                return UnsupportedAggregateSnafu {
                    function: "avg",
                    data_type: input_type,
                }
                .fail();
            }
            AggPlan::Avg
        }
        AggregateFunction::Count => AggPlan::Count,
        AggregateFunction::CountDistinct => AggPlan::CountDistinct,
        AggregateFunction::CountStar => unreachable!(),
    };

    let output_type = match plan {
        AggPlan::Min | AggPlan::Max => input_type,
        AggPlan::SumInt => DataType::Int64,
        AggPlan::SumFloat | AggPlan::Avg => DataType::Double,
        AggPlan::Count | AggPlan::CountStar | AggPlan::CountDistinct => DataType::Int64,
    };

    let output_name = format!("{}_{}", col_schema.name, def.function.name());

    Ok(ResolvedAggregate {
        plan,
        column: Some(column),
        output_type,
        output_name,
    })
}

/// Per-group, per-aggregate running state.
#[derive(Debug, Clone, Default)]
struct AggregateResult {
    current: Option<Scalar>,
    count: u64,
    distinct: Option<HashSet<HashableValue>>,
}

fn update_result(plan: AggPlan, result: &mut AggregateResult, value: Option<Value<'_>>) -> Result<()> {
    match plan {
        AggPlan::Min => {
            if let Some(v) = value {
                let v = v.to_owned();
                result.current = Some(match result.current.take() {
                    Some(cur) if v.partial_cmp(&cur) != Some(std::cmp::Ordering::Less) => cur,
                    _ => v,
                });
            }
        }
        AggPlan::Max => {
            if let Some(v) = value {
                let v = v.to_owned();
                result.current = Some(match result.current.take() {
                    Some(cur) if v.partial_cmp(&cur) != Some(std::cmp::Ordering::Greater) => cur,
                    _ => v,
                });
            }
        }
        AggPlan::SumInt => {
            if let Some(v) = value {
                let x: i64 = match v {
                    Value::I32(x) => x as i64,
                    Value::I64(x) => x,
                    _ => unreachable!("SumInt only ever sees integer columns"),
                };
                let cur = match result.current {
                    Some(Scalar::I64(c)) => c,
                    None => 0,
                    _ => unreachable!(),
                };
                let new = cur.checked_add(x).context(crate::OverflowSnafu)?;
                result.current = Some(Scalar::I64(new));
            }
        }
        AggPlan::SumFloat => {
            if let Some(v) = value {
                let x = to_f64(v);
                let cur = match result.current {
                    Some(Scalar::F64(c)) => c,
                    None => 0.0,
                    _ => unreachable!(),
                };
                result.current = Some(Scalar::F64(cur + x));
            }
        }
        AggPlan::Avg => {
            if let Some(v) = value {
                let x = to_f64(v);
                let cur = match result.current {
                    Some(Scalar::F64(c)) => c,
                    None => 0.0,
                    _ => unreachable!(),
                };
                result.current = Some(Scalar::F64(cur + x));
                result.count += 1;
            }
        }
        AggPlan::Count => {
            if value.is_some() {
                result.count += 1;
            }
        }
        AggPlan::CountStar => {
            result.count += 1;
        }
        AggPlan::CountDistinct => {
            if let Some(v) = value {
                result.distinct.get_or_insert_with(HashSet::new).insert(HashableValue::from(v));
            }
        }
    }
    Ok(())
}

fn to_f64(v: Value<'_>) -> f64 {
    match v {
        Value::I32(x) => x as f64,
        Value::I64(x) => x as f64,
        Value::F32(x) => x as f64,
        Value::F64(x) => x,
        Value::String(_) => unreachable!("numeric aggregates never see string columns"),
    }
}

fn finalize(plan: AggPlan, result: &AggregateResult) -> Option<Scalar> {
    match plan {
        AggPlan::Min | AggPlan::Max | AggPlan::SumInt | AggPlan::SumFloat => result.current.clone(),
        AggPlan::Avg => {
            if result.count == 0 {
                None
            } else {
                let sum = match result.current {
                    Some(Scalar::F64(s)) => s,
                    _ => 0.0,
                };
                Some(Scalar::F64(sum / result.count as f64))
            }
        }
        AggPlan::Count | AggPlan::CountStar => Some(Scalar::I64(result.count as i64)),
        AggPlan::CountDistinct => Some(Scalar::I64(result.distinct.as_ref().map_or(0, HashSet::len) as i64)),
    }
}

fn hash_key(key: &GroupKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// One shard of the group map: its own lock, so that groups hashing to
/// different shards never contend with each other.
struct Shard {
    id_map: HashMap<GroupKey, usize>,
    example_row_ids: Vec<RowID>,
    // results[aggregate_index][local_group_index]
    results: Vec<Vec<AggregateResult>>,
}

impl Shard {
    fn new(n_aggregates: usize) -> Self {
        Self {
            id_map: HashMap::new(),
            example_row_ids: Vec::new(),
            results: vec![Vec::new(); n_aggregates],
        }
    }
}

struct ShardedResults {
    shards: Vec<Mutex<Shard>>,
}

impl ShardedResults {
    fn new(n_shards: usize, n_aggregates: usize) -> Self {
        let n_shards = n_shards.max(1);
        Self {
            shards: (0..n_shards).map(|_| Mutex::new(Shard::new(n_aggregates))).collect(),
        }
    }

    /// Applies one row's contribution to one aggregate column, allocating
    /// the group (across *every* aggregate's result vector) the first
    /// time it's seen.
    fn apply(&self, key: &GroupKey, row_id: RowID, aggregate_index: usize, plan: AggPlan, value: Option<Value<'_>>) -> Result<()> {
        let shard_index = (hash_key(key) as usize) % self.shards.len();
        let mut shard = self.shards[shard_index].lock();

        let local_index = match shard.id_map.get(key) {
            Some(&idx) => idx,
            None => {
                let idx = shard.example_row_ids.len();
                shard.example_row_ids.push(row_id);
                for per_aggregate in shard.results.iter_mut() {
                    per_aggregate.push(AggregateResult::default());
                }
                shard.id_map.insert(key.clone(), idx);
                idx
            }
        };

        update_result(plan, &mut shard.results[aggregate_index][local_index], value)
    }
}

/// Groups `input` by the columns named in `group_by` and computes
/// `aggregates` per group. See `SPEC_FULL.md` §5.2 for the full algorithm.
pub fn aggregate(
    input: &dyn InputTable,
    group_by: &[usize],
    aggregates: &[AggregateColumnDefinition],
    cancellation: Option<&CancellationToken>,
) -> Result<OutputTable> {
    let schema = input.schema();

    for &idx in group_by {
        if idx >= schema.len() {
            return InvalidColumnSnafu { index: idx }.fail();
        }
    }

    let resolved: Vec<ResolvedAggregate> = aggregates
        .iter()
        .map(|def| resolve_aggregate(def, schema))
        .collect::<Result<_>>()?;

    let chunks = input.chunks();
    tracing::debug!(n_chunks = chunks.len(), n_group_by = group_by.len(), n_aggregates = resolved.len(), "starting aggregation");

    // Phase 1: build group keys, one dictionary per group-by column,
    // shared (and mutated under lock) across all chunks. Independent
    // across chunks, so it runs on the rayon pool.
    let dictionaries: Vec<Dictionary> = group_by.iter().map(|_| Dictionary::new()).collect();
    let keys_per_chunk: Vec<Vec<GroupKey>> = chunks
        .par_iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            if let Some(token) = cancellation {
                if token.is_cancelled() {
                    tracing::warn!(chunk_index, "aggregation cancelled during key building");
                    return Err(Error::Cancelled);
                }
            }
            tracing::trace!(chunk_index, rows = chunk.rows(), "building keys for chunk");
            Ok(build_chunk_keys(chunk, group_by, &dictionaries))
        })
        .collect::<Result<Vec<_>>>()?;

    // Phase 2: accumulate. Groups are sharded by key hash so that writes
    // to different groups never block each other.
    let n_shards = rayon::current_num_threads();
    let sharded = ShardedResults::new(n_shards, resolved.len());

    chunks
        .par_iter()
        .enumerate()
        .try_for_each(|(chunk_index, chunk)| -> Result<()> {
            if let Some(token) = cancellation {
                if token.is_cancelled() {
                    tracing::warn!(chunk_index, "aggregation cancelled during accumulation");
                    return CancelledSnafu.fail();
                }
            }
            tracing::trace!(chunk_index, rows = chunk.rows(), "accumulating chunk");
            let keys = &keys_per_chunk[chunk_index];

            for (aggregate_index, resolved_aggregate) in resolved.iter().enumerate() {
                for (row, key) in keys.iter().enumerate() {
                    let row_id = RowID::new(chunk_index, row);
                    let value = match resolved_aggregate.column {
                        Some(col) => chunk.get(col, row),
                        None => Some(Value::I64(1)), // synthetic all-ones column for COUNT(*)
                    };
                    sharded.apply(key, row_id, aggregate_index, resolved_aggregate.plan, value)?;
                }
            }
            Ok(())
        })?;

    let output = materialize(input, group_by, schema, &resolved, sharded);
    tracing::debug!(n_groups = output.rows(), "aggregation finished");
    Ok(output)
}

fn materialize(input: &dyn InputTable, group_by: &[usize], schema: &ChunkSchema, resolved: &[ResolvedAggregate], sharded: ShardedResults) -> OutputTable {
    let mut group_builders: Vec<ColumnBuilder> = group_by.iter().map(|&idx| ColumnBuilder::new(schema[idx].data_type)).collect();
    let mut aggregate_builders: Vec<ColumnBuilder> = resolved.iter().map(|r| ColumnBuilder::new(r.output_type)).collect();

    let chunks = input.chunks();
    for shard_lock in sharded.shards {
        let shard = shard_lock.into_inner();
        for (local_index, row_id) in shard.example_row_ids.iter().enumerate() {
            for (group_position, &col_idx) in group_by.iter().enumerate() {
                let value = chunks[row_id.chunk_index].get(col_idx, row_id.row_offset).map(Value::to_owned);
                group_builders[group_position].push(value);
            }
            for (aggregate_index, resolved_aggregate) in resolved.iter().enumerate() {
                let result = &shard.results[aggregate_index][local_index];
                aggregate_builders[aggregate_index].push(finalize(resolved_aggregate.plan, result));
            }
        }
    }

    let mut output_schema = Vec::with_capacity(group_by.len() + resolved.len());
    for &idx in group_by {
        output_schema.push(schema[idx].clone());
    }
    for resolved_aggregate in resolved {
        output_schema.push(ColumnSchema::new(resolved_aggregate.output_name.clone(), resolved_aggregate.output_type));
    }

    let segments: Vec<Segment> = group_builders
        .into_iter()
        .chain(aggregate_builders)
        .map(|b| Segment::Value(b.finish()))
        .collect();

    let schema_arc = Arc::new(output_schema.clone());
    let chunk = crate::chunk::Chunk::new(schema_arc, segments);
    OutputTable::new(output_schema, chunk)
}
