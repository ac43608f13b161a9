//! Execution: drives an [`Operator`] tree into rows.
//!
//! Every operator is its own [`StreamIterator`]: it holds its predecessor
//! as a `Box<dyn StreamIterator>` and produces rows one `next()` call at a
//! time, matching the `{fresh, active, exhausted, closed}` state machine
//! from spec §4.3. Only the leaves (`TableScan`, `IndexScan`, `Emit`) and
//! the two operators that must see their whole input before producing any
//! output (`TempTreeSort`, `GroupAggregate`) buffer rows into a `Vec`;
//! everything above them pulls lazily, so `Take` can stop its predecessor
//! early and `Filter`/`Project`/`Skip` never force more of the tree than a
//! caller actually asks for.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};

use corvid_catalog::{Catalog, KvEngine};
use corvid_expr::{eval, Environment, Params};
use corvid_row::{ColumnBuffer, Key, Row};
use corvid_value::Value;

use crate::error::{internal, PlanError, Result, StreamClosed};
use crate::operator::{AggregateSpec, Operator};

#[derive(Clone, Copy)]
pub struct ExecCtx<'a> {
    pub catalog: &'a Catalog,
    pub kv: &'a RefCell<&'a mut dyn KvEngine>,
    pub params: &'a Params,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub key: Option<Key>,
    pub row: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Active,
    Exhausted,
    Closed,
}

/// The pull interface every operator exposes (spec §4.3).
pub trait StreamIterator {
    fn next(&mut self) -> Result<bool>;
    fn row(&self) -> Option<Row>;
    fn key(&self) -> Option<Key>;
    fn close(&mut self) -> Result<()>;
}

/// A pre-buffered sequence of frames presented through the pull interface.
/// Used for leaves (whose underlying `KvEngine::iterate` borrow can't
/// outlive a single `open` call without a self-referential struct) and for
/// the two blocking operators that must see their whole input up front.
struct VecCursor<'a> {
    frames: Vec<Frame>,
    pos: usize,
    phase: Phase,
    on_close: Option<Box<dyn FnOnce() -> Result<()> + 'a>>,
}

impl<'a> VecCursor<'a> {
    fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            pos: 0,
            phase: Phase::Fresh,
            on_close: None,
        }
    }

    fn with_cleanup(frames: Vec<Frame>, on_close: Box<dyn FnOnce() -> Result<()> + 'a>) -> Self {
        Self {
            frames,
            pos: 0,
            phase: Phase::Fresh,
            on_close: Some(on_close),
        }
    }
}

impl<'a> StreamIterator for VecCursor<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if self.phase == Phase::Exhausted {
            return Ok(false);
        }
        if self.pos < self.frames.len() {
            self.pos += 1;
            self.phase = Phase::Active;
            Ok(true)
        } else {
            self.phase = Phase::Exhausted;
            Ok(false)
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase != Phase::Active || self.pos == 0 {
            return None;
        }
        self.frames.get(self.pos - 1).map(|f| f.row.clone())
    }

    fn key(&self) -> Option<Key> {
        if self.phase != Phase::Active || self.pos == 0 {
            return None;
        }
        self.frames.get(self.pos - 1).and_then(|f| f.key.clone())
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        if let Some(cleanup) = self.on_close.take() {
            cleanup()?;
        }
        Ok(())
    }
}

/// Wraps a single already-known frame (e.g. the row that conflicted inside
/// `GenerateKey`'s `on_conflict` handling) behind the pull interface, so an
/// `on_conflict` sub-tree can be opened rooted at that one row without
/// re-deriving it through a leaf scan or losing its key.
struct SeedIter {
    pending: Option<Frame>,
    current: Option<Frame>,
    phase: Phase,
}

impl SeedIter {
    fn new(frame: Frame) -> Self {
        Self {
            pending: Some(frame),
            current: None,
            phase: Phase::Fresh,
        }
    }
}

impl StreamIterator for SeedIter {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        match self.pending.take() {
            Some(f) => {
                self.current = Some(f);
                self.phase = Phase::Active;
                Ok(true)
            }
            None => {
                self.phase = Phase::Exhausted;
                self.current = None;
                Ok(false)
            }
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        self.phase = Phase::Closed;
        Ok(())
    }
}

fn row_env<'a>(row: &'a Row, params: &'a Params) -> Environment<'a> {
    Environment::new(Some(row), params)
}

fn eval_scalar(expr: &corvid_expr::Expr, row: &Row, params: &Params) -> Result<Value> {
    Ok(eval(expr, &row_env(row, params))?)
}

fn take_skip_count(expr: &corvid_expr::Expr, ctx: &ExecCtx) -> Result<usize> {
    let env = Environment::new(None, ctx.params);
    let v = eval(expr, &env)?;
    let as_big = v.cast_as(corvid_value::Type::BigInt)?;
    match as_big {
        Value::BigInt(n) if n >= 0 => Ok(n as usize),
        Value::BigInt(_) => Ok(0),
        _ => Err(internal("Take/Skip count did not cast to BIGINT")),
    }
}

/// Pulls every remaining frame out of `it`, closing it once exhausted.
/// Used by the blocking operators (`TempTreeSort`, `GroupAggregate`) that
/// need their whole input before they can produce a first output row.
fn drain_frames(mut it: Box<dyn StreamIterator + '_>) -> Result<Vec<Frame>> {
    let mut out = Vec::new();
    while it.next()? {
        let row = it.row().ok_or_else(|| internal("drain: prev yielded no row"))?;
        let key = it.key();
        out.push(Frame { key, row });
    }
    it.close()?;
    Ok(out)
}

/// Runs the sort, leaving its transient namespace allocated; the caller
/// decides when to drop it (immediately, for a sort nested further up the
/// tree, or deferred to `close()` for a top-level stream).
fn run_sort<'a>(prev: Box<dyn StreamIterator + 'a>, expr: &corvid_expr::Expr, desc: bool, ctx: &ExecCtx<'a>) -> Result<(Vec<Frame>, String)> {
    let input = drain_frames(prev)?;
    let ns = {
        let mut kv = ctx.kv.borrow_mut();
        ctx.catalog.allocate_transient_namespace(&mut **kv)?
    };

    // Buffer `(sort_value, counter) -> frame index` so equal keys keep
    // their original relative order (spec §4.3's stable tie-break).
    let mut keyed: Vec<(Vec<u8>, usize)> = Vec::with_capacity(input.len());
    for (i, frame) in input.iter().enumerate() {
        let v = eval_scalar(expr, &frame.row, ctx.params)?;
        let mut key_bytes = Vec::new();
        v.encode_as_key(desc, &mut key_bytes)?;
        key_bytes.extend_from_slice(&(i as u64).to_be_bytes());
        let mut kv = ctx.kv.borrow_mut();
        kv.put(&ns, &key_bytes, &(i as u64).to_be_bytes())?;
        keyed.push((key_bytes, i));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let sorted: Vec<Frame> = keyed.into_iter().map(|(_, idx)| input[idx].clone()).collect();
    Ok((sorted, ns))
}

fn build_group_aggregate_frames(
    input: &[Frame],
    group_by: &Option<corvid_expr::Expr>,
    aggregates: &[AggregateSpec],
    ctx: &ExecCtx,
) -> Result<Vec<Frame>> {
    let mut out = Vec::new();

    if input.is_empty() {
        // Synthetic empty group (spec §8 scenario S5).
        let mut buf = ColumnBuffer::new();
        if let Some(gb) = group_by {
            buf.add(gb.to_text(), Value::Null);
        }
        for spec in aggregates {
            let agg = spec.kind.build();
            buf.add(spec.output_name.clone(), agg.finalize());
        }
        out.push(Frame {
            key: None,
            row: Row::from_buffer(buf),
        });
        return Ok(out);
    }

    let mut current_key: Option<Value> = None;
    let mut builders: Vec<Box<dyn corvid_expr::Aggregator>> = Vec::new();
    let mut flush = |current_key: &Option<Value>, builders: &mut Vec<Box<dyn corvid_expr::Aggregator>>, out: &mut Vec<Frame>| {
        if builders.is_empty() {
            return;
        }
        let mut buf = ColumnBuffer::new();
        if let (Some(gb), Some(key)) = (group_by, current_key) {
            buf.add(gb.to_text(), key.clone());
        }
        for (spec, agg) in aggregates.iter().zip(builders.iter()) {
            buf.add(spec.output_name.clone(), agg.finalize());
        }
        out.push(Frame {
            key: None,
            row: Row::from_buffer(buf),
        });
    };

    for frame in input {
        let group_value = match group_by {
            Some(gb) => Some(eval_scalar(gb, &frame.row, ctx.params)?),
            None => None,
        };
        let changed = match (&current_key, &group_value) {
            (None, _) if builders.is_empty() => true,
            (Some(a), Some(b)) => !a.eq(b)?,
            (Some(_), None) => false,
            (None, None) => false,
            (None, Some(_)) => true,
        };
        if changed {
            flush(&current_key, &mut builders, &mut out);
            builders = aggregates.iter().map(|a| a.kind.build()).collect();
            current_key = group_value;
        }
        for (spec, agg) in aggregates.iter().zip(builders.iter_mut()) {
            let input_value = eval_scalar(&spec.input, &frame.row, ctx.params)?;
            agg.update(&input_value)?;
        }
    }
    flush(&current_key, &mut builders, &mut out);
    Ok(out)
}

fn scan_table_frames(table: &str, ranges: &corvid_catalog::Ranges, reverse: bool, ctx: &ExecCtx) -> Result<Vec<Frame>> {
    let def = ctx.catalog.table(table)?;
    let kv = ctx.kv.borrow();
    let rows: Result<Vec<Frame>> = def
        .scan(&**kv, ranges, reverse)?
        .map(|r| r.map_err(PlanError::from).map(|(k, row)| Frame { key: Some(k), row }))
        .collect();
    rows
}

fn scan_index_frames(index: &str, ranges: &corvid_catalog::Ranges, reverse: bool, ctx: &ExecCtx) -> Result<Vec<Frame>> {
    let idx = ctx.catalog.index(index)?;
    let def = ctx.catalog.table(&idx.table)?;
    let kv = ctx.kv.borrow();
    let mut out = Vec::new();
    for key in idx.scan(&**kv, ranges, reverse)? {
        let key = key.map_err(PlanError::from)?;
        if let Some(row) = def.get_by_key(&**kv, &key).map_err(PlanError::from)? {
            out.push(Frame { key: Some(key), row });
        }
    }
    Ok(out)
}

fn emit_frames(columns: &[String], rows: &[Vec<corvid_expr::Expr>], ctx: &ExecCtx) -> Result<Vec<Frame>> {
    let mut out = Vec::with_capacity(rows.len());
    for row_exprs in rows {
        let mut buf = ColumnBuffer::new();
        for (name, expr) in columns.iter().zip(row_exprs.iter()) {
            let env = Environment::new(None, ctx.params);
            buf.add(name.clone(), eval(expr, &env)?);
        }
        out.push(Frame {
            key: None,
            row: Row::from_buffer(buf),
        });
    }
    Ok(out)
}

struct FilterIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    expr: &'a corvid_expr::Expr,
    params: &'a Params,
    phase: Phase,
}

impl<'a> StreamIterator for FilterIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        loop {
            if !self.prev.next()? {
                self.phase = Phase::Exhausted;
                return Ok(false);
            }
            let row = self.prev.row().ok_or_else(|| internal("Filter: prev yielded no row"))?;
            if eval_scalar(self.expr, &row, self.params)?.is_truthy()? {
                self.phase = Phase::Active;
                return Ok(true);
            }
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.prev.row()
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.prev.key()
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct ProjectIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    exprs: &'a [corvid_expr::Expr],
    params: &'a Params,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for ProjectIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            self.current = None;
            return Ok(false);
        }
        let row = self.prev.row().ok_or_else(|| internal("Project: prev yielded no row"))?;
        let key = self.prev.key();
        let mut buf = ColumnBuffer::new();
        for e in self.exprs {
            match e {
                corvid_expr::Expr::Wildcard => {
                    buf.copy_from(&row.to_column_buffer()?);
                }
                corvid_expr::Expr::Named { expr, alias } => {
                    let v = eval_scalar(expr, &row, self.params)?;
                    buf.add(alias.clone(), v);
                }
                other => {
                    let v = eval_scalar(other, &row, self.params)?;
                    buf.add(other.to_text(), v);
                }
            }
        }
        self.current = Some(Frame {
            key,
            row: Row::from_buffer(buf),
        });
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

/// Once `limit` rows have been pulled, `prev` is closed eagerly so a
/// `TempTreeSort`/`GroupAggregate` anywhere beneath a `Take` releases its
/// resources as soon as the consumer stops asking for rows, rather than
/// only when the whole tree happens to be drained. Every further poll
/// genuinely re-raises `StreamClosed` against the now-closed `prev` and
/// absorbs it, rather than just returning `Ok(false)` directly.
struct TakeIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    limit: usize,
    taken: usize,
    phase: Phase,
}

impl<'a> TakeIter<'a> {
    fn new(mut prev: Box<dyn StreamIterator + 'a>, limit: usize) -> Result<Self> {
        if limit == 0 {
            prev.close()?;
            return Ok(Self {
                prev,
                limit,
                taken: 0,
                phase: Phase::Exhausted,
            });
        }
        Ok(Self {
            prev,
            limit,
            taken: 0,
            phase: Phase::Fresh,
        })
    }
}

impl<'a> StreamIterator for TakeIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if self.phase == Phase::Exhausted || self.taken >= self.limit {
            if self.phase != Phase::Exhausted {
                self.prev.close()?;
                self.phase = Phase::Exhausted;
            }
            return match absorb_stream_closed(self.prev.next())? {
                Some(true) => Err(internal("closed stream yielded a row")),
                Some(false) | None => Ok(false),
            };
        }
        match self.prev.next()? {
            true => {
                self.taken += 1;
                self.phase = Phase::Active;
                Ok(true)
            }
            false => {
                self.phase = Phase::Exhausted;
                Ok(false)
            }
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.prev.row()
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.prev.key()
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct SkipIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    count: usize,
    skipped: usize,
    phase: Phase,
}

impl<'a> StreamIterator for SkipIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        while self.skipped < self.count {
            if !self.prev.next()? {
                self.phase = Phase::Exhausted;
                return Ok(false);
            }
            self.skipped += 1;
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            return Ok(false);
        }
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.prev.row()
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.prev.key()
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct ConcatIter<'a> {
    streams: &'a [Operator],
    ctx: ExecCtx<'a>,
    seed: Option<Frame>,
    idx: usize,
    current: Option<Box<dyn StreamIterator + 'a>>,
    phase: Phase,
}

impl<'a> ConcatIter<'a> {
    fn new(streams: &'a [Operator], ctx: ExecCtx<'a>, seed: Option<&Frame>) -> Self {
        Self {
            streams,
            ctx,
            seed: seed.cloned(),
            idx: 0,
            current: None,
            phase: Phase::Fresh,
        }
    }
}

impl<'a> StreamIterator for ConcatIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        loop {
            if self.current.is_none() {
                if self.idx >= self.streams.len() {
                    self.phase = Phase::Exhausted;
                    return Ok(false);
                }
                let it = open_inner(&self.streams[self.idx], &self.ctx, self.seed.as_ref())?;
                self.idx += 1;
                self.current = Some(it);
            }
            let cur = self.current.as_mut().expect("checked above");
            if cur.next()? {
                self.phase = Phase::Active;
                return Ok(true);
            }
            cur.close()?;
            self.current = None;
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|c| c.row())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|c| c.key())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        if let Some(mut cur) = self.current.take() {
            cur.close()?;
        }
        Ok(())
    }
}

struct UnionIter<'a> {
    inner: ConcatIter<'a>,
    seen: HashSet<Vec<u8>>,
    phase: Phase,
}

impl<'a> UnionIter<'a> {
    fn new(streams: &'a [Operator], ctx: ExecCtx<'a>, seed: Option<&Frame>) -> Self {
        Self {
            inner: ConcatIter::new(streams, ctx, seed),
            seen: HashSet::new(),
            phase: Phase::Fresh,
        }
    }
}

impl<'a> StreamIterator for UnionIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        loop {
            if !self.inner.next()? {
                self.phase = Phase::Exhausted;
                return Ok(false);
            }
            let row = self.inner.row().ok_or_else(|| internal("Union: prev yielded no row"))?;
            let mut bytes = Vec::new();
            for (_, v) in row.to_column_buffer()?.iterate() {
                v.encode(&mut bytes)?;
            }
            if self.seen.insert(bytes) {
                self.phase = Phase::Active;
                return Ok(true);
            }
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.inner.row()
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.inner.key()
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.inner.close()
    }
}

struct InsertIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    def: &'a corvid_catalog::TableDef,
    kv: &'a RefCell<&'a mut dyn KvEngine>,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for InsertIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            self.current = None;
            return Ok(false);
        }
        let row = self.prev.row().ok_or_else(|| internal("Insert: prev yielded no row"))?;
        let stored = {
            let mut kv = self.kv.borrow_mut();
            self.def.insert(&mut **kv, row)?
        };
        self.current = Some(Frame {
            key: stored.key().cloned(),
            row: stored,
        });
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

/// `GenerateKey`'s conflict handling opens `on_conflict` rooted at the
/// conflicting row itself (via `SeedIter`) each time a conflict occurs,
/// rather than once after the whole input has been consumed; every frame
/// the sub-stream produces is queued and relayed before the next input
/// row is pulled (spec §4.3's `ON CONFLICT` semantics apply per occurrence).
struct GenerateKeyIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    def: &'a corvid_catalog::TableDef,
    on_conflict: Option<&'a Operator>,
    on_conflict_do_nothing: bool,
    ctx: ExecCtx<'a>,
    pending: VecDeque<Frame>,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for GenerateKeyIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        loop {
            if let Some(frame) = self.pending.pop_front() {
                self.current = Some(frame);
                self.phase = Phase::Active;
                return Ok(true);
            }
            if !self.prev.next()? {
                self.phase = Phase::Exhausted;
                self.current = None;
                return Ok(false);
            }
            let row = self.prev.row().ok_or_else(|| internal("GenerateKey: prev yielded no row"))?;
            let exists = {
                let kv = self.ctx.kv.borrow();
                match row.key() {
                    Some(k) => self.def.exists(&**kv, k)?,
                    None => false,
                }
            };
            if exists {
                if let Some(sub) = self.on_conflict {
                    let seed = Frame {
                        key: row.key().cloned(),
                        row: row.clone(),
                    };
                    let mut sub_iter = open_inner(sub, &self.ctx, Some(&seed))?;
                    while sub_iter.next()? {
                        let srow = sub_iter.row().ok_or_else(|| internal("on_conflict sub-stream yielded no row"))?;
                        let skey = sub_iter.key();
                        self.pending.push_back(Frame { key: skey, row: srow });
                    }
                    sub_iter.close()?;
                    continue;
                }
                if self.on_conflict_do_nothing {
                    continue;
                }
                return Err(internal(format!(
                    "primary key conflict on {} without ON CONFLICT handling",
                    self.def.name
                )));
            }
            let (key, _) = {
                let mut kv = self.ctx.kv.borrow_mut();
                self.def.generate_key(&mut **kv, &row)?
            };
            self.current = Some(Frame {
                key: Some(key.clone()),
                row: row.with_key(key),
            });
            self.phase = Phase::Active;
            return Ok(true);
        }
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct ReplaceIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    def: &'a corvid_catalog::TableDef,
    kv: &'a RefCell<&'a mut dyn KvEngine>,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for ReplaceIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            self.current = None;
            return Ok(false);
        }
        let row = self.prev.row().ok_or_else(|| internal("Replace: prev yielded no row"))?;
        let key = row.key().cloned().ok_or_else(|| internal("Replace requires rows carrying a key"))?;
        {
            let mut kv = self.kv.borrow_mut();
            self.def.replace(&mut **kv, &key, row.clone())?;
        }
        self.current = Some(Frame { key: Some(key), row });
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct DeleteIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    def: &'a corvid_catalog::TableDef,
    kv: &'a RefCell<&'a mut dyn KvEngine>,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for DeleteIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            self.current = None;
            return Ok(false);
        }
        let row = self.prev.row().ok_or_else(|| internal("Delete: prev yielded no row"))?;
        let key = row.key().cloned().ok_or_else(|| internal("Delete requires rows carrying a key"))?;
        {
            let mut kv = self.kv.borrow_mut();
            self.def.delete(&mut **kv, &key)?;
        }
        self.current = Some(Frame { key: Some(key), row });
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

struct ValidateIter<'a> {
    prev: Box<dyn StreamIterator + 'a>,
    def: &'a corvid_catalog::TableDef,
    current: Option<Frame>,
    phase: Phase,
}

impl<'a> StreamIterator for ValidateIter<'a> {
    fn next(&mut self) -> Result<bool> {
        if self.phase == Phase::Closed {
            return Err(StreamClosed.into());
        }
        if !self.prev.next()? {
            self.phase = Phase::Exhausted;
            self.current = None;
            return Ok(false);
        }
        let row = self.prev.row().ok_or_else(|| internal("Validate: prev yielded no row"))?;
        let validated = self.def.validate_row(row)?;
        self.current = Some(Frame {
            key: validated.key().cloned(),
            row: validated,
        });
        self.phase = Phase::Active;
        Ok(true)
    }

    fn row(&self) -> Option<Row> {
        if self.phase == Phase::Active {
            self.current.as_ref().map(|f| f.row.clone())
        } else {
            None
        }
    }

    fn key(&self) -> Option<Key> {
        if self.phase == Phase::Active {
            self.current.as_ref().and_then(|f| f.key.clone())
        } else {
            None
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        self.phase = Phase::Closed;
        self.prev.close()
    }
}

/// Opens `op` for execution, returning a pull iterator over its output.
///
/// `seed`, when present, substitutes a single known frame for whichever
/// leaf (`TableScan`/`IndexScan`/`Emit`) sits at the bottom of `op`'s tree
/// instead of performing the leaf's real scan/emit — used to root a
/// `GenerateKey` `on_conflict` sub-stream at the row that actually
/// conflicted (see `GenerateKeyIter`).
fn open_inner<'a>(op: &'a Operator, ctx: &ExecCtx<'a>, seed: Option<&Frame>) -> Result<Box<dyn StreamIterator + 'a>> {
    if let Some(frame) = seed {
        if matches!(op, Operator::TableScan { .. } | Operator::IndexScan { .. } | Operator::Emit { .. }) {
            return Ok(Box::new(SeedIter::new(frame.clone())));
        }
    }
    match op {
        Operator::TableScan { table, ranges, reverse } => {
            let frames = scan_table_frames(table, ranges, *reverse, ctx)?;
            Ok(Box::new(VecCursor::new(frames)))
        }
        Operator::IndexScan { index, ranges, reverse } => {
            let frames = scan_index_frames(index, ranges, *reverse, ctx)?;
            Ok(Box::new(VecCursor::new(frames)))
        }
        Operator::Emit { columns, rows } => {
            let frames = emit_frames(columns, rows, ctx)?;
            Ok(Box::new(VecCursor::new(frames)))
        }
        Operator::Filter { prev, expr } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            Ok(Box::new(FilterIter {
                prev: prev_it,
                expr,
                params: ctx.params,
                phase: Phase::Fresh,
            }))
        }
        Operator::Project { prev, exprs } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            Ok(Box::new(ProjectIter {
                prev: prev_it,
                exprs,
                params: ctx.params,
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::Take { prev, n } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let limit = take_skip_count(n, ctx)?;
            Ok(Box::new(TakeIter::new(prev_it, limit)?))
        }
        Operator::Skip { prev, n } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let count = take_skip_count(n, ctx)?;
            Ok(Box::new(SkipIter {
                prev: prev_it,
                count,
                skipped: 0,
                phase: Phase::Fresh,
            }))
        }
        Operator::TempTreeSort { prev, expr, desc } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let (frames, ns) = run_sort(prev_it, expr, *desc, ctx)?;
            let kv = ctx.kv;
            let on_close: Box<dyn FnOnce() -> Result<()> + 'a> = Box::new(move || {
                let mut kv = kv.borrow_mut();
                kv.drop_namespace(&ns).map_err(PlanError::from)
            });
            Ok(Box::new(VecCursor::with_cleanup(frames, on_close)))
        }
        Operator::GroupAggregate { prev, group_by, aggregates } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let input = drain_frames(prev_it)?;
            let frames = build_group_aggregate_frames(&input, group_by, aggregates, ctx)?;
            Ok(Box::new(VecCursor::new(frames)))
        }
        Operator::Insert { prev, table } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let def = ctx.catalog.table(table)?;
            Ok(Box::new(InsertIter {
                prev: prev_it,
                def,
                kv: ctx.kv,
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::GenerateKey {
            prev,
            table,
            on_conflict,
            on_conflict_do_nothing,
        } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let def = ctx.catalog.table(table)?;
            Ok(Box::new(GenerateKeyIter {
                prev: prev_it,
                def,
                on_conflict: on_conflict.as_deref(),
                on_conflict_do_nothing: *on_conflict_do_nothing,
                ctx: *ctx,
                pending: VecDeque::new(),
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::Replace { prev, table } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let def = ctx.catalog.table(table)?;
            Ok(Box::new(ReplaceIter {
                prev: prev_it,
                def,
                kv: ctx.kv,
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::Delete { prev, table } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let def = ctx.catalog.table(table)?;
            Ok(Box::new(DeleteIter {
                prev: prev_it,
                def,
                kv: ctx.kv,
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::Validate { prev, table } => {
            let prev_it = open_inner(prev, ctx, seed)?;
            let def = ctx.catalog.table(table)?;
            Ok(Box::new(ValidateIter {
                prev: prev_it,
                def,
                current: None,
                phase: Phase::Fresh,
            }))
        }
        Operator::Concat { streams } => Ok(Box::new(ConcatIter::new(streams, *ctx, seed))),
        Operator::Union { streams } => Ok(Box::new(UnionIter::new(streams, *ctx, seed))),
    }
}

/// Opens `op` for execution, returning a pull iterator over its output.
pub fn open<'a>(op: &'a Operator, ctx: &ExecCtx<'a>) -> Result<Box<dyn StreamIterator + 'a>> {
    open_inner(op, ctx, None)
}

/// Converts the `StreamClosed` sentinel into a clean end of iteration,
/// matching spec §7's "`StreamClosed` is converted to a successful end of
/// iteration".
pub fn absorb_stream_closed<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(PlanError::StreamClosed(StreamClosed)) => Ok(None),
        Err(e) => Err(e),
    }
}
