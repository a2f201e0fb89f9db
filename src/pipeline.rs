//! Fan-out/fan-in tally over bounded queues.
//!
//! ```text
//! feeder --records--> grouper --batches--> worker x W --keys--> aggregator
//! ```
//!
//! Every queue is a bounded `crossbeam_channel`, so a slow stage blocks the
//! stages in front of it instead of buffering the whole input. Each stage
//! closes its output by dropping its sender when its input is exhausted; the
//! result queue closes only when the last worker has dropped its clone, which
//! is the barrier the aggregator waits on.

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::mem;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{DomainKey, Transform};
use crate::error::{Result, TallyError};
use crate::stats::{finalize, FrequencyTable, Tally};

pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

type Record = Vec<u8>;
type Batch = Vec<Record>;

/// Worker count used when none is configured: all cores but one, at least one.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub workers: usize,
    /// Records per unit of work handed to a worker.
    pub batch_size: usize,
    /// Capacity of each of the three queues.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(TallyError::InvalidConfig(
                "worker count must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TallyError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(TallyError::InvalidConfig(
                "queue capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads the next line into `record`, stripping `\n` or `\r\n`. Returns `false` at end of input.
fn read_record<R: BufRead>(source: &mut R, record: &mut Record, line: u64) -> Result<bool> {
    let read = source
        .read_until(b'\n', record)
        .map_err(|source| TallyError::Read { line, source })?;
    if read == 0 {
        return Ok(false);
    }
    if record.last() == Some(&b'\n') {
        record.pop();
        if record.last() == Some(&b'\r') {
            record.pop();
        }
    }
    Ok(true)
}

fn feed<R: BufRead>(mut source: R, work: Sender<Record>) -> Result<u64> {
    let start = Instant::now();
    let mut fed = 0u64;

    loop {
        let mut record = Record::new();
        if !read_record(&mut source, &mut record, fed + 1)? {
            break;
        }
        if work.send(record).is_err() {
            return Err(TallyError::Disconnected {
                stage: "feeder".to_string(),
            });
        }
        fed += 1;
    }

    debug!(
        action = "complete",
        component = "feeder",
        records = fed,
        duration_ms = start.elapsed().as_millis(),
        "Feeder reached end of input"
    );
    Ok(fed)
}

fn group(work: Receiver<Record>, batches: Sender<Batch>, batch_size: usize) -> Result<u64> {
    let disconnected = || TallyError::Disconnected {
        stage: "grouper".to_string(),
    };
    let mut sent = 0u64;
    let mut batch = Batch::with_capacity(batch_size);

    for record in work.iter() {
        batch.push(record);
        if batch.len() == batch_size {
            let full = mem::replace(&mut batch, Batch::with_capacity(batch_size));
            batches.send(full).map_err(|_| disconnected())?;
            sent += 1;
        }
    }

    // Final partial batch, possibly empty.
    batches.send(batch).map_err(|_| disconnected())?;
    sent += 1;

    debug!(action = "complete", component = "grouper", batches = sent, "Grouper drained work queue");
    Ok(sent)
}

fn work<T: Transform + ?Sized>(
    id: usize,
    batches: Receiver<Batch>,
    results: Sender<Vec<DomainKey>>,
    transform: &T,
) -> Result<u64> {
    let mut processed = 0u64;

    for batch in batches.iter() {
        let keys: Vec<DomainKey> = batch.iter().map(|record| transform.apply(record)).collect();
        processed += keys.len() as u64;
        if results.send(keys).is_err() {
            return Err(TallyError::Disconnected {
                stage: format!("worker-{id}"),
            });
        }
    }

    debug!(action = "complete", component = "worker", worker_id = id, records = processed, "Worker finished");
    Ok(processed)
}

fn aggregate(results: Receiver<Vec<DomainKey>>) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    for keys in results.iter() {
        for key in keys {
            table.increment(key);
        }
    }
    table
}

fn spawn_stage<'scope, 'env, F>(
    scope: &'scope Scope<'scope, 'env>,
    name: String,
    f: F,
) -> Result<ScopedJoinHandle<'scope, Result<u64>>>
where
    F: FnOnce() -> Result<u64> + Send + 'scope,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, f)
        .map_err(|source| TallyError::Spawn {
            stage: name,
            source,
        })
}

fn join_stage(handle: ScopedJoinHandle<'_, Result<u64>>, stage: &str) -> Result<u64> {
    handle.join().unwrap_or_else(|_| {
        Err(TallyError::StagePanicked {
            stage: stage.to_string(),
        })
    })
}

/// Runs the concurrent tally over `source` and returns the ordered result.
///
/// Either the whole input is tallied or an error is returned; a read failure
/// still lets every stage drain and exit before it is reported.
pub fn run<R, T>(source: R, transform: &T, config: &PipelineConfig) -> Result<Tally>
where
    R: BufRead + Send,
    T: Transform + ?Sized,
{
    config.validate()?;
    let start = Instant::now();
    info!(
        action = "start",
        component = "pipeline",
        workers = config.workers,
        batch_size = config.batch_size,
        queue_capacity = config.queue_capacity,
        "Starting tally pipeline"
    );

    let (work_tx, work_rx) = bounded::<Record>(config.queue_capacity);
    let (batch_tx, batch_rx) = bounded::<Batch>(config.queue_capacity);
    let (result_tx, result_rx) = bounded::<Vec<DomainKey>>(config.queue_capacity);

    let table = thread::scope(|scope| -> Result<FrequencyTable> {
        let feeder = spawn_stage(scope, "feeder".to_string(), move || feed(source, work_tx))?;
        let grouper = spawn_stage(scope, "grouper".to_string(), move || {
            group(work_rx, batch_tx, config.batch_size)
        })?;

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let batches = batch_rx.clone();
            let results = result_tx.clone();
            workers.push(spawn_stage(scope, format!("worker-{id}"), move || {
                work(id, batches, results, transform)
            })?);
        }
        // Only the workers may hold senders, or the aggregator never sees the queue close.
        drop(batch_rx);
        drop(result_tx);

        let table = aggregate(result_rx);

        let fed = join_stage(feeder, "feeder");
        let grouped = join_stage(grouper, "grouper");
        let mut processed = 0u64;
        let mut worker_error = None;
        for (id, handle) in workers.into_iter().enumerate() {
            match join_stage(handle, &format!("worker-{id}")) {
                Ok(count) => processed += count,
                Err(e) => {
                    worker_error.get_or_insert(e);
                }
            }
        }

        // Failures cascade into disconnects upstream of a dead stage, so report
        // the read failure first, then the furthest-downstream stage error.
        let fed = match fed {
            Err(e @ TallyError::Read { .. }) => return Err(e),
            other => other,
        };
        if let Some(e) = worker_error {
            return Err(e);
        }
        let batches = grouped?;
        let fed = fed?;

        if processed != fed {
            warn!(
                action = "verify",
                component = "pipeline",
                fed,
                processed,
                "Processed record count differs from records fed"
            );
        }
        debug!(action = "aggregate", component = "pipeline", batches, distinct_keys = table.len(), "Aggregation complete");
        Ok(table)
    })?;

    let tally = finalize(table);
    info!(
        action = "complete",
        component = "pipeline",
        records = tally.records,
        domains = tally.domains.len(),
        malformed = tally.malformed,
        duration_ms = start.elapsed().as_millis(),
        "Tally pipeline completed"
    );
    Ok(tally)
}

/// Single-threaded tally with the same semantics as [`run`].
pub fn tally_sequential<R, T>(mut source: R, transform: &T) -> Result<Tally>
where
    R: BufRead,
    T: Transform + ?Sized,
{
    let start = Instant::now();
    let mut table = FrequencyTable::new();
    let mut record = Record::new();

    loop {
        record.clear();
        if !read_record(&mut source, &mut record, table.records() + 1)? {
            break;
        }
        table.increment(transform.apply(&record));
    }

    let tally = finalize(table);
    info!(
        action = "complete",
        component = "sequential",
        records = tally.records,
        domains = tally.domains.len(),
        duration_ms = start.elapsed().as_millis(),
        "Sequential tally completed"
    );
    Ok(tally)
}
