//! Extraction pipeline: windows to work units to parallel fetch tasks.
//!
//! The full date range is partitioned into windows, the windows are dealt
//! into one work unit per task, and each unit runs on its own tokio task
//! with its own fetcher. Windows within a unit are processed strictly in
//! chronological order; units share no mutable state. The first error
//! aborts the run and surfaces unchanged.

use crate::client::SoapClient;
use crate::error::MarketoError;
use crate::lead::{LeadFetcher, NormalizedRecord};
use crate::timeslice::{TimeWindow, generate_windows, slice};
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

/// Parameters of one extraction run.
#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub from: DateTime<Utc>,
    /// Defaults to the current instant when absent.
    pub to: Option<DateTime<Utc>>,
    pub interval_seconds: i64,
    pub batch_size: u32,
    pub task_count: usize,
}

/// Run a full extraction, fanning work units out over tokio tasks.
///
/// `make_handler` is called once per work unit (with the unit index) to
/// build that unit's record handler; the handler receives every normalized
/// record of the unit's windows in order and blocks the unit's fetch loop
/// until it returns.
///
/// Returns the total number of records handled across all units.
pub async fn run_extraction<S, H>(
    client: SoapClient,
    config: &ExtractionConfig,
    make_handler: S,
) -> Result<u64, MarketoError>
where
    S: Fn(usize) -> H,
    H: FnMut(NormalizedRecord) -> Result<(), MarketoError> + Send + 'static,
{
    let windows = generate_windows(config.from, config.to, config.interval_seconds)?;
    let units = slice(windows, config.task_count.max(1));
    log::info!(
        "Extracting {} window(s) across {} work unit(s)",
        units.iter().map(Vec::len).sum::<usize>(),
        units.len()
    );

    let mut set = JoinSet::new();
    for (index, unit) in units.into_iter().enumerate() {
        if unit.is_empty() {
            continue;
        }
        let fetcher = LeadFetcher::new(client.clone());
        let batch_size = config.batch_size;
        let mut handler = make_handler(index);

        set.spawn(async move {
            run_work_unit(index, fetcher, unit, batch_size, &mut handler).await
        });
    }

    let mut total = 0;
    while let Some(joined) = set.join_next().await {
        let count = joined
            .map_err(|e| MarketoError::Transport(format!("worker task failed: {}", e)))??;
        total += count;
    }

    log::info!("Extraction complete: {} record(s)", total);
    Ok(total)
}

/// Process one work unit's windows strictly in order.
async fn run_work_unit<H>(
    index: usize,
    fetcher: LeadFetcher,
    windows: Vec<TimeWindow>,
    batch_size: u32,
    handler: &mut H,
) -> Result<u64, MarketoError>
where
    H: FnMut(NormalizedRecord) -> Result<(), MarketoError> + Send,
{
    log::debug!("Work unit {}: {} window(s)", index, windows.len());
    let mut count = 0;
    for window in &windows {
        count += fetcher.fetch_window(window, batch_size, handler).await?;
    }
    log::debug!("Work unit {} done: {} record(s)", index, count);
    Ok(count)
}
