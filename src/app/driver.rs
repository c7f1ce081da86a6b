//! JSON-lines driver
//!
//! Reads one message per input line, hands it to the configured handler and
//! writes every released message to standard output as one JSON line.
//! Discarded messages go to the discard file when one is configured.

use crate::aggregator::{
    CorrelatingMessageHandler, HandlerStatistics, MessagingError, Reaper,
    ResequencingMessageHandler, TaskScheduler,
};
use crate::app::config::{AppConfig, Mode};
use crate::app::error::AppError;
use crate::channel::{MessageChannel, QueueChannel};
use crate::message::Message;
use crate::store::MessageGroupStore;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

const SINK_POLL: Duration = Duration::from_millis(20);

/// Everything one run needs beyond the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub config: AppConfig,
    /// Standard input when `None`
    pub input: Option<PathBuf>,
    pub flush_on_exit: bool,
    pub drain: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: u64,
    pub rejected: u64,
    pub released: u64,
    pub discarded: u64,
    pub open_groups: usize,
    pub statistics: HandlerStatistics,
}

#[derive(Clone)]
enum Engine {
    Aggregator(CorrelatingMessageHandler),
    Resequencer(ResequencingMessageHandler),
}

impl Engine {
    fn build(
        config: &AppConfig,
        output: Arc<dyn MessageChannel>,
        discard: Option<Arc<dyn MessageChannel>>,
        scheduler: TaskScheduler,
    ) -> Result<Self, AppError> {
        let aggregator = config.aggregator_config();
        let engine = match config.mode {
            Mode::Aggregator => {
                let mut builder = CorrelatingMessageHandler::builder()
                    .output_channel(output)
                    .scheduler(scheduler)
                    .config(aggregator);
                if let Some(discard) = discard {
                    builder = builder.discard_channel(discard);
                }
                Engine::Aggregator(builder.build()?)
            }
            Mode::Resequencer => {
                let mut builder = ResequencingMessageHandler::builder()
                    .output_channel(output)
                    .scheduler(scheduler)
                    .config(aggregator);
                if let Some(discard) = discard {
                    builder = builder.discard_channel(discard);
                }
                Engine::Resequencer(builder.build()?)
            }
        };
        Ok(engine)
    }

    fn handle(&self, message: Message) -> Result<(), MessagingError> {
        match self {
            Engine::Aggregator(handler) => handler.handle(message),
            Engine::Resequencer(handler) => handler.handle(message),
        }
    }

    fn expire_message_groups(&self, older_than: Duration) -> usize {
        match self {
            Engine::Aggregator(handler) => handler.expire_message_groups(older_than),
            Engine::Resequencer(handler) => handler.expire_message_groups(older_than),
        }
    }

    fn store(&self) -> &Arc<dyn MessageGroupStore> {
        match self {
            Engine::Aggregator(handler) => handler.store(),
            Engine::Resequencer(handler) => handler.store(),
        }
    }

    fn reaper(&self) -> Option<&Reaper> {
        match self {
            Engine::Aggregator(handler) => handler.reaper(),
            Engine::Resequencer(handler) => handler.reaper(),
        }
    }

    fn statistics(&self) -> HandlerStatistics {
        match self {
            Engine::Aggregator(handler) => handler.statistics(),
            Engine::Resequencer(handler) => handler.statistics(),
        }
    }
}

/// Drains a channel into a writer on a blocking thread until stopped
///
/// Dropping the sink stops it too, so an early error return cannot leave the
/// writer thread polling forever.
struct JsonLinesSink {
    stop: Arc<AtomicBool>,
    task: Option<JoinHandle<std::io::Result<u64>>>,
}

impl JsonLinesSink {
    fn spawn(channel: Arc<QueueChannel>, writer: Box<dyn Write + Send>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();
        let task = tokio::task::spawn_blocking(move || -> std::io::Result<u64> {
            let mut out = BufWriter::new(writer);
            let mut written = 0;
            loop {
                match channel.receive(SINK_POLL) {
                    Some(message) => {
                        write_line(&mut out, &message)?;
                        written += 1;
                    }
                    None if stopped.load(Ordering::Acquire) => break,
                    None => out.flush()?,
                }
            }
            for message in channel.drain() {
                write_line(&mut out, &message)?;
                written += 1;
            }
            out.flush()?;
            Ok(written)
        });
        Self {
            stop,
            task: Some(task),
        }
    }

    /// Stop after the channel is empty and return the number of lines written
    async fn finish(mut self) -> Result<u64, AppError> {
        self.stop.store(true, Ordering::Release);
        match self.task.take() {
            Some(task) => task.await?.map_err(|e| AppError::io("writing messages", e)),
            None => Ok(0),
        }
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn write_line(out: &mut impl Write, message: &Message) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")
}

async fn open_input(input: Option<&PathBuf>) -> Result<Box<dyn AsyncRead + Unpin + Send>, AppError> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| AppError::open(path, e))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdin())),
    }
}

/// Run the handler over the input and report what happened
///
/// Released messages are written to `stdout`.
pub async fn run(
    settings: RunSettings,
    stdout: Box<dyn Write + Send>,
) -> Result<RunSummary, AppError> {
    let config = &settings.config;
    let input = open_input(settings.input.as_ref()).await?;
    let discard_file = match &config.discard_file {
        Some(path) => Some(std::fs::File::create(path).map_err(|e| AppError::open(path, e))?),
        None => None,
    };

    let output = Arc::new(QueueChannel::new("output", config.output_capacity));
    let discard = discard_file
        .as_ref()
        .map(|_| Arc::new(QueueChannel::new("discard", config.discard_capacity)));
    let scheduler = TaskScheduler::new(tokio::runtime::Handle::current());
    let engine = Engine::build(
        config,
        output.clone(),
        discard
            .clone()
            .map(|channel| channel as Arc<dyn MessageChannel>),
        scheduler,
    )?;
    log::info!("Running as {} with {:?}", config.mode, config.aggregator_config());

    let output_sink = JsonLinesSink::spawn(output, stdout);
    let discard_sink = discard
        .zip(discard_file)
        .map(|(channel, file)| JsonLinesSink::spawn(channel, Box::new(file)));

    let mut summary = RunSummary::default();
    let mut lines = BufReader::new(input).lines();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.map_err(|e| AppError::io("reading input", e))?,
            _ = &mut interrupted => {
                log::warn!("Interrupted, no further input is read");
                break;
            }
        };
        let Some(line) = line else { break };
        summary.lines += 1;
        if line.trim().is_empty() {
            continue;
        }
        let message: Message = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Line {}: not a valid message: {}", summary.lines, e);
                summary.rejected += 1;
                continue;
            }
        };
        // Sends may block on a full output channel
        let handler = engine.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || handler.handle(message)).await? {
            log::warn!("Line {}: {}", summary.lines, e);
            summary.rejected += 1;
        }
    }
    log::debug!("Input exhausted after {} line(s)", summary.lines);

    if settings.flush_on_exit {
        let handler = engine.clone();
        let flushed =
            tokio::task::spawn_blocking(move || handler.expire_message_groups(Duration::ZERO))
                .await?;
        log::info!("Flushed {} open group(s)", flushed);
    }
    if !settings.drain.is_zero() {
        log::debug!("Waiting {:?} for pending group timeouts", settings.drain);
        tokio::time::sleep(settings.drain).await;
    }
    if let Some(reaper) = engine.reaper() {
        reaper.stop();
    }

    summary.open_groups = engine.store().message_group_count();
    if summary.open_groups > 0 {
        log::warn!("{} group(s) still open at exit", summary.open_groups);
    }
    summary.statistics = engine.statistics();
    summary.released = output_sink.finish().await?;
    if let Some(sink) = discard_sink {
        summary.discarded = sink.finish().await?;
    }
    Ok(summary)
}
