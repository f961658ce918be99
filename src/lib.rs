//! Workspace umbrella crate for the wavedb image similarity database.
//!
//! The `wavedb` crate re-exports the decode, signature, and store layers so
//! applications can drive the full pipeline through a single dependency.
//! Helpers such as [`signature_from_file`], [`add_file`], and [`query_file`]
//! orchestrate the stages end-to-end: decode an image to YIQ planes, reduce
//! the planes to a Haar wavelet signature, and insert into or probe the
//! in-memory database.
//!
//! ## Quick start
//!
//! ```no_run
//! use wavedb::{add_file, query_file, MemDb};
//!
//! # fn demo() -> Result<(), wavedb::PipelineError> {
//! let mut db = MemDb::new();
//! add_file(&mut db, 1, "photos/sunset.jpg")?;
//! add_file(&mut db, 2, "photos/harbor.jpg")?;
//!
//! for hit in query_file(&db, "photos/sunset-copy.jpg", 5)? {
//!     println!("{} scored {:.2}", hit.user_id, hit.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Metrics and structured logs can be captured by installing a
//! [`PipelineMetrics`] recorder via [`set_pipeline_metrics`] and/or a
//! [`PipelineEventLogger`] with [`set_pipeline_logger`]. Both hooks receive
//! the probed path, the user ID where one applies, and the concrete stage
//! outcome, so deployments can correlate pipeline behaviour with upstream
//! systems. `PipelineMetrics` suits latency/histogram telemetry;
//! `PipelineEventLogger` emits structured events for centralized logging.
//!
//! ## Errors
//!
//! Failures produced by any layer converge on [`PipelineError`], which
//! preserves the source error and the offending path for downstream
//! handling. Callers can distinguish decode, degenerate-image, and store
//! failures without depending on the individual workspace crates.

pub use decode::{decode_file, decode_image, DecodeError, DecodedImage};
pub use signature::{
    extract, DcTriple, Signature, SignatureError, IMG_SIDE, NUM_CHANNELS, NUM_COEFS,
    NUM_POSITIONS, WEIGHTS,
};
pub use store::{
    max_score, ImageRecord, MemDb, PersistError, QueryHit, QueryParams, SignatureFile,
    StoreError, StoredImage, UserId,
};

pub mod config;

use chrono::{SecondsFormat, Utc};
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};

/// Errors that can occur while processing an image through the pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The decoder could not produce YIQ planes for the file.
    Decode(DecodeError),
    /// The file decoded but is too flat to fingerprint.
    DegenerateImage { path: String, source: SignatureError },
    /// The database rejected the operation.
    Store(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Decode(err) => write!(f, "decode failure: {err}"),
            PipelineError::DegenerateImage { path, source } => {
                write!(f, "degenerate image {path}: {source}")
            }
            PipelineError::Store(err) => write!(f, "store failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Decode(err) => Some(err),
            PipelineError::DegenerateImage { source, .. } => Some(source),
            PipelineError::Store(err) => Some(err),
        }
    }
}

impl From<DecodeError> for PipelineError {
    fn from(value: DecodeError) -> Self {
        PipelineError::Decode(value)
    }
}

impl From<StoreError> for PipelineError {
    fn from(value: StoreError) -> Self {
        PipelineError::Store(value)
    }
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_decode(&self, latency: Duration, result: Result<(), &PipelineError>);
    fn record_extract(&self, latency: Duration, result: Result<(), &PipelineError>);
    fn record_index(&self, latency: Duration, result: Result<(), &StoreError>);
    fn record_query(&self, latency: Duration, hits: usize);
}

/// Processing stage captured in observability events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Decode,
    Extract,
    Index,
    Query,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Decode => "decode",
            PipelineStage::Extract => "extract",
            PipelineStage::Index => "index",
            PipelineStage::Query => "query",
        };
        f.write_str(name)
    }
}

/// Outcome of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEventStatus {
    Success,
    Failure,
}

impl fmt::Display for PipelineEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineEventStatus::Success => "success",
            PipelineEventStatus::Failure => "failure",
        };
        f.write_str(label)
    }
}

/// Structured observation describing the outcome of a pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub stage: PipelineStage,
    pub status: PipelineEventStatus,
    pub latency: Duration,
    pub path: Option<String>,
    pub user_id: Option<UserId>,
    pub error: Option<String>,
}

impl PipelineEvent {
    fn from_outcome(
        stage: PipelineStage,
        context: &StageContext,
        latency: Duration,
        error: Option<String>,
    ) -> Self {
        let status = if error.is_some() {
            PipelineEventStatus::Failure
        } else {
            PipelineEventStatus::Success
        };
        Self {
            stage,
            status,
            latency,
            path: context.path.clone(),
            user_id: context.user_id,
            error,
        }
    }

}

impl fmt::Display for PipelineEvent {
    /// Renders one `key=value` fragment per populated field. Paths and error
    /// messages are quoted with Rust string escaping, so embedded quotes and
    /// newlines cannot break the line format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage={} status={} latency_us={}",
            self.stage,
            self.status,
            self.latency.as_micros()
        )?;
        if let Some(path) = &self.path {
            write!(f, " path={path:?}")?;
        }
        if let Some(user_id) = self.user_id {
            write!(f, " user_id={user_id}")?;
        }
        if let Some(error) = &self.error {
            write!(f, " error={error:?}")?;
        }
        Ok(())
    }
}

/// Hook for emitting structured events per pipeline stage.
pub trait PipelineEventLogger: Send + Sync {
    fn log(&self, event: &PipelineEvent);
}

/// Logger that writes one `key=value` line per stage event to any writer,
/// prefixed with an RFC 3339 timestamp unless disabled.
pub struct KeyValueLogger {
    writer: Mutex<Box<dyn Write + Send>>,
    include_timestamp: bool,
}

impl KeyValueLogger {
    /// Create a logger that writes to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Create a logger backed by the provided writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
            include_timestamp: true,
        }
    }

    /// Toggle timestamp emission for the structured log line.
    pub fn with_timestamps(mut self, include_timestamp: bool) -> Self {
        self.include_timestamp = include_timestamp;
        self
    }
}

impl PipelineEventLogger for KeyValueLogger {
    fn log(&self, event: &PipelineEvent) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let _ = if self.include_timestamp {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            writeln!(writer, "timestamp={ts:?} {event}")
        } else {
            writeln!(writer, "{event}")
        };
    }
}

/// Globally installed observability hooks. Both slots start empty; stage
/// spans are only recorded while at least one hook is installed.
#[derive(Default)]
struct PipelineHooks {
    metrics: RwLock<Option<Arc<dyn PipelineMetrics>>>,
    logger: RwLock<Option<Arc<dyn PipelineEventLogger>>>,
}

fn hooks() -> &'static PipelineHooks {
    static HOOKS: OnceLock<PipelineHooks> = OnceLock::new();
    HOOKS.get_or_init(PipelineHooks::default)
}

fn read_slot<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn replace_slot<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    replace_slot(&hooks().metrics, recorder);
}

/// Install or clear the structured pipeline event logger.
pub fn set_pipeline_logger(logger: Option<Arc<dyn PipelineEventLogger>>) {
    replace_slot(&hooks().logger, logger);
}

#[derive(Debug, Clone, Default)]
struct StageContext {
    path: Option<String>,
    user_id: Option<UserId>,
}

impl StageContext {
    fn for_path(path: &Path) -> Self {
        Self {
            path: Some(path.display().to_string()),
            user_id: None,
        }
    }

    fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

struct MetricsSpan {
    recorder: Option<Arc<dyn PipelineMetrics>>,
    logger: Option<Arc<dyn PipelineEventLogger>>,
    stage: PipelineStage,
    context: StageContext,
    start: Instant,
}

impl MetricsSpan {
    fn start(stage: PipelineStage, context: StageContext) -> Option<Self> {
        let recorder = read_slot(&hooks().metrics);
        let logger = read_slot(&hooks().logger);
        if recorder.is_none() && logger.is_none() {
            return None;
        }
        Some(Self {
            recorder,
            logger,
            stage,
            context,
            start: Instant::now(),
        })
    }

    fn record_decode(self, result: Result<(), &PipelineError>) {
        let latency = self.start.elapsed();
        self.emit_event(latency, result.err().map(|e| e.to_string()));
        if let Some(recorder) = self.recorder {
            recorder.record_decode(latency, result);
        }
    }

    fn record_extract(self, result: Result<(), &PipelineError>) {
        let latency = self.start.elapsed();
        self.emit_event(latency, result.err().map(|e| e.to_string()));
        if let Some(recorder) = self.recorder {
            recorder.record_extract(latency, result);
        }
    }

    fn record_index(self, result: Result<(), &StoreError>) {
        let latency = self.start.elapsed();
        self.emit_event(latency, result.err().map(|e| e.to_string()));
        if let Some(recorder) = self.recorder {
            recorder.record_index(latency, result);
        }
    }

    fn record_query(self, hits: usize) {
        let latency = self.start.elapsed();
        self.emit_event(latency, None);
        if let Some(recorder) = self.recorder {
            recorder.record_query(latency, hits);
        }
    }

    fn emit_event(&self, latency: Duration, error: Option<String>) {
        if let Some(logger) = self.logger.as_ref() {
            let event = PipelineEvent::from_outcome(self.stage, &self.context, latency, error);
            logger.log(&event);
        }
    }
}

/// Signature, DC triple, and original resolution extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub signature: Signature,
    pub dc: DcTriple,
    pub width: u16,
    pub height: u16,
}

impl ExtractedImage {
    /// Pair the extracted signature with a user ID for insertion.
    pub fn into_record(self, user_id: UserId) -> ImageRecord {
        ImageRecord {
            user_id,
            signature: self.signature,
            dc: self.dc,
            width: self.width,
            height: self.height,
        }
    }
}

/// Decode `path` and reduce it to a signature and DC triple.
pub fn signature_from_file(path: impl AsRef<Path>) -> Result<ExtractedImage, PipelineError> {
    let path = path.as_ref();

    let decode_span = MetricsSpan::start(PipelineStage::Decode, StageContext::for_path(path));
    let decoded = match decode_file(path, IMG_SIDE as u32) {
        Ok(decoded) => {
            if let Some(span) = decode_span {
                span.record_decode(Ok(()));
            }
            decoded
        }
        Err(err) => {
            let err = PipelineError::Decode(err);
            if let Some(span) = decode_span {
                span.record_decode(Err(&err));
            }
            return Err(err);
        }
    };

    let extract_span = MetricsSpan::start(PipelineStage::Extract, StageContext::for_path(path));
    match extract(decoded.planes) {
        Ok((signature, dc)) => {
            if let Some(span) = extract_span {
                span.record_extract(Ok(()));
            }
            Ok(ExtractedImage {
                signature,
                dc,
                width: decoded.width,
                height: decoded.height,
            })
        }
        Err(source) => {
            let err = PipelineError::DegenerateImage {
                path: path.display().to_string(),
                source,
            };
            if let Some(span) = extract_span {
                span.record_extract(Err(&err));
            }
            Err(err)
        }
    }
}

/// Decode `path` and insert it into `db` under `user_id`.
pub fn add_file(
    db: &mut MemDb,
    user_id: UserId,
    path: impl AsRef<Path>,
) -> Result<UserId, PipelineError> {
    let path = path.as_ref();
    let extracted = signature_from_file(path)?;

    let span = MetricsSpan::start(
        PipelineStage::Index,
        StageContext::for_path(path).with_user(user_id),
    );
    match db.add_image(extracted.into_record(user_id)) {
        Ok(uid) => {
            if let Some(span) = span {
                span.record_index(Ok(()));
            }
            Ok(uid)
        }
        Err(err) => {
            if let Some(span) = span {
                span.record_index(Err(&err));
            }
            Err(PipelineError::Store(err))
        }
    }
}

/// Decode `path` and return the `limit` most similar stored images.
pub fn query_file(
    db: &MemDb,
    path: impl AsRef<Path>,
    limit: usize,
) -> Result<Vec<QueryHit>, PipelineError> {
    let path = path.as_ref();
    let extracted = signature_from_file(path)?;

    let span = MetricsSpan::start(PipelineStage::Query, StageContext::for_path(path));
    let hits = db.query(&QueryParams::new(extracted.signature, extracted.dc, limit));
    if let Some(span) = span {
        span.record_query(hits.len());
    }
    Ok(hits)
}
