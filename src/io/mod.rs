//! Annotation import/export.
//!
//! Each codec module ([`pvoc`], [`yolo`], [`json`]) converts between the
//! annotation model and one exchange format. They share one contract:
//! per-entry problems never abort an operation. Every load/save walks its
//! inputs, collects an [`ErrorInfoEntry`] per failed file/object/line,
//! and returns an [`IoResult`] reporting how many entries *did* succeed.
//! Only whole-operation preconditions (no class map, unparsable JSON
//! document) surface as hard errors.
//!
//! Batch work over independent files runs in parallel (rayon). Shared
//! state is limited to the append-only error list, the [`CategoryPool`]
//! (insert-if-absent category merging), and an atomic progress counter;
//! the final merge into the store is a single sequential commit.

pub mod folder;
pub mod json;
pub mod pvoc;
pub mod yolo;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::model::{ObjectCategory, RgbaColor};

/// What kind of operation produced an [`IoResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationType {
    AnnotationImport,
    AnnotationSaving,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::AnnotationImport => write!(f, "import"),
            OperationType::AnnotationSaving => write!(f, "saving"),
        }
    }
}

/// One collected per-entry failure: the offending source (file name,
/// object, line) and a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorInfoEntry {
    pub source_name: String,
    pub message: String,
}

impl ErrorInfoEntry {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfoEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_name, self.message)
    }
}

/// The single authoritative result object for every load/save operation.
#[derive(Clone, Debug)]
pub struct IoResult {
    pub operation: OperationType,
    /// Entries (files or annotations) that were applied successfully.
    pub success_count: usize,
    pub duration: Duration,
    pub errors: Vec<ErrorInfoEntry>,
}

impl IoResult {
    pub fn new(
        operation: OperationType,
        success_count: usize,
        duration: Duration,
        errors: Vec<ErrorInfoEntry>,
    ) -> Self {
        Self {
            operation,
            success_count,
            duration,
            errors,
        }
    }
}

impl fmt::Display for IoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Annotation {}: {} succeeded, {} failed ({} ms)",
            self.operation,
            self.success_count,
            self.errors.len(),
            self.duration.as_millis()
        )?;
        for entry in &self.errors {
            writeln!(f, "  {entry}")?;
        }
        Ok(())
    }
}

/// Cooperative abort for a running batch: new units of work are skipped,
/// in-flight ones finish.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared knobs for batch operations.
#[derive(Clone, Copy, Default)]
pub struct BatchOptions<'a> {
    /// Invoked with the completed fraction in `[0, 1]` after each unit of
    /// work. A UX contract, not a correctness one.
    pub progress: Option<&'a (dyn Fn(f64) + Sync)>,
    pub abort: Option<&'a AbortFlag>,
}

impl<'a> BatchOptions<'a> {
    pub(crate) fn report(&self, completed: usize, total: usize) {
        if let Some(progress) = self.progress {
            if total > 0 {
                progress(completed as f64 / total as f64);
            }
        }
    }

    pub(crate) fn aborted(&self) -> bool {
        self.abort.is_some_and(AbortFlag::is_aborted)
    }
}

/// Shared counter driving [`BatchOptions::report`] from parallel workers.
pub(crate) struct ProgressCounter<'a> {
    completed: AtomicUsize,
    total: usize,
    options: &'a BatchOptions<'a>,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(total: usize, options: &'a BatchOptions<'a>) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            options,
        }
    }

    pub(crate) fn tick(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.options.report(done, self.total);
    }
}

/// Thread-shared category registry for a parallel import.
///
/// Multiple files can introduce or reference the same category
/// concurrently; `intern` gives insert-if-absent merge semantics
/// (the first definition wins, categories already in the store win over
/// everything), and `record_shape` tallies parsed shapes per category
/// atomically with it.
pub(crate) struct CategoryPool {
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    categories: Vec<ObjectCategory>,
    index: HashMap<String, usize>,
    tallies: HashMap<String, usize>,
}

impl CategoryPool {
    /// Seeds the pool with the store's existing categories so their
    /// colors win over imported ones.
    pub(crate) fn seeded(existing: &[ObjectCategory]) -> Self {
        let categories: Vec<ObjectCategory> = existing.to_vec();
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, category)| (category.name.clone(), i))
            .collect();
        Self {
            inner: Mutex::new(PoolInner {
                categories,
                index,
                tallies: HashMap::new(),
            }),
        }
    }

    /// Inserts the category if absent; a random color is generated when
    /// the import did not specify one.
    pub(crate) fn intern(&self, name: &str, color: Option<RgbaColor>) {
        let mut inner = self.inner.lock().expect("category pool lock");
        if !inner.index.contains_key(name) {
            let position = inner.categories.len();
            inner.categories.push(ObjectCategory::new(
                name,
                color.unwrap_or_else(RgbaColor::random),
            ));
            inner.index.insert(name.to_string(), position);
        }
    }

    /// Counts one parsed shape for `name`.
    pub(crate) fn record_shape(&self, name: &str) {
        let mut inner = self.inner.lock().expect("category pool lock");
        *inner.tallies.entry(name.to_string()).or_insert(0) += 1;
    }

    /// The merged category list (store categories first, imported ones
    /// after, in first-seen order) and the parse-time tallies.
    pub(crate) fn into_parts(self) -> (Vec<ObjectCategory>, HashMap<String, usize>) {
        let inner = self.inner.into_inner().expect("category pool lock");
        (inner.categories, inner.tallies)
    }
}

/// Locale-independent fixed-point formatting (`.` decimal separator
/// regardless of host locale), parameterized by precision.
pub(crate) fn fmt_fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}
