//! Extraction orchestrator: resolved object graph → files + manifest.
//!
//! # Phases
//!
//! 1. **Plan** (sequential).  Every directory entry is turned into either a
//!    finished manifest row (empty, unreadable, unknown tag, no decoder) or a
//!    job carrying its decoder and final output path.  Output names are fixed
//!    here, so collision handling does not depend on scheduling: every name
//!    claimed by more than one object gets `_<object id>` appended, and a
//!    suffixed name that is still taken gets a further `_<n>`.
//! 2. **Decode + write** (parallel).  Jobs run on a bounded Rayon pool.  Each
//!    worker sends `(entry index, row)` over a channel to one collector
//!    thread, which is the only code that touches the manifest rows.
//!
//! # Cancellation
//!
//! Workers check the [`CancelToken`] before decoding and again before
//! writing.  A cancelled job is recorded as `Skipped`; jobs already writing
//! finish, and the sink never leaves a partial file.

pub mod sink;

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{debug, info, warn};

use crate::decode::{Decoder, DecoderRegistry};
use crate::manifest::{Manifest, ManifestEntry, Outcome};
use crate::object::{EntryState, ObjectGraph, ResolvedObject};

pub use sink::{DirectorySink, MemorySink, PayloadSink};

/// Progress callback: `(processed, total)` entries.  May be called from any
/// worker thread.
pub type ProgressFn = dyn Fn(u32, u32) + Send + Sync;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Worker count; `0` uses one per available core.
    pub threads:       usize,
    /// Write each file into a per-kind folder (`textures/`, `audio/`, ...).
    pub group_by_kind: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { threads: 0, group_by_kind: false }
    }
}

/// Shared cancellation flag.  Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct Job<'g> {
    index:   usize,
    object:  &'g Arc<ResolvedObject>,
    decoder: &'g Arc<dyn Decoder>,
    path:    PathBuf,
}

enum Plan<'g> {
    Done(ManifestEntry),
    Run(Job<'g>),
}

pub struct Extractor<S: PayloadSink> {
    registry: DecoderRegistry,
    sink:     S,
    options:  ExtractOptions,
    cancel:   CancelToken,
    progress: Option<Arc<ProgressFn>>,
}

impl<S: PayloadSink> Extractor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            registry: DecoderRegistry::with_defaults(),
            sink,
            options:  ExtractOptions::default(),
            cancel:   CancelToken::new(),
            progress: None,
        }
    }

    pub fn with_registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Decode and write every entry of `graph`.  Never fails as a whole: each
    /// entry's result is a manifest row, in directory order.
    pub fn run(&self, bundle_name: &str, graph: &ObjectGraph) -> Manifest {
        let total = graph.entries.len() as u32;
        let processed = AtomicU32::new(0);
        let tick = || {
            let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = &self.progress {
                cb(n, total);
            }
        };

        let mut rows: Vec<Option<ManifestEntry>> = vec![None; graph.entries.len()];
        let mut jobs = Vec::new();
        for (index, plan) in self.plan(graph).into_iter().enumerate() {
            match plan {
                Plan::Done(row) => {
                    rows[index] = Some(row);
                    tick();
                }
                Plan::Run(job) => jobs.push(job),
            }
        }
        debug!(jobs = jobs.len(), entries = total, "extraction planned");

        let rows = thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, ManifestEntry)>();
            let collector = scope.spawn(move || {
                for (index, row) in rx {
                    rows[index] = Some(row);
                }
                rows
            });
            self.dispatch(&jobs, tx, &tick);
            collector.join().unwrap_or_else(|p| std::panic::resume_unwind(p))
        });

        let entries = rows
            .into_iter()
            .zip(&graph.entries)
            .map(|(row, (entry, _))| {
                row.unwrap_or_else(|| {
                    ManifestEntry::new(entry.name.clone(), entry.type_tag.0, Outcome::Failed)
                        .with_reason("no result recorded")
                })
            })
            .collect();

        let manifest = Manifest {
            bundle:         bundle_name.to_owned(),
            format_version: graph.format_version,
            generated_at:   Utc::now().to_rfc3339(),
            cancelled:      self.cancel.is_cancelled(),
            entries,
        };
        info!(bundle = bundle_name, cancelled = manifest.cancelled, "{}", manifest.summary());
        manifest
    }

    // ── Plan ─────────────────────────────────────────────────────────────────

    fn plan<'g>(&'g self, graph: &'g ObjectGraph) -> Vec<Plan<'g>> {
        let mut plans = Vec::with_capacity(graph.entries.len());
        let mut claimed: HashMap<String, usize> = HashMap::new();

        for (index, (entry, state)) in graph.entries.iter().enumerate() {
            let skipped = |reason: String| {
                ManifestEntry::new(entry.name.clone(), entry.type_tag.0, Outcome::Skipped).with_reason(reason)
            };
            let plan = match state {
                EntryState::Empty => Plan::Done(skipped("empty entry".into())),
                EntryState::Failed(e) => Plan::Done(
                    ManifestEntry::new(entry.name.clone(), entry.type_tag.0, Outcome::Failed)
                        .with_reason(e.to_string()),
                ),
                EntryState::Resolved(id) => match graph.get(*id) {
                    None => Plan::Done(skipped(format!("object {id} missing from graph"))),
                    Some(object) if !object.known => Plan::Done(
                        skipped(format!("unknown type tag {}", object.type_tag.0)).with_object(*id),
                    ),
                    Some(object) => match self.registry.get(object.type_tag) {
                        None => Plan::Done(
                            skipped(format!("no decoder for {}", object.type_tag)).with_object(*id),
                        ),
                        Some(decoder) => {
                            let path = self.relative_path(decoder.as_ref(), object, None);
                            *claimed.entry(collision_key(&path)).or_insert(0) += 1;
                            Plan::Run(Job { index, object, decoder, path })
                        }
                    },
                },
            };
            plans.push(plan);
        }

        // Unique names are reserved first so a suffixed name never takes one.
        let mut taken: HashSet<String> = plans
            .iter()
            .filter_map(|plan| match plan {
                Plan::Run(job) => Some(collision_key(&job.path)),
                Plan::Done(_) => None,
            })
            .filter(|key| claimed.get(key).copied().unwrap_or(0) == 1)
            .collect();

        for plan in &mut plans {
            let Plan::Run(job) = plan else { continue };
            if claimed.get(&collision_key(&job.path)).copied().unwrap_or(0) <= 1 {
                continue;
            }
            let id = job.object.id;
            let mut path = self.relative_path(job.decoder.as_ref(), job.object, Some(&id.to_string()));
            let mut n = 1u32;
            while taken.contains(&collision_key(&path)) {
                path = self.relative_path(job.decoder.as_ref(), job.object, Some(&format!("{id}_{n}")));
                n += 1;
            }
            taken.insert(collision_key(&path));
            job.path = path;
        }
        plans
    }

    fn relative_path(&self, decoder: &dyn Decoder, object: &ResolvedObject, suffix: Option<&str>) -> PathBuf {
        let name = decoder.output_name(object);
        let name = match suffix {
            Some(suffix) => with_suffix(&name, suffix),
            None => name,
        };
        if self.options.group_by_kind {
            PathBuf::from(decoder.category().dir_name()).join(name)
        } else {
            PathBuf::from(name)
        }
    }

    // ── Execute ──────────────────────────────────────────────────────────────

    #[cfg(feature = "parallel")]
    fn dispatch(&self, jobs: &[Job<'_>], tx: mpsc::Sender<(usize, ManifestEntry)>, tick: &(dyn Fn() + Sync)) {
        use rayon::prelude::*;

        let run = || {
            jobs.par_iter().for_each_with(tx, |tx, job| {
                let row = self.execute(job);
                tick();
                // The collector outlives every worker.
                let _ = tx.send((job.index, row));
            });
        };
        if self.options.threads == 0 {
            return run();
        }
        match rayon::ThreadPoolBuilder::new().num_threads(self.options.threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "could not build worker pool; using the global pool");
                run()
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch(&self, jobs: &[Job<'_>], tx: mpsc::Sender<(usize, ManifestEntry)>, tick: &(dyn Fn() + Sync)) {
        for job in jobs {
            let row = self.execute(job);
            tick();
            let _ = tx.send((job.index, row));
        }
    }

    fn execute(&self, job: &Job<'_>) -> ManifestEntry {
        let object = job.object;
        let row = ManifestEntry::new(object.entry_name.clone(), object.type_tag.0, Outcome::Skipped)
            .with_object(object.id);
        if self.cancel.is_cancelled() {
            return row.with_reason("cancelled");
        }

        let payload = match job.decoder.decode(object) {
            Ok(p) => p,
            Err(e) => {
                warn!(entry = %object.entry_name, decoder = job.decoder.name(), error = %e, "decode failed");
                return ManifestEntry { outcome: Outcome::Failed, ..row }.with_reason(e.to_string());
            }
        };
        if self.cancel.is_cancelled() {
            return row.with_reason("cancelled");
        }

        if let Err(e) = self.sink.write(&job.path, &payload.bytes) {
            warn!(entry = %object.entry_name, path = %job.path.display(), error = %e, "write failed");
            return ManifestEntry { outcome: Outcome::Failed, ..row }.with_reason(format!("write failed: {e}"));
        }
        debug!(entry = %object.entry_name, path = %job.path.display(), bytes = payload.bytes.len(), "written");

        ManifestEntry {
            outcome:       Outcome::Success,
            output:        Some(job.path.clone()),
            bytes_written: payload.bytes.len() as u64,
            content_hash:  Some(blake3::hash(&payload.bytes).to_hex().to_string()),
            width:         payload.width,
            height:        payload.height,
            ..row
        }
    }
}

/// Case-folded so names that differ only in case still count as colliding.
fn collision_key(path: &std::path::Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// `hero.png` → `hero_12.png`; `README` → `README_12`.
fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{name}_{suffix}"),
    }
}
