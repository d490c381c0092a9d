//! Entry → object resolution.
//!
//! # Passes
//! 1. Every non-empty entry is sliced out of the container (checked against
//!    the container bounds and, for v2, its CRC32), decompressed, and read
//!    into an [`ObjectHandle`].  Failures are recorded per entry.
//! 2. References are followed with an explicit work stack.  Each object is
//!    built exactly once, after everything it points at.  An id that is still
//!    on the stack when it is seen again closes a cycle; that edge becomes a
//!    null reference instead of recursing.
//!
//! Stack depth is independent of graph depth, so deep chains and cycles of
//! any length terminate.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{FieldValue, ObjectHandle, ObjectId, ResolvedObject, ResolvedValue};
use crate::codec::{decompress_entry, max_uncompressed_len, Compression};
use crate::cursor::RawBlob;
use crate::directory::{Directory, EntryDescriptor};
use crate::error::BundleError;
use crate::schema::SchemaRegistry;

/// Outcome of reading one directory entry.
#[derive(Debug)]
pub enum EntryState {
    /// Zero-length entry; never opened.
    Empty,
    /// Entry could not be read; the error is local to it.
    Failed(BundleError),
    /// Entry holds the object with this id.
    Resolved(ObjectId),
}

/// All entries of one container with their resolved objects.
#[derive(Debug)]
pub struct ObjectGraph {
    pub format_version: u32,
    /// One state per directory entry, in directory order.
    pub entries:       Vec<(EntryDescriptor, EntryState)>,
    objects:           IndexMap<ObjectId, Arc<ResolvedObject>>,
    /// References replaced by null to break a cycle.
    pub broken_cycles: usize,
    /// References to ids no entry declares.
    pub dangling:      usize,
}

impl ObjectGraph {
    pub fn get(&self, id: ObjectId) -> Option<&Arc<ResolvedObject>> {
        self.objects.get(&id)
    }

    /// Resolved objects in directory order.
    pub fn objects(&self) -> impl Iterator<Item = &Arc<ResolvedObject>> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

pub struct Resolver {
    schemas: SchemaRegistry,
}

enum Step {
    Enter(ObjectId),
    Exit(ObjectId),
}

impl Resolver {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self { schemas }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Slice, verify and decompress the payload of one entry.
    pub fn open_entry(container: &RawBlob, entry: &EntryDescriptor) -> Result<RawBlob, BundleError> {
        let stored = container.slice(entry.byte_offset, entry.byte_length)?;
        if let Some(expected) = entry.checksum {
            let actual = crc32fast::hash(&stored);
            if actual != expected {
                return Err(BundleError::ChecksumMismatch { entry: entry.name.clone(), expected, actual });
            }
        }
        if entry.compression == Compression::None {
            return Ok(stored);
        }
        let limit = max_uncompressed_len(entry.compression, entry.byte_length);
        if entry.uncompressed_len > limit {
            return Err(BundleError::ImplausibleSize {
                entry:    entry.name.clone(),
                declared: entry.uncompressed_len,
                stored:   entry.byte_length,
                limit,
            });
        }
        let plain = decompress_entry(entry.compression, &stored, entry.uncompressed_len as usize)?;
        Ok(RawBlob::new(plain))
    }

    pub fn resolve(&self, container: &RawBlob, directory: &Directory) -> ObjectGraph {
        let endian = directory.header.object_endian();
        let mut handles: IndexMap<ObjectId, (ObjectHandle, String)> = IndexMap::new();
        let mut entries = Vec::with_capacity(directory.entries.len());

        for entry in &directory.entries {
            let state = if entry.is_empty() {
                EntryState::Empty
            } else {
                match self.read_entry(container, entry, endian, &handles) {
                    Ok(handle) => {
                        let id = handle.id;
                        handles.insert(id, (handle, entry.name.clone()));
                        EntryState::Resolved(id)
                    }
                    Err(e) => {
                        warn!(entry = %entry.name, error = %e, "entry could not be read");
                        EntryState::Failed(e)
                    }
                }
            };
            entries.push((entry.clone(), state));
        }

        let mut graph = ObjectGraph {
            format_version: directory.header.version,
            entries,
            objects: IndexMap::with_capacity(handles.len()),
            broken_cycles: 0,
            dangling: 0,
        };
        let ids: Vec<ObjectId> = handles.keys().copied().collect();
        for id in ids {
            self.link(id, &handles, &mut graph);
        }
        // Insertion happened in post-order; restore directory order.
        graph
            .objects
            .sort_by(|a, _, b, _| handles.get_index_of(a).cmp(&handles.get_index_of(b)));

        debug!(
            objects = graph.objects.len(),
            broken_cycles = graph.broken_cycles,
            dangling = graph.dangling,
            "object graph resolved"
        );
        graph
    }

    fn read_entry(
        &self,
        container: &RawBlob,
        entry:     &EntryDescriptor,
        endian:    crate::cursor::Endian,
        seen:      &IndexMap<ObjectId, (ObjectHandle, String)>,
    ) -> Result<ObjectHandle, BundleError> {
        let payload = Self::open_entry(container, entry)?;
        let handle = ObjectHandle::read(payload, endian, &self.schemas)?;
        if handle.id == 0 {
            return Err(BundleError::InvalidObjectId);
        }
        if seen.contains_key(&handle.id) {
            return Err(BundleError::DuplicateObject(handle.id));
        }
        if handle.type_tag != entry.type_tag {
            warn!(
                entry = %entry.name,
                directory = %entry.type_tag,
                record = %handle.type_tag,
                "type tag mismatch; using the record's tag"
            );
        }
        Ok(handle)
    }

    /// Resolve `root` and everything reachable from it that is not yet built.
    fn link(
        &self,
        root:    ObjectId,
        handles: &IndexMap<ObjectId, (ObjectHandle, String)>,
        graph:   &mut ObjectGraph,
    ) {
        let mut in_progress: HashSet<ObjectId> = HashSet::new();
        let mut stack = vec![Step::Enter(root)];

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => {
                    if graph.objects.contains_key(&id) || in_progress.contains(&id) {
                        continue;
                    }
                    let Some((handle, _)) = handles.get(&id) else { continue };
                    in_progress.insert(id);
                    stack.push(Step::Exit(id));
                    let children: Vec<ObjectId> = handle.references().collect();
                    for child in children.into_iter().rev() {
                        if handles.contains_key(&child)
                            && !graph.objects.contains_key(&child)
                            && !in_progress.contains(&child)
                        {
                            stack.push(Step::Enter(child));
                        }
                    }
                }
                Step::Exit(id) => {
                    let (handle, entry_name) = &handles[&id];
                    let resolved = self.build(handle, entry_name, handles, graph);
                    in_progress.remove(&id);
                    graph.objects.insert(id, Arc::new(resolved));
                }
            }
        }
    }

    fn build(
        &self,
        handle:     &ObjectHandle,
        entry_name: &str,
        handles:    &IndexMap<ObjectId, (ObjectHandle, String)>,
        graph:      &mut ObjectGraph,
    ) -> ResolvedObject {
        let mut lookup = |from: ObjectId, target: ObjectId| -> Option<Arc<ResolvedObject>> {
            if target == 0 {
                return None;
            }
            if let Some(obj) = graph.objects.get(&target) {
                return Some(Arc::clone(obj));
            }
            if handles.contains_key(&target) {
                graph.broken_cycles += 1;
                debug!(from, to = target, "reference cycle broken with null");
            } else {
                graph.dangling += 1;
                warn!(from, to = target, "dangling reference");
            }
            None
        };

        let fields = handle
            .fields
            .iter()
            .map(|(&name, value)| {
                let resolved = match value {
                    FieldValue::Int(v)       => ResolvedValue::Int(*v),
                    FieldValue::Float(v)     => ResolvedValue::Float(*v),
                    FieldValue::Str(s)       => ResolvedValue::Str(s.clone()),
                    FieldValue::Bytes(b)     => ResolvedValue::Bytes(b.clone()),
                    FieldValue::Ref(None)    => ResolvedValue::Object(None),
                    FieldValue::Ref(Some(t)) => ResolvedValue::Object(lookup(handle.id, *t)),
                    FieldValue::RefList(ids) => {
                        ResolvedValue::Objects(ids.iter().map(|&t| lookup(handle.id, t)).collect())
                    }
                };
                (name, resolved)
            })
            .collect();

        ResolvedObject {
            id:         handle.id,
            type_tag:   handle.type_tag,
            entry_name: entry_name.to_owned(),
            fields,
            raw:        handle.raw.clone(),
            known:      handle.known,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(SchemaRegistry::builtin())
    }
}
