//! Typed object records and their resolved form.
//!
//! Reading an entry produces an [`ObjectHandle`]: the record's fields in
//! schema order, with references still expressed as bare ids.  The
//! [`resolve`] pass turns handles into [`ResolvedObject`]s whose references
//! point directly at other resolved objects.

pub mod resolve;

use indexmap::IndexMap;
use std::sync::Arc;

use crate::cursor::{ByteCursor, CursorError, Endian, RawBlob};
use crate::schema::{FieldKind, SchemaRegistry, TypeTag};

pub use resolve::{EntryState, ObjectGraph, Resolver};

/// Stable object identifier within one container.  0 is the null reference.
pub type ObjectId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(RawBlob),
    /// Unresolved reference; `None` for the null id.
    Ref(Option<ObjectId>),
    RefList(Vec<ObjectId>),
}

/// An object record as read from its entry, references not yet followed.
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    pub id:       ObjectId,
    pub type_tag: TypeTag,
    /// Schema fields in declaration order.  Empty for opaque handles.
    pub fields:   IndexMap<&'static str, FieldValue>,
    /// The entry payload the record was read from (decompressed).
    pub raw:      RawBlob,
    /// False when no schema was registered for `type_tag`.
    pub known:    bool,
}

impl ObjectHandle {
    /// Read one record from `payload` using the schema registered for its tag.
    /// Unknown tags yield an opaque handle carrying only the raw bytes.
    pub fn read(payload: RawBlob, endian: Endian, schemas: &SchemaRegistry) -> Result<Self, CursorError> {
        let mut c = ByteCursor::new(payload.clone());
        let type_tag = TypeTag(c.read_u32(endian)?);
        let id = c.read_u64(endian)?;

        let Some(schema) = schemas.get(type_tag) else {
            return Ok(Self { id, type_tag, fields: IndexMap::new(), raw: payload, known: false });
        };

        let mut fields = IndexMap::with_capacity(schema.fields.len());
        for def in schema.fields {
            let value = match def.kind {
                FieldKind::Int32   => FieldValue::Int(c.read_i32(endian)? as i64),
                FieldKind::UInt32  => FieldValue::Int(c.read_u32(endian)? as i64),
                FieldKind::Int64   => FieldValue::Int(c.read_i64(endian)?),
                FieldKind::Float32 => FieldValue::Float(c.read_f32(endian)? as f64),
                FieldKind::String  => {
                    let len = c.read_u32(endian)? as u64;
                    let s = c.read_string(len)?;
                    c.read_aligned(4)?;
                    FieldValue::Str(s)
                }
                FieldKind::Bytes => {
                    let len = c.read_u32(endian)? as u64;
                    let b = c.slice(len)?;
                    c.read_aligned(4)?;
                    FieldValue::Bytes(b)
                }
                FieldKind::Reference => {
                    let target = c.read_u64(endian)?;
                    FieldValue::Ref((target != 0).then_some(target))
                }
                FieldKind::ReferenceList => {
                    let count = c.read_u32(endian)? as u64;
                    // Each id is 8 bytes; refuse counts the payload cannot hold.
                    if count.saturating_mul(8) > c.remaining() {
                        return Err(CursorError::OutOfBounds {
                            offset:    payload.source_offset() + c.position(),
                            requested: count.saturating_mul(8),
                            available: c.remaining(),
                        });
                    }
                    let mut ids = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        ids.push(c.read_u64(endian)?);
                    }
                    FieldValue::RefList(ids)
                }
            };
            fields.insert(def.name, value);
        }

        Ok(Self { id, type_tag, fields, raw: payload, known: true })
    }

    /// Ids of every non-null reference, in field order.
    pub fn references(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.fields.values().flat_map(|v| -> Vec<ObjectId> {
            match v {
                FieldValue::Ref(Some(id)) => vec![*id],
                FieldValue::RefList(ids)  => ids.iter().copied().filter(|&id| id != 0).collect(),
                _                         => Vec::new(),
            }
        })
    }
}

// ── Resolved form ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(RawBlob),
    /// `None` for null, dangling and cycle-breaking references.
    Object(Option<Arc<ResolvedObject>>),
    Objects(Vec<Option<Arc<ResolvedObject>>>),
}

#[derive(Debug, Clone)]
pub struct ResolvedObject {
    pub id:         ObjectId,
    pub type_tag:   TypeTag,
    /// Directory name of the entry the object was read from.
    pub entry_name: String,
    pub fields:     IndexMap<&'static str, ResolvedValue>,
    pub raw:        RawBlob,
    pub known:      bool,
}

impl ResolvedObject {
    pub fn field(&self, name: &str) -> Option<&ResolvedValue> {
        self.fields.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.field(name)? {
            ResolvedValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.field(name)? {
            ResolvedValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.field(name)? {
            ResolvedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&RawBlob> {
        match self.field(name)? {
            ResolvedValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<&Arc<ResolvedObject>> {
        match self.field(name)? {
            ResolvedValue::Object(o) => o.as_ref(),
            _ => None,
        }
    }

    pub fn objects(&self, name: &str) -> &[Option<Arc<ResolvedObject>>] {
        match self.field(name) {
            Some(ResolvedValue::Objects(list)) => list,
            _ => &[],
        }
    }

    /// Recorded name, falling back to the directory entry name.
    pub fn display_name(&self) -> &str {
        match self.str("name") {
            Some(n) if !n.is_empty() => n,
            _ => &self.entry_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordWriter;

    #[test]
    fn reads_fields_in_schema_order() {
        let rec = RecordWriter::new(TypeTag::SPRITE, 9, Endian::Big)
            .string("icon")
            .reference(4)
            .float32(1.0)
            .float32(2.0)
            .float32(3.0)
            .float32(4.5)
            .finish();
        let h = ObjectHandle::read(RawBlob::new(rec), Endian::Big, &SchemaRegistry::builtin()).unwrap();
        assert!(h.known);
        assert_eq!(h.id, 9);
        let names: Vec<_> = h.fields.keys().copied().collect();
        assert_eq!(names, ["name", "texture", "rect_x", "rect_y", "rect_width", "rect_height"]);
        assert_eq!(h.fields["texture"], FieldValue::Ref(Some(4)));
        assert_eq!(h.fields["rect_height"], FieldValue::Float(4.5));
        assert_eq!(h.references().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn unknown_tag_is_opaque() {
        let mut rec = RecordWriter::new(TypeTag(999), 3, Endian::Little).finish();
        rec.extend_from_slice(b"future payload");
        let h = ObjectHandle::read(RawBlob::new(rec.clone()), Endian::Little, &SchemaRegistry::builtin()).unwrap();
        assert!(!h.known);
        assert!(h.fields.is_empty());
        assert_eq!(h.raw.as_slice(), rec.as_slice());
    }

    #[test]
    fn truncated_record_is_out_of_bounds() {
        let rec = RecordWriter::new(TypeTag::TEXT_ASSET, 1, Endian::Little).string("a").finish();
        let err = ObjectHandle::read(RawBlob::new(rec), Endian::Little, &SchemaRegistry::builtin()).unwrap_err();
        assert!(matches!(err, CursorError::OutOfBounds { .. }));
    }

    #[test]
    fn huge_reference_list_is_rejected_before_allocating() {
        let rec = RecordWriter::new(TypeTag::GAME_OBJECT, 1, Endian::Little)
            .string("go")
            .reference(0)
            .uint32(u32::MAX)
            .finish();
        let err = ObjectHandle::read(RawBlob::new(rec), Endian::Little, &SchemaRegistry::builtin()).unwrap_err();
        assert!(matches!(err, CursorError::OutOfBounds { .. }));
    }
}
