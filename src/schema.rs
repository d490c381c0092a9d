//! Type tags and the per-type field tables that drive record parsing.
//!
//! The resolver never knows what a texture or a mesh looks like; it asks the
//! [`SchemaRegistry`] for the field list of a tag and reads those fields in
//! order.  Supporting a new object kind means registering one more
//! [`TypeSchema`], nothing else.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Engine class identifier of a serialized object.  Open set: unknown values
/// are representable and resolve to opaque handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypeTag(pub u32);

impl TypeTag {
    pub const GAME_OBJECT: TypeTag = TypeTag(1);
    pub const TEXTURE_2D:  TypeTag = TypeTag(28);
    pub const MESH:        TypeTag = TypeTag(43);
    pub const TEXT_ASSET:  TypeTag = TypeTag(49);
    pub const AUDIO_CLIP:  TypeTag = TypeTag(83);
    pub const SPRITE:      TypeTag = TypeTag(213);
    /// Split-out payload referenced by textures and audio clips.
    pub const RAW_DATA:    TypeTag = TypeTag(4096);

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::GAME_OBJECT => "GameObject",
            TypeTag::TEXTURE_2D  => "Texture2D",
            TypeTag::MESH        => "Mesh",
            TypeTag::TEXT_ASSET  => "TextAsset",
            TypeTag::AUDIO_CLIP  => "AudioClip",
            TypeTag::SPRITE      => "Sprite",
            TypeTag::RAW_DATA    => "RawData",
            _                    => "Unknown",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Wire encoding of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int32,
    UInt32,
    Int64,
    Float32,
    /// u32 length, UTF-8 bytes, align 4.
    String,
    /// u32 length, raw bytes, align 4.
    Bytes,
    /// u64 object id; 0 is the null reference.
    Reference,
    /// u32 count followed by that many u64 object ids.
    ReferenceList,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeSchema {
    pub tag:    TypeTag,
    pub fields: &'static [FieldDef],
}

use FieldKind::*;

pub static BUILTIN_SCHEMAS: &[TypeSchema] = &[
    TypeSchema {
        tag: TypeTag::GAME_OBJECT,
        fields: &[
            field("name", String),
            field("parent", Reference),
            field("components", ReferenceList),
        ],
    },
    TypeSchema {
        tag: TypeTag::TEXTURE_2D,
        fields: &[
            field("name", String),
            field("width", Int32),
            field("height", Int32),
            field("texture_format", Int32),
            field("mip_count", Int32),
            field("image_data", Bytes),
            field("stream_data", Reference),
        ],
    },
    TypeSchema {
        tag: TypeTag::MESH,
        fields: &[
            field("name", String),
            field("vertex_count", Int32),
            field("vertices", Bytes),
            field("index_format", Int32),
            field("indices", Bytes),
        ],
    },
    TypeSchema {
        tag: TypeTag::TEXT_ASSET,
        fields: &[
            field("name", String),
            field("encoding", Int32),
            field("script", Bytes),
        ],
    },
    TypeSchema {
        tag: TypeTag::AUDIO_CLIP,
        fields: &[
            field("name", String),
            field("channels", Int32),
            field("frequency", Int32),
            field("bits_per_sample", Int32),
            field("compression_format", Int32),
            field("data", Bytes),
            field("stream_data", Reference),
        ],
    },
    TypeSchema {
        tag: TypeTag::SPRITE,
        fields: &[
            field("name", String),
            field("texture", Reference),
            field("rect_x", Float32),
            field("rect_y", Float32),
            field("rect_width", Float32),
            field("rect_height", Float32),
        ],
    },
    TypeSchema {
        tag: TypeTag::RAW_DATA,
        fields: &[
            field("name", String),
            field("data", Bytes),
        ],
    },
];

/// Tag → field table lookup used by the resolver.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<TypeTag, TypeSchema>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self { schemas: HashMap::new() }
    }

    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        for schema in BUILTIN_SCHEMAS {
            reg.register(*schema);
        }
        reg
    }

    /// Add or replace the schema for `schema.tag`.
    pub fn register(&mut self, schema: TypeSchema) {
        self.schemas.insert(schema.tag, schema);
    }

    pub fn get(&self, tag: TypeTag) -> Option<&TypeSchema> {
        self.schemas.get(&tag)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self { Self::builtin() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_schema_starts_with_name() {
        for s in BUILTIN_SCHEMAS {
            assert_eq!(s.fields[0].name, "name", "{}", s.tag);
            assert_eq!(s.fields[0].kind, FieldKind::String);
        }
    }

    #[test]
    fn registry_accepts_new_tags() {
        let mut reg = SchemaRegistry::builtin();
        assert!(reg.get(TypeTag(114)).is_none());
        const FIELDS: &[FieldDef] = &[field("name", FieldKind::String)];
        reg.register(TypeSchema { tag: TypeTag(114), fields: FIELDS });
        assert_eq!(reg.get(TypeTag(114)).unwrap().fields.len(), 1);
    }
}
