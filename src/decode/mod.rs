//! Typed decoders: resolved object → exportable file payload.
//!
//! Decoders are looked up by type tag in a [`DecoderRegistry`].  The
//! orchestrator only ever talks to the [`Decoder`] trait, so a new resource
//! kind is supported by registering one more implementation.

pub mod audio;
pub mod blob;
pub mod gameobject;
pub mod mesh;
pub mod pixel;
pub mod sprite;
pub mod text;
pub mod texture;

use image::{ImageOutputFormat, RgbaImage};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

use crate::cursor::RawBlob;
use crate::object::ResolvedObject;
use crate::schema::TypeTag;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported pixel format {0}")]
    UnsupportedPixelFormat(i64),
    #[error("{type_tag} object is missing field '{field}'")]
    MissingField { type_tag: TypeTag, field: &'static str },
    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("pixel data too short: need {expected} bytes, have {actual}")]
    PixelDataTooShort { expected: usize, actual: usize },
    #[error("invalid text payload: {0}")]
    InvalidText(String),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("unsupported audio compression format {0}")]
    UnsupportedAudioFormat(i64),
    #[error("invalid audio clip: {0}")]
    InvalidAudio(String),
    #[error("sprite rect {0} lies outside its texture")]
    InvalidSpriteRect(String),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Payload ──────────────────────────────────────────────────────────────────

/// Output folder used when grouping files by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Textures,
    Sprites,
    Audio,
    Models,
    Text,
    Objects,
    Other,
}

impl Category {
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Textures => "textures",
            Category::Sprites  => "sprites",
            Category::Audio    => "audio",
            Category::Models   => "models",
            Category::Text     => "text",
            Category::Objects  => "objects",
            Category::Other    => "other",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedPayload {
    pub output_name: String,
    pub mime_hint:   &'static str,
    pub category:    Category,
    pub bytes:       Vec<u8>,
    pub width:       Option<u32>,
    pub height:      Option<u32>,
}

// ── Decoder trait ────────────────────────────────────────────────────────────

pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;
    /// File name the payload is written under, before collision handling.
    /// Must be cheap and must agree with `decode`'s `output_name`.
    fn output_name(&self, object: &ResolvedObject) -> String;
    fn category(&self) -> Category;
    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError>;
}

/// Type tag → decoder dispatch table.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<TypeTag, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// Registry with every built-in decoder.
    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register(TypeTag::TEXTURE_2D, Arc::new(texture::TextureDecoder));
        reg.register(TypeTag::SPRITE, Arc::new(sprite::SpriteDecoder));
        reg.register(TypeTag::TEXT_ASSET, Arc::new(text::TextDecoder));
        reg.register(TypeTag::AUDIO_CLIP, Arc::new(audio::AudioDecoder));
        reg.register(TypeTag::MESH, Arc::new(mesh::MeshDecoder));
        reg.register(TypeTag::GAME_OBJECT, Arc::new(gameobject::GameObjectDecoder));
        reg.register(TypeTag::RAW_DATA, Arc::new(blob::BlobDecoder));
        reg
    }

    /// Add or replace the decoder for `tag`.
    pub fn register(&mut self, tag: TypeTag, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(tag, decoder);
    }

    pub fn unregister(&mut self, tag: TypeTag) -> Option<Arc<dyn Decoder>> {
        self.decoders.remove(&tag)
    }

    pub fn get(&self, tag: TypeTag) -> Option<&Arc<dyn Decoder>> {
        self.decoders.get(&tag)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self { Self::with_defaults() }
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(crate) fn require_int(object: &ResolvedObject, field: &'static str) -> Result<i64, DecodeError> {
    object.int(field).ok_or(DecodeError::MissingField { type_tag: object.type_tag, field })
}

pub(crate) fn require_float(object: &ResolvedObject, field: &'static str) -> Result<f64, DecodeError> {
    object.float(field).ok_or(DecodeError::MissingField { type_tag: object.type_tag, field })
}

/// Payload bytes stored inline in `field`, or, when that is empty, in the
/// raw data object named by `stream_data`.
pub(crate) fn inline_or_streamed(object: &ResolvedObject, field: &'static str) -> Result<RawBlob, DecodeError> {
    match object.bytes(field) {
        Some(b) if !b.is_empty() => Ok(b.clone()),
        _ => object
            .object("stream_data")
            .and_then(|s| s.bytes("data"))
            .cloned()
            .ok_or(DecodeError::MissingField { type_tag: object.type_tag, field }),
    }
}

/// Make a recorded object name safe to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() { "unnamed".to_owned() } else { trimmed.to_owned() }
}

/// `<sanitized display name><suffix>`.
pub(crate) fn file_name(object: &ResolvedObject, suffix: &str) -> String {
    format!("{}{}", sanitize_file_name(object.display_name()), suffix)
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, DecodeError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) mod test_support {
    use indexmap::IndexMap;
    use std::sync::Arc;

    use crate::cursor::RawBlob;
    use crate::object::{ResolvedObject, ResolvedValue};
    use crate::schema::TypeTag;

    /// Hand-built resolved object for decoder unit tests.
    pub fn object(tag: TypeTag, id: u64, fields: Vec<(&'static str, ResolvedValue)>) -> Arc<ResolvedObject> {
        Arc::new(ResolvedObject {
            id,
            type_tag: tag,
            entry_name: format!("entry{id}"),
            fields: fields.into_iter().collect::<IndexMap<_, _>>(),
            raw: RawBlob::empty(),
            known: true,
        })
    }

    pub fn bytes(b: &[u8]) -> ResolvedValue {
        ResolvedValue::Bytes(RawBlob::from(b))
    }

    pub fn name(s: &str) -> ResolvedValue {
        ResolvedValue::Str(s.to_owned())
    }
}
