pub mod builder;
pub mod bundle;
pub mod codec;
pub mod cursor;
pub mod decode;
pub mod directory;
pub mod error;
pub mod extract;
pub mod header;
pub mod manifest;
pub mod object;
pub mod schema;

pub use bundle::{Bundle, EntryInfo};
pub use cursor::{ByteCursor, CursorError, Endian, RawBlob};
pub use decode::{DecodeError, DecodedPayload, Decoder, DecoderRegistry};
pub use directory::{Directory, EntryDescriptor};
pub use error::BundleError;
pub use extract::{CancelToken, ExtractOptions, Extractor};
pub use manifest::{Manifest, ManifestEntry, Outcome};
pub use object::{ObjectGraph, ResolvedObject, Resolver};
pub use schema::{SchemaRegistry, TypeTag};
