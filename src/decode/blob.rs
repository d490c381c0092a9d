use super::{sanitize_file_name, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

/// RawData → bytes verbatim.  Names that already carry an extension keep it.
pub struct BlobDecoder;

impl Decoder for BlobDecoder {
    fn name(&self) -> &'static str { "blob" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        let name = sanitize_file_name(object.display_name());
        if name.contains('.') { name } else { format!("{name}.bin") }
    }

    fn category(&self) -> Category { Category::Other }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let data = object
            .bytes("data")
            .ok_or(DecodeError::MissingField { type_tag: object.type_tag, field: "data" })?;
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "application/octet-stream",
            category:    self.category(),
            bytes:       data.to_vec(),
            width:       None,
            height:      None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_support::{bytes, name, object};
    use crate::schema::TypeTag;

    #[test]
    fn passes_bytes_through() {
        let o = object(TypeTag::RAW_DATA, 3, vec![("name", name("level0")), ("data", bytes(&[0, 1, 2]))]);
        let p = BlobDecoder.decode(&o).unwrap();
        assert_eq!(p.output_name, "level0.bin");
        assert_eq!(p.bytes, [0, 1, 2]);
    }

    #[test]
    fn keeps_existing_extension() {
        let o = object(TypeTag::RAW_DATA, 3, vec![("name", name("atlas.resS")), ("data", bytes(&[]))]);
        assert_eq!(BlobDecoder.output_name(&o), "atlas.resS");
    }
}
