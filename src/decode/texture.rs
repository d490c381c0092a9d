use image::RgbaImage;

use super::pixel::unpacker_for;
use super::{
    encode_png, file_name, inline_or_streamed, require_int, Category, DecodeError, DecodedPayload,
    Decoder,
};
use crate::object::ResolvedObject;

/// Texture2D → PNG.
pub struct TextureDecoder;

/// Unpack the top mip level of a texture object into an RGBA image.
pub fn decode_rgba(object: &ResolvedObject) -> Result<RgbaImage, DecodeError> {
    let width  = require_int(object, "width")?;
    let height = require_int(object, "height")?;
    let format = require_int(object, "texture_format")?;

    if width <= 0 || height <= 0 || width > u16::MAX as i64 || height > u16::MAX as i64 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    let unpacker = unpacker_for(format).ok_or(DecodeError::UnsupportedPixelFormat(format))?;
    let data = inline_or_streamed(object, "image_data")?;

    let (w, h) = (width as u32, height as u32);
    let rgba = unpacker.unpack(&data, w, h)?;
    RgbaImage::from_raw(w, h, rgba).ok_or(DecodeError::InvalidDimensions { width, height })
}

impl Decoder for TextureDecoder {
    fn name(&self) -> &'static str { "texture" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        file_name(object, ".png")
    }

    fn category(&self) -> Category { Category::Textures }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let image = decode_rgba(object)?;
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "image/png",
            category:    self.category(),
            bytes:       encode_png(&image)?,
            width:       Some(image.width()),
            height:      Some(image.height()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_support::{bytes, name, object};
    use crate::object::ResolvedValue;
    use crate::schema::TypeTag;

    fn texture(format: i64, data: &[u8], stream: Option<std::sync::Arc<ResolvedObject>>) -> std::sync::Arc<ResolvedObject> {
        object(TypeTag::TEXTURE_2D, 1, vec![
            ("name", name("hero")),
            ("width", ResolvedValue::Int(2)),
            ("height", ResolvedValue::Int(1)),
            ("texture_format", ResolvedValue::Int(format)),
            ("mip_count", ResolvedValue::Int(1)),
            ("image_data", bytes(data)),
            ("stream_data", ResolvedValue::Object(stream)),
        ])
    }

    #[test]
    fn rgba32_texture_becomes_png() {
        let tex = texture(4, &[255, 0, 0, 255, 0, 0, 255, 128], None);
        let payload = TextureDecoder.decode(&tex).unwrap();
        assert_eq!(payload.output_name, "hero.png");
        assert_eq!((payload.width, payload.height), (Some(2), Some(1)));
        assert_eq!(&payload.bytes[..8], b"\x89PNG\r\n\x1a\n");

        let back = image::load_from_memory(&payload.bytes).unwrap().to_rgba8();
        assert_eq!(back.get_pixel(1, 0).0, [0, 0, 255, 128]);
    }

    #[test]
    fn pixel_data_can_live_in_a_stream_object() {
        let stream = object(TypeTag::RAW_DATA, 2, vec![
            ("name", name("hero.resS")),
            ("data", bytes(&[1, 2, 3, 4, 5, 6])),
        ]);
        let tex = texture(3, &[], Some(stream));
        let img = decode_rgba(&tex).unwrap();
        assert_eq!(img.get_pixel(1, 0).0, [4, 5, 6, 255]);
    }

    #[test]
    fn unknown_format_is_unsupported() {
        let tex = texture(34, &[0; 8], None);
        assert!(matches!(TextureDecoder.decode(&tex), Err(DecodeError::UnsupportedPixelFormat(34))));
    }

    #[test]
    fn missing_pixels_are_reported() {
        let tex = texture(4, &[], None);
        assert!(matches!(decode_rgba(&tex), Err(DecodeError::MissingField { field: "image_data", .. })));
    }
}
