use image::imageops;

use super::texture::decode_rgba;
use super::{encode_png, file_name, require_float, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

/// Sprite → PNG cropped out of the texture it references.  The rect origin
/// is the top-left corner of the texture, matching the row order of the
/// unpacked pixels.
pub struct SpriteDecoder;

impl Decoder for SpriteDecoder {
    fn name(&self) -> &'static str { "sprite" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        file_name(object, ".png")
    }

    fn category(&self) -> Category { Category::Sprites }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let texture = object
            .object("texture")
            .ok_or(DecodeError::MissingField { type_tag: object.type_tag, field: "texture" })?;
        let atlas = decode_rgba(texture)?;

        let rect = [
            require_float(object, "rect_x")?,
            require_float(object, "rect_y")?,
            require_float(object, "rect_width")?,
            require_float(object, "rect_height")?,
        ];
        let [x, y, w, h] = rect.map(|v| v.round());
        let describe = || format!("({x}, {y}, {w}x{h}) in {}x{}", atlas.width(), atlas.height());
        if !(x >= 0.0 && y >= 0.0 && w >= 1.0 && h >= 1.0)
            || x + w > atlas.width() as f64
            || y + h > atlas.height() as f64
        {
            return Err(DecodeError::InvalidSpriteRect(describe()));
        }

        let cropped = imageops::crop_imm(&atlas, x as u32, y as u32, w as u32, h as u32).to_image();
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "image/png",
            category:    self.category(),
            bytes:       encode_png(&cropped)?,
            width:       Some(cropped.width()),
            height:      Some(cropped.height()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_support::{bytes, name, object};
    use crate::object::ResolvedValue;
    use crate::schema::TypeTag;
    use std::sync::Arc;

    fn atlas() -> Arc<ResolvedObject> {
        // 2x2 RGBA32: red, green / blue, white
        let px = [255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
        object(TypeTag::TEXTURE_2D, 1, vec![
            ("name", name("atlas")),
            ("width", ResolvedValue::Int(2)),
            ("height", ResolvedValue::Int(2)),
            ("texture_format", ResolvedValue::Int(4)),
            ("mip_count", ResolvedValue::Int(1)),
            ("image_data", bytes(&px)),
            ("stream_data", ResolvedValue::Object(None)),
        ])
    }

    fn sprite(texture: Option<Arc<ResolvedObject>>, rect: [f64; 4]) -> Arc<ResolvedObject> {
        object(TypeTag::SPRITE, 2, vec![
            ("name", name("coin")),
            ("texture", ResolvedValue::Object(texture)),
            ("rect_x", ResolvedValue::Float(rect[0])),
            ("rect_y", ResolvedValue::Float(rect[1])),
            ("rect_width", ResolvedValue::Float(rect[2])),
            ("rect_height", ResolvedValue::Float(rect[3])),
        ])
    }

    #[test]
    fn crops_the_referenced_texture() {
        let p = SpriteDecoder.decode(&sprite(Some(atlas()), [0.0, 1.0, 1.0, 1.0])).unwrap();
        assert_eq!((p.width, p.height), (Some(1), Some(1)));
        let img = image::load_from_memory(&p.bytes).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn rect_outside_texture_fails() {
        let err = SpriteDecoder.decode(&sprite(Some(atlas()), [1.0, 1.0, 2.0, 1.0])).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSpriteRect(_)));
    }

    #[test]
    fn null_texture_reference_fails() {
        let err = SpriteDecoder.decode(&sprite(None, [0.0, 0.0, 1.0, 1.0])).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "texture", .. }));
    }
}
