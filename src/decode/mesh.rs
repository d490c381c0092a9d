use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Write;

use super::{file_name, require_int, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

/// Mesh → Wavefront OBJ.  Vertices are packed little-endian `f32` xyz
/// triples; indices form a triangle list.
pub struct MeshDecoder;

fn read_indices(bytes: &[u8], index_format: i64) -> Result<Vec<u32>, DecodeError> {
    match index_format {
        0 => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::InvalidMesh("16-bit index buffer has odd length".into()));
            }
            Ok(bytes.chunks_exact(2).map(|c| LittleEndian::read_u16(c) as u32).collect())
        }
        1 => {
            if bytes.len() % 4 != 0 {
                return Err(DecodeError::InvalidMesh("32-bit index buffer length not a multiple of 4".into()));
            }
            Ok(bytes.chunks_exact(4).map(LittleEndian::read_u32).collect())
        }
        other => Err(DecodeError::InvalidMesh(format!("unknown index format {other}"))),
    }
}

pub fn to_obj(name: &str, vertices: &[u8], vertex_count: usize, indices: &[u32]) -> Result<String, DecodeError> {
    if vertices.len() < vertex_count * 12 {
        return Err(DecodeError::InvalidMesh(format!(
            "{vertex_count} vertices need {} bytes, have {}",
            vertex_count * 12,
            vertices.len()
        )));
    }
    if indices.len() % 3 != 0 {
        return Err(DecodeError::InvalidMesh(format!("{} indices is not a triangle list", indices.len())));
    }
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(DecodeError::InvalidMesh(format!("index {bad} out of range for {vertex_count} vertices")));
    }

    let mut obj = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(obj, "o {name}");
    for v in vertices[..vertex_count * 12].chunks_exact(12) {
        let x = LittleEndian::read_f32(&v[0..4]);
        let y = LittleEndian::read_f32(&v[4..8]);
        let z = LittleEndian::read_f32(&v[8..12]);
        let _ = writeln!(obj, "v {x} {y} {z}");
    }
    for tri in indices.chunks_exact(3) {
        let _ = writeln!(obj, "f {} {} {}", tri[0] + 1, tri[1] + 1, tri[2] + 1);
    }
    Ok(obj)
}

impl Decoder for MeshDecoder {
    fn name(&self) -> &'static str { "mesh" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        file_name(object, ".obj")
    }

    fn category(&self) -> Category { Category::Models }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let vertex_count = require_int(object, "vertex_count")?;
        if vertex_count < 0 {
            return Err(DecodeError::InvalidMesh(format!("negative vertex count {vertex_count}")));
        }
        let missing = |field| DecodeError::MissingField { type_tag: object.type_tag, field };
        let vertices = object.bytes("vertices").ok_or_else(|| missing("vertices"))?;
        let index_bytes = object.bytes("indices").ok_or_else(|| missing("indices"))?;
        let indices = read_indices(index_bytes, require_int(object, "index_format")?)?;

        let obj = to_obj(object.display_name(), vertices, vertex_count as usize, &indices)?;
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "model/obj",
            category:    self.category(),
            bytes:       obj.into_bytes(),
            width:       None,
            height:      None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    #[test]
    fn triangle_exports_one_based_faces() {
        let verts = floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.5, 0.0]);
        let obj = to_obj("tri", &verts, 3, &[0, 1, 2]).unwrap();
        assert_eq!(obj, "o tri\nv 0 0 0\nv 1 0 0\nv 0 1.5 0\nf 1 2 3\n");
    }

    #[test]
    fn index_buffers_are_validated() {
        let verts = floats(&[0.0; 9]);
        assert!(to_obj("m", &verts, 3, &[0, 1]).is_err());
        assert!(to_obj("m", &verts, 3, &[0, 1, 3]).is_err());
        assert!(to_obj("m", &verts, 4, &[0, 1, 2]).is_err());
    }

    #[test]
    fn reads_both_index_widths() {
        assert_eq!(read_indices(&[1, 0, 2, 0], 0).unwrap(), vec![1, 2]);
        assert_eq!(read_indices(&[7, 0, 0, 0], 1).unwrap(), vec![7]);
        assert!(read_indices(&[1, 0, 2], 0).is_err());
        assert!(read_indices(&[], 5).is_err());
    }
}
