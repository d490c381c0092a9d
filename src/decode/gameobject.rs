use serde::Serialize;

use super::{sanitize_file_name, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

/// GameObject → `<name>_info.json` describing its parent and components.
pub struct GameObjectDecoder;

#[derive(Serialize)]
struct ComponentInfo<'a> {
    id:        u64,
    type_name: &'static str,
    type_tag:  u32,
    name:      &'a str,
}

#[derive(Serialize)]
struct GameObjectInfo<'a> {
    name:       &'a str,
    id:         u64,
    parent:     Option<u64>,
    components: Vec<ComponentInfo<'a>>,
    /// Component slots whose reference was null, dangling or cyclic.
    unresolved: usize,
}

impl Decoder for GameObjectDecoder {
    fn name(&self) -> &'static str { "gameobject" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        format!("{}_info.json", sanitize_file_name(object.display_name()))
    }

    fn category(&self) -> Category { Category::Objects }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let slots = object.objects("components");
        let components: Vec<_> = slots
            .iter()
            .flatten()
            .map(|c| ComponentInfo {
                id:        c.id,
                type_name: c.type_tag.name(),
                type_tag:  c.type_tag.0,
                name:      c.display_name(),
            })
            .collect();
        let info = GameObjectInfo {
            name:       object.display_name(),
            id:         object.id,
            parent:     object.object("parent").map(|p| p.id),
            unresolved: slots.len() - components.len(),
            components,
        };
        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   "application/json",
            category:    self.category(),
            bytes:       serde_json::to_vec_pretty(&info)?,
            width:       None,
            height:      None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_support::{name, object};
    use crate::object::ResolvedValue;
    use crate::schema::TypeTag;

    #[test]
    fn lists_resolved_components() {
        let mesh = object(TypeTag::MESH, 4, vec![("name", name("body"))]);
        let go = object(TypeTag::GAME_OBJECT, 3, vec![
            ("name", name("player")),
            ("parent", ResolvedValue::Object(None)),
            ("components", ResolvedValue::Objects(vec![Some(mesh), None])),
        ]);
        let p = GameObjectDecoder.decode(&go).unwrap();
        assert_eq!(p.output_name, "player_info.json");
        let json: serde_json::Value = serde_json::from_slice(&p.bytes).unwrap();
        assert_eq!(json["components"][0]["type_name"], "Mesh");
        assert_eq!(json["components"][0]["name"], "body");
        assert_eq!(json["unresolved"], 1);
        assert!(json["parent"].is_null());
    }
}
