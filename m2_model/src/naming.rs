//! Resource names for files referenced by a model.
//!
//! Names are relative to the same root as the model name.
use m2_lib::m2::Texture;

/// The model name without the `.m2` extension like `"creature/wolf/wolf"`.
pub fn model_base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if !name[i..].contains(['/', '\\']) => &name[..i],
        _ => name,
    }
}

/// The external animation file for a sequence like `"creature/wolf/wolf0004-00.anim"`.
pub fn animation_file_name(base_name: &str, id: u16, variation_index: u16) -> String {
    format!("{base_name}{id:04}-{variation_index:02}.anim")
}

/// The skin file for a profile using file ids from the `SFID` chunk if present.
pub fn skin_file_name(base_name: &str, profile: usize, skin_file_ids: Option<&[u32]>) -> String {
    match skin_file_ids.and_then(|ids| ids.get(profile)) {
        Some(file_id) => format!("{file_id}.skin"),
        None => format!("{base_name}{profile:02}.skin"),
    }
}

/// The texture file using file ids from the `TXID` chunk if present
/// or [None] for textures assigned at runtime.
pub fn texture_file_name(
    texture: &Texture,
    index: usize,
    texture_file_ids: Option<&[u32]>,
) -> Option<String> {
    if texture.texture_type != 0 {
        return None;
    }

    match texture_file_ids.and_then(|ids| ids.get(index)) {
        Some(file_id) if *file_id != 0 => Some(format!("{file_id}.blp")),
        _ => {
            let path = normalize_path(&texture.filename);
            (!path.is_empty()).then_some(path)
        }
    }
}

/// Convert an embedded path like `"Creature\\Wolf\\Wolf.blp\0"` to `"creature/wolf/wolf.blp"`.
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches('\0').replace('\\', "/").to_lowercase()
}
