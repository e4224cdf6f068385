use uuid::Uuid;

pub const UPLOAD_DIR: &str = "upload/recipe";

/// Storage key for a newly uploaded recipe image.
pub fn recipe_image_file_path(filename: &str) -> String {
    recipe_image_file_path_with(filename, Uuid::new_v4())
}

/// `upload/recipe/<id>.<ext>`, keeping the extension of `filename` only when it is
/// plain ASCII alphanumeric so nothing user-supplied can steer the path.
pub fn recipe_image_file_path_with(filename: &str, id: Uuid) -> String {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{UPLOAD_DIR}/{id}.{ext}"),
        None => format!("{UPLOAD_DIR}/{id}"),
    }
}

/// Content type of an image recognised by its leading bytes.
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}
