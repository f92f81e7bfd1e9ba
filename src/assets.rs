use std::io::Cursor;
use xmltree::Element;

pub const COSTUME_NAME_MAP: &str = "__costume_name_map__.json";
pub const SOUND_NAME_MAP: &str = "__sound_name_map__.json";
pub const COSTUME_META: &str = "__costume_meta__.json";

pub const DEFAULT_COSTUME_SVG: &str =
    r##"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1" viewBox="0 0 1 1"></svg>"##;

/// Content-addressed asset name: `(assetId, md5ext)`.
pub fn md5_name(data: &[u8], ext: &str) -> (String, String) {
    let digest = format!("{:x}", md5::compute(data));
    let md5ext = if ext.is_empty() {
        digest.clone()
    } else {
        format!("{}.{}", digest, ext)
    };
    (digest, md5ext)
}

/// Lowercased extension of a file name, without the dot.
pub fn extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

/// Display name from an asset file name: extension dropped, `123_` index prefix removed.
pub fn cleaned_asset_name(file_name: &str) -> String {
    let base = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    match base.split_once('_') {
        Some((prefix, rest)) if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) => {
            rest.to_string()
        }
        _ => base.to_string(),
    }
}

/// Folder-safe version of a sprite name.
pub fn safe_name(name: &str, fallback: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pixel size of an image, read from its header. SVGs use `width`/`height`,
/// falling back to the `viewBox`.
pub fn probe_image_size(data: &[u8], ext: &str) -> Option<(f64, f64)> {
    match ext {
        "png" => {
            if data.len() < 24 || !data.starts_with(b"\x89PNG") {
                return None;
            }
            let w = u32::from_be_bytes(data[16..20].try_into().ok()?);
            let h = u32::from_be_bytes(data[20..24].try_into().ok()?);
            Some((w as f64, h as f64))
        }
        "gif" => {
            if data.len() < 10 || !data.starts_with(b"GIF") {
                return None;
            }
            let w = u16::from_le_bytes(data[6..8].try_into().ok()?);
            let h = u16::from_le_bytes(data[8..10].try_into().ok()?);
            Some((w as f64, h as f64))
        }
        "bmp" => {
            if data.len() < 26 || !data.starts_with(b"BM") {
                return None;
            }
            let w = i32::from_le_bytes(data[18..22].try_into().ok()?);
            let h = i32::from_le_bytes(data[22..26].try_into().ok()?);
            // Negative height marks a top-down bitmap.
            Some((w.unsigned_abs() as f64, h.unsigned_abs() as f64))
        }
        "svg" => svg_size(data),
        _ => None,
    }
}

fn svg_size(data: &[u8]) -> Option<(f64, f64)> {
    let root = match Element::parse(Cursor::new(data)) {
        Ok(root) => root,
        Err(err) => {
            tracing::debug!("unreadable svg: {}", err);
            return None;
        }
    };
    let width = parse_svg_length(root.attributes.get("width").map(String::as_str));
    let height = parse_svg_length(root.attributes.get("height").map(String::as_str));
    if let (Some(w), Some(h)) = (width, height) {
        return Some((w, h));
    }
    root.attributes
        .get("viewBox")
        .and_then(|vb| parse_view_box(vb))
        .map(|(_, _, w, h)| (w, h))
}

fn parse_view_box(view_box: &str) -> Option<(f64, f64, f64, f64)> {
    let parts = view_box
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [min_x, min_y, w, h] if *w > 0.0 && *h > 0.0 => Some((*min_x, *min_y, *w, *h)),
        _ => None,
    }
}

/// Leading number of an SVG length such as `"480px"`; non-positive values are rejected.
fn parse_svg_length(value: Option<&str>) -> Option<f64> {
    let s = value?.trim_start();
    let mut end = 0usize;
    let mut saw_digit = false;
    let mut seen_dot = false;
    for (idx, ch) in s.char_indices() {
        match ch {
            '+' | '-' if idx == 0 => {}
            '0'..='9' => saw_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }
    if !saw_digit {
        return None;
    }
    let n = s[..end].parse::<f64>().ok()?;
    (n > 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(cleaned_asset_name("003__abc.svg"), "_abc");
        assert_eq!(cleaned_asset_name("12_Cat walk.png"), "Cat walk");
        assert_eq!(cleaned_asset_name("costume_1.svg"), "costume_1");
        assert_eq!(cleaned_asset_name("noext"), "noext");
        assert_eq!(safe_name("  Sprite/1?  ", "Sprite"), "Sprite_1_");
        assert_eq!(safe_name("***", "Sprite"), "___");
        assert_eq!(safe_name("   ", "Sprite"), "Sprite");
        assert_eq!(extension("a.PNG"), "png");
        assert_eq!(extension(".hidden"), "");
    }

    #[test]
    fn md5_names_are_content_addressed() {
        let (id, md5ext) = md5_name(b"", "svg");
        assert_eq!(id, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5ext, "d41d8cd98f00b204e9800998ecf8427e.svg");
        assert_eq!(md5_name(b"", "").1, id);
    }

    #[test]
    fn header_sizes() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        png.extend_from_slice(&480u32.to_be_bytes());
        png.extend_from_slice(&360u32.to_be_bytes());
        assert_eq!(probe_image_size(&png, "png"), Some((480.0, 360.0)));

        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&32u16.to_le_bytes());
        gif.extend_from_slice(&16u16.to_le_bytes());
        assert_eq!(probe_image_size(&gif, "gif"), Some((32.0, 16.0)));

        let mut bmp = b"BM".to_vec();
        bmp.resize(18, 0);
        bmp.extend_from_slice(&10i32.to_le_bytes());
        bmp.extend_from_slice(&(-20i32).to_le_bytes());
        assert_eq!(probe_image_size(&bmp, "bmp"), Some((10.0, 20.0)));

        assert_eq!(probe_image_size(b"short", "png"), None);
        assert_eq!(probe_image_size(b"whatever", "wav"), None);
    }

    #[test]
    fn svg_sizes() {
        let sized = br#"<svg xmlns="http://www.w3.org/2000/svg" width="96px" height="48"/>"#;
        assert_eq!(probe_image_size(sized, "svg"), Some((96.0, 48.0)));
        let boxed = br#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 40 20"/>"#;
        assert_eq!(probe_image_size(boxed, "svg"), Some((40.0, 20.0)));
        assert_eq!(probe_image_size(DEFAULT_COSTUME_SVG.as_bytes(), "svg"), Some((1.0, 1.0)));
        assert_eq!(probe_image_size(b"<not-svg", "svg"), None);
    }
}
