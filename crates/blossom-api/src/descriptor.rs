//! Blob Descriptor JSON shape (spec §4.5)

use serde::Serialize;

use blossom_meta::BlobMeta;

#[derive(Debug, Clone, Serialize)]
pub struct BlobDescriptor {
    pub url: String,
    pub sha256: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uploaded: i64,
}

impl BlobDescriptor {
    pub fn from_meta(meta: &BlobMeta, base_url: &str) -> Self {
        let ext = mime_to_ext(&meta.mime_type);
        let url = if ext.is_empty() {
            format!("{base_url}/{}", meta.sha256)
        } else {
            format!("{base_url}/{}.{ext}", meta.sha256)
        };

        Self {
            url,
            sha256: meta.sha256.clone(),
            size: meta.size,
            mime_type: meta.mime_type.clone(),
            uploaded: meta.created_at,
        }
    }
}

/// Fixed MIME -> extension table (spec §4.5). Unknown MIMEs map to "".
pub fn mime_to_ext(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "text/plain" => "txt",
        "text/html" => "html",
        "application/json" => "json",
        "application/zip" => "zip",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mime_maps_to_extension() {
        assert_eq!(mime_to_ext("image/png"), "png");
        assert_eq!(mime_to_ext("application/octet-stream"), "");
    }

    #[test]
    fn descriptor_url_omits_dot_for_unknown_mime() {
        let meta = BlobMeta {
            sha256: "a".repeat(64),
            size: 5,
            mime_type: "application/octet-stream".to_string(),
            created_at: 1,
            last_accessed: 1,
            access_count: 0,
        };
        let d = BlobDescriptor::from_meta(&meta, "http://127.0.0.1:24242");
        assert_eq!(d.url, format!("http://127.0.0.1:24242/{}", "a".repeat(64)));
    }

    #[test]
    fn descriptor_url_appends_extension_for_known_mime() {
        let meta = BlobMeta {
            sha256: "b".repeat(64),
            size: 5,
            mime_type: "text/plain".to_string(),
            created_at: 1,
            last_accessed: 1,
            access_count: 0,
        };
        let d = BlobDescriptor::from_meta(&meta, "http://127.0.0.1:24242");
        assert_eq!(d.url, format!("http://127.0.0.1:24242/{}.txt", "b".repeat(64)));
    }
}
