// Content type classification for printable content

use image::ImageFormat;
use serde::Serialize;

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentType {
    pub mime: String,
    pub uti: String,
    pub extensions: Vec<String>,
    pub renderable: bool,
}

impl ContentType {
    pub fn new(mime: &str, uti: &str, extensions: &[&str], renderable: bool) -> Self {
        Self {
            mime: mime.to_string(),
            uti: uti.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            renderable,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Type hints available for a location without loading it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeHint<'a> {
    pub declared_mime: Option<&'a str>,
    pub extension: Option<&'a str>,
    pub header: Option<&'a [u8]>,
}

/// Number of leading bytes needed by [`ContentTypeTable::sniff`].
pub const SNIFF_LEN: usize = 32;

/// Printable-type table. Lookups go declared MIME, then extension, then header bytes.
#[derive(Debug, Clone)]
pub struct ContentTypeTable {
    entries: Vec<ContentType>,
}

impl Default for ContentTypeTable {
    fn default() -> Self {
        Self::from_entries(vec![
            ContentType::new("application/pdf", "com.adobe.pdf", &["pdf"], true),
            ContentType::new("image/jpeg", "public.jpeg", &["jpg", "jpeg", "jpe"], true),
            ContentType::new("image/png", "public.png", &["png"], true),
            ContentType::new("image/gif", "com.compuserve.gif", &["gif"], true),
            ContentType::new("image/tiff", "public.tiff", &["tif", "tiff"], true),
            ContentType::new("image/bmp", "com.microsoft.bmp", &["bmp"], true),
            ContentType::new("image/heic", "public.heic", &["heic", "heif"], true),
            ContentType::new("image/webp", "org.webmproject.webp", &["webp"], true),
            ContentType::new("application/msword", "com.microsoft.word.doc", &["doc"], true),
            ContentType::new(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "org.openxmlformats.wordprocessingml.document",
                &["docx"],
                true,
            ),
            ContentType::new(
                "application/vnd.ms-excel",
                "com.microsoft.excel.xls",
                &["xls"],
                true,
            ),
            ContentType::new(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "org.openxmlformats.spreadsheetml.sheet",
                &["xlsx"],
                true,
            ),
            ContentType::new(
                "application/vnd.ms-powerpoint",
                "com.microsoft.powerpoint.ppt",
                &["ppt"],
                true,
            ),
            ContentType::new(
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                "org.openxmlformats.presentationml.presentation",
                &["pptx"],
                true,
            ),
            ContentType::new("application/rtf", "public.rtf", &["rtf"], true),
            ContentType::new("text/plain", "public.plain-text", &["txt", "text"], false),
            ContentType::new("text/html", "public.html", &["html", "htm"], false),
            ContentType::new("application/zip", "public.zip-archive", &["zip"], false),
            ContentType::new("application/octet-stream", "public.data", &["bin"], false),
        ])
    }
}

impl ContentTypeTable {
    pub fn from_entries(entries: Vec<ContentType>) -> Self {
        Self { entries }
    }

    pub fn by_mime(&self, mime: &str) -> Option<&ContentType> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        self.entries
            .iter()
            .find(|e| e.mime.eq_ignore_ascii_case(essence))
    }

    pub fn by_extension(&self, extension: &str) -> Option<&ContentType> {
        let ext = extension.trim_start_matches('.');
        self.entries
            .iter()
            .find(|e| e.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }

    /// Classifies leading content bytes. Only PDF and raster images are sniffed.
    pub fn sniff(&self, header: &[u8]) -> Option<&ContentType> {
        if header.starts_with(b"%PDF-") {
            return self.by_mime("application/pdf");
        }

        let mime = match image::guess_format(header).ok()? {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::WebP => "image/webp",
            _ => return None,
        };
        self.by_mime(mime)
    }

    /// Resolves a content type from whatever hints are present.
    ///
    /// A generic declared type (`application/octet-stream`) does not stop the
    /// lookup; the extension and header bytes get a chance to refine it.
    pub fn classify(&self, hint: TypeHint<'_>) -> Option<&ContentType> {
        let declared = hint.declared_mime.and_then(|m| self.by_mime(m));
        if let Some(found) = declared {
            if found.renderable || !is_generic(&found.mime) {
                return Some(found);
            }
        }

        hint.extension
            .and_then(|ext| self.by_extension(ext))
            .or_else(|| hint.header.and_then(|h| self.sniff(h)))
            .or(declared)
    }

    /// Identifiers reported by `types()`, in table order.
    pub fn supported_identifiers(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.renderable)
            .map(|e| e.uti.clone())
            .collect()
    }
}

fn is_generic(mime: &str) -> bool {
    mime.eq_ignore_ascii_case("application/octet-stream")
}
