// Content descriptor resolution and loading

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::content_types::{ContentType, ContentTypeTable, TypeHint, SNIFF_LEN};
use crate::errors::PrintError;

// Accepts payloads with or without trailing padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    Data,
    File,
    Remote,
    Other,
}

/// Fully-qualified, loadable form of a content descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    url: Url,
}

impl ResolvedLocation {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn kind(&self) -> LocationKind {
        match self.url.scheme() {
            "data" => LocationKind::Data,
            "file" => LocationKind::File,
            "http" | "https" => LocationKind::Remote,
            _ => LocationKind::Other,
        }
    }

    fn extension(&self) -> Option<String> {
        let path = match self.kind() {
            LocationKind::File => self.url.to_file_path().ok()?,
            _ => PathBuf::from(self.url.path_segments()?.last()?),
        };
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// Parsed `data:[<mime>][;base64],<payload>` URI.
#[derive(Debug)]
struct DataUri<'a> {
    mime: String,
    base64: bool,
    payload: &'a str,
}

impl<'a> DataUri<'a> {
    fn parse(uri: &'a str) -> Result<Self, PrintError> {
        let body = uri
            .strip_prefix("data:")
            .ok_or_else(|| PrintError::InvalidDescriptor("not a data URI".to_string()))?;
        let (meta, payload) = body.split_once(',').ok_or_else(|| {
            PrintError::UnreadableContent("data URI has no payload separator".to_string())
        })?;

        let mut params = meta.split(';');
        let mime = params
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or("text/plain")
            .to_ascii_lowercase();
        let base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        Ok(Self {
            mime,
            base64,
            payload,
        })
    }

    fn decode(&self) -> Result<Bytes, PrintError> {
        if self.base64 {
            let compact: String = self
                .payload
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            LENIENT_BASE64
                .decode(compact.as_bytes())
                .map(Bytes::from)
                .map_err(|e| PrintError::unreadable("base64 payload", e))
        } else {
            Ok(Bytes::from(urlencoding::decode_binary(self.payload.as_bytes()).into_owned()))
        }
    }

    /// Decodes just enough of the payload to sniff its type.
    fn header(&self) -> Option<Vec<u8>> {
        if !self.base64 {
            return None;
        }
        let chars: String = self
            .payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .take(SNIFF_LEN.div_ceil(3) * 4)
            .collect();
        if !chars.is_ascii() {
            return None;
        }
        let usable = chars.len() - chars.len() % 4;
        let prefix = if usable == 0 { chars.as_str() } else { &chars[..usable] };
        LENIENT_BASE64.decode(prefix).ok()
    }
}

/// Content bytes ready to be handed to the print UI.
#[derive(Debug, Clone)]
pub struct LoadedContent {
    pub location: ResolvedLocation,
    pub bytes: Bytes,
    pub content_type: ContentType,
}

pub struct ContentResolver {
    resource_root: PathBuf,
    types: ContentTypeTable,
    fetch_timeout: Duration,
}

impl ContentResolver {
    pub fn new(resource_root: impl Into<PathBuf>) -> Self {
        let root = resource_root.into();
        let resource_root = std::path::absolute(&root).unwrap_or(root);
        Self {
            resource_root,
            types: ContentTypeTable::default(),
            fetch_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn types(&self) -> &ContentTypeTable {
        &self.types
    }

    /// Turns a descriptor into a loadable location.
    ///
    /// Absolute URIs are kept as they are. Anything else is a path below the
    /// resource root, except absolute filesystem paths which are used directly.
    pub fn url_for(&self, descriptor: &str) -> Result<ResolvedLocation, PrintError> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(PrintError::InvalidDescriptor(
                "content descriptor is empty".to_string(),
            ));
        }

        // Encoders wrap long base64 payloads across lines.
        if let Some(inline) = descriptor.strip_prefix("base64:") {
            return inline_base64(&strip_line_breaks(inline));
        }
        if descriptor.starts_with("data:") {
            return parse_url(&strip_line_breaks(descriptor));
        }

        if descriptor.chars().any(char::is_control) {
            return Err(PrintError::InvalidDescriptor(
                "content descriptor contains control characters".to_string(),
            ));
        }
        if let Some(relative) = descriptor.strip_prefix("res://") {
            return self.resource_url(relative);
        }
        if let Some(rest) = descriptor.strip_prefix("file://") {
            // file:///abs and file://localhost/abs are absolute; file://dir/x is an asset path
            let local_host = rest
                .get(.."localhost/".len())
                .is_some_and(|host| host.eq_ignore_ascii_case("localhost/"));
            if !rest.starts_with('/') && !local_host {
                return self.resource_url(rest);
            }
        }
        if Path::new(descriptor).is_absolute() {
            return file_url(Path::new(descriptor));
        }

        match Url::parse(descriptor) {
            Ok(url) => Ok(ResolvedLocation { url }),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.resource_url(descriptor),
            Err(e) => Err(PrintError::InvalidDescriptor(format!("{}: {}", descriptor, e))),
        }
    }

    fn resource_url(&self, relative: &str) -> Result<ResolvedLocation, PrintError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(PrintError::InvalidDescriptor(
                "resource path is empty".to_string(),
            ));
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(PrintError::InvalidDescriptor(format!(
                "{} escapes the resource root",
                relative.display()
            )));
        }
        file_url(&self.resource_root.join(relative))
    }

    /// Reads the complete content behind a location. Blocks on file and network I/O.
    pub fn load(&self, location: &ResolvedLocation) -> Result<Bytes, PrintError> {
        match location.kind() {
            LocationKind::Data => DataUri::parse(location.as_str())?.decode(),
            LocationKind::File => {
                let path = location.url().to_file_path().map_err(|_| {
                    PrintError::UnreadableContent(format!("{} is not a local path", location.as_str()))
                })?;
                debug!("Reading print content from {}", path.display());
                std::fs::read(&path)
                    .map(Bytes::from)
                    .map_err(|e| PrintError::unreadable(path.display(), e))
            }
            LocationKind::Remote => self.fetch(location.url()),
            LocationKind::Other => Err(PrintError::UnreadableContent(format!(
                "unsupported scheme: {}",
                location.url().scheme()
            ))),
        }
    }

    fn fetch(&self, url: &Url) -> Result<Bytes, PrintError> {
        info!("Fetching remote print content: {}", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(|e| PrintError::unreadable(url, e))?;

        let response = client
            .get(url.as_str())
            .send()
            .map_err(|e| PrintError::unreadable(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Remote content fetch failed with {}: {}", status, url);
            return Err(PrintError::unreadable(url, format!("HTTP {}", status)));
        }

        response.bytes().map_err(|e| PrintError::unreadable(url, e))
    }

    /// Classifies a location from its type hints without loading it.
    pub fn content_type(&self, location: &ResolvedLocation) -> Option<ContentType> {
        match location.kind() {
            LocationKind::Data => {
                let data = DataUri::parse(location.as_str()).ok()?;
                let header = data.header();
                self.types
                    .classify(TypeHint {
                        declared_mime: Some(&data.mime),
                        extension: None,
                        header: header.as_deref(),
                    })
                    .cloned()
            }
            LocationKind::File => {
                let extension = location.extension();
                let hint = TypeHint {
                    extension: extension.as_deref(),
                    ..TypeHint::default()
                };
                if let Some(found) = self.types.classify(hint) {
                    return Some(found.clone());
                }
                let path = location.url().to_file_path().ok()?;
                let header = read_header(&path)?;
                self.types.sniff(&header).cloned()
            }
            LocationKind::Remote | LocationKind::Other => {
                let extension = location.extension();
                self.types
                    .classify(TypeHint {
                        extension: extension.as_deref(),
                        ..TypeHint::default()
                    })
                    .cloned()
            }
        }
    }

    pub fn can_render(&self, location: &ResolvedLocation) -> bool {
        self.content_type(location)
            .map(|t| t.renderable)
            .unwrap_or(false)
    }

    /// Resolves, type-checks and loads a descriptor for printing.
    pub fn resolve(&self, descriptor: &str) -> Result<LoadedContent, PrintError> {
        let location = self.url_for(descriptor)?;
        let hinted = self.content_type(&location);
        if let Some(t) = hinted.as_ref().filter(|t| !t.renderable) {
            return Err(PrintError::UnsupportedType {
                content_type: t.mime.clone(),
            });
        }

        let bytes = self.load(&location)?;
        let content_type = match hinted {
            Some(t) => t,
            None => {
                let header = &bytes[..bytes.len().min(SNIFF_LEN)];
                self.types
                    .sniff(header)
                    .cloned()
                    .ok_or_else(|| PrintError::UnsupportedType {
                        content_type: FALLBACK_MIME.to_string(),
                    })?
            }
        };

        if !content_type.renderable {
            return Err(PrintError::UnsupportedType {
                content_type: content_type.mime,
            });
        }

        Ok(LoadedContent {
            location,
            bytes,
            content_type,
        })
    }
}

fn file_url(path: &Path) -> Result<ResolvedLocation, PrintError> {
    Url::from_file_path(path)
        .map(|url| ResolvedLocation { url })
        .map_err(|_| {
            PrintError::InvalidDescriptor(format!("{} cannot form a file URI", path.display()))
        })
}

fn parse_url(descriptor: &str) -> Result<ResolvedLocation, PrintError> {
    Url::parse(descriptor)
        .map(|url| ResolvedLocation { url })
        .map_err(|e| PrintError::InvalidDescriptor(format!("{}: {}", descriptor, e)))
}

fn strip_line_breaks(descriptor: &str) -> String {
    descriptor
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect()
}

fn inline_base64(inline: &str) -> Result<ResolvedLocation, PrintError> {
    let (mime, payload) = match inline.split_once(',') {
        Some((mime, payload)) if mime.contains('/') => (mime, payload),
        _ => (FALLBACK_MIME, inline),
    };
    if payload.is_empty() {
        return Err(PrintError::InvalidDescriptor(
            "base64 content is empty".to_string(),
        ));
    }
    parse_url(&format!("data:{};base64,{}", mime, payload))
}

fn read_header(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut header).ok()?;
    Some(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use tempfile::TempDir;

    const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n";

    fn resolver_with_files(files: &[(&str, &[u8])]) -> (TempDir, ContentResolver) {
        let dir = TempDir::new().expect("temp dir");
        for (name, contents) in files {
            std::fs::write(dir.path().join(name), contents).expect("write fixture");
        }
        let resolver = ContentResolver::new(dir.path());
        (dir, resolver)
    }

    /// Answers a single HTTP request with `status` and `body`, returning the base URL.
    fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_absolute_urls_are_kept() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let location = resolver
            .url_for("https://example.com/files/report.pdf")
            .expect("valid url");
        assert_eq!(location.as_str(), "https://example.com/files/report.pdf");
        assert_eq!(location.kind(), LocationKind::Remote);

        let data = resolver
            .url_for("data:application/pdf;base64,JVBERi0xLjQ=")
            .expect("valid data uri");
        assert_eq!(data.kind(), LocationKind::Data);
        assert!(data.as_str().ends_with("JVBERi0xLjQ="));
    }

    #[test]
    fn test_relative_paths_resolve_under_resource_root() {
        let (dir, resolver) = resolver_with_files(&[]);
        let location = resolver.url_for("docs/document.pdf").expect("valid path");
        assert_eq!(location.kind(), LocationKind::File);
        let path = location.url().to_file_path().expect("file path");
        assert!(path.starts_with(dir.path()));
        assert!(path.ends_with("docs/document.pdf"));

        let res = resolver.url_for("res://docs/document.pdf").expect("res path");
        assert_eq!(res, location);
        let asset = resolver.url_for("file://docs/document.pdf").expect("asset path");
        assert_eq!(asset, location);
    }

    #[test]
    fn test_invalid_descriptors() {
        let (_dir, resolver) = resolver_with_files(&[]);
        assert!(matches!(
            resolver.url_for("   "),
            Err(PrintError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            resolver.url_for("doc\u{0}.pdf"),
            Err(PrintError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            resolver.url_for("../secrets.pdf"),
            Err(PrintError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_load_data_uri() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let location = resolver
            .url_for("data:text/plain;base64,SGVsbG8=")
            .expect("valid data uri");
        assert_eq!(resolver.load(&location).expect("decodes"), Bytes::from("Hello"));

        let plain = resolver.url_for("data:,Hello%20there").expect("valid data uri");
        assert_eq!(resolver.load(&plain).expect("decodes"), Bytes::from("Hello there"));
    }

    #[test]
    fn test_load_base64_prefix() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let location = resolver
            .url_for("base64:application/pdf,JVBERi0xLjQK")
            .expect("valid inline content");
        assert_eq!(location.kind(), LocationKind::Data);
        assert_eq!(
            resolver.load(&location).expect("decodes"),
            Bytes::from_static(b"%PDF-1.4\n")
        );
        assert!(resolver.can_render(&location));
    }

    #[test]
    fn test_load_missing_file_is_unreadable() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let location = resolver.url_for("missing.pdf").expect("valid path");
        assert!(matches!(
            resolver.load(&location),
            Err(PrintError::UnreadableContent(_))
        ));
    }

    #[test]
    fn test_unsupported_scheme_is_unreadable() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let location = resolver.url_for("ftp://example.com/a.pdf").expect("valid url");
        assert!(matches!(
            resolver.load(&location),
            Err(PrintError::UnreadableContent(_))
        ));
    }

    #[test]
    fn test_can_render_uses_hints() {
        let (_dir, resolver) = resolver_with_files(&[("document.pdf", PDF_BYTES), ("scan", PDF_BYTES)]);

        let pdf = resolver.url_for("document.pdf").expect("valid path");
        assert!(resolver.can_render(&pdf));

        let sniffed = resolver.url_for("scan").expect("valid path");
        assert!(resolver.can_render(&sniffed));

        let text = resolver
            .url_for("data:text/plain;base64,SGVsbG8=")
            .expect("valid data uri");
        assert!(!resolver.can_render(&text));

        // Never fetched: the extension alone decides.
        let binary = resolver
            .url_for("http://127.0.0.1:9/download/setup.bin")
            .expect("valid url");
        assert!(!resolver.can_render(&binary));
    }

    #[test]
    fn test_resolve_loads_printable_content() {
        let (_dir, resolver) = resolver_with_files(&[("document.pdf", PDF_BYTES)]);
        let loaded = resolver.resolve("document.pdf").expect("printable");
        assert_eq!(loaded.content_type.mime, "application/pdf");
        assert_eq!(loaded.bytes, Bytes::from_static(PDF_BYTES));
    }

    #[test]
    fn test_resolve_rejects_unsupported_types() {
        let (_dir, resolver) = resolver_with_files(&[("notes.txt", b"plain text"), ("blob", b"\x00\x01")]);
        assert!(matches!(
            resolver.resolve("notes.txt"),
            Err(PrintError::UnsupportedType { .. })
        ));
        assert!(matches!(
            resolver.resolve("blob"),
            Err(PrintError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_wrapped_base64_payloads() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let loaded = resolver
            .resolve("data:application/pdf;base64,JVBERi0x\nLjQKJWFi\nYw==")
            .expect("wrapped data uri");
        assert_eq!(loaded.bytes, Bytes::from_static(b"%PDF-1.4\n%abc"));
        assert_eq!(loaded.content_type.mime, "application/pdf");

        let inline = resolver
            .url_for("base64:application/pdf,JVBERi0x\r\nLjQK")
            .expect("wrapped inline content");
        assert_eq!(
            resolver.load(&inline).expect("decodes"),
            Bytes::from_static(b"%PDF-1.4\n")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_localhost_uri_is_absolute() {
        let (dir, resolver) = resolver_with_files(&[]);
        let elsewhere = TempDir::new().expect("temp dir");
        let path = elsewhere.path().join("abs.pdf");
        std::fs::write(&path, PDF_BYTES).expect("write pdf");

        let location = resolver
            .url_for(&format!("file://localhost{}", path.display()))
            .expect("valid file uri");
        let resolved = location.url().to_file_path().expect("file path");
        assert_eq!(resolved, path);
        assert!(!resolved.starts_with(dir.path()));
        assert_eq!(
            resolver.load(&location).expect("reads file"),
            Bytes::from_static(PDF_BYTES)
        );
    }

    #[test]
    fn test_remote_content_is_fetched_and_sniffed() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let base = serve_once("200 OK", PDF_BYTES);

        let loaded = resolver
            .resolve(&format!("{}/download", base))
            .expect("remote pdf");
        assert_eq!(loaded.location.kind(), LocationKind::Remote);
        assert_eq!(loaded.content_type.mime, "application/pdf");
        assert_eq!(loaded.bytes, Bytes::from_static(PDF_BYTES));
    }

    #[test]
    fn test_remote_error_status_is_unreadable() {
        let (_dir, resolver) = resolver_with_files(&[]);
        let base = serve_once("404 Not Found", b"");

        match resolver.resolve(&format!("{}/missing.pdf", base)) {
            Err(PrintError::UnreadableContent(message)) => assert!(message.contains("404")),
            other => panic!("expected unreadable content, got {:?}", other),
        }
    }
}
