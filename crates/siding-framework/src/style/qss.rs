//! Stylesheet preprocessing.
//!
//! Before a stylesheet reaches the host it is rewritten:
//!
//! 1. `#IFAERO a #ELSE b #END` keeps `a` when translucent frames are active
//!    and `b` otherwise (the `#ELSE` branch is optional).
//! 2. `@import "other.qss";` is replaced by the processed contents of the
//!    imported file, searched along the style's inheritance chain. A file
//!    importing itself by name pulls in the parent style's copy.
//! 3. `url(...)` references are resolved along the inheritance chain and
//!    rewritten to absolute quoted paths. Embedded resources are extracted
//!    into the cache first.
//! 4. `data:` URIs (base64 or percent-encoded with a charset) are decoded into
//!    a content-addressed file under `<cache>/data-uris/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use siding_core::source::{join, normalize};
use siding_core::{AddonDescriptor, AddonKey, AddonPath, AddonRegistry, inheritance};

static QSS_AERO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)#IFAERO\s*(.*?)\s*(?:#ELSE\s*(.*?)\s*)?#END").expect("valid aero pattern")
});

static QSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@import\s+(.*?)\s*(?:;|$)").expect("valid import pattern"));

static QSS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)url\((.*?)\)").expect("valid url pattern"));

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid scheme pattern"));

/// Where a stylesheet reference points.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    /// A path relative to a style's root.
    Local(String),
    /// A decoded `data:` URI written to the cache.
    Data(PathBuf),
}

/// Stateful preprocessor for one top-level stylesheet load.
pub(crate) struct Preprocessor<'a> {
    registry: &'a AddonRegistry,
    cache_dir: &'a Path,
    aero: bool,
    /// Files currently being expanded, to stop self-imports.
    visiting: Vec<(AddonKey, String)>,
}

impl<'a> Preprocessor<'a> {
    pub(crate) fn new(registry: &'a AddonRegistry, cache_dir: &'a Path, aero: bool) -> Self {
        Self {
            registry,
            cache_dir,
            aero,
            visiting: Vec::new(),
        }
    }

    /// Reads `name` from `style` and preprocesses it. Missing files yield an
    /// empty stylesheet.
    pub(crate) fn load(&mut self, name: &str, style: &'a AddonDescriptor) -> String {
        let Some(path) = style.path() else {
            warn!(style = %style.name(), file = %name, "Style has no resource location");
            return String::new();
        };
        let name = normalize(name);
        if !path.exists(&name) {
            warn!(style = %style.name(), file = %name, "Cannot find stylesheet in style");
            return String::new();
        }
        let data = match path.read_to_string(&name) {
            Ok(data) => data,
            Err(e) => {
                warn!(style = %style.name(), file = %name, error = %e, "Cannot read stylesheet");
                return String::new();
            }
        };

        self.visiting.push((style.key().clone(), name.clone()));
        let processed = self.process(&name, &data, style);
        self.visiting.pop();
        processed
    }

    fn process(&mut self, name: &str, data: &str, style: &'a AddonDescriptor) -> String {
        let dir = name.rsplit_once('/').map(|(d, _)| d).unwrap_or("").to_string();

        let aero = self.aero;
        let data = QSS_AERO.replace_all(data, |caps: &Captures<'_>| {
            let branch = if aero { caps.get(1) } else { caps.get(2) };
            branch.map_or(String::new(), |m| m.as_str().to_string())
        });
        let data = QSS_IMPORT.replace_all(&data, |caps: &Captures<'_>| {
            self.import(&dir, style, &caps[0], &caps[1])
        });
        let data = QSS_URL.replace_all(&data, |caps: &Captures<'_>| {
            self.url(&dir, style, &caps[0], &caps[1])
        });
        data.into_owned()
    }

    fn import(&mut self, dir: &str, style: &'a AddonDescriptor, whole: &str, target: &str) -> String {
        let mut url = target.trim();
        if let Some(inner) = url.strip_prefix("url(") {
            match inner.strip_suffix(')') {
                Some(inner) => url = inner,
                None => return whole.to_string(),
            }
        }

        match self.handle_url(dir, url) {
            None => String::new(),
            Some(Target::Data(file)) => match std::fs::read_to_string(&file) {
                Ok(data) => self.process("", &data, style),
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Cannot read decoded import");
                    String::new()
                }
            },
            Some(Target::Local(rel)) => {
                let visiting = &self.visiting;
                let owner = inheritance::resolve(self.registry, style, |d| {
                    let available = d.path().is_some_and(|p| p.exists(&rel));
                    let cyclic = visiting.iter().any(|(k, f)| k == d.key() && *f == rel);
                    (available && !cyclic).then_some(d)
                });
                match owner {
                    Some(owner) => self.load(&rel, owner),
                    None => {
                        debug!(style = %style.name(), file = %rel, "Import not found in inheritance chain");
                        String::new()
                    }
                }
            }
        }
    }

    fn url(&mut self, dir: &str, style: &'a AddonDescriptor, whole: &str, target: &str) -> String {
        match self.handle_url(dir, target) {
            None => whole.to_string(),
            Some(Target::Data(file)) => format_url(&file),
            Some(Target::Local(rel)) => {
                let found = inheritance::resolve(self.registry, style, |d| {
                    d.path().filter(|p| p.exists(&rel)).cloned()
                });
                match found.and_then(|p| self.materialize(&p, &rel)) {
                    Some(file) => format_url(&file),
                    None => whole.to_string(),
                }
            }
        }
    }

    fn handle_url(&self, dir: &str, raw: &str) -> Option<Target> {
        let mut url = raw.trim();
        let quoted = url.len() >= 2
            && ((url.starts_with('"') && url.ends_with('"'))
                || (url.starts_with('\'') && url.ends_with('\'')));
        if quoted {
            url = &url[1..url.len() - 1];
        }
        if url.is_empty() {
            return None;
        }
        if url.starts_with("data:") {
            return self.data_url(url).map(Target::Data);
        }
        if URL_SCHEME.is_match(url) {
            return None;
        }

        let url = url.split(['?', '#']).next().unwrap_or(url);
        Some(Target::Local(match url.strip_prefix('/') {
            Some(rooted) => normalize(rooted),
            None => join(dir, url),
        }))
    }

    /// A real file for `rel`: the file itself for directory sources, a cached
    /// copy for embedded ones.
    fn materialize(&self, path: &AddonPath, rel: &str) -> Option<PathBuf> {
        if let Some(file) = path.absolute(rel) {
            return Some(file);
        }
        let bytes = path.read(rel).ok()?;
        let ext = rel.rsplit_once('.').map_or("bin", |(_, e)| e);
        let file = self
            .cache_dir
            .join("resources")
            .join(format!("{:x}.{ext}", md5::compute(path.display(rel))));
        write_cached(&file, &bytes)
    }

    fn data_url(&self, url: &str) -> Option<PathBuf> {
        let rest = &url["data:".len()..];
        let (format, data) = rest.split_once(',').unwrap_or(("", rest));
        let (mimetype, encoding) = format.split_once(';').unwrap_or((format, ""));

        let ext = match mimetype.rsplit_once('/') {
            Some((_, subtype)) => subtype.split('+').next().unwrap_or(subtype),
            None if mimetype.is_empty() => "txt",
            None => mimetype,
        };
        let encoding = if encoding.is_empty() {
            "charset=US-ASCII"
        } else {
            encoding
        };

        let bytes = if encoding.eq_ignore_ascii_case("base64") {
            match STANDARD.decode(data.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Invalid base64 in data URI");
                    return None;
                }
            }
        } else if let Some(charset) = encoding.strip_prefix("charset=") {
            transcode(charset, urlencoding::decode_binary(data.as_bytes()).into_owned())
        } else {
            warn!(encoding = %encoding, "Unsupported data URI encoding");
            return None;
        };

        let file = self
            .cache_dir
            .join("data-uris")
            .join(format!("{:x}.{ext}", md5::compute(data.as_bytes())));
        write_cached(&file, &bytes)
    }
}

fn write_cached(file: &Path, bytes: &[u8]) -> Option<PathBuf> {
    if !file.exists() {
        let result = file
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(file, bytes));
        if let Err(e) = result {
            warn!(file = %file.display(), error = %e, "Cannot write cache file");
            return None;
        }
    }
    Some(file.to_path_buf())
}

/// Re-encodes percent-decoded text as UTF-8.
fn transcode(charset: &str, raw: Vec<u8>) -> Vec<u8> {
    match charset.to_ascii_lowercase().as_str() {
        "" | "utf-8" | "utf8" | "us-ascii" | "ascii" => raw,
        "iso-8859-1" | "latin1" | "latin-1" => {
            raw.iter().map(|&b| b as char).collect::<String>().into_bytes()
        }
        other => {
            warn!(charset = %other, "Unsupported data URI charset; writing bytes unchanged");
            raw
        }
    }
}

fn format_url(file: &Path) -> String {
    let display = file.to_string_lossy().replace('\\', "/").replace('"', "\\\"");
    format!("url(\"{display}\")")
}
