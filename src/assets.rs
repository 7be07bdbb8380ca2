use crate::catalog::{LAYOUT_VERSION, asset_basename};
use crate::error::{AssetUnavailable, SignError};
use base64::Engine;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_WEBP: &str = "image/webp";

/// Byte store the engine reads optional images from and writes finished
/// documents to. Retry policy belongs to the implementation.
pub trait Storage: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, SignError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, SignError>;
    fn put(&self, bytes: &[u8], key: &str, content_type: &str) -> Result<(), SignError>;
    fn delete(&self, key: &str) -> Result<(), SignError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetKind {
    Headshot,
    BrokerageLogo,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Headshot => "headshot",
            AssetKind::BrokerageLogo => "brokerage_logo",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        }
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        let objects = self.objects.lock().ok()?;
        objects.get(key).map(|obj| obj.content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>>, SignError> {
        self.objects
            .lock()
            .map_err(|_| SignError::Storage("memory storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, key: &str) -> Result<bool, SignError> {
        Ok(self.lock()?.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, SignError> {
        self.lock()?
            .get(key)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| SignError::Storage(format!("no object at {}", key)))
    }

    fn put(&self, bytes: &[u8], key: &str, content_type: &str) -> Result<(), SignError> {
        self.lock()?.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SignError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Keys map to files below `root`. Keys that would escape the root are refused.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SignError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|part| matches!(part, Component::Normal(_)));
        if !safe {
            return Err(SignError::Storage(format!("invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

impl Storage for DirStorage {
    fn exists(&self, key: &str) -> Result<bool, SignError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, SignError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| SignError::Storage(format!("read {}: {}", key, e)))
    }

    fn put(&self, bytes: &[u8], key: &str, _content_type: &str) -> Result<(), SignError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SignError::Storage(format!("mkdir for {}: {}", key, e)))?;
        }
        fs::write(&path, bytes).map_err(|e| SignError::Storage(format!("write {}: {}", key, e)))
    }

    fn delete(&self, key: &str) -> Result<(), SignError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SignError::Storage(format!("delete {}: {}", key, e))),
        }
    }
}

/// Loads an optional image. `data:` URIs are decoded in place; other keys go
/// through `storage`. Every failure is reported as `AssetUnavailable` so the
/// caller can choose its fallback.
pub fn fetch_asset(storage: Option<&dyn Storage>, key: Option<&str>) -> Result<Vec<u8>, AssetUnavailable> {
    let key = key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(AssetUnavailable::NoKey)?;
    if key.starts_with("data:") {
        return decode_data_uri(key);
    }
    let Some(storage) = storage else {
        return Err(AssetUnavailable::Missing(key.to_string()));
    };
    match storage.exists(key) {
        Ok(true) => {}
        Ok(false) => return Err(AssetUnavailable::Missing(key.to_string())),
        Err(err) => {
            return Err(AssetUnavailable::Fetch {
                key: key.to_string(),
                reason: err.to_string(),
            });
        }
    }
    let bytes = storage.get(key).map_err(|err| AssetUnavailable::Fetch {
        key: key.to_string(),
        reason: err.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(AssetUnavailable::Decode {
            key: key.to_string(),
            reason: "empty object".to_string(),
        });
    }
    Ok(bytes)
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetUnavailable> {
    let label = uri.chars().take(32).collect::<String>();
    let decode_err = |reason: &str| AssetUnavailable::Decode {
        key: label.clone(),
        reason: reason.to_string(),
    };
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| decode_err("data uri has no payload"))?;
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| decode_err(&e.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };
    if data.is_empty() {
        return Err(decode_err("empty payload"));
    }
    Ok(data)
}

pub fn pdf_key(order_id: Option<u64>, template_id: &str, size_key: &str) -> String {
    match order_id {
        Some(id) => format!("pdfs/order_{}/{}_{}.pdf", id, template_id, size_key),
        None => format!("pdfs/misc/{}_{}.pdf", template_id, size_key),
    }
}

pub fn preview_key(order_id: Option<u64>, size_key: &str) -> String {
    let basename = asset_basename(size_key, LAYOUT_VERSION);
    match order_id {
        Some(id) => format!("previews/order_{}/{}.webp", id, basename),
        None => format!("previews/tmp/{}.webp", basename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("yardsign_{tag}_{}_{}", std::process::id(), nanos))
    }

    #[test]
    fn keys_follow_order_scheme() {
        assert_eq!(
            pdf_key(Some(42), "yard_modern_round", "18x24"),
            "pdfs/order_42/yard_modern_round_18x24.pdf"
        );
        assert_eq!(pdf_key(None, "yard_open_house", "24x36"), "pdfs/misc/yard_open_house_24x36.pdf");
        assert_eq!(preview_key(Some(7), "18x24"), "previews/order_7/sign_18x24_v2.webp");
        assert_eq!(preview_key(None, "12x18"), "previews/tmp/sign_12x18_v2.webp");
    }

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        storage.put(b"abc", "a/b.png", "image/png").unwrap();
        assert!(storage.exists("a/b.png").unwrap());
        assert_eq!(storage.get("a/b.png").unwrap(), b"abc");
        assert_eq!(storage.content_type("a/b.png").as_deref(), Some("image/png"));
        storage.delete("a/b.png").unwrap();
        assert!(!storage.exists("a/b.png").unwrap());
        assert!(matches!(storage.get("a/b.png"), Err(SignError::Storage(_))));
    }

    #[test]
    fn fetch_reports_why_an_asset_is_unavailable() {
        let storage = MemoryStorage::new();
        storage.insert("empty.png", Vec::new(), "image/png");
        storage.insert("ok.png", vec![1, 2, 3], "image/png");
        let dyn_storage: &dyn Storage = &storage;
        assert_eq!(fetch_asset(Some(dyn_storage), None), Err(AssetUnavailable::NoKey));
        assert_eq!(fetch_asset(Some(dyn_storage), Some("  ")), Err(AssetUnavailable::NoKey));
        assert_eq!(
            fetch_asset(Some(dyn_storage), Some("gone.png")),
            Err(AssetUnavailable::Missing("gone.png".to_string()))
        );
        assert!(matches!(
            fetch_asset(Some(dyn_storage), Some("empty.png")),
            Err(AssetUnavailable::Decode { .. })
        ));
        assert_eq!(fetch_asset(Some(dyn_storage), Some("ok.png")), Ok(vec![1, 2, 3]));
        assert_eq!(
            fetch_asset(None, Some("ok.png")),
            Err(AssetUnavailable::Missing("ok.png".to_string()))
        );
    }

    #[test]
    fn data_uris_skip_storage() {
        let uri = "data:image/png;base64,AQID";
        assert_eq!(fetch_asset(None, Some(uri)), Ok(vec![1, 2, 3]));
        assert!(matches!(
            fetch_asset(None, Some("data:image/png;base64,@@@")),
            Err(AssetUnavailable::Decode { .. })
        ));
    }

    #[test]
    fn dir_storage_rejects_escaping_keys() {
        let root = temp_dir("dir_storage");
        let storage = DirStorage::new(&root);
        storage.put(b"pdf", "pdfs/order_1/x.pdf", CONTENT_TYPE_PDF).unwrap();
        assert_eq!(storage.get("pdfs/order_1/x.pdf").unwrap(), b"pdf");
        assert!(storage.put(b"x", "../escape.pdf", CONTENT_TYPE_PDF).is_err());
        assert!(storage.get("/etc/passwd").is_err());
        storage.delete("pdfs/order_1/x.pdf").unwrap();
        storage.delete("pdfs/order_1/x.pdf").unwrap();
        let _ = fs::remove_dir_all(root);
    }
}
