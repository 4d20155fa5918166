//! drift_catalog - 环境音目录
//!
//! 声音键到音频资源、标题和背景样式的只读映射。

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 目录错误
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate sound key: {0}")]
    DuplicateKey(SoundKey),

    #[error("Catalog is empty")]
    Empty,
}

/// 声音键（不透明标识符）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundKey(String);

impl SoundKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SoundKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SoundKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SoundKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// 背景样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStyle {
    Ocean,
    Rain,
    Brown,
}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundItem {
    pub key: SoundKey,
    pub asset: PathBuf,
    pub title: String,
    pub subtitle: String,
    pub background: BackgroundStyle,
}

impl SoundItem {
    pub fn new(
        key: impl Into<SoundKey>,
        asset: impl Into<PathBuf>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        background: BackgroundStyle,
    ) -> Self {
        Self {
            key: key.into(),
            asset: asset.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            background,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    sounds: Vec<SoundItem>,
}

/// 声音目录
#[derive(Debug, Clone)]
pub struct SoundCatalog {
    sounds: Vec<SoundItem>,
}

impl SoundCatalog {
    /// 创建目录，键必须唯一且至少有一个条目
    pub fn new(sounds: Vec<SoundItem>) -> Result<Self, CatalogError> {
        if sounds.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(sounds.len());
        for item in &sounds {
            if !seen.insert(item.key.as_str()) {
                return Err(CatalogError::DuplicateKey(item.key.clone()));
            }
        }

        Ok(Self { sounds })
    }

    /// 内置目录，资源路径相对于 `sounds/`
    pub fn builtin() -> Self {
        let sounds = vec![
            SoundItem::new(
                "ocean",
                "sounds/ocean_waves.ogg",
                "Ocean Waves",
                "Slow waves rolling onto the shore",
                BackgroundStyle::Ocean,
            ),
            SoundItem::new(
                "rain",
                "sounds/rain.ogg",
                "Rain",
                "Steady rainfall on a quiet night",
                BackgroundStyle::Rain,
            ),
            SoundItem::new(
                "waterfall",
                "sounds/waterfall.ogg",
                "Waterfall",
                "Water falling over distant rocks",
                BackgroundStyle::Ocean,
            ),
            SoundItem::new(
                "brown",
                "sounds/brown_noise.ogg",
                "Brown Noise",
                "Deep, even noise for focus and sleep",
                BackgroundStyle::Brown,
            ),
        ];

        Self { sounds }
    }

    /// 从 JSON 字符串解析 (`{"sounds": [...]}`)
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.sounds)
    }

    /// 从文件加载，相对资源路径以该文件所在目录为根
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;

        Ok(match path.parent() {
            Some(root) => catalog.with_asset_root(root),
            None => catalog,
        })
    }

    /// 将相对资源路径重定位到 `root` 下
    pub fn with_asset_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        for item in &mut self.sounds {
            if item.asset.is_relative() {
                item.asset = root.join(&item.asset);
            }
        }
        self
    }

    pub fn get_by_key(&self, key: &str) -> Option<&SoundItem> {
        self.sounds.iter().find(|s| s.key.as_str() == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_by_key(key).is_some()
    }

    pub fn sounds(&self) -> &[SoundItem] {
        &self.sounds
    }

    pub fn keys(&self) -> impl Iterator<Item = &SoundKey> {
        self.sounds.iter().map(|s| &s.key)
    }
}

impl Default for SoundCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys() {
        let catalog = SoundCatalog::builtin();
        let keys: Vec<&str> = catalog.keys().map(SoundKey::as_str).collect();
        assert_eq!(keys, ["ocean", "rain", "waterfall", "brown"]);

        let brown = catalog.get_by_key("brown").unwrap();
        assert_eq!(brown.asset, PathBuf::from("sounds/brown_noise.ogg"));
        assert_eq!(brown.background, BackgroundStyle::Brown);
        assert!(catalog.get_by_key("thunder").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let item = SoundItem::new("rain", "a.ogg", "A", "", BackgroundStyle::Rain);
        let err = SoundCatalog::new(vec![item.clone(), item]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateKey(k) if k.as_str() == "rain"));

        assert!(matches!(SoundCatalog::new(Vec::new()), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_json_with_asset_root() {
        let json = r#"{
            "sounds": [
                {
                    "key": "forest",
                    "asset": "forest.ogg",
                    "title": "Forest",
                    "subtitle": "Birds and leaves",
                    "background": "rain"
                },
                {
                    "key": "hum",
                    "asset": "/abs/hum.wav",
                    "title": "Hum",
                    "subtitle": "",
                    "background": "brown"
                }
            ]
        }"#;

        let catalog = SoundCatalog::from_json_str(json)
            .unwrap()
            .with_asset_root("/data/sounds");

        assert_eq!(
            catalog.get_by_key("forest").unwrap().asset,
            PathBuf::from("/data/sounds/forest.ogg")
        );
        // 绝对路径保持不变
        assert_eq!(
            catalog.get_by_key("hum").unwrap().asset,
            PathBuf::from("/abs/hum.wav")
        );
    }

    #[test]
    fn test_unknown_background_rejected() {
        let json = r#"{"sounds":[{"key":"x","asset":"x.ogg","title":"X","subtitle":"","background":"lava"}]}"#;
        assert!(matches!(
            SoundCatalog::from_json_str(json),
            Err(CatalogError::Json(_))
        ));
    }
}
