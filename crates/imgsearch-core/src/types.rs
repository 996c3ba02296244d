//! Domain types shared by the source, embedding, vector and pipeline crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use image::DynamicImage;

use crate::error::{Error, Result};

pub type ImageId = String;
pub type Extra = BTreeMap<String, serde_json::Value>;

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ImageSourceKind {
    LocalFileSystem,
    RemoteDownload,
}

/// Encoding detected from the image bytes, never from a file extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Webp,
    Ico,
    Heic,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Tiff => "TIFF",
            Self::Webp => "WEBP",
            Self::Ico => "ICO",
            Self::Heic => "HEIC",
        }
    }

    /// Map a format reported by the `image` crate; `None` for codecs we do not index.
    pub fn from_codec(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Ico => Some(Self::Ico),
            _ => None,
        }
    }

    /// The `image` crate codec for this format. HEIC has none.
    pub fn codec(&self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::Gif => Some(image::ImageFormat::Gif),
            Self::Bmp => Some(image::ImageFormat::Bmp),
            Self::Tiff => Some(image::ImageFormat::Tiff),
            Self::Webp => Some(image::ImageFormat::WebP),
            Self::Ico => Some(image::ImageFormat::Ico),
            Self::Heic => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata stored next to every indexed vector.
///
/// Required fields are typed; anything else a source knows about the image
/// lives in `extra` and is flattened into the same JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMetadata {
    pub id: ImageId,
    pub name: String,
    pub source: ImageSourceKind,
    pub image_height: u32,
    pub image_width: u32,
    pub file_type: ImageFormat,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ImageMetadata {
    /// Keys owned by the typed fields; `extra` may not shadow them.
    pub const RESERVED_KEYS: [&'static str; 9] = [
        "id",
        "name",
        "source",
        "image_height",
        "image_width",
        "file_type",
        "file_size",
        "local_file_path",
        "external_ref",
    ];

    /// Check the invariants every stored metadata record must hold.
    ///
    /// Extension keys that collide with a typed field are dropped.
    pub fn validated(mut self) -> Result<Self> {
        self.extra.retain(|k, _| !Self::RESERVED_KEYS.contains(&k.as_str()));
        if self.id.trim().is_empty() {
            return Err(Error::Metadata("id must not be empty".into()));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(Error::Metadata(format!(
                "{}: image dimensions must be positive ({}x{})",
                self.id, self.image_width, self.image_height
            )));
        }
        if self.local_file_path.is_none() && self.external_ref.is_none() {
            return Err(Error::Metadata(format!(
                "{}: either local_file_path or external_ref is required",
                self.id
            )));
        }
        Ok(self)
    }

    /// JSON object form, as echoed back by index queries.
    pub fn to_json(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self).map_err(|e| Error::Metadata(e.to_string()))? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(Error::Metadata(format!("expected an object, got {other}"))),
        }
    }
}

/// A decoded image paired with its metadata. Never constructed for undecodable input.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub pixels: DynamicImage,
    pub metadata: ImageMetadata,
}

impl ImageRecord {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Logical partition of an index. Upserts and queries never cross namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument("namespace must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// One persisted record: `(id, vector, metadata)`. Re-upserting an id replaces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: ImageId,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A ranked query hit. Vector values are never returned.
///
/// `score` is backend-specific but higher is always better.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMatch {
    pub id: ImageId,
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Dotproduct => "dotproduct",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "dotproduct" | "dot" => Ok(Self::Dotproduct),
            other => Err(Error::Config(format!("unknown distance metric '{other}'"))),
        }
    }
}

/// Name, dimension and metric of an index, fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: DistanceMetric) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Config("index name must not be empty".into()));
        }
        if dimension == 0 {
            return Err(Error::Config(format!("index '{name}' needs a positive dimension")));
        }
        // stored as an Arrow fixed-size list, whose length is an i32
        if i32::try_from(dimension).is_err() {
            return Err(Error::Config(format!("index '{name}': dimension {dimension} is too large")));
        }
        Ok(Self { name, dimension, metric })
    }
}
