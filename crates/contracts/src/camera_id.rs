//! CameraId - Cheap-to-clone camera identity
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Camera identity as it appears on the wire.
///
/// The camera side keys every result by `<table name><camera index>`
/// (e.g. `"walleye0"`). The identity is created once per camera at
/// configuration time and then cloned into every decoder and log span,
/// so it wraps an `Arc<str>`.
///
/// # Examples
/// ```
/// use contracts::CameraId;
///
/// let id = CameraId::for_camera("cam", 0);
/// let id2 = id.clone();  // O(1) - just increments ref count
/// assert_eq!(id, id2);
/// assert_eq!(id.as_str(), "cam0");
/// ```
#[derive(Clone, Default)]
pub struct CameraId(Arc<str>);

impl CameraId {
    /// Create a new CameraId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Build the wire identity for camera `index` under `table_name`.
    pub fn for_camera(table_name: &str, index: u32) -> Self {
        Self::from(format!("{table_name}{index}"))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity encoded as UTF-8 bytes (binary frame header).
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Deref for CameraId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for CameraId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CameraId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CameraId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for CameraId {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CameraId({:?})", self.0)
    }
}

impl PartialEq for CameraId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for CameraId {}

impl PartialEq<str> for CameraId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for CameraId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Hash for CameraId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for CameraId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CameraId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_for_camera_concatenates_index() {
        assert_eq!(CameraId::for_camera("walleye", 3), "walleye3");
        assert_eq!(CameraId::for_camera("cam", 12).as_bytes(), b"cam12");
    }

    #[test]
    fn test_clone_is_cheap() {
        let id1: CameraId = "cam0".into();
        let id2 = id1.clone();

        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_hashmap_key() {
        let mut map: HashMap<CameraId, i32> = HashMap::new();
        map.insert("cam0".into(), 1);
        map.insert("cam1".into(), 2);

        assert_eq!(map.get("cam0"), Some(&1));
        assert_eq!(map.get("cam1"), Some(&2));
    }

    #[test]
    fn test_serde() {
        let id: CameraId = "cam0".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"cam0\"");

        let parsed: CameraId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
