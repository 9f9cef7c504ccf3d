//! Asset identity - what to load and where it lives.

use std::fmt;

/// The kind of an asset. Each kind has its own base directory and loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetKind {
    /// A font face.
    Font,
    /// A texture (decoded image, promoted on first access).
    Texture,
    /// A raw file read into memory.
    File,
}

impl AssetKind {
    /// Lowercase human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Font => "font",
            AssetKind::Texture => "texture",
            AssetKind::File => "file",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniquely identifies a cached asset.
///
/// Equality is structural: two keys with the same kind and name refer to the
/// same cache entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey {
    kind: AssetKind,
    name: String,
}

impl AssetKey {
    /// Create a key.
    pub fn new(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Key for a font asset.
    pub fn font(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Font, name)
    }

    /// Key for a texture asset.
    pub fn texture(name: impl Into<String>) -> Self {
        Self::new(AssetKind::Texture, name)
    }

    /// Key for a raw file asset.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(AssetKind::File, name)
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} asset {}", self.kind, self.name)
    }
}

/// Join a base directory and an asset name with `/` separators.
///
/// Names always use `/`, whatever the host platform.
pub fn join_path(base: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        // base was "/" (or several slashes)
        return format!("/{}", name);
    }
    format!("{}/{}", base, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::alloc::HashSet;

    #[test]
    fn test_key_equality_is_structural() {
        let a = AssetKey::texture("a.png");
        let b = AssetKey::new(AssetKind::Texture, String::from("a.png"));
        assert_eq!(a, b);
        assert_ne!(a, AssetKey::font("a.png"));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(AssetKey::font("sans.ttf").to_string(), "font asset sans.ttf");
        assert_eq!(AssetKey::texture("a.png").to_string(), "texture asset a.png");
        assert_eq!(AssetKey::file("level.dat").to_string(), "file asset level.dat");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a.png"), "a.png");
        assert_eq!(join_path("textures", "a.png"), "textures/a.png");
        assert_eq!(join_path("textures/", "a.png"), "textures/a.png");
        assert_eq!(join_path("textures", "/ui/a.png"), "textures/ui/a.png");
        assert_eq!(join_path("/", "a.png"), "/a.png");
    }
}
