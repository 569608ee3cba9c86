use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// JSON-file-backed set of favorite course ids.
pub struct FavoritesStore {
    path: PathBuf,
}

impl FavoritesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("creating data dir {:?}", data_dir))?;
        }
        Ok(Self {
            path: data_dir.join("favorites.json"),
        })
    }

    fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading favorites {:?}", self.path))?;
        serde_json::from_str(&raw).context("parsing favorites")
    }

    fn write(&self, favorites: &[String]) -> Result<()> {
        let json = serde_json::to_string_pretty(favorites)?;
        fs::write(&self.path, json).context("writing favorites")?;
        Ok(())
    }

    /// Add a course to the favorites. Adding an existing favorite is a
    /// success, not an error.
    pub fn add(&self, course_id: &str) -> Result<()> {
        let mut favorites = self.read()?;
        if favorites.iter().any(|id| id == course_id) {
            return Ok(());
        }
        favorites.push(course_id.to_string());
        self.write(&favorites)
    }

    pub fn remove(&self, course_id: &str) -> Result<()> {
        let mut favorites = self.read()?;
        favorites.retain(|id| id != course_id);
        self.write(&favorites)
    }

    pub fn is_favorite(&self, course_id: &str) -> bool {
        self.read()
            .map(|favorites| favorites.iter().any(|id| id == course_id))
            .unwrap_or(false)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.read()
    }
}
