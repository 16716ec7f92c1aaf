//! Recipe Registry - Store and reuse pipeline recipes
//!
//! Saves recipes to disk with usage statistics so a recipe that worked for
//! one extract can be run again by id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::transform::pipeline::parse_recipe;
use crate::transform::recipe::Recipe;

/// Directory where recipes are stored (relative to current dir)
const DEFAULT_REGISTRY_DIR: &str = ".loadprep/recipes";

/// Environment variable overriding the registry directory
pub const RECIPE_DIR_ENV: &str = "LOADPREP_RECIPE_DIR";

/// A stored recipe with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecipe {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// The recipe itself
    pub recipe: Recipe,
    /// Creation timestamp
    pub created_at: String,
    /// Last time this recipe was run
    pub last_used: Option<String>,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Number of runs
    pub use_count: u32,
}

/// Registry for managing stored recipes
pub struct RecipeRegistry {
    /// Directory where recipes are stored
    registry_dir: PathBuf,
    /// Loaded recipes (id -> recipe)
    recipes: HashMap<String, StoredRecipe>,
}

impl RecipeRegistry {
    /// Create a registry in `LOADPREP_RECIPE_DIR`, or `.loadprep/recipes`
    pub fn new() -> Self {
        match std::env::var(RECIPE_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::with_dir(dir),
            _ => Self::with_dir(DEFAULT_REGISTRY_DIR),
        }
    }

    /// Create a registry with a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            recipes: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all recipes from the registry directory; unreadable files are ignored
    fn load_all(&mut self) {
        let entries = match fs::read_dir(&self.registry_dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(stored) = serde_json::from_str::<StoredRecipe>(&content) {
                        self.recipes.insert(stored.id.clone(), stored);
                    }
                }
            }
        }
    }

    /// All stored recipes, most successful first
    pub fn list(&self) -> Vec<&StoredRecipe> {
        let mut recipes: Vec<_> = self.recipes.values().collect();
        recipes.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| a.id.cmp(&b.id))
        });
        recipes
    }

    /// Get a recipe by ID
    pub fn get(&self, id: &str) -> RegistryResult<&StoredRecipe> {
        self.recipes
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Save a recipe, returning its new id
    pub fn save(&mut self, recipe: Recipe, name: &str) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let id = self.generate_id(name);
        let stored = StoredRecipe {
            id: id.clone(),
            name: name.to_string(),
            recipe,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            success_rate: 1.0,
            use_count: 0,
        };

        self.write(&stored)?;
        self.recipes.insert(id.clone(), stored);
        Ok(id)
    }

    /// Import a recipe from a JSON file, validating it first
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let content = fs::read_to_string(path)?;
        let recipe = parse_recipe(&content, true).map_err(|e| RegistryError::InvalidRecipe(e.to_string()))?;

        let recipe_name = match name {
            Some(n) => n.to_string(),
            None if !recipe.name.is_empty() => recipe.name.clone(),
            None => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
                .to_string(),
        };

        self.save(recipe, &recipe_name)
    }

    /// Update statistics after running a recipe
    pub fn update_stats(&mut self, id: &str, success: bool) -> RegistryResult<()> {
        let stored = self
            .recipes
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        // Exponential moving average
        stored.success_rate = if success {
            stored.success_rate * 0.9 + 0.1
        } else {
            stored.success_rate * 0.9
        };
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let snapshot = stored.clone();
        self.write(&snapshot)
    }

    /// Delete a recipe from the registry
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.recipes.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredRecipe) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }

    /// Generate a unique ID from a name
    fn generate_id(&self, name: &str) -> String {
        let slug: String = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        let slug = if slug.is_empty() { "recipe".to_string() } else { slug };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut id = format!("{}-{}", slug, timestamp);
        let mut n = 1;
        while self.recipes.contains_key(&id) {
            n += 1;
            id = format!("{}-{}-{}", slug, timestamp, n);
        }
        id
    }
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::recipe::example_recipe;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        let id = registry.save(example_recipe(), "Music Catalog!").unwrap();
        assert!(id.starts_with("music-catalog-"));

        let reloaded = RecipeRegistry::with_dir(dir.path());
        let stored = reloaded.get(&id).unwrap();
        assert_eq!(stored.recipe, example_recipe());
        assert_eq!(stored.use_count, 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        let a = registry.save(example_recipe(), "same").unwrap();
        let b = registry.save(example_recipe(), "same").unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_update_stats_moving_average() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        let id = registry.save(example_recipe(), "stats").unwrap();

        registry.update_stats(&id, false).unwrap();
        let stored = registry.get(&id).unwrap();
        assert!((stored.success_rate - 0.9).abs() < 1e-9);
        assert_eq!(stored.use_count, 1);
        assert!(stored.last_used.is_some());

        registry.update_stats(&id, true).unwrap();
        assert!((registry.get(&id).unwrap().success_rate - 0.91).abs() < 1e-9);

        // persisted
        let reloaded = RecipeRegistry::with_dir(dir.path());
        assert_eq!(reloaded.get(&id).unwrap().use_count, 2);
    }

    #[test]
    fn test_import_uses_recipe_name() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nightly.json");
        fs::write(&file, example_recipe().to_json().unwrap()).unwrap();

        let mut registry = RecipeRegistry::with_dir(dir.path().join("registry"));
        let id = registry.import(&file, None).unwrap();
        assert_eq!(registry.get(&id).unwrap().name, "music-catalog");
    }

    #[test]
    fn test_import_rejects_invalid_document() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"{"steps": [{"type": "explode"}]}"#).unwrap();

        let mut registry = RecipeRegistry::with_dir(dir.path().join("registry"));
        assert!(matches!(registry.import(&file, None), Err(RegistryError::InvalidRecipe(_))));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut registry = RecipeRegistry::with_dir(dir.path());
        let id = registry.save(example_recipe(), "gone").unwrap();

        registry.delete(&id).unwrap();
        assert!(matches!(registry.get(&id), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.delete(&id), Err(RegistryError::NotFound(_))));
        assert!(!dir.path().join(format!("{}.json", id)).exists());
    }
}
