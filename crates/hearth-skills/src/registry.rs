//! Skills registry for managing multiple skills
//!
//! Scans skill directories once at startup; lookups afterwards are read-only.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::skill::{ActionConfig, SkillConfig};

/// Read contract used by the router to resolve skill and action names
pub trait SkillRegistry: Send + Sync {
    /// Get a skill by name
    fn skill(&self, name: &str) -> Option<&SkillConfig>;

    /// All skills, sorted by name
    fn skills(&self) -> Vec<&SkillConfig>;

    /// Get an action of a skill
    fn action(&self, skill: &str, action: &str) -> Option<&ActionConfig> {
        self.skill(skill).and_then(|s| s.action(action))
    }
}

/// Skills registry backed by skill directories on disk
pub struct SkillsRegistry {
    /// All discovered skills
    skills: HashMap<String, SkillConfig>,
    /// Skills directories to scan
    directories: Vec<PathBuf>,
}

impl SkillsRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
            directories: Vec::new(),
        }
    }

    /// Add a skills directory to scan
    pub fn add_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Add personal skills directory: ~/.hearth/skills/
    pub fn with_personal_skills(self) -> Self {
        if let Some(home) = dirs::home_dir() {
            self.add_directory(home.join(".hearth").join("skills"))
        } else {
            warn!("Could not find home directory for personal skills");
            self
        }
    }

    /// Register a skill directly, replacing one with the same name
    pub fn insert(&mut self, skill: SkillConfig) {
        self.skills.insert(skill.name.clone(), skill);
    }

    /// Scan all configured directories and load every skill config
    pub fn discover(&mut self) -> Result<()> {
        info!(
            "Starting skills discovery in {} directories",
            self.directories.len()
        );

        let directories = self.directories.clone();

        for dir in &directories {
            if !dir.exists() {
                debug!("Skills directory does not exist: {:?}", dir);
                continue;
            }

            if !dir.is_dir() {
                warn!("Skills path is not a directory: {:?}", dir);
                continue;
            }

            self.scan_directory(dir)?;
        }

        info!("Discovered {} skills", self.skills.len());
        Ok(())
    }

    /// Scan a single directory for skills
    fn scan_directory(&mut self, dir: &Path) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {:?}", dir))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if !path.is_dir() {
                continue;
            }

            match SkillConfig::from_dir(&path) {
                Ok(skill) => {
                    debug!(
                        "Discovered skill: {} ({} actions) at {:?}",
                        skill.name,
                        skill.actions.len(),
                        path
                    );
                    if self.skills.contains_key(&skill.name) {
                        warn!("Skill '{}' defined twice, keeping {:?}", skill.name, path);
                    }
                    self.insert(skill);
                }
                Err(e) => {
                    debug!("Skipping {:?}: {:#}", path, e);
                }
            }
        }

        Ok(())
    }

    /// Get all skill names
    pub fn skill_names(&self) -> impl Iterator<Item = &String> {
        self.skills.keys()
    }

    /// Get number of skills
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl SkillRegistry for SkillsRegistry {
    fn skill(&self, name: &str) -> Option<&SkillConfig> {
        self.skills.get(name)
    }

    fn skills(&self) -> Vec<&SkillConfig> {
        let mut sorted: Vec<_> = self.skills.values().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted
    }
}

impl Default for SkillsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
