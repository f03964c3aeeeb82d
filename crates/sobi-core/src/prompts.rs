//! Markdown prompt templates
//!
//! Each prompt is a markdown file with YAML frontmatter and `# System` /
//! `# User` sections. A file named `<id>.md` in the override directory
//! (by default `<data dir>/sobi/prompts/overrides/`) wins over the copy
//! baked into the binary.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const CLASSIFY_EXPENDITURES_MD: &str = include_str!("../../../prompts/classify_expenditures.md");
const RANK_OVERSPENDING_MD: &str = include_str!("../../../prompts/rank_overspending.md");
const RECOMMEND_SAVINGS_MD: &str = include_str!("../../../prompts/recommend_savings.md");

const FRONTMATTER_FENCE: &str = "---";
const SYSTEM_HEADER: &str = "# System";
const USER_HEADER: &str = "# User";

/// The prompts the service ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    ClassifyExpenditures,
    RankOverspending,
    RecommendSavings,
}

impl PromptId {
    const ALL: [PromptId; 3] = [
        PromptId::ClassifyExpenditures,
        PromptId::RankOverspending,
        PromptId::RecommendSavings,
    ];

    /// File stem and frontmatter id
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassifyExpenditures => "classify_expenditures",
            Self::RankOverspending => "rank_overspending",
            Self::RecommendSavings => "recommend_savings",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &Self::ALL
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }

    fn embedded(&self) -> &'static str {
        match self {
            Self::ClassifyExpenditures => CLASSIFY_EXPENDITURES_MD,
            Self::RankOverspending => RANK_OVERSPENDING_MD,
            Self::RecommendSavings => RECOMMEND_SAVINGS_MD,
        }
    }

    fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

/// YAML header of a prompt file
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the wording or output contract changes
    pub version: u32,
    /// Pipeline stage that uses this prompt
    pub task: String,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Markdown body after the frontmatter
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Split `---` frontmatter from the body of a prompt file
    fn parse(text: &str) -> Result<Self> {
        let after_open = text
            .trim()
            .strip_prefix(FRONTMATTER_FENCE)
            .ok_or_else(|| Error::InvalidData("prompt has no YAML frontmatter".into()))?;
        let (header, body) = after_open
            .split_once(FRONTMATTER_FENCE)
            .ok_or_else(|| Error::InvalidData("prompt frontmatter is never closed".into()))?;

        let metadata: PromptMetadata = serde_yaml::from_str(header.trim())
            .map_err(|e| Error::InvalidData(format!("bad prompt frontmatter: {}", e)))?;

        Ok(Self {
            metadata,
            content: body.trim().to_string(),
            is_override: false,
            override_path: None,
        })
    }

    /// Read an override file; its frontmatter id must match the file it replaces
    fn from_file(id: PromptId, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::InvalidData(format!("cannot read prompt {}: {}", path.display(), e))
        })?;
        let mut prompt = Self::parse(&text)?;
        if prompt.metadata.id != id.as_str() {
            return Err(Error::InvalidData(format!(
                "Prompt override {} declares id '{}'",
                path.display(),
                prompt.metadata.id
            )));
        }
        prompt.is_override = true;
        prompt.override_path = Some(path.to_path_buf());
        Ok(prompt)
    }

    pub fn system_section(&self) -> Option<&str> {
        section(&self.content, SYSTEM_HEADER)
    }

    pub fn user_section(&self) -> Option<&str> {
        section(&self.content, USER_HEADER)
    }

    pub fn render_system(&self, vars: &HashMap<&str, &str>) -> Option<String> {
        self.system_section().map(|s| render_template(s, vars))
    }

    /// The user section, or the whole body for prompts without headers
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        render_template(self.user_section().unwrap_or(&self.content), vars)
    }
}

/// Resolves prompts by id and memoizes them
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    fn with_dir(override_dir: Option<PathBuf>) -> Self {
        Self {
            override_dir,
            cache: HashMap::new(),
        }
    }

    /// Overrides from the per-user data directory
    pub fn new() -> Self {
        Self::with_dir(default_prompts_dir())
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self::with_dir(Some(path))
    }

    /// Never touches the filesystem
    pub fn embedded_only() -> Self {
        Self::with_dir(None)
    }

    /// Configured directory if any, otherwise the per-user one
    pub fn from_override(dir: Option<PathBuf>) -> Self {
        dir.map_or_else(Self::new, Self::with_override_dir)
    }

    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.resolve(id)?;
            self.cache.insert(id, prompt);
        }
        self.cache
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    fn resolve(&self, id: PromptId) -> Result<Prompt> {
        match self.existing_override(id) {
            Some(path) => {
                tracing::debug!(prompt = id.as_str(), path = %path.display(), "Using prompt override");
                Prompt::from_file(id, &path)
            }
            None => Prompt::parse(id.embedded()),
        }
    }

    fn existing_override(&self, id: PromptId) -> Option<PathBuf> {
        let dir = self.override_dir.as_ref()?;
        Some(dir.join(id.file_name())).filter(|p| p.exists())
    }

    /// One row per known prompt; a prompt that fails to load reports version 0
    pub fn list(&mut self) -> Vec<PromptInfo> {
        let mut rows = Vec::with_capacity(PromptId::ALL.len());
        for id in PromptId::ALL {
            let override_path = self.existing_override(id);
            let (version, task) = match self.get(id) {
                Ok(p) => (p.metadata.version, p.metadata.task.clone()),
                Err(_) => (0, String::new()),
            };
            rows.push(PromptInfo {
                id: id.as_str().to_string(),
                version,
                task,
                has_override: override_path.is_some(),
                override_path,
            });
        }
        rows
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.existing_override(id).is_some()
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Row for `sobi prompts list`
#[derive(Debug, Clone)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub task: String,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sobi").join("prompts").join("overrides"))
}

/// Text under `header` up to the next top-level heading
fn section<'a>(body: &'a str, header: &str) -> Option<&'a str> {
    let (_, rest) = body.split_once(header)?;
    let text = rest.split("\n# ").next().unwrap_or(rest);
    Some(text.trim())
}

/// Expand `{{#if var}}...{{/if}}` and `{{var}}` in one left-to-right pass
///
/// Inserted values are copied straight to the output, so template syntax
/// inside a value stays literal. A block is kept when its variable is
/// present and non-empty. Unknown `{{name}}` tokens are left untouched.
fn render_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    const IF_OPEN: &str = "{{#if ";
    const IF_CLOSE: &str = "{{/if}}";

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find("{{") {
        out.push_str(&rest[..pos]);
        let tag = &rest[pos..];

        if let Some(cond) = tag.strip_prefix(IF_OPEN) {
            let Some((name, after)) = cond.split_once("}}") else {
                out.push_str(tag);
                return out;
            };
            let Some((block, tail)) = after.split_once(IF_CLOSE) else {
                out.push_str(tag);
                return out;
            };
            if vars.get(name.trim()).is_some_and(|v| !v.is_empty()) {
                out.push_str(&render_template(block, vars));
            }
            rest = tail;
            continue;
        }

        match tag[2..].split_once("}}") {
            Some((name, tail)) => {
                match vars.get(name.trim()) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                rest = tail;
            }
            None => {
                out.push_str(tag);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
