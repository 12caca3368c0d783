//! Course authoring state: an ordered list of modules with CRUD, reorder, and
//! JSON export.
//!
//! The module `order` field is always the dense sequence `0..n` matching list
//! position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::ModuleId;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuilderError {
    #[error("unknown module: {0}")]
    UnknownModule(ModuleId),

    #[error("index {index} out of range for {len} modules")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("failed to serialize course: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Text,
    Video,
    Image,
    Quiz,
    H5p,
    Scorm,
}

impl ModuleKind {
    pub const ALL: [Self; 6] = [
        Self::Text,
        Self::Video,
        Self::Image,
        Self::Quiz,
        Self::H5p,
        Self::Scorm,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "Text Content",
            Self::Video => "Video",
            Self::Image => "Image",
            Self::Quiz => "Assessment",
            Self::H5p => "H5P Content",
            Self::Scorm => "SCORM Package",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScormSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H5pSettings {
    pub content_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub tracking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: ModuleId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ModuleKind,
    #[serde(default)]
    pub content: String,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    pub order: usize,
    #[serde(default, rename = "scormData", skip_serializing_if = "Option::is_none")]
    pub scorm: Option<ScormSettings>,
    #[serde(default, rename = "h5pData", skip_serializing_if = "Option::is_none")]
    pub h5p: Option<H5pSettings>,
}

/// Partial update for a module; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModulePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ModuleKind>,
    pub content: Option<String>,
    pub duration: Option<u32>,
    #[serde(rename = "scormData")]
    pub scorm: Option<ScormSettings>,
    #[serde(rename = "h5pData")]
    pub h5p: Option<H5pSettings>,
}

impl ModulePatch {
    fn apply_to(self, module: &mut CourseModule) {
        if let Some(title) = self.title {
            module.title = title;
        }
        if let Some(description) = self.description {
            module.description = description;
        }
        if let Some(kind) = self.kind {
            module.kind = kind;
        }
        if let Some(content) = self.content {
            module.content = content;
        }
        if let Some(duration) = self.duration {
            module.duration = duration;
        }
        if let Some(scorm) = self.scorm {
            module.scorm = Some(scorm);
        }
        if let Some(h5p) = self.h5p {
            module.h5p = Some(h5p);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub modules: Vec<CourseModule>,
}

/// Exported document: the course plus derived totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseExport {
    #[serde(flatten)]
    pub course: Course,
    /// Sum of module durations in minutes.
    pub total_duration: u32,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CourseBuilder {
    course: Course,
}

impl CourseBuilder {
    /// Start from existing course data. Module order is normalised to list
    /// position.
    #[must_use]
    pub fn new(mut course: Course) -> Self {
        renumber(&mut course.modules);
        Self { course }
    }

    #[must_use]
    pub fn course(&self) -> &Course {
        &self.course
    }

    #[must_use]
    pub fn modules(&self) -> &[CourseModule] {
        &self.course.modules
    }

    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&CourseModule> {
        self.course.modules.iter().find(|m| &m.id == id)
    }

    /// # Errors
    ///
    /// `BuilderError::EmptyTitle` for a blank title.
    pub fn edit_details(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<(), BuilderError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(BuilderError::EmptyTitle);
        }
        self.course.title = title;
        self.course.description = description.into();
        self.course.category = category.into();
        Ok(())
    }

    /// Append a new module of `kind` with default fields.
    pub fn add_module(&mut self, kind: ModuleKind) -> &CourseModule {
        let order = self.course.modules.len();
        let module = CourseModule {
            id: ModuleId::generate(),
            title: format!("New {}", kind.label()),
            description: "Module description".to_owned(),
            kind,
            content: String::new(),
            duration: 0,
            order,
            scorm: None,
            h5p: None,
        };
        debug!(module = %module.id, ?kind, order, "module added");
        self.course.modules.push(module);
        &self.course.modules[order]
    }

    /// # Errors
    ///
    /// `BuilderError::UnknownModule` if no module has that id.
    pub fn update_module(&mut self, id: &ModuleId, patch: ModulePatch) -> Result<(), BuilderError> {
        let module = self
            .course
            .modules
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| BuilderError::UnknownModule(id.clone()))?;
        patch.apply_to(module);
        Ok(())
    }

    /// # Errors
    ///
    /// `BuilderError::UnknownModule` if no module has that id.
    pub fn delete_module(&mut self, id: &ModuleId) -> Result<CourseModule, BuilderError> {
        let index = self
            .course
            .modules
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| BuilderError::UnknownModule(id.clone()))?;
        let removed = self.course.modules.remove(index);
        renumber(&mut self.course.modules);
        Ok(removed)
    }

    /// Move the module at `from` to position `to`, then renumber.
    ///
    /// # Errors
    ///
    /// `BuilderError::IndexOutOfRange` if either index is past the end.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), BuilderError> {
        let len = self.course.modules.len();
        for index in [from, to] {
            if index >= len {
                return Err(BuilderError::IndexOutOfRange { index, len });
            }
        }
        let module = self.course.modules.remove(from);
        self.course.modules.insert(to, module);
        renumber(&mut self.course.modules);
        Ok(())
    }

    #[must_use]
    pub fn total_duration(&self) -> u32 {
        self.course
            .modules
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.duration))
    }

    #[must_use]
    pub fn export(&self, now: DateTime<Utc>) -> CourseExport {
        CourseExport {
            course: self.course.clone(),
            total_duration: self.total_duration(),
            exported_at: now,
        }
    }

    /// # Errors
    ///
    /// Serialization failure.
    pub fn export_json(&self, now: DateTime<Utc>) -> Result<String, BuilderError> {
        Ok(serde_json::to_string_pretty(&self.export(now))?)
    }

    /// `Advanced Labour Law` becomes `Advanced_Labour_Law_course.json`.
    #[must_use]
    pub fn export_file_name(&self) -> String {
        let stem = self.course.title.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{stem}_course.json")
    }
}

fn renumber(modules: &mut [CourseModule]) {
    for (index, module) in modules.iter_mut().enumerate() {
        module.order = index;
    }
}
