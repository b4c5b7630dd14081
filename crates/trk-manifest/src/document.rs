//! Manifest documents (JSON / YAML ingress)
//!
//! Raw, loosely-checked serde shapes. [`ManifestDocument::into_bundle`] is the
//! single place where they become a validated [`ManifestBundle`].

use crate::bundle::{ArtifactTypeDef, ManifestBundle};
use crate::error::ManifestError;
use crate::id::WorkflowId;
use crate::workflow::{ChoiceOption, State, Transition, Workflow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk manifest format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl ManifestFormat {
    /// Detect format from file extension
    ///
    /// # Errors
    /// `UnsupportedFormat` for any other extension
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ManifestError::UnsupportedFormat(ext)),
        }
    }
}

/// Workflow as written in a manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow id
    pub id: WorkflowId,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared states
    #[serde(default)]
    pub states: Vec<State>,
    /// Declared edges
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// `state_reason` choices
    #[serde(default)]
    pub state_reason_options: Vec<ChoiceOption>,
    /// `resolution` choices
    #[serde(default)]
    pub resolution_options: Vec<ChoiceOption>,
}

impl WorkflowDocument {
    /// Validate into a [`Workflow`]
    ///
    /// # Errors
    /// Any structural violation reported by [`crate::WorkflowBuilder::build`]
    pub fn into_workflow(self) -> Result<Workflow, ManifestError> {
        let mut builder = Workflow::builder(self.id)
            .states(self.states)
            .transitions(self.transitions)
            .options(self.state_reason_options, self.resolution_options);
        if let Some(name) = self.name {
            builder = builder.named(name);
        }
        builder.build()
    }
}

/// Whole manifest as written in a file
///
/// Unknown keys (custom field declarations, layout hints) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Workflows
    #[serde(default)]
    pub workflows: Vec<WorkflowDocument>,
    /// Artifact types
    #[serde(default)]
    pub artifact_types: Vec<ArtifactTypeDef>,
}

impl ManifestDocument {
    /// Decode from JSON text
    ///
    /// # Errors
    /// `Json` if the text is not a manifest document
    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode from YAML text
    ///
    /// # Errors
    /// `Yaml` if the text is not a manifest document
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Validate into a [`ManifestBundle`]
    ///
    /// # Errors
    /// First structural violation found
    pub fn into_bundle(self) -> Result<ManifestBundle, ManifestError> {
        let workflows = self
            .workflows
            .into_iter()
            .map(WorkflowDocument::into_workflow)
            .collect::<Result<Vec<_>, _>>()?;
        ManifestBundle::new(workflows, self.artifact_types)
    }
}

impl ManifestBundle {
    /// Parse and validate a JSON manifest
    ///
    /// # Errors
    /// Decode or structural errors
    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        ManifestDocument::from_json_str(text)?.into_bundle()
    }

    /// Parse and validate a YAML manifest
    ///
    /// # Errors
    /// Decode or structural errors
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        ManifestDocument::from_yaml_str(text)?.into_bundle()
    }

    /// Load a manifest file, choosing the format by extension
    ///
    /// # Errors
    /// IO, format, decode or structural errors
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let format = ManifestFormat::from_path(path)?;
        let text =
            std::fs::read_to_string(path).map_err(|e| ManifestError::io_error(path, e))?;
        tracing::info!("Loading manifest from {}", path.display());
        match format {
            ManifestFormat::Json => Self::from_json_str(&text),
            ManifestFormat::Yaml => Self::from_yaml_str(&text),
        }
    }
}
