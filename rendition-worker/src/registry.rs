//! Construction and naming of renditions.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::domain::Rendition;
use crate::domain::value_objects::RenditionInstructions;
use crate::{Error, Result};

/// Builds the renditions of one activation from the raw instruction list.
#[derive(Debug, Clone)]
pub struct RenditionRegistry {
    out_dir: PathBuf,
    require_target: bool,
}

impl RenditionRegistry {
    /// `require_target` is false when uploads are disabled.
    pub fn new(out_dir: impl Into<PathBuf>, require_target: bool) -> Self {
        Self {
            out_dir: out_dir.into(),
            require_target,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Validate the instructions and create one rendition per entry.
    ///
    /// Renditions are indexed by position. Two renditions resolving to the same
    /// file name are rejected because they would overwrite each other.
    pub fn build(&self, instructions: &[RenditionInstructions]) -> Result<Vec<Rendition>> {
        if instructions.is_empty() {
            return Err(Error::validation("no renditions requested"));
        }

        let mut names = HashSet::with_capacity(instructions.len());
        let mut renditions = Vec::with_capacity(instructions.len());
        for (index, entry) in instructions.iter().enumerate() {
            self.validate(index, entry)?;
            let rendition = Rendition::new(entry.clone(), &self.out_dir, index);
            if !names.insert(rendition.name().to_string()) {
                return Err(Error::validation(format!(
                    "rendition {} reuses the name '{}'",
                    index,
                    rendition.name()
                )));
            }
            renditions.push(rendition);
        }
        Ok(renditions)
    }

    fn validate(&self, index: usize, entry: &RenditionInstructions) -> Result<()> {
        match &entry.target {
            Some(target) => target
                .validate()
                .map_err(|e| Error::validation(format!("rendition {}: {}", index, e))),
            None if self.require_target => Err(Error::validation(format!(
                "rendition {} has no target",
                index
            ))),
            None => Ok(()),
        }
    }

    /// Placeholder renditions for reporting a failure that happened before the
    /// instruction list could be validated.
    pub fn unchecked(&self, instructions: &[RenditionInstructions]) -> Vec<Rendition> {
        instructions
            .iter()
            .enumerate()
            .map(|(index, entry)| Rendition::new(entry.clone(), &self.out_dir, index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Target;

    fn with_target(fmt: &str) -> RenditionInstructions {
        RenditionInstructions {
            target: Some(Target::Url("https://example.com/put".into())),
            ..RenditionInstructions::for_format(fmt)
        }
    }

    #[test]
    fn test_build_names_and_paths() {
        let registry = RenditionRegistry::new("/work/out", true);
        let renditions = registry.build(&[with_target("png"), with_target("jpg")]).unwrap();
        assert_eq!(renditions[0].name(), "rendition0.png");
        assert_eq!(renditions[1].path(), Path::new("/work/out/rendition1.jpg"));
        assert_eq!(renditions[1].index(), 1);
    }

    #[test]
    fn test_empty_list_rejected() {
        let registry = RenditionRegistry::new("/out", true);
        assert!(registry.build(&[]).is_err());
    }

    #[test]
    fn test_target_required_unless_uploads_disabled() {
        let bare = RenditionInstructions::for_format("png");
        assert!(RenditionRegistry::new("/out", true).build(&[bare.clone()]).is_err());
        assert!(RenditionRegistry::new("/out", false).build(&[bare]).is_ok());
    }

    #[test]
    fn test_malformed_target_rejected() {
        let bad = RenditionInstructions {
            target: Some(Target::Url("not a url".into())),
            ..RenditionInstructions::for_format("png")
        };
        let err = RenditionRegistry::new("/out", true).build(&[bad]).unwrap_err();
        assert_eq!(err.location(), Some("validation"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let named = |name: &str| RenditionInstructions {
            name: Some(name.to_string()),
            ..with_target("png")
        };
        let registry = RenditionRegistry::new("/out", true);
        assert!(registry.build(&[named("a.png"), named("a.png")]).is_err());
    }
}
