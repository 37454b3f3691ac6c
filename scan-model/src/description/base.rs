use crate::error::{Result, ScanModelError};

/// The metadata every node kind carries: its entity name.
///
/// Every other description type embeds one of these rather than repeating
/// the name-validation logic; a `JTAGControllerAssembly` or a transparent
/// network node that needs no further metadata uses `AssemblyDescription`
/// directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyDescription {
    entity_name: String,
}

impl AssemblyDescription {
    /// Validates and wraps `entity_name`. Names must be non-empty and must
    /// not contain `.`, since `.` is the path separator
    /// [`crate::topology::Topology::resolve_path`] splits on.
    pub fn new(entity_name: impl Into<String>) -> Result<Self> {
        let entity_name = entity_name.into();
        if entity_name.is_empty() {
            return Err(ScanModelError::Other(anyhow::anyhow!(
                "entity name must not be empty"
            )));
        }
        if entity_name.contains('.') {
            return Err(ScanModelError::Other(anyhow::anyhow!(
                "entity name '{entity_name}' must not contain '.'"
            )));
        }
        Ok(AssemblyDescription { entity_name })
    }

    /// The node's name, unique among its siblings.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(AssemblyDescription::new("").is_err());
    }

    #[test]
    fn rejects_dotted_name() {
        assert!(AssemblyDescription::new("a.b").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        let d = AssemblyDescription::new("ir").unwrap();
        assert_eq!(d.entity_name(), "ir");
    }
}
