use super::base::AssemblyDescription;
use crate::error::Result;

/// Metadata for a `JTAGNetwork` or `IJTAGNetwork`: a name, with no further
/// fields. Network nodes are transparent routers; their behavior comes
/// entirely from the children wired into them at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkDescription {
    base: AssemblyDescription,
}

impl NetworkDescription {
    /// Builds a network description.
    pub fn new(entity_name: impl Into<String>) -> Result<Self> {
        Ok(NetworkDescription {
            base: AssemblyDescription::new(entity_name)?,
        })
    }

    /// The network node's name.
    pub fn entity_name(&self) -> &str {
        self.base.entity_name()
    }
}
