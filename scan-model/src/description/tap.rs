use super::base::AssemblyDescription;
use crate::error::Result;

/// Metadata for a `TAP` (the IEEE 1149.1 test access port node): its name
/// and instruction register width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapDescription {
    base: AssemblyDescription,
    ir_length: usize,
}

impl TapDescription {
    /// Builds a TAP description with an `ir_length`-bit instruction
    /// register.
    pub fn new(entity_name: impl Into<String>, ir_length: usize) -> Result<Self> {
        Ok(TapDescription {
            base: AssemblyDescription::new(entity_name)?,
            ir_length,
        })
    }

    /// The TAP's name.
    pub fn entity_name(&self) -> &str {
        self.base.entity_name()
    }

    /// The instruction register's declared bit width.
    pub fn ir_length(&self) -> usize {
        self.ir_length
    }
}
