use super::base::AssemblyDescription;
use crate::bitvector::BitVector;
use crate::error::{Result, ScanModelError};
use crate::NodeId;

/// One entry in a mux's address map: a selector code, an optional label
/// (a `ScanMux` names each instruction, e.g. `"BYPASS"`; a `DataMux` does
/// not), and the child the code selects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxEntry {
    /// The key-register value that selects `child`.
    pub code: BitVector,
    /// A human-readable name for this entry, if the mux kind assigns one.
    pub label: Option<String>,
    /// The child this code activates.
    pub child: NodeId,
}

/// Metadata for a `DataMux` or `ScanMux`: the key-register width and the
/// ordered address map from selector code to child.
///
/// The map is kept as an ordered list rather than flattened into a
/// `HashMap`: entry order is significant because the first entry doubles as
/// the default selection ([`Self::default_code`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MuxDescription {
    base: AssemblyDescription,
    code_length: usize,
    entries: Vec<MuxEntry>,
}

impl MuxDescription {
    /// Builds an empty mux description; children are added with
    /// [`Self::add_entry`] as [`crate::topology::Topology`] wires them in.
    pub fn new(entity_name: impl Into<String>, code_length: usize) -> Result<Self> {
        Ok(MuxDescription {
            base: AssemblyDescription::new(entity_name)?,
            code_length,
            entries: Vec::new(),
        })
    }

    /// The mux's name.
    pub fn entity_name(&self) -> &str {
        self.base.entity_name()
    }

    /// The key register's declared bit width.
    pub fn code_length(&self) -> usize {
        self.code_length
    }

    /// Adds a child under `code`, optionally named `label`. Rejects a code
    /// length mismatch or a code already claimed by another entry.
    pub fn add_entry(&mut self, code: BitVector, label: Option<String>, child: NodeId) -> Result<()> {
        if code.len() != self.code_length {
            return Err(ScanModelError::LengthMismatch {
                name: self.base.entity_name().to_string(),
                expected: self.code_length,
                actual: code.len(),
            });
        }
        if self.entries.iter().any(|e| e.code == code) {
            return Err(ScanModelError::Other(anyhow::anyhow!(
                "mux '{}' already has an entry for code {}",
                self.base.entity_name(),
                code
            )));
        }
        self.entries.push(MuxEntry { code, label, child });
        Ok(())
    }

    /// All entries, in the order they were added.
    pub fn entries(&self) -> &[MuxEntry] {
        &self.entries
    }

    /// Looks up the entry matching `code`.
    pub fn lookup(&self, code: &BitVector) -> Option<&MuxEntry> {
        self.entries.iter().find(|e| &e.code == code)
    }

    /// Looks up the entry that selects `child`.
    pub fn entry_for_child(&self, child: NodeId) -> Option<&MuxEntry> {
        self.entries.iter().find(|e| e.child == child)
    }

    /// The first-added entry's code, used whenever the key register holds a
    /// value with no matching entry and a default must be substituted.
    pub fn default_code(&self) -> Option<&BitVector> {
        self.entries.first().map(|e| &e.code)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn add_entry_rejects_duplicate_code() {
        let mut d = MuxDescription::new("m", 2).unwrap();
        d.add_entry(BitVector::from_u64(0, 2), None, 1).unwrap();
        let err = d.add_entry(BitVector::from_u64(0, 2), None, 2).unwrap_err();
        assert!(matches!(err, ScanModelError::Other(_)));
    }

    #[test]
    fn default_code_is_first_added() {
        let mut d = MuxDescription::new("m", 2).unwrap();
        d.add_entry(BitVector::from_u64(1, 2), Some("BYPASS".into()), 1).unwrap();
        d.add_entry(BitVector::from_u64(2, 2), Some("SAMPLE".into()), 2).unwrap();
        assert_eq!(d.default_code(), Some(&BitVector::from_u64(1, 2)));
    }

    #[test]
    fn entry_for_child_finds_match() {
        let mut d = MuxDescription::new("m", 2).unwrap();
        d.add_entry(BitVector::from_u64(1, 2), None, 7).unwrap();
        assert_eq!(d.entry_for_child(7).unwrap().child, 7);
        assert!(d.entry_for_child(9).is_none());
    }
}
