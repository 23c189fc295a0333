//! Source registry: unique name -> definition, in registration order

use crate::error::SourceError;
use crate::source::{SourceDefinition, SourceType};
use crate::timing::RunTimingPlan;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Mapping from unique source name to its definition
///
/// Definitions are stored behind `Arc` so thread managers can share them
/// read-only. Once frozen the registry rejects any addition or mutation.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<SourceDefinition>>,
    index: HashMap<String, usize>,
    frozen: bool,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new source and return a handle to set its parameters
    ///
    /// An empty name is replaced by a generated `"<type> <n>"` name unique
    /// within the registry.
    pub fn add_source(
        &mut self,
        source_type: SourceType,
        name: &str,
    ) -> Result<&mut SourceDefinition, SourceError> {
        let name = if name.is_empty() {
            self.generate_name(source_type)
        } else {
            name.to_string()
        };
        if self.frozen {
            return Err(SourceError::RegistryFrozen { name });
        }
        if self.index.contains_key(&name) {
            return Err(SourceError::DuplicateName { name });
        }

        let idx = self.sources.len();
        self.index.insert(name.clone(), idx);
        self.sources.push(Arc::new(SourceDefinition::new(source_type, name)));
        self.get_mut_at(idx)
    }

    fn generate_name(&self, source_type: SourceType) -> String {
        let mut n = self.sources.len() + 1;
        loop {
            let candidate = format!("{} {}", source_type, n);
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn get_mut_at(&mut self, idx: usize) -> Result<&mut SourceDefinition, SourceError> {
        let frozen = self.frozen;
        let source = &mut self.sources[idx];
        let name = source.name.clone();
        if frozen {
            return Err(SourceError::RegistryFrozen { name });
        }
        Arc::get_mut(source).ok_or(SourceError::RegistryFrozen { name })
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Result<&SourceDefinition, SourceError> {
        self.index
            .get(name)
            .map(|&idx| self.sources[idx].as_ref())
            .ok_or_else(|| self.unknown(name))
    }

    /// Mutable handle on a registered source, while the registry is not frozen
    pub fn get_mut(&mut self, name: &str) -> Result<&mut SourceDefinition, SourceError> {
        let idx = *self.index.get(name).ok_or_else(|| self.unknown(name))?;
        self.get_mut_at(idx)
    }

    fn unknown(&self, name: &str) -> SourceError {
        SourceError::UnknownSource {
            name: name.to_string(),
            known: self.names().map(str::to_string).collect(),
        }
    }

    /// Position of a source in registration order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDefinition> {
        self.sources.iter().map(|s| s.as_ref())
    }

    /// Shared handles, in registration order, for building source instances
    pub fn shared(&self) -> &[Arc<SourceDefinition>] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Validate every definition then forbid further changes
    pub fn freeze(&mut self) -> Result<(), SourceError> {
        for source in &self.sources {
            source.validate()?;
        }
        self.frozen = true;
        Ok(())
    }

    /// Validate every definition against the plan then forbid further
    /// changes. Fails when the primaries of all sources do not fit in a `u64`.
    pub fn freeze_for(&mut self, plan: &RunTimingPlan) -> Result<u64, SourceError> {
        let mut total = 0u64;
        for source in &self.sources {
            source.validate()?;
            total = total.checked_add(source.expected_total(plan)?).ok_or_else(|| {
                SourceError::InvalidSource {
                    name: source.name.clone(),
                    reason: format!(
                        "{} brings the primaries of all sources past {}",
                        source.count,
                        u64::MAX
                    ),
                }
            })?;
        }
        self.frozen = true;
        Ok(total)
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Multi-line description of the sources. Level 0 lists names only.
    pub fn dump(&self, level: u8) -> String {
        let mut s = format!("Number of sources: {}", self.len());
        for source in self.iter() {
            if level == 0 {
                s.push_str(&format!("\n  {} ({})", source.name, source.source_type));
            } else {
                for line in source.to_string().lines() {
                    s.push_str("\n  ");
                    s.push_str(line);
                }
            }
        }
        s
    }
}

impl fmt::Display for SourceRegistry {
    /// One line: the source names then their count
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "{} ({})", names.join(" "), self.len())
    }
}
