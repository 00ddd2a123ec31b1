//! Concurrent write-once map of completed descriptors
use crate::descriptor::BuildDescriptor;
use crate::error::{BuildError, BuildResult};
use crate::target::Target;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// (project, target)
pub type DescriptorKey = (String, Target);

/// Completed descriptors shared between workers
///
/// Each key is written at most once; a second write is a logic error and
/// fails with [`BuildError::DuplicateDescriptor`].
#[derive(Debug, Default, Clone)]
pub struct DescriptorStore {
    descriptors: Arc<DashMap<DescriptorKey, Arc<BuildDescriptor>>>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the descriptor `project` resolved to for `target`
    pub fn insert(
        &self,
        target: &Target,
        descriptor: BuildDescriptor,
    ) -> BuildResult<Arc<BuildDescriptor>> {
        let key = (descriptor.project.clone(), target.clone());
        match self.descriptors.entry(key) {
            Entry::Occupied(entry) => Err(BuildError::DuplicateDescriptor {
                project: entry.key().0.clone(),
                target: entry.key().1.key(),
            }),
            Entry::Vacant(entry) => {
                let descriptor = Arc::new(descriptor);
                entry.insert(descriptor.clone());
                Ok(descriptor)
            }
        }
    }

    pub fn get(&self, project: &str, target: &Target) -> Option<Arc<BuildDescriptor>> {
        self.descriptors
            .get(&(project.to_string(), target.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, project: &str, target: &Target) -> bool {
        self.descriptors
            .contains_key(&(project.to_string(), target.clone()))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
