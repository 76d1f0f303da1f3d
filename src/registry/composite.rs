use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::Registry;
use crate::core::PrsError;

/// Ordered list of registries consulted one after another.
///
/// `fetch` returns the first member's success. When every member fails, the
/// error is the first `FileNotFound` seen, or the last error otherwise, so a
/// missing document is not masked by a later backend's network failure.
#[derive(Clone, Default)]
pub struct CompositeRegistry {
    members: Vec<Arc<dyn Registry>>,
}

impl CompositeRegistry {
    pub fn new(members: Vec<Arc<dyn Registry>>) -> Self {
        Self {
            members,
        }
    }

    #[must_use]
    pub fn with(mut self, member: Arc<dyn Registry>) -> Self {
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn members(&self) -> &[Arc<dyn Registry>] {
        &self.members
    }
}

#[async_trait]
impl Registry for CompositeRegistry {
    async fn fetch(&self, path: &str) -> Result<String> {
        let mut not_found: Option<anyhow::Error> = None;
        let mut last: Option<anyhow::Error> = None;

        for member in &self.members {
            match member.fetch(path).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::debug!(target: "registry", "{} could not provide {}: {:#}", member.describe(), path, e);
                    if not_found.is_none()
                        && matches!(PrsError::from_anyhow(&e), PrsError::FileNotFound { .. })
                    {
                        not_found = Some(e);
                    } else {
                        last = Some(e);
                    }
                }
            }
        }

        Err(not_found.or(last).unwrap_or_else(|| {
            PrsError::FileNotFound {
                path: path.to_string(),
            }
            .into()
        }))
    }

    async fn exists(&self, path: &str) -> bool {
        for member in &self.members {
            if member.exists(path).await {
                return true;
            }
        }
        false
    }

    async fn list(&self, path: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for member in &self.members {
            for name in member.list(path).await {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn describe(&self) -> String {
        let members: Vec<String> = self.members.iter().map(|m| m.describe()).collect();
        format!("composite[{}]", members.join(", "))
    }
}
