// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Lifecycle of projects and repositories: create, soft-delete (remove),
//! unremove and purge, at both granularities.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use dogma_core::project::{self, META_REPO_NAME};
use dogma_core::{CoreError, CoreResult, Project, Repository};

use crate::commit_engine::RepoHandle;

#[derive(Clone, Eq, PartialEq, Hash)]
struct RepoKey(String, String);

pub struct RepositoryManager {
    data_dir: Option<PathBuf>,
    projects: DashMap<String, Project>,
    repositories: DashMap<RepoKey, Repository>,
    handles: DashMap<RepoKey, Arc<RepoHandle>>,
}

impl RepositoryManager {
    pub fn new() -> Self {
        Self {
            data_dir: None,
            projects: DashMap::new(),
            repositories: DashMap::new(),
            handles: DashMap::new(),
        }
    }

    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: Some(dir.into()), ..Self::new() }
    }

    fn repo_dir(&self, project: &str, repo: &str) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(project).join(repo))
    }

    // -- Projects ---------------------------------------------------

    pub fn create_project(&self, name: &str, author: &str) -> CoreResult<()> {
        if self.projects.contains_key(name) {
            return Err(CoreError::AlreadyExists(format!("project {name}")));
        }
        let p = Project::new(name, author)?;
        self.projects.insert(name.to_string(), p);
        self.create_repository(name, META_REPO_NAME, author)?;
        Ok(())
    }

    pub fn remove_project(&self, name: &str, author: &str) -> CoreResult<()> {
        let mut p = self
            .projects
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(format!("project {name}")))?;
        if p.is_internal() {
            return Err(CoreError::Permission(format!("{name} is an internal project")));
        }
        p.mark_removed(author);
        Ok(())
    }

    pub fn unremove_project(&self, name: &str) -> CoreResult<()> {
        let mut p = self
            .projects
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(format!("project {name}")))?;
        p.unmark_removed();
        Ok(())
    }

    pub fn purge_project(&self, name: &str) -> CoreResult<()> {
        self.projects
            .remove(name)
            .ok_or_else(|| CoreError::NotFound(format!("project {name}")))?;
        self.repositories.retain(|k, _| k.0 != name);
        self.handles.retain(|k, _| k.0 != name);
        if let Some(dir) = &self.data_dir {
            let _ = std::fs::remove_dir_all(dir.join(name));
        }
        Ok(())
    }

    pub fn list_projects(&self, is_admin: bool) -> Vec<Project> {
        self.projects
            .iter()
            .filter(|e| !e.is_removed())
            .filter(|e| is_admin || !e.is_internal())
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn list_removed_projects(&self) -> Vec<Project> {
        self.projects.iter().filter(|e| e.is_removed()).map(|e| e.value().clone()).collect()
    }

    pub fn get_project(&self, name: &str) -> CoreResult<Project> {
        self.projects
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("project {name}")))
    }

    // -- Repositories -------------------------------------------------

    pub fn create_repository(&self, project: &str, name: &str, author: &str) -> CoreResult<()> {
        if name != META_REPO_NAME && !self.projects.contains_key(project) {
            return Err(CoreError::NotFound(format!("project {project}")));
        }
        let key = RepoKey(project.to_string(), name.to_string());
        if self.repositories.contains_key(&key) {
            return Err(CoreError::AlreadyExists(format!("repository {project}/{name}")));
        }
        let repo = Repository::new(project, name, author)?;
        self.repositories.insert(key.clone(), repo);
        let handle = match self.repo_dir(project, name) {
            Some(dir) => Arc::new(RepoHandle::with_data_dir(dir)?),
            None => Arc::new(RepoHandle::new_empty()),
        };
        self.handles.insert(key, handle);
        Ok(())
    }

    pub fn remove_repository(&self, project: &str, name: &str, author: &str) -> CoreResult<()> {
        let key = RepoKey(project.to_string(), name.to_string());
        let mut repo = self
            .repositories
            .get_mut(&key)
            .ok_or_else(|| CoreError::NotFound(format!("repository {project}/{name}")))?;
        repo.mark_removed(author);
        Ok(())
    }

    pub fn unremove_repository(&self, project: &str, name: &str) -> CoreResult<()> {
        let key = RepoKey(project.to_string(), name.to_string());
        let mut repo = self
            .repositories
            .get_mut(&key)
            .ok_or_else(|| CoreError::NotFound(format!("repository {project}/{name}")))?;
        repo.unmark_removed();
        Ok(())
    }

    pub fn purge_repository(&self, project: &str, name: &str) -> CoreResult<()> {
        let key = RepoKey(project.to_string(), name.to_string());
        self.repositories
            .remove(&key)
            .ok_or_else(|| CoreError::NotFound(format!("repository {project}/{name}")))?;
        self.handles.remove(&key);
        if let Some(dir) = self.repo_dir(project, name) {
            let _ = std::fs::remove_dir_all(dir);
        }
        Ok(())
    }

    pub fn list_repositories(&self, project: &str) -> Vec<Repository> {
        self.repositories
            .iter()
            .filter(|e| e.key().0 == project && !e.is_removed())
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn get_repository(&self, project: &str, name: &str) -> CoreResult<Repository> {
        let key = RepoKey(project.to_string(), name.to_string());
        self.repositories
            .get(&key)
            .map(|e| e.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("repository {project}/{name}")))
    }

    pub fn handle(&self, project: &str, name: &str) -> CoreResult<Arc<RepoHandle>> {
        let key = RepoKey(project.to_string(), name.to_string());
        self.handles
            .get(&key)
            .map(|e| e.value().clone())
            .ok_or_else(|| CoreError::NotFound(format!("repository {project}/{name}")))
    }

    /// Sync head_revision stored in repository metadata after a push.
    pub fn record_head_revision(&self, project: &str, name: &str, revision: i64) {
        let key = RepoKey(project.to_string(), name.to_string());
        if let Some(mut repo) = self.repositories.get_mut(&key) {
            repo.head_revision = revision;
        }
    }
}

impl Default for RepositoryManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_project_name(name: &str) -> CoreResult<()> {
    project::validate_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_project_creates_meta_repo() {
        let mgr = RepositoryManager::new();
        mgr.create_project("foo", "alice").unwrap();
        let repos = mgr.list_repositories("foo");
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, META_REPO_NAME);
    }

    #[test]
    fn duplicate_project_rejected() {
        let mgr = RepositoryManager::new();
        mgr.create_project("foo", "alice").unwrap();
        assert!(matches!(mgr.create_project("foo", "alice"), Err(CoreError::AlreadyExists(_))));
    }

    #[test]
    fn soft_delete_hides_from_list_but_enumerable() {
        let mgr = RepositoryManager::new();
        mgr.create_project("foo", "alice").unwrap();
        mgr.remove_project("foo", "alice").unwrap();
        assert!(mgr.list_projects(true).is_empty());
        assert_eq!(mgr.list_removed_projects().len(), 1);
        mgr.unremove_project("foo").unwrap();
        assert_eq!(mgr.list_projects(true).len(), 1);
    }

    #[test]
    fn purge_removes_physically() {
        let mgr = RepositoryManager::new();
        mgr.create_project("foo", "alice").unwrap();
        mgr.purge_project("foo").unwrap();
        assert!(matches!(mgr.get_project("foo"), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn internal_project_cannot_be_removed() {
        let mgr = RepositoryManager::new();
        mgr.create_project("dogma", "alice").unwrap();
        assert!(matches!(mgr.remove_project("dogma", "alice"), Err(CoreError::Permission(_))));
    }

    #[test]
    fn create_repository_then_push() {
        let mgr = RepositoryManager::new();
        mgr.create_project("foo", "alice").unwrap();
        mgr.create_repository("foo", "bar", "alice").unwrap();
        let handle = mgr.handle("foo", "bar").unwrap();
        assert_eq!(handle.head_revision(), 1);
    }
}
