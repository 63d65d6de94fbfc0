// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Thin `git2` wrapper: clone-or-fetch a mirror's remote into a scratch
//! workdir, read a subtree into a flat path map, and commit + push a flat
//! path map back out. This is the only module in the crate that touches
//! libgit2 directly; [`crate::scheduler`] deals purely in
//! `BTreeMap<String, Vec<u8>>` snapshots so the diffing logic stays
//! testable without a real remote.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dogma_core::{Credential, CredentialType};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Cred, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature,
};

use crate::error::{MirrorError, MirrorResult};

/// A checked-out working copy of a mirror's remote Git repository.
pub struct GitWorkdir {
    repo: Repository,
}

fn remote_callbacks(credential: Option<&Credential>) -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    let credential = credential.cloned();
    callbacks.credentials(move |_url, username_from_url, _allowed| match &credential {
        Some(Credential { credential_type: CredentialType::Password { username, password }, .. }) => {
            Cred::userpass_plaintext(username, password)
        }
        Some(Credential {
            credential_type: CredentialType::SshKey { username, private_key, passphrase },
            ..
        }) => Cred::ssh_key_from_memory(username, None, private_key, passphrase.as_deref()),
        Some(Credential { credential_type: CredentialType::AccessToken { token }, .. }) => {
            Cred::userpass_plaintext(token, "")
        }
        _ => Cred::default().or_else(|_| {
            Cred::username(username_from_url.unwrap_or("git"))
        }),
    });
    callbacks
}

fn fetch_options(credential: Option<&Credential>) -> FetchOptions<'static> {
    let mut opts = FetchOptions::new();
    opts.remote_callbacks(remote_callbacks(credential));
    opts
}

impl GitWorkdir {
    /// Clone the remote into `dir` if absent, otherwise fetch and
    /// fast-forward the local tracking ref. Returns the checked out
    /// workdir plus the resolved remote head commit id (hex). `dir` is
    /// expected to be a per-mirror scratch directory (see
    /// [`scratch_path`]) so concurrent mirrors never share a checkout.
    pub fn sync(
        dir: &Path,
        uri: &str,
        branch: &str,
        credential: Option<&Credential>,
    ) -> MirrorResult<(Self, String)> {
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let repo = if dir.join(".git").exists() {
            let repo = Repository::open(dir)?;
            {
                let mut remote = repo.find_remote("origin").or_else(|_| repo.remote("origin", uri))?;
                remote.fetch(&[branch], Some(&mut fetch_options(credential)), None)?;
            }
            repo
        } else {
            RepoBuilder::new()
                .fetch_options(fetch_options(credential))
                .branch(branch)
                .clone(uri, dir)?
        };

        let head_oid = resolve_branch_tip(&repo, branch)?;
        checkout_detached(&repo, head_oid)?;

        Ok((Self { repo }, head_oid.to_string()))
    }

    /// Flatten every blob under `subpath` (an absolute dogma-style path,
    /// `/` for the whole tree) into `dogma path -> bytes`, skipping any
    /// path matched by `ignore`.
    pub fn read_tree(&self, subpath: &str, ignore: &globset::GlobSet) -> MirrorResult<BTreeMap<String, Vec<u8>>> {
        let head = self.repo.head()?.peel_to_commit()?;
        let tree = head.tree()?;
        let sub_tree = if subpath == "/" || subpath.is_empty() {
            tree
        } else {
            let entry = tree.get_path(Path::new(subpath.trim_start_matches('/')))?;
            entry.to_object(&self.repo)?.peel_to_tree()?
        };

        let mut out = BTreeMap::new();
        sub_tree.walk(git2::TreeWalkMode::PreOrder, |parent, entry| {
            if entry.kind() != Some(git2::ObjectType::Blob) {
                return git2::TreeWalkResult::Ok;
            }
            let name = entry.name().unwrap_or_default();
            let rel = format!("{parent}{name}");
            if ignore.is_match(&rel) {
                return git2::TreeWalkResult::Ok;
            }
            if let Ok(obj) = entry.to_object(&self.repo) {
                if let Some(blob) = obj.as_blob() {
                    out.insert(format!("/{rel}"), blob.content().to_vec());
                }
            }
            git2::TreeWalkResult::Ok
        })?;
        Ok(out)
    }

    /// Write `files` (dogma-style absolute paths, rooted under `subpath`)
    /// into the working tree, commit, and push to `branch`. Returns the
    /// new commit id (hex). A no-op (identical tree) still returns the
    /// current head id without creating an empty commit.
    pub fn commit_and_push(
        &self,
        subpath: &str,
        files: &BTreeMap<String, Vec<u8>>,
        branch: &str,
        credential: Option<&Credential>,
        author: &str,
        summary: &str,
    ) -> MirrorResult<String> {
        let workdir = self.repo.workdir().ok_or_else(|| MirrorError::Other("bare repository has no workdir".into()))?;
        let root = if subpath == "/" || subpath.is_empty() {
            workdir.to_path_buf()
        } else {
            workdir.join(subpath.trim_start_matches('/'))
        };
        std::fs::create_dir_all(&root)?;

        for (path, content) in files {
            let rel = path.trim_start_matches('/');
            let dest = root.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dest, content)?;
        }

        let mut index = self.repo.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = self.repo.head()?.peel_to_commit()?;
        if parent.tree_id() == tree_id {
            return Ok(parent.id().to_string());
        }

        let sig = Signature::now(author, &format!("{author}@localhost"))?;
        let commit_id = self.repo.commit(Some("HEAD"), &sig, &sig, summary, &tree, &[&parent])?;

        let mut remote = self.repo.find_remote("origin")?;
        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(remote_callbacks(credential));
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec.as_str()], Some(&mut push_opts))?;

        Ok(commit_id.to_string())
    }
}

fn resolve_branch_tip(repo: &Repository, branch: &str) -> MirrorResult<git2::Oid> {
    if let Ok(reference) = repo.find_branch(branch, git2::BranchType::Local) {
        return Ok(reference.get().peel_to_commit()?.id());
    }
    let remote_ref = format!("refs/remotes/origin/{branch}");
    let reference = repo.find_reference(&remote_ref)?;
    Ok(reference.peel_to_commit()?.id())
}

fn checkout_detached(repo: &Repository, oid: git2::Oid) -> MirrorResult<()> {
    let commit = repo.find_commit(oid)?;
    repo.set_head_detached(oid)?;
    let mut builder = CheckoutBuilder::new();
    builder.force();
    repo.checkout_tree(commit.as_object(), Some(&mut builder))?;
    Ok(())
}

/// Compile a mirror's gitignore-style pattern list into a matcher. An
/// empty pattern list matches nothing.
pub fn compile_ignore(patterns: &[String]) -> MirrorResult<globset::GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(globset::Glob::new(pattern).map_err(|e| MirrorError::Other(e.to_string()))?);
    }
    builder.build().map_err(|e| MirrorError::Other(e.to_string()))
}

/// Scratch directory root for a mirror's checkout, namespaced by project
/// so two mirrors in different projects never collide even if their ids
/// happened to match (ids are unique per-project, not globally).
pub fn scratch_path(base: &Path, project: &str, mirror_id: &str) -> PathBuf {
    base.join(project).join(mirror_id)
}
