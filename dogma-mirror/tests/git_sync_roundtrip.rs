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

//! Exercises [`dogma_mirror::GitWorkdir`] against a real local bare
//! repository (no network) to cover the clone/fetch/read/commit/push path
//! end to end.

use std::collections::BTreeMap;

use dogma_mirror::git_sync::{compile_ignore, scratch_path, GitWorkdir};
use git2::{Repository, Signature};
use tempfile::tempdir;

fn init_bare_remote_with_file(dir: &std::path::Path, rel: &str, content: &[u8]) {
    let bare = Repository::init_bare(dir).unwrap();
    let seed_dir = tempdir().unwrap();
    let seed = Repository::clone(dir.to_str().unwrap(), seed_dir.path()).unwrap_or_else(|_| {
        // `clone` of an empty bare repo fails on some libgit2 builds; init directly instead.
        Repository::init(seed_dir.path()).unwrap()
    });
    let file_path = seed_dir.path().join(rel);
    std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
    std::fs::write(&file_path, content).unwrap();

    let mut index = seed.index().unwrap();
    index.add_path(std::path::Path::new(rel)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = seed.find_tree(tree_id).unwrap();
    let sig = Signature::now("test", "test@localhost").unwrap();
    seed.commit(Some("HEAD"), &sig, &sig, "seed", &tree, &[]).unwrap();

    let mut remote = seed.find_remote("origin").or_else(|_| seed.remote("origin", dir.to_str().unwrap())).unwrap();
    remote.push(&["refs/heads/master:refs/heads/master"], None).unwrap();
    let _ = bare;
}

#[test]
fn sync_then_read_tree_sees_seeded_file() {
    let remote_dir = tempdir().unwrap();
    init_bare_remote_with_file(remote_dir.path(), "config/app.json", b"{\"a\":1}");

    let scratch_base = tempdir().unwrap();
    let checkout = scratch_path(scratch_base.path(), "proj", "m1");

    let (workdir, head) = GitWorkdir::sync(&checkout, remote_dir.path().to_str().unwrap(), "master", None).unwrap();
    assert!(!head.is_empty());

    let ignore = compile_ignore(&[]).unwrap();
    let files = workdir.read_tree("/", &ignore).unwrap();
    assert_eq!(files.get("/config/app.json").map(|v| v.as_slice()), Some(b"{\"a\":1}".as_slice()));
}

#[test]
fn read_tree_honors_gitignore_patterns() {
    let remote_dir = tempdir().unwrap();
    init_bare_remote_with_file(remote_dir.path(), "secrets/key.pem", b"shh");

    let scratch_base = tempdir().unwrap();
    let checkout = scratch_path(scratch_base.path(), "proj", "m2");
    let (workdir, _) = GitWorkdir::sync(&checkout, remote_dir.path().to_str().unwrap(), "master", None).unwrap();

    let ignore = compile_ignore(&["secrets/**".to_string()]).unwrap();
    let files = workdir.read_tree("/", &ignore).unwrap();
    assert!(files.is_empty());
}

#[test]
fn commit_and_push_is_a_noop_for_identical_tree() {
    let remote_dir = tempdir().unwrap();
    init_bare_remote_with_file(remote_dir.path(), "a.txt", b"hello");

    let scratch_base = tempdir().unwrap();
    let checkout = scratch_path(scratch_base.path(), "proj", "m3");
    let (workdir, _) = GitWorkdir::sync(&checkout, remote_dir.path().to_str().unwrap(), "master", None).unwrap();

    let mut files = BTreeMap::new();
    files.insert("/a.txt".to_string(), b"hello".to_vec());
    let before = workdir.read_tree("/", &compile_ignore(&[]).unwrap()).unwrap();
    let commit_id = workdir.commit_and_push("/", &files, "master", None, "tester", "no-op").unwrap();
    let after = workdir.read_tree("/", &compile_ignore(&[]).unwrap()).unwrap();
    assert_eq!(before, after);
    assert!(!commit_id.is_empty());
}
