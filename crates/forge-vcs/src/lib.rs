//! Minimal append-only object store: blobs, trees, commits, and a `HEAD`
//! pointer.
//!
//! Trees are flat maps of relative path to blob hash. Each commit carries
//! the full tree plus a parent link, so the delta against the parent is
//! recomputable at any time. Objects are content-addressed with SHA-256.

use forge_contract::{CommitSummary, ExportObject};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VcsError {
    #[error("store not initialized")]
    NotInitialized,

    #[error("missing object: {0}")]
    MissingObject(String),

    #[error("object encoding failed: {0}")]
    Encode(String),
}

/// One tree entry: relative path to blob hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub blob: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitObject {
    pub tree: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum GitObject {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit(CommitObject),
}

impl GitObject {
    fn kind(&self) -> &'static str {
        match self {
            Self::Blob(_) => "blob",
            Self::Tree(_) => "tree",
            Self::Commit(_) => "commit",
        }
    }
}

/// Result of one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub hash: String,
    /// Paths whose blob changed (or disappeared) relative to the parent.
    pub changed_paths: Vec<String>,
}

fn hash_bytes(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b" ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(data);
    format!("{:064x}", hasher.finalize())
}

/// The per-session object store.
#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: HashMap<String, GitObject>,
    head: Option<String>,
    initialized: bool,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: a second call leaves existing objects and HEAD alone.
    pub fn init(&mut self) {
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current HEAD commit hash. `None` until the first commit lands.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// The tree at HEAD as a path -> blob-hash map. Empty before the first
    /// commit.
    pub fn head_tree(&self) -> BTreeMap<String, String> {
        let Some(head) = &self.head else {
            return BTreeMap::new();
        };
        self.tree_of(head)
    }

    fn tree_of(&self, commit_hash: &str) -> BTreeMap<String, String> {
        let Some(GitObject::Commit(commit)) = self.objects.get(commit_hash) else {
            return BTreeMap::new();
        };
        let Some(GitObject::Tree(entries)) = self.objects.get(&commit.tree) else {
            return BTreeMap::new();
        };
        entries
            .iter()
            .map(|e| (e.path.clone(), e.blob.clone()))
            .collect()
    }

    /// Write `files` on top of HEAD and advance it.
    ///
    /// Always records a commit, even when nothing changed; an unchanged
    /// commit has an empty delta against its parent.
    pub fn commit(
        &mut self,
        files: &[(String, String)],
        message: &str,
    ) -> Result<CommitOutcome, VcsError> {
        self.commit_with_removals(files, &[], message)
    }

    /// Like [`Self::commit`], additionally dropping `removed` paths from the
    /// tree.
    pub fn commit_with_removals(
        &mut self,
        files: &[(String, String)],
        removed: &[String],
        message: &str,
    ) -> Result<CommitOutcome, VcsError> {
        if !self.initialized {
            return Err(VcsError::NotInitialized);
        }

        let mut tree = self.head_tree();
        for path in removed {
            tree.remove(path);
        }
        for (path, contents) in files {
            let data = contents.as_bytes().to_vec();
            let blob_hash = hash_bytes("blob", &data);
            self.objects
                .entry(blob_hash.clone())
                .or_insert(GitObject::Blob(data));
            tree.insert(path.clone(), blob_hash);
        }

        let entries: Vec<TreeEntry> = tree
            .iter()
            .map(|(path, blob)| TreeEntry {
                path: path.clone(),
                blob: blob.clone(),
            })
            .collect();
        let tree_data =
            serde_json::to_vec(&entries).map_err(|e| VcsError::Encode(e.to_string()))?;
        let tree_hash = hash_bytes("tree", &tree_data);
        self.objects
            .entry(tree_hash.clone())
            .or_insert(GitObject::Tree(entries));

        let commit = CommitObject {
            tree: tree_hash,
            parent: self.head.clone(),
            message: message.to_string(),
        };
        let commit_data =
            serde_json::to_vec(&commit).map_err(|e| VcsError::Encode(e.to_string()))?;
        let commit_hash = hash_bytes("commit", &commit_data);

        let changed_paths = {
            let parent_tree = self
                .head
                .as_deref()
                .map(|h| self.tree_of(h))
                .unwrap_or_default();
            diff_trees(&parent_tree, &tree)
        };

        self.objects
            .insert(commit_hash.clone(), GitObject::Commit(commit));
        self.head = Some(commit_hash.clone());

        Ok(CommitOutcome {
            hash: commit_hash,
            changed_paths,
        })
    }

    /// Blob contents of `path` at HEAD.
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        let blob_hash = self.head_tree().remove(path)?;
        match self.objects.get(&blob_hash) {
            Some(GitObject::Blob(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Commit history starting from HEAD, newest first, bounded by `limit`.
    pub fn log(&self, limit: usize) -> Vec<CommitSummary> {
        let mut out = Vec::new();
        let mut cursor = self.head.clone();
        while let Some(hash) = cursor {
            if out.len() >= limit {
                break;
            }
            let Some(GitObject::Commit(commit)) = self.objects.get(&hash) else {
                break;
            };
            let parent_tree = commit
                .parent
                .as_deref()
                .map(|p| self.tree_of(p))
                .unwrap_or_default();
            out.push(CommitSummary {
                hash: hash.clone(),
                message: commit.message.clone(),
                changed_paths: diff_trees(&parent_tree, &self.tree_of(&hash)),
            });
            cursor = commit.parent.clone();
        }
        out
    }

    /// Total commits reachable from HEAD.
    pub fn commit_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head.clone();
        while let Some(hash) = cursor {
            let Some(GitObject::Commit(commit)) = self.objects.get(&hash) else {
                break;
            };
            count += 1;
            cursor = commit.parent.clone();
        }
        count
    }

    /// Raw object stream for external publishing.
    pub fn export_objects(&self) -> Vec<ExportObject> {
        let mut out: Vec<ExportObject> = self
            .objects
            .iter()
            .map(|(hash, obj)| {
                let data = match obj {
                    GitObject::Blob(data) => data.clone(),
                    GitObject::Tree(entries) => serde_json::to_vec(entries).unwrap_or_default(),
                    GitObject::Commit(commit) => serde_json::to_vec(commit).unwrap_or_default(),
                };
                ExportObject {
                    hash: hash.clone(),
                    kind: obj.kind().to_string(),
                    data,
                }
            })
            .collect();
        out.sort_by(|a, b| a.hash.cmp(&b.hash));
        out
    }
}

fn diff_trees(old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> Vec<String> {
    let mut changed = Vec::new();
    for (path, blob) in new {
        if old.get(path) != Some(blob) {
            changed.push(path.clone());
        }
    }
    for path in old.keys() {
        if !new.contains_key(path) {
            changed.push(path.clone());
        }
    }
    changed.sort();
    changed
}
