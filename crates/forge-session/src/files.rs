//! Generated-file management (C3).
//!
//! Writes are linearized: the VCS commit lands before the file map update,
//! so no snapshot ever shows a path the store has no commit for.

use crate::state::StateStore;
use forge_contract::{FileRecord, SessionError};
use forge_vcs::ObjectStore;
use std::sync::{Arc, Mutex};

pub struct FileManager {
    state: Arc<StateStore>,
    vcs: Arc<Mutex<ObjectStore>>,
}

impl FileManager {
    pub fn new(state: Arc<StateStore>, vcs: Arc<Mutex<ObjectStore>>) -> Self {
        Self { state, vcs }
    }

    /// Persist one generated file and commit it.
    pub fn save_file(
        &self,
        file: FileRecord,
        commit_message: &str,
    ) -> Result<FileRecord, SessionError> {
        self.save_files(vec![file.clone()], commit_message)?;
        let persisted = self
            .state
            .read(|s| s.base.generated_files.get(&file.file_path).cloned());
        persisted.ok_or_else(|| SessionError::Internal("saved file missing from map".into()))
    }

    /// Persist a batch of files as one commit, then update the map.
    ///
    /// A commit failure leaves the map untouched.
    pub fn save_files(
        &self,
        mut files: Vec<FileRecord>,
        commit_message: &str,
    ) -> Result<(), SessionError> {
        if files.is_empty() {
            return Ok(());
        }

        for file in &mut files {
            let previous = self
                .state
                .read(|s| s.base.generated_files.get(&file.file_path).cloned());
            file.last_diff = match previous {
                Some(prev) => line_diff(&prev.file_contents, &file.file_contents),
                None => line_diff("", &file.file_contents),
            };
        }

        let pairs: Vec<(String, String)> = files
            .iter()
            .map(|f| (f.file_path.clone(), f.file_contents.clone()))
            .collect();
        self.vcs
            .lock()
            .expect("vcs lock poisoned")
            .commit(&pairs, commit_message)
            .map_err(|e| SessionError::Vcs(e.to_string()))?;

        self.state.update(|s| {
            for file in files {
                s.base
                    .generated_files
                    .insert(file.file_path.clone(), file);
            }
        });
        Ok(())
    }

    pub fn get_file(&self, path: &str) -> Option<FileRecord> {
        self.state
            .read(|s| s.base.generated_files.get(path).cloned())
    }

    pub fn get_files(&self) -> Vec<FileRecord> {
        self.state
            .read(|s| s.base.generated_files.values().cloned().collect())
    }

    /// Drop paths from the map and record the removal commit.
    pub fn delete_files(&self, paths: &[String]) -> Result<(), SessionError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.vcs
            .lock()
            .expect("vcs lock poisoned")
            .commit_with_removals(&[], paths, "remove files")
            .map_err(|e| SessionError::Vcs(e.to_string()))?;
        self.state.update(|s| {
            for path in paths {
                s.base.generated_files.remove(path);
            }
        });
        Ok(())
    }
}

/// Minimal line diff: removed lines prefixed `-`, added lines prefixed `+`,
/// with the common prefix and suffix trimmed.
fn line_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let mut start = 0;
    while start < old_lines.len()
        && start < new_lines.len()
        && old_lines[start] == new_lines[start]
    {
        start += 1;
    }
    let mut old_end = old_lines.len();
    let mut new_end = new_lines.len();
    while old_end > start && new_end > start && old_lines[old_end - 1] == new_lines[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }

    let mut out = String::new();
    for line in &old_lines[start..old_end] {
        out.push('-');
        out.push_str(line);
        out.push('\n');
    }
    for line in &new_lines[start..new_end] {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_contract::{ProjectType, SessionState};

    fn setup() -> (Arc<StateStore>, Arc<Mutex<ObjectStore>>, FileManager) {
        let state = Arc::new(StateStore::new(SessionState::initial(ProjectType::App)));
        let mut store = ObjectStore::new();
        store.init();
        let vcs = Arc::new(Mutex::new(store));
        let manager = FileManager::new(state.clone(), vcs.clone());
        (state, vcs, manager)
    }

    #[test]
    fn save_files_updates_map_and_commits() {
        let (state, vcs, manager) = setup();
        manager
            .save_files(
                vec![FileRecord::new("src/main.tsx", "render()")],
                "add entry",
            )
            .unwrap();

        assert!(state.read(|s| s.base.generated_files.contains_key("src/main.tsx")));
        let vcs = vcs.lock().unwrap();
        assert_eq!(vcs.commit_count(), 1);
        assert!(vcs.head_tree().contains_key("src/main.tsx"));
    }

    #[test]
    fn map_and_head_tree_stay_in_sync() {
        let (state, vcs, manager) = setup();
        manager
            .save_files(
                vec![
                    FileRecord::new("a.ts", "1"),
                    FileRecord::new("b.ts", "2"),
                ],
                "two files",
            )
            .unwrap();
        manager.delete_files(&["a.ts".to_string()]).unwrap();

        let map_paths: Vec<String> =
            state.read(|s| s.base.generated_files.keys().cloned().collect());
        let tree_paths: Vec<String> = vcs.lock().unwrap().head_tree().keys().cloned().collect();
        assert_eq!(map_paths, tree_paths);
    }

    #[test]
    fn idempotent_save_produces_two_commits_second_with_empty_delta() {
        let (_, vcs, manager) = setup();
        let file = FileRecord::new("a.ts", "x");
        manager.save_files(vec![file.clone()], "c1").unwrap();
        manager.save_files(vec![file], "c1").unwrap();

        let vcs = vcs.lock().unwrap();
        assert_eq!(vcs.commit_count(), 2);
        let log = vcs.log(2);
        assert!(log[0].changed_paths.is_empty());
        assert_eq!(log[1].changed_paths, vec!["a.ts"]);
    }

    #[test]
    fn commit_failure_leaves_map_untouched() {
        let state = Arc::new(StateStore::new(SessionState::initial(ProjectType::App)));
        // Uninitialized store: commits are rejected.
        let vcs = Arc::new(Mutex::new(ObjectStore::new()));
        let manager = FileManager::new(state.clone(), vcs);

        let err = manager
            .save_files(vec![FileRecord::new("a.ts", "x")], "c1")
            .unwrap_err();
        assert!(matches!(err, SessionError::Vcs(_)));
        assert!(state.read(|s| s.base.generated_files.is_empty()));
    }

    #[test]
    fn last_diff_records_changed_lines() {
        let (state, _, manager) = setup();
        manager
            .save_files(vec![FileRecord::new("a.ts", "one\ntwo\n")], "c1")
            .unwrap();
        manager
            .save_files(vec![FileRecord::new("a.ts", "one\nthree\n")], "c2")
            .unwrap();

        let diff = state.read(|s| s.base.generated_files["a.ts"].last_diff.clone());
        assert!(diff.contains("-two"));
        assert!(diff.contains("+three"));
        assert!(!diff.contains("one"));
    }

    #[test]
    fn save_file_returns_persisted_record() {
        let (_, _, manager) = setup();
        let saved = manager
            .save_file(
                FileRecord::new("a.ts", "x").with_purpose("entry"),
                "c1",
            )
            .unwrap();
        assert_eq!(saved.file_purpose, "entry");
        assert!(saved.last_diff.contains("+x"));
    }

    #[test]
    fn get_and_delete_round_trip() {
        let (_, _, manager) = setup();
        manager
            .save_files(vec![FileRecord::new("a.ts", "x")], "c1")
            .unwrap();
        assert!(manager.get_file("a.ts").is_some());
        assert_eq!(manager.get_files().len(), 1);

        manager.delete_files(&["a.ts".to_string()]).unwrap();
        assert!(manager.get_file("a.ts").is_none());
    }
}
