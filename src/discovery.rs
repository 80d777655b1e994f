use crate::config::Config;
use crate::error::DiscoveryError;
use crate::git::HistorySource;
use crate::model::RepositoryRef;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

const GIT_MARKER: &str = ".git";

/// Resolves `root` to the absolute path every repository path is reported under.
pub fn canonical_root(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let canonical = root.canonicalize().map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::NotFound(root.to_path_buf()),
        _ => DiscoveryError::Unreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !canonical.is_dir() {
        return Err(DiscoveryError::NotADirectory(canonical));
    }
    std::fs::read_dir(&canonical).map_err(|source| DiscoveryError::Unreadable {
        path: canonical.clone(),
        source,
    })?;
    Ok(canonical)
}

/// Finds every repository below `root` that survives the config's filters.
pub fn discover(
    root: &Path,
    config: &Config,
    source: &dyn HistorySource,
) -> Result<Vec<RepositoryRef>, DiscoveryError> {
    let repos = find_repositories(root, config)?
        .into_iter()
        .map(|path| {
            let remote_url = source.remote_url(&path);
            RepositoryRef::new(path, remote_url)
        })
        .collect();
    Ok(repos)
}

/// Repository paths below `root`, filtered, sorted and deduplicated.
pub fn find_repositories(root: &Path, config: &Config) -> Result<Vec<PathBuf>, DiscoveryError> {
    let root = canonical_root(root)?;

    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != GIT_MARKER)
        .build();

    let mut repos = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_dir()) {
            continue;
        }
        let path = entry.path();
        if !path.join(GIT_MARKER).exists() {
            continue;
        }
        if is_selected(path, config) {
            tracing::debug!(path = %path.display(), "found repository");
            repos.push(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()));
        } else {
            tracing::debug!(path = %path.display(), "repository filtered out");
        }
    }

    repos.sort();
    repos.dedup();
    Ok(repos)
}

/// Excludes win over includes; no includes means everything not excluded.
pub fn is_selected(path: &Path, config: &Config) -> bool {
    if config.exclude_patterns.iter().any(|p| p.is_match(path)) {
        return false;
    }
    config.include_patterns.is_empty() || config.include_patterns.iter().any(|p| p.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn make_repo(path: &Path) {
        fs::create_dir_all(path.join(".git")).unwrap();
    }

    fn config(include: &[&str], exclude: &[&str], home: &Path) -> Config {
        let file = ConfigFile {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Config::build(file, Some("me@example.com"), Some(home)).unwrap()
    }

    #[test]
    fn finds_nested_repositories_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        make_repo(&root.join("b"));
        make_repo(&root.join("a"));
        make_repo(&root.join("a/vendor/inner"));
        make_repo(&root.join("deep/er/c"));
        fs::create_dir_all(root.join("plain/dir")).unwrap();

        let found = find_repositories(&root, &config(&[], &[], &root)).unwrap();
        assert_eq!(
            found,
            vec![
                root.join("a"),
                root.join("a/vendor/inner"),
                root.join("b"),
                root.join("deep/er/c"),
            ]
        );
    }

    #[test]
    fn does_not_descend_into_git_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        make_repo(&root.join("a"));
        make_repo(&root.join("a/.git/modules/sub"));

        let found = find_repositories(&root, &config(&[], &[], &root)).unwrap();
        assert_eq!(found, vec![root.join("a")]);
    }

    #[test]
    fn gitfile_marks_a_worktree() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("wt")).unwrap();
        fs::write(root.join("wt/.git"), "gitdir: /elsewhere\n").unwrap();

        let found = find_repositories(&root, &config(&[], &[], &root)).unwrap();
        assert_eq!(found, vec![root.join("wt")]);
    }

    #[test]
    fn include_pattern_with_tilde() {
        let dir = tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap();
        make_repo(&home.join("work/a"));
        make_repo(&home.join("personal/b"));

        let found = find_repositories(&home, &config(&["~/work/*"], &[], &home)).unwrap();
        assert_eq!(found, vec![home.join("work/a")]);
    }

    #[cfg(unix)]
    #[test]
    fn include_pattern_through_symlinked_home() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let real_home = base.join("var/home/u");
        make_repo(&real_home.join("work/a"));
        fs::create_dir_all(base.join("home")).unwrap();
        let linked_home = base.join("home/u");
        std::os::unix::fs::symlink(&real_home, &linked_home).unwrap();

        let found =
            find_repositories(&linked_home, &config(&["~/work/*"], &[], &linked_home)).unwrap();
        assert_eq!(found, vec![real_home.join("work/a")]);
    }

    #[test]
    fn exclude_wins_over_include() {
        let dir = tempdir().unwrap();
        let home = dir.path().canonicalize().unwrap();
        make_repo(&home.join("work/a"));
        make_repo(&home.join("work/archived"));

        let found = find_repositories(&home, &config(&["~/work/*"], &["**/archived"], &home)).unwrap();
        assert_eq!(found, vec![home.join("work/a")]);
    }

    #[test]
    fn root_itself_can_be_a_repository() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        make_repo(&root);
        let found = find_repositories(&root, &config(&[], &[], &root)).unwrap();
        assert_eq!(found, vec![root]);
    }

    #[test]
    fn empty_tree_is_not_an_error() {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert!(find_repositories(&root, &config(&[], &[], &root)).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_discovery_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = find_repositories(&missing, &config(&[], &[], dir.path())).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound(_)));
    }

    #[test]
    fn file_root_is_discovery_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = find_repositories(&file, &config(&[], &[], dir.path())).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotADirectory(_)));
    }
}
