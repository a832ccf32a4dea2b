use std::path::{Path, PathBuf};

/// Resolve the project root directory.
///
/// Priority:
/// 1. `--root` flag / `CRONPIPE_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.cronpipe/`
/// 3. Fall back to `cwd`
///
/// The result is absolute: the daemon is spawned with `--root <root>` and a
/// different working directory, so a relative root would resolve elsewhere.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(p) = explicit {
        return if p.is_absolute() {
            p.to_path_buf()
        } else {
            cwd.join(p)
        };
    }

    find_state_dir(&cwd).unwrap_or(cwd)
}

fn find_state_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(cronpipe_core::paths::STATE_DIR).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn relative_explicit_root_is_made_absolute() {
        let result = resolve_root(Some(Path::new("pipeline")));
        assert!(result.is_absolute());
        assert!(result.ends_with("pipeline"));
    }

    #[test]
    fn finds_state_dir_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".cronpipe")).unwrap();
        let subdir = dir.path().join("scripts/deep");
        std::fs::create_dir_all(&subdir).unwrap();

        assert_eq!(find_state_dir(&subdir).as_deref(), Some(dir.path()));
    }

    #[test]
    fn no_state_dir_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(find_state_dir(dir.path()).is_none());
    }
}
