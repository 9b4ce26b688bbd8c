use std::path::{Path, PathBuf};

use orc_core::OrchestratorError;

/// Convert a host-absolute path into its container-local equivalent: strip
/// `host_prefix` and prepend `container_mount`. Refuses any path not rooted
/// under the given prefix — the container executor's only defense against a
/// worker writing outside its workspace mount (section 4.3).
pub fn host_to_container_path(
    host_prefix: &Path,
    container_mount: &Path,
    path: &Path,
) -> Result<PathBuf, OrchestratorError> {
    let relative = path
        .strip_prefix(host_prefix)
        .map_err(|_| OrchestratorError::PathNotRooted {
            path: path.display().to_string(),
        })?;
    Ok(container_mount.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_reroots() {
        let out = host_to_container_path(
            Path::new("/data/course"),
            Path::new("/source"),
            Path::new("/data/course/week1/intro.ipynb"),
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/source/week1/intro.ipynb"));
    }

    #[test]
    fn refuses_path_outside_prefix() {
        let err = host_to_container_path(
            Path::new("/data/course"),
            Path::new("/source"),
            Path::new("/etc/passwd"),
        )
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::PathNotRooted { .. }));
    }
}
