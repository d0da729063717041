use std::path::{Path, PathBuf};
use uzers::os::unix::UserExt;

/// Expand a leading `~` or `~user` to a home directory.
///
/// Returns `None` when the home directory cannot be determined (no `HOME`, or
/// an unknown user). Paths without a leading tilde are returned unchanged.
///
/// ```
/// use claude_setup::utils::path::expand_tilde;
///
/// let path = expand_tilde("/etc/claude").unwrap();
/// assert_eq!(path.to_str(), Some("/etc/claude"));
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_str()?;

    let Some(after_tilde) = path_str.strip_prefix('~') else {
        return Some(path.to_path_buf());
    };

    if after_tilde.is_empty() || after_tilde.starts_with('/') {
        let home = std::env::var("HOME").ok()?;
        return Some(PathBuf::from(home).join(after_tilde.trim_start_matches('/')));
    }

    let (username, rest) = after_tilde.split_once('/').unwrap_or((after_tilde, ""));
    let user = uzers::get_user_by_name(username)?;
    Some(user.home_dir().join(rest.trim_start_matches('/')))
}

/// [`expand_tilde`], falling back to the path as written.
pub fn expand_or_keep<P: AsRef<Path>>(path: P) -> PathBuf {
    expand_tilde(path.as_ref()).unwrap_or_else(|| path.as_ref().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_expand_tilde_current_user() {
        let home = env::var("HOME").unwrap();

        assert_eq!(expand_tilde("~").unwrap(), PathBuf::from(&home));
        assert_eq!(
            expand_tilde("~/.claude/plugins/registry.json").unwrap(),
            PathBuf::from(format!("{}/.claude/plugins/registry.json", home))
        );
        assert_eq!(
            expand_tilde("~/~file").unwrap(),
            PathBuf::from(format!("{}/~file", home))
        );
    }

    #[test]
    fn test_expand_tilde_other_user() {
        if let Some(path) = expand_tilde("~root/.claude") {
            assert!(path.starts_with("/"));
            assert!(path.ends_with(".claude"));
        }
        assert!(expand_tilde("~nonexistentuser12345/file").is_none());
    }

    #[test]
    fn test_expand_tilde_no_tilde() {
        assert_eq!(
            expand_tilde("/path/~user/file").unwrap(),
            PathBuf::from("/path/~user/file")
        );
        assert_eq!(
            expand_tilde("relative/path").unwrap(),
            PathBuf::from("relative/path")
        );
    }

    #[test]
    #[serial]
    fn test_expand_without_home() {
        let original_home = env::var("HOME").ok();
        env::remove_var("HOME");

        assert!(expand_tilde("~/file").is_none());
        assert_eq!(expand_or_keep("~/file"), PathBuf::from("~/file"));

        if let Some(home) = original_home {
            env::set_var("HOME", home);
        }
    }
}
