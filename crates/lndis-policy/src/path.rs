// path.rs — Lexical path validation.
//
// Every function here is pure: nothing touches the filesystem. Traversal is
// detected on the raw string before any resolution, so `../` tricks are caught
// even for paths that do not exist yet. Resolution is lexical normalization
// (`.` dropped, `~` expanded, relative paths joined onto the workspace root).
//
// Symlinks are not followed. A tool that writes through a symlink inside the
// workspace can still escape it; OS-level confinement is out of scope.

use std::path::{Component, Path, PathBuf};

/// System directories that are never a legal target, on any rule.
#[cfg(windows)]
const PROTECTED_DIRS: &[&str] = &[
    r"C:\Windows",
    r"C:\Program Files",
    r"C:\Program Files (x86)",
    r"C:\ProgramData",
];

#[cfg(target_os = "macos")]
const PROTECTED_DIRS: &[&str] = &[
    "/System",
    "/Library",
    "/Applications",
    "/bin",
    "/sbin",
    "/usr",
    "/etc",
    "/dev",
    "/private/etc",
    "/private/var/db",
];

#[cfg(all(unix, not(target_os = "macos")))]
const PROTECTED_DIRS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib32", "/lib64", "/proc", "/sbin", "/snap",
    "/sys", "/usr", "/var/lib", "/var/log",
];

#[cfg(not(any(unix, windows)))]
const PROTECTED_DIRS: &[&str] = &[];

/// Credential stores under the operator's home directory.
const PROTECTED_HOME_DIRS: &[&str] = &[".ssh", ".gnupg", ".aws", ".kube"];

/// The compiled-in protected set for the current platform.
///
/// Rule documents may extend this list but can never shrink it.
pub fn builtin_protected_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = PROTECTED_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = dirs::home_dir() {
        dirs.extend(PROTECTED_HOME_DIRS.iter().map(|d| normalize(&home.join(d))));
    }
    dirs
}

/// Whether a raw path argument contains a parent-directory token.
///
/// Percent-encoded dots and separators are decoded first so `..%2f` and
/// `%2e%2e/` are caught as well.
pub fn has_traversal(raw: &str) -> bool {
    let decoded = raw
        .to_ascii_lowercase()
        .replace("%2e", ".")
        .replace("%2f", "/")
        .replace("%5c", "\\");
    decoded.split(['/', '\\']).any(|segment| segment == "..")
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(raw);
    };
    if raw == "~" {
        return home;
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into its
/// parent. Never consults the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Resolve a raw path argument to an absolute, normalized path.
///
/// Relative paths are taken to be relative to the workspace root.
pub fn resolve(raw: &str, workspace_root: &Path) -> PathBuf {
    let expanded = expand_home(raw);
    if expanded.is_absolute() {
        normalize(&expanded)
    } else {
        normalize(&workspace_root.join(expanded))
    }
}

/// Component-aware containment: `/etc/passwd` is within `/etc`, `/etcetera` is not.
pub fn is_within(path: &Path, root: &Path) -> bool {
    if cfg!(windows) {
        let path = path.to_string_lossy().to_lowercase();
        let root = root.to_string_lossy().to_lowercase();
        return Path::new(&path).starts_with(Path::new(&root));
    }
    path.starts_with(root)
}

/// Return the first protected directory containing `path`, if any.
pub fn protected_match<'a>(path: &Path, protected: &'a [PathBuf]) -> Option<&'a Path> {
    protected
        .iter()
        .find(|dir| is_within(path, dir))
        .map(PathBuf::as_path)
}

/// Whether the path's extension is in the (lowercase, dot-prefixed) block list.
pub fn has_blocked_extension(path: &Path, blocked: &[String]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
    blocked.iter().any(|b| *b == ext)
}
