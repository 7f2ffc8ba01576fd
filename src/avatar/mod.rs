pub mod roots;
pub mod validate;

pub use roots::AllowedRoots;
pub use validate::{check, validate, ValidatedPath};

use std::path::{Component, Path, PathBuf};

/// Lexically collapses `.`, `..` and repeated separators without touching the
/// filesystem. `..` at the root stays at the root. Relative input yields `None`.
pub(crate) fn normalize(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(_) | Component::RootDir => out.push(comp.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(seg) => out.push(seg),
        }
    }
    Some(out)
}
