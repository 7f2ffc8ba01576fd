use once_cell::sync::OnceCell;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::normalize;

/// Subpath below the per-application data folder where the desktop app caches media.
pub const MEDIA_SUBPATH: [&str; 2] = ["BeeperTexts", "media"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    MacOs,
    Windows,
    Posix,
}

impl OsFamily {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Posix,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RootsError {
    #[error("unable to resolve the home directory")]
    NoHome,
    #[error("home directory is not absolute: {0}")]
    NotAbsolute(String),
}

/// Snapshot of everything the resolver is allowed to look at.
#[derive(Debug, Clone)]
pub struct Environment {
    pub os: OsFamily,
    pub home: Option<PathBuf>,
    pub xdg_data_home: Option<OsString>,
}

impl Environment {
    pub fn from_process() -> Self {
        let os = OsFamily::current();
        Self {
            os,
            home: dirs::home_dir(),
            xdg_data_home: match os {
                OsFamily::Posix => std::env::var_os("XDG_DATA_HOME"),
                _ => None,
            },
        }
    }
}

/// Ordered, non-empty set of directories avatar files may live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoots(Vec<PathBuf>);

static SHARED: OnceCell<Arc<AllowedRoots>> = OnceCell::new();

impl AllowedRoots {
    /// Process-wide roots, resolved on first call and immutable afterwards.
    pub fn shared() -> Result<Arc<AllowedRoots>, RootsError> {
        SHARED
            .get_or_try_init(|| {
                let roots = Self::resolve(&Environment::from_process())?;
                tracing::info!(roots = ?roots.0, "resolved avatar roots");
                Ok(Arc::new(roots))
            })
            .cloned()
    }

    pub fn resolve(env: &Environment) -> Result<Self, RootsError> {
        let home = env.home.as_deref().ok_or(RootsError::NoHome)?;
        if !home.is_absolute() {
            return Err(RootsError::NotAbsolute(home.display().to_string()));
        }

        let mut bases: Vec<PathBuf> = Vec::with_capacity(2);
        match env.os {
            OsFamily::MacOs => bases.push(home.join("Library").join("Application Support")),
            OsFamily::Windows => bases.push(home.join("AppData").join("Roaming")),
            OsFamily::Posix => {
                // XDG says relative values are invalid and must be ignored
                if let Some(xdg) = env.xdg_data_home.as_ref().map(PathBuf::from) {
                    if xdg.is_absolute() {
                        bases.push(xdg);
                    }
                }
                bases.push(home.join(".local").join("share"));
            }
        }

        let mut roots: Vec<PathBuf> = Vec::with_capacity(bases.len());
        for base in bases {
            let Some(root) = media_dir(&base) else { continue };
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        Ok(Self(roots))
    }

    #[cfg(test)]
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self(paths.iter().filter_map(|p| normalize(p)).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

fn media_dir(base: &Path) -> Option<PathBuf> {
    let joined = MEDIA_SUBPATH.iter().fold(base.to_path_buf(), |acc, seg| acc.join(seg));
    normalize(dunce::simplified(&joined))
}
