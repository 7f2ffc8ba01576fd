//! Trust boundary for avatar references coming from API payloads.
//!
//! A reference is accepted only when it is a `file://` URI whose decoded,
//! normalized path sits inside one of the [`AllowedRoots`]. Everything else is
//! rejected; [`validate`] collapses the reason away, [`check`] keeps it.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use super::{normalize, AllowedRoots};

pub const FILE_SCHEME: &str = "file://";

// Characters that must not appear raw in the path part of a file URI.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("reference is not a file:// uri")]
    Scheme,
    #[error("malformed percent-escape at offset {0}")]
    MalformedEscape(usize),
    #[error("decoded path is not valid utf-8")]
    InvalidUtf8,
    #[error("path contains a nul byte")]
    Nul,
    #[error("path is not absolute")]
    NotAbsolute,
    #[error("parent segment survived normalization")]
    Traversal,
    #[error("path is outside every allowed root")]
    OutsideRoots,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Scheme => "Scheme",
            Rejection::MalformedEscape(_) => "MalformedEscape",
            Rejection::InvalidUtf8 => "InvalidUtf8",
            Rejection::Nul => "Nul",
            Rejection::NotAbsolute => "NotAbsolute",
            Rejection::Traversal => "Traversal",
            Rejection::OutsideRoots => "OutsideRoots",
        }
    }
}

/// Absolute, normalized path inside an allowed root. Only [`check`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath(PathBuf);

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Re-wraps the path as a percent-encoded `file://` URI.
    pub fn to_file_uri(&self) -> String {
        let raw = self.0.to_string_lossy();
        if cfg!(windows) {
            let slashed = raw.replace('\\', "/");
            format!("{FILE_SCHEME}/{}", utf8_percent_encode(&slashed, PATH_ESCAPES))
        } else {
            format!("{FILE_SCHEME}{}", utf8_percent_encode(&raw, PATH_ESCAPES))
        }
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_path().display())
    }
}

impl Serialize for ValidatedPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.display())
    }
}

/// Public boundary: `Some` only for a path that is safe to open directly.
pub fn validate(reference: &str, roots: &AllowedRoots) -> Option<ValidatedPath> {
    match check(reference, roots) {
        Ok(path) => Some(path),
        Err(reason) => {
            tracing::debug!(code = reason.code(), %reason, "avatar reference rejected");
            None
        }
    }
}

pub fn check(reference: &str, roots: &AllowedRoots) -> Result<ValidatedPath, Rejection> {
    let rest = reference.strip_prefix(FILE_SCHEME).ok_or(Rejection::Scheme)?;
    let decoded = decode(rest)?;
    if decoded.contains('\0') {
        return Err(Rejection::Nul);
    }

    let canonical = normalize(Path::new(host_path(&decoded))).ok_or(Rejection::NotAbsolute)?;

    if canonical.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Rejection::Nul);
    }
    if canonical.components().any(|c| c == Component::ParentDir) {
        return Err(Rejection::Traversal);
    }

    // component-wise: `<root>-evil` is not under `<root>`
    if roots.iter().any(|root| canonical.starts_with(root)) {
        Ok(ValidatedPath(canonical))
    } else {
        Err(Rejection::OutsideRoots)
    }
}

fn decode(raw: &str) -> Result<String, Rejection> {
    let bytes = raw.as_bytes();
    let mut from = 0;
    while let Some(off) = bytes[from..].iter().position(|&b| b == b'%') {
        let at = from + off;
        let well_formed = bytes
            .get(at + 1..at + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(Rejection::MalformedEscape(at));
        }
        from = at + 3;
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Rejection::InvalidUtf8)
}

#[cfg(windows)]
fn host_path(decoded: &str) -> &str {
    // file:///C:/x decodes to /C:/x
    let b = decoded.as_bytes();
    if b.len() >= 3 && b[0] == b'/' && b[1].is_ascii_alphabetic() && b[2] == b':' {
        &decoded[1..]
    } else {
        decoded
    }
}

#[cfg(not(windows))]
fn host_path(decoded: &str) -> &str {
    decoded
}
