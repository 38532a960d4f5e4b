use std::fmt;
use std::str::FromStr;

use crate::error::AssetError;

/// Location of an asset inside its package, such as `cars/ferrari`.
///
/// Segments may be separated by `/` or `\`. Empty and `.` segments carry no
/// meaning, so `/cars//./ferrari/` and `cars/ferrari` name the same asset.
/// `..` and segments containing `:` are refused: a reference always stays
/// inside a package root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath(String);

impl AssetPath {
    pub fn new(path: &str) -> Result<Self, AssetError> {
        let refuse = |segment: &str| AssetError::InvalidPath(format!("{path}: `{segment}` not allowed"));
        let segments = path
            .split(['/', '\\'])
            .filter(|segment| !matches!(*segment, "" | "."))
            .map(|segment| match segment {
                ".." => Err(refuse(segment)),
                _ if segment.contains(':') => Err(refuse(segment)),
                _ => Ok(segment),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if segments.is_empty() {
            return Err(AssetError::InvalidPath(format!("{path:?} names no asset")));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First segment: the package the asset lives in.
    pub fn package(&self) -> &str {
        match self.0.find('/') {
            Some(pos) => &self.0[..pos],
            None => &self.0,
        }
    }

    /// Last segment: the asset's own name.
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetPath {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
