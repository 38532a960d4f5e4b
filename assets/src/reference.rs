use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::AssetError;
use crate::path::AssetPath;

/// A deferred, typed reference to an asset that may not be loaded yet.
///
/// A reference either names an asset path or is null. Resolving it goes
/// through a [`StreamingService`](crate::StreamingService), usually via an
/// [`AssetLoader`](crate::AssetLoader).
pub struct SoftRef<T> {
    path: Option<AssetPath>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SoftRef<T> {
    /// A reference to nothing. Resolves to `None`.
    pub fn null() -> Self {
        Self {
            path: None,
            _marker: PhantomData,
        }
    }

    pub fn new(path: AssetPath) -> Self {
        Self {
            path: Some(path),
            _marker: PhantomData,
        }
    }

    /// Parses and normalizes `path` into a reference.
    pub fn parse(path: &str) -> Result<Self, AssetError> {
        AssetPath::new(path).map(Self::new)
    }

    pub fn is_null(&self) -> bool {
        self.path.is_none()
    }

    pub fn path(&self) -> Option<&AssetPath> {
        self.path.as_ref()
    }
}

impl<T> Default for SoftRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for SoftRef<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for SoftRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<T> Eq for SoftRef<T> {}

impl<T> fmt::Debug for SoftRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "SoftRef<{}>({path})", std::any::type_name::<T>()),
            None => write!(f, "SoftRef<{}>(null)", std::any::type_name::<T>()),
        }
    }
}

/// A loaded asset whose type was checked against the requested one.
pub struct AssetHandle<T> {
    path: AssetPath,
    object: Arc<T>,
}

impl<T> AssetHandle<T> {
    pub(crate) fn new(path: AssetPath, object: Arc<T>) -> Self {
        Self { path, object }
    }

    pub fn path(&self) -> &AssetPath {
        &self.path
    }

    pub fn get(&self) -> &Arc<T> {
        &self.object
    }

    pub fn into_inner(self) -> Arc<T> {
        self.object
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            object: self.object.clone(),
        }
    }
}

impl<T> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T: fmt::Debug> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("path", &self.path)
            .field("object", &self.object)
            .finish()
    }
}
