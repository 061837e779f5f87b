use crate::error::{DriverError, DriverResult};
use std::path::Path;

/// Maps an image reference to a local root path a role's entrypoint runs
/// from. Plain (non-async) trait: resolving a local directory is a stat
/// syscall, not I/O worth yielding over.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, image: &str) -> DriverResult<String>;
}

/// Treats the image reference as an absolute path to an existing
/// directory and returns it unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDirectoryImageFetcher;

impl ImageFetcher for LocalDirectoryImageFetcher {
    fn fetch(&self, image: &str) -> DriverResult<String> {
        let path = Path::new(image);
        if !path.is_absolute() {
            return Err(DriverError::ValueError(format!(
                "image `{image}` must be an absolute path"
            )));
        }
        if !path.is_dir() {
            return Err(DriverError::ValueError(format!(
                "image `{image}` does not exist as a directory"
            )));
        }
        Ok(image.to_string())
    }
}
