use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("configured model {0} does not exist")]
    MissingExplicit(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a classifier model may come from.
pub struct ModelSource<'a> {
    pub name: &'a str,
    pub url: &'a str,
    /// Path set in the settings; when present nothing else is consulted.
    pub explicit: Option<&'a Path>,
    /// Directory shipped next to the binary, checked after the cache.
    pub bundled_dir: Option<&'a Path>,
}

/// Resolves the classifier model once at startup.
///
/// Resolution order:
/// 1. Explicitly configured path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory
/// 4. Download from URL into the cache
pub fn resolve(
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, source, progress)
}

fn resolve_in(
    cache_dir: &Path,
    source: &ModelSource<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = source.explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::MissingExplicit(path.to_path_buf()))
        };
    }

    let cached_path = cache_dir.join(source.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = source.bundled_dir {
        let bundled_path = dir.join(source.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {}", source.name, source.url);
    download(source.url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceCheck/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceCheck/models/` or `~/.cache/FaceCheck/models/`
/// - Windows: `%LOCALAPPDATA%/FaceCheck/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceCheck").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceCheck").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

/// Streams `url` into `dest` through a `.part` file renamed on success.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = stream_to(url, &temp_path, progress).and_then(|()| {
        fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
            path: dest.to_path_buf(),
            source: e,
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn stream_to(
    url: &str,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(temp_path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BAD_URL: &str = "http://invalid.nonexistent.example.com/model";

    fn source<'a>(explicit: Option<&'a Path>, bundled_dir: Option<&'a Path>) -> ModelSource<'a> {
        ModelSource {
            name: "test_model.onnx",
            url: BAD_URL,
            explicit,
            bundled_dir,
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("custom.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved = resolve_in(&tmp.path().join("cache"), &source(Some(&model), None), None);
        assert_eq!(resolved.unwrap(), model);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("absent.onnx");
        let err = resolve_in(tmp.path(), &source(Some(&model), None), None).unwrap_err();
        assert!(matches!(err, ModelResolveError::MissingExplicit(_)));
    }

    #[test]
    fn test_cache_checked_before_bundled() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("test_model.onnx"), b"cached").unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();

        let resolved = resolve_in(&cache, &source(None, Some(&bundled)), None).unwrap();
        assert_eq!(resolved, cache.join("test_model.onnx"));
    }

    #[test]
    fn test_bundled_used_when_cache_empty() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("test_model.onnx"), b"bundled").unwrap();

        let resolved =
            resolve_in(&tmp.path().join("cache"), &source(None, Some(&bundled)), None).unwrap();
        assert_eq!(resolved, bundled.join("test_model.onnx"));
    }

    #[test]
    fn test_model_cache_dir_names_application() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceCheck"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_failed_download_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let err = resolve_in(&cache, &source(None, None), None).unwrap_err();
        assert!(matches!(err, ModelResolveError::Download { .. }));
        assert!(!cache.join("test_model.onnx").exists());
        assert!(!cache.join("test_model.part").exists());
    }
}
