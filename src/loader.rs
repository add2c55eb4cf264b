use crate::{PropertyStore, decode::LexError, statics};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::Deserialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

/// Parameters for [`properties`] / [`properties_async`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertiesOptions {
    /// Resource to load. `None` produces an empty store.
    pub url: Option<String>,
    /// Extra request headers, passed through to the loader untouched.
    pub headers: IndexMap<String, String>,
    /// Report unavailable resources as errors instead of returning an empty store.
    pub fail_on_error: bool,
}

impl PropertiesOptions {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    pub url: &'a str,
    pub headers: &'a IndexMap<String, String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("property resource '{url}' is unavailable")]
    ResourceUnavailable { url: String },
    #[error("reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("property resource '{url}' is not valid UTF-8")]
    InvalidUtf8 { url: String },
    #[error("problem parsing property resource '{url}'")]
    Decode {
        url: String,
        #[source]
        source: LexError,
    },
    #[error("loader task failed: {0}")]
    Task(String),
}

/// Fetches raw properties text. `Ok(None)` means the resource does not exist.
pub trait ResourceLoader {
    fn fetch(&self, request: &ResourceRequest<'_>) -> Result<Option<String>, LoadError>;
}

impl<F> ResourceLoader for F
where
    F: Fn(&ResourceRequest<'_>) -> Result<Option<String>, LoadError>,
{
    fn fetch(&self, request: &ResourceRequest<'_>) -> Result<Option<String>, LoadError> {
        self(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFormat {
    Plain,
    Gzip,
}

/// Loads resources from the local filesystem; `url` is a path, relative to `base_dir` if set.
/// Request headers are ignored.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_dir: Option<PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(url),
            None => PathBuf::from(url),
        }
    }
}

impl ResourceLoader for FileLoader {
    fn fetch(&self, request: &ResourceRequest<'_>) -> Result<Option<String>, LoadError> {
        let path = self.resolve(request.url);
        match read_text_file(&path) {
            Ok(text) => Ok(Some(text)),
            Err(LoadError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "property file not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Create a store from `options`, fetching synchronously through `loader`.
pub fn properties<L>(options: &PropertiesOptions, loader: &L) -> Result<PropertyStore, LoadError>
where
    L: ResourceLoader + ?Sized,
{
    let Some(url) = options.url.as_deref() else {
        return Ok(PropertyStore::new());
    };
    let fetched = loader.fetch(&ResourceRequest {
        url,
        headers: &options.headers,
    });
    resolve(options, url, fetched)
}

/// Like [`properties`], but the fetch runs on tokio's blocking pool.
/// The text is decoded only once it has been fetched completely.
pub async fn properties_async<L>(
    options: PropertiesOptions,
    loader: Arc<L>,
) -> Result<PropertyStore, LoadError>
where
    L: ResourceLoader + Send + Sync + 'static,
{
    let Some(url) = options.url.clone() else {
        return Ok(PropertyStore::new());
    };

    let task_url = url.clone();
    let headers = options.headers.clone();
    let fetched = tokio::task::spawn_blocking(move || {
        loader.fetch(&ResourceRequest {
            url: &task_url,
            headers: &headers,
        })
    })
    .await
    .map_err(|e| LoadError::Task(e.to_string()))?;

    resolve(&options, &url, fetched)
}

fn resolve(
    options: &PropertiesOptions,
    url: &str,
    fetched: Result<Option<String>, LoadError>,
) -> Result<PropertyStore, LoadError> {
    let text = match fetched {
        Ok(Some(text)) => text,
        Ok(None) => {
            return unavailable(
                options,
                LoadError::ResourceUnavailable {
                    url: url.to_string(),
                },
            );
        }
        Err(err) => return unavailable(options, err),
    };

    let store = PropertyStore::parse(&text).map_err(|source| LoadError::Decode {
        url: url.to_string(),
        source,
    })?;
    tracing::debug!(url, entries = store.len(), "loaded properties");
    Ok(store)
}

fn unavailable(options: &PropertiesOptions, err: LoadError) -> Result<PropertyStore, LoadError> {
    if options.fail_on_error {
        return Err(err);
    }
    tracing::warn!(error = %err, "property resource unavailable, using empty store");
    Ok(PropertyStore::new())
}

/// Read a file as text, gunzipping it first when it looks compressed.
pub(crate) fn read_text_file(path: &Path) -> Result<String, LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let bytes = fs::read(path).map_err(io_err)?;
    let bytes = match detect_format(path, &bytes) {
        ResourceFormat::Plain => bytes,
        ResourceFormat::Gzip => {
            let mut decoder = GzDecoder::new(&bytes[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(io_err)?;
            out
        }
    };

    let text = String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 {
        url: path.display().to_string(),
    })?;
    Ok(match text.strip_prefix(statics::UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn detect_format(path: &Path, bytes: &[u8]) -> ResourceFormat {
    if path.extension().and_then(|e| e.to_str()) == Some(statics::GZIP_EXTENSION) {
        return ResourceFormat::Gzip;
    }
    if bytes.starts_with(&statics::GZIP_MAGIC) {
        return ResourceFormat::Gzip;
    }
    ResourceFormat::Plain
}
