//! Exact brute-force vector index with atomic on-disk persistence.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Default)]
struct Inner {
    dimension: Option<usize>,
    /// Insertion order; search ties are broken by position here.
    points: Vec<VectorPoint>,
    positions: HashMap<String, usize>,
}

impl Inner {
    fn check_dimension(&self, actual: usize) -> Result<(), VectorStoreError> {
        if actual == 0 {
            return Err(VectorStoreError::EmptyVector);
        }
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(VectorStoreError::Dimension { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn insert(&mut self, point: VectorPoint) -> Result<(), VectorStoreError> {
        self.check_dimension(point.vector.len())?;
        self.dimension = Some(point.vector.len());
        if let Some(&pos) = self.positions.get(&point.id) {
            self.points[pos] = point;
        } else {
            self.positions.insert(point.id.clone(), self.points.len());
            self.points.push(point);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    format_version: u32,
    metric: Metric,
    dimension: Option<usize>,
    embedding_model: &'a str,
    entries: &'a [VectorPoint],
}

#[derive(Deserialize)]
struct IndexFile {
    format_version: u32,
    metric: Metric,
    dimension: Option<usize>,
    embedding_model: String,
    entries: Vec<VectorPoint>,
}

fn write_synced(path: &Path, file: &IndexFileRef<'_>) -> Result<(), VectorStoreError> {
    let mut out = fs::File::create(path)?;
    serde_json::to_writer(&mut out, file)?;
    out.flush()?;
    out.sync_all()?;
    Ok(())
}

pub struct FlatIndex {
    metric: Metric,
    embedding_model: String,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatIndex")
            .field("metric", &self.metric)
            .field("embedding_model", &self.embedding_model)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl FlatIndex {
    #[must_use]
    pub fn new(metric: Metric, embedding_model: impl Into<String>) -> Self {
        Self {
            metric,
            embedding_model: embedding_model.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Embedding model the stored vectors were produced with.
    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Load an index previously written by [`FlatIndex::persist`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory or index file is missing, and
    /// `Incompatible` if the file has an unknown format version or vectors that
    /// disagree with the recorded dimension.
    pub fn open(dir: &Path) -> Result<Self, VectorStoreError> {
        if !dir.is_dir() {
            return Err(VectorStoreError::NotFound(dir.to_path_buf()));
        }
        let path = dir.join(INDEX_FILE);
        if !path.is_file() {
            return Err(VectorStoreError::NotFound(path));
        }

        let bytes = fs::read(&path)?;
        let file: IndexFile = serde_json::from_slice(&bytes)?;
        if file.format_version != FORMAT_VERSION {
            return Err(VectorStoreError::Incompatible(format!(
                "format version {} (expected {FORMAT_VERSION})",
                file.format_version
            )));
        }

        let mut inner = Inner {
            dimension: file.dimension,
            ..Inner::default()
        };
        for point in file.entries {
            inner.insert(point).map_err(|e| {
                VectorStoreError::Incompatible(format!("{}: {e}", path.display()))
            })?;
        }

        tracing::info!(
            path = %path.display(),
            entries = inner.points.len(),
            metric = %file.metric,
            model = %file.embedding_model,
            "vector index loaded"
        );

        Ok(Self {
            metric: file.metric,
            embedding_model: file.embedding_model,
            inner: RwLock::new(inner),
        })
    }

    /// Write the index to `dir/index.json`. The data goes to a temporary file
    /// in the same directory which is synced and then renamed over the previous
    /// index, so a concurrent reader sees either the old or the new file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or any write fails.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf, VectorStoreError> {
        fs::create_dir_all(dir)?;
        let target = dir.join(INDEX_FILE);
        let tmp = dir.join(format!(".{INDEX_FILE}.{}.tmp", std::process::id()));

        let inner = self.inner.read().map_err(|_| VectorStoreError::Poisoned)?;
        let file = IndexFileRef {
            format_version: FORMAT_VERSION,
            metric: self.metric,
            dimension: inner.dimension,
            embedding_model: &self.embedding_model,
            entries: &inner.points,
        };

        let written = write_synced(&tmp, &file)
            .and_then(|()| fs::rename(&tmp, &target).map_err(VectorStoreError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        #[cfg(unix)]
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }

        tracing::info!(
            path = %target.display(),
            entries = inner.points.len(),
            "vector index persisted"
        );
        Ok(target)
    }

    fn search_sync(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredVectorPoint>, VectorStoreError> {
        let inner = self.inner.read().map_err(|_| VectorStoreError::Poisoned)?;
        inner.check_dimension(vector.len())?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = inner
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, self.metric.score(vector, &p.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let p = &inner.points[i];
                ScoredVectorPoint {
                    id: p.id.clone(),
                    score,
                    payload: p.payload.clone(),
                }
            })
            .collect())
    }
}

impl VectorStore for FlatIndex {
    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let mut inner = self.inner.write().map_err(|_| VectorStoreError::Poisoned)?;
            // Validate the whole batch first so a bad vector leaves the index untouched.
            let expected = inner.dimension.or(points.first().map(|p| p.vector.len()));
            for p in &points {
                inner.check_dimension(p.vector.len())?;
                if let Some(expected) = expected
                    && p.vector.len() != expected
                {
                    return Err(VectorStoreError::Dimension {
                        expected,
                        actual: p.vector.len(),
                    });
                }
            }
            for p in points {
                inner.insert(p)?;
            }
            Ok(())
        })
    }

    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        Box::pin(async move { self.search_sync(&vector, limit) })
    }

    fn len(&self) -> usize {
        self.inner.read().map_or(0, |i| i.points.len())
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.read().ok().and_then(|i| i.dimension)
    }
}
