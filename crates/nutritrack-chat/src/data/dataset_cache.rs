/*
 * Copyright 2026 sukawasatoru
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::data::openai::FileDataSource;
use crate::error::DatasetFetchError;
use crate::model::{DATASET_CHAR_LIMIT, truncate_chars};
use nutritrack::prelude::*;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Eq, PartialEq)]
pub struct CachedDataset {
    pub source_id: String,
    pub snippet: Arc<str>,
}

pub trait GetDatasetCache {
    fn get_dataset_cache(&self) -> &DatasetCache;
}

/// Single-slot cache of the reference dataset.
///
/// The lock is never held across the fetch, so concurrent misses for the same file may fetch
/// twice and the last completed fetch wins.
#[derive(Debug, Default)]
pub struct DatasetCache {
    slot: RwLock<Option<Arc<CachedDataset>>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Snippet of `source_id`, fetched on first use. Fetch failures are logged and yield `None`
    /// without touching the cached entry.
    #[tracing::instrument(skip(self, data_source, api_key))]
    pub async fn resolve<S>(
        &self,
        data_source: &S,
        api_key: &str,
        source_id: Option<&str>,
    ) -> Option<Arc<str>>
    where
        S: FileDataSource + ?Sized,
    {
        let source_id = source_id?;

        if let Some(snippet) = self.lookup(source_id) {
            debug!("hit");
            return Some(snippet);
        }

        match fetch_snippet(data_source, api_key, source_id).await {
            Ok(snippet) => {
                info!(len = snippet.chars().count(), "loaded dataset");
                self.replace(CachedDataset {
                    source_id: source_id.to_owned(),
                    snippet: snippet.clone(),
                });
                Some(snippet)
            }
            Err(e) => {
                warn!(?e, "failed to load dataset");
                None
            }
        }
    }

    pub fn current(&self) -> Option<Arc<CachedDataset>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, source_id: &str) -> Option<Arc<str>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|data| data.source_id == source_id)
            .map(|data| data.snippet.clone())
    }

    fn replace(&self, dataset: CachedDataset) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(dataset));
    }
}

async fn fetch_snippet<S>(
    data_source: &S,
    api_key: &str,
    source_id: &str,
) -> Result<Arc<str>, DatasetFetchError>
where
    S: FileDataSource + ?Sized,
{
    let content = data_source
        .retrieve_file_content(api_key, source_id)
        .await?;
    let text = String::from_utf8(content)?;
    Ok(Arc::from(truncate_chars(&text, DATASET_CHAR_LIMIT)))
}
