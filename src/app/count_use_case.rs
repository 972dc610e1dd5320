use std::sync::Arc;
use tracing::instrument;

use crate::app::ports::{CountFilter, RemoteStorePort};
use crate::error::Result;
use crate::types::Category;

/// Row counts in the remote table, in total or per category
pub struct CountUseCase {
    store: Arc<dyn RemoteStorePort>,
}

impl CountUseCase {
    pub fn new(store: Arc<dyn RemoteStorePort>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn total(&self) -> Result<u64> {
        Ok(self.store.count(None).await?)
    }

    #[instrument(skip(self))]
    pub async fn by_category(&self) -> Result<Vec<(Category, u64)>> {
        let mut counts = Vec::with_capacity(Category::all().len());
        for category in Category::all() {
            let filter = CountFilter::eq("category", category.as_str());
            counts.push((category, self.store.count(Some(&filter)).await?));
        }
        Ok(counts)
    }
}
