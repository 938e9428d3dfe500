//! Read-only adapter over a LanceDB table produced by the offline pipeline.
//!
//! The table must carry a Utf8 `id` column (matching `ChunkStore` ids) and a
//! fixed-size float `vector` column.

use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, DistanceType, Table};

use citerag_core::traits::VectorIndex;
use citerag_core::types::VectorHit;

pub struct LanceVectorIndex {
	table: Table,
	rows: usize,
}

impl LanceVectorIndex {
	pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
		let db = connect(uri).execute().await?;
		let table = db.open_table(table_name).execute().await?;
		let rows = table.count_rows(None).await?;
		tracing::info!(uri, table = table_name, rows, "opened LanceDB vector table");
		Ok(Self { table, rows })
	}
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	fn len(&self) -> usize { self.rows }

	async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<VectorHit>> {
		if k == 0 || self.rows == 0 { return Ok(Vec::new()); }
		let mut stream = self.table.vector_search(query_vec.to_vec())?.distance_type(DistanceType::Cosine).limit(k).execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("lance result is missing a Utf8 'id' column"))?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("lance result is missing '_distance'"))?;
			for i in 0..batch.num_rows() {
				hits.push(VectorHit { chunk_id: ids.value(i).to_string(), distance: distances.value(i) });
			}
		}
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(k);
		Ok(hits)
	}
}
