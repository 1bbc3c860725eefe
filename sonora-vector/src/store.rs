//! Qdrant-backed implementation of the C4 vector store contract.

use qdrant_client::qdrant::value::Kind as QdrantKind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType,
    Filter, HnswConfigDiffBuilder, PointStruct, QuantizationConfigBuilder,
    ScalarQuantizationBuilder, ScalarType, SearchParamsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use sonora_common::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::payload::{ChunkPayload, EmbeddingPoint, QueryFilter, ScoredPoint};

/// Collection-creation parameters, matching spec §4.3's `ensure_collection`
/// signature and §6's schema defaults.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub name: String,
    pub dim: u64,
    pub hnsw_m: u64,
    pub hnsw_ef_construct: u64,
    pub quantization_quantile: f32,
    pub payload_indexes: Vec<&'static str>,
}

impl CollectionSchema {
    pub fn for_collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dim: 512,
            hnsw_m: 16,
            hnsw_ef_construct: 200,
            quantization_quantile: 0.99,
            payload_indexes: vec!["track_id", "genre"],
        }
    }
}

/// Wraps a `qdrant-client` connection to a single collection.
pub struct VectorStore {
    client: Qdrant,
    collection: String,
}

impl VectorStore {
    /// Connects to Qdrant at `url` (e.g. `http://127.0.0.1:6334`).
    pub async fn connect(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::VectorStoreUnavailable(format!("failed to build qdrant client: {e}")))?;

        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    /// Verifies the store is reachable, per spec §4.9's startup sequence.
    pub async fn verify_reachable(&self) -> Result<()> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| Error::VectorStoreUnavailable(format!("health check failed: {e}")))
    }

    /// Idempotently creates the collection with the spec §4.3/§6 schema:
    /// 512 dims, cosine distance, HNSW m=16/ef_construct=200, scalar int8
    /// quantization (quantile 0.99, always-in-RAM), keyword payload
    /// indexes on `track_id` and `genre`.
    pub async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&schema.name)
            .await
            .map_err(|e| Error::VectorStoreUnavailable(format!("collection_exists failed: {e}")))?;

        if exists {
            debug!(collection = %schema.name, "vector collection already exists");
            return Ok(());
        }

        info!(collection = %schema.name, dim = schema.dim, "creating vector collection");

        let create = CreateCollectionBuilder::new(&schema.name)
            .vectors_config(VectorParamsBuilder::new(schema.dim, Distance::Cosine))
            .hnsw_config(
                HnswConfigDiffBuilder::default()
                    .m(schema.hnsw_m)
                    .ef_construct(schema.hnsw_ef_construct),
            )
            .quantization_config(QuantizationConfigBuilder::new(
                ScalarQuantizationBuilder::default()
                    .r#type(ScalarType::Int8.into())
                    .quantile(schema.quantization_quantile)
                    .always_ram(true),
            ));

        self.client
            .create_collection(create)
            .await
            .map_err(|e| Error::VectorStoreUnavailable(format!("create_collection failed: {e}")))?;

        for field in &schema.payload_indexes {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &schema.name,
                    *field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| {
                    Error::VectorStoreUnavailable(format!("create_field_index({field}) failed: {e}"))
                })?;
        }

        Ok(())
    }

    /// Upserts a batch of chunk embeddings (spec §4.3's `upsert` contract).
    pub async fn upsert(&self, points: Vec<EmbeddingPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let qdrant_points = points
            .into_iter()
            .map(|p| {
                let payload_json = serde_json::to_value(&p.payload)
                    .expect("ChunkPayload always serializes");
                let payload = json_to_payload_map(&payload_json);
                PointStruct::new(p.id.to_string(), p.vector, payload)
            })
            .collect::<Vec<_>>();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, qdrant_points))
            .await
            .map_err(|e| Error::VectorStoreUnavailable(format!("upsert_points failed: {e}")))?;

        Ok(())
    }

    /// Queries the collection for the `limit` nearest points to `vector`
    /// (spec §4.3/§4.7), with search-time `ef` and an optional filter.
    pub async fn query(
        &self,
        vector: &[f32],
        limit: u64,
        ef: u64,
        filter: QueryFilter,
    ) -> Result<Vec<ScoredPoint>> {
        let mut search = SearchPointsBuilder::new(&self.collection, vector.to_vec(), limit)
            .with_payload(true)
            .params(SearchParamsBuilder::default().hnsw_ef(ef));

        let qdrant_filter = build_filter(&filter);
        if let Some(qdrant_filter) = qdrant_filter {
            search = search.filter(qdrant_filter);
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| Error::VectorStoreUnavailable(format!("search_points failed: {e}")))?;

        response
            .result
            .into_iter()
            .map(|point| {
                let id = point_id_to_uuid(&point)?;
                let payload = payload_map_to_chunk(&point.payload)?;
                Ok(ScoredPoint {
                    id,
                    score: point.score,
                    payload,
                })
            })
            .collect()
    }
}

fn build_filter(filter: &QueryFilter) -> Option<Filter> {
    let mut must = Vec::new();
    let mut must_not = Vec::new();

    if let Some(genre) = &filter.genre {
        must.push(Condition::matches("genre", genre.clone()));
    }
    if let Some(exclude) = &filter.exclude_track_id {
        must_not.push(Condition::matches("track_id", exclude.to_string()));
    }

    if must.is_empty() && must_not.is_empty() {
        return None;
    }

    Some(Filter {
        must,
        must_not,
        ..Default::default()
    })
}

fn json_to_payload_map(value: &serde_json::Value) -> HashMap<String, QdrantValue> {
    let serde_json::Value::Object(map) = value else {
        return HashMap::new();
    };
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
        .collect()
}

fn json_to_qdrant_value(value: &serde_json::Value) -> QdrantValue {
    let kind = match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(QdrantKind::BoolValue(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantKind::IntegerValue(i))
            } else {
                Some(QdrantKind::DoubleValue(n.as_f64().unwrap_or(0.0)))
            }
        }
        serde_json::Value::String(s) => Some(QdrantKind::StringValue(s.clone())),
        _ => None,
    };
    QdrantValue { kind }
}

fn point_id_to_uuid(point: &qdrant_client::qdrant::ScoredPoint) -> Result<Uuid> {
    let id = point
        .id
        .as_ref()
        .ok_or_else(|| Error::Internal("vector store returned a point with no id".to_string()))?;
    let text = match &id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s.clone(),
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => return Err(Error::Internal("vector store point id is empty".to_string())),
    };
    Uuid::parse_str(&text)
        .map_err(|e| Error::Internal(format!("vector store returned a non-UUID point id: {e}")))
}

fn payload_map_to_chunk(payload: &HashMap<String, QdrantValue>) -> Result<ChunkPayload> {
    let mut map = serde_json::Map::new();
    for (k, v) in payload {
        map.insert(k.clone(), qdrant_value_to_json(v));
    }
    serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| Error::Internal(format!("malformed chunk payload: {e}")))
}

fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        Some(QdrantKind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(QdrantKind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(QdrantKind::DoubleValue(d)) => {
            serde_json::Number::from_f64(*d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
        }
        Some(QdrantKind::StringValue(s)) => serde_json::Value::String(s.clone()),
        _ => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_produces_no_qdrant_filter() {
        assert!(build_filter(&QueryFilter::default()).is_none());
    }

    #[test]
    fn exclude_track_id_becomes_must_not() {
        let id = Uuid::new_v4();
        let filter = build_filter(&QueryFilter {
            exclude_track_id: Some(id),
            genre: None,
        })
        .unwrap();
        assert_eq!(filter.must_not.len(), 1);
        assert!(filter.must.is_empty());
    }

    #[test]
    fn genre_becomes_must() {
        let filter = build_filter(&QueryFilter {
            exclude_track_id: None,
            genre: Some("ambient".to_string()),
        })
        .unwrap();
        assert_eq!(filter.must.len(), 1);
        assert!(filter.must_not.is_empty());
    }

    #[test]
    fn chunk_payload_round_trips_through_json_conversion() {
        let payload = ChunkPayload {
            track_id: Uuid::new_v4(),
            offset_sec: 10.0,
            chunk_index: 2,
            duration_sec: 10.0,
            artist: Some("Test Artist".to_string()),
            title: None,
            genre: Some("jazz".to_string()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        let map = json_to_payload_map(&json);
        let roundtripped = payload_map_to_chunk(&map).unwrap();
        assert_eq!(roundtripped.track_id, payload.track_id);
        assert_eq!(roundtripped.chunk_index, payload.chunk_index);
        assert_eq!(roundtripped.artist, payload.artist);
        assert_eq!(roundtripped.title, payload.title);
    }
}
