use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const NAMESPACE_COL: &str = "namespace";
pub const ID_COL: &str = "id";
pub const METADATA_COL: &str = "metadata";
pub const VECTOR_COL: &str = "vector";

/// Layout of one index table. `metadata` holds the record's JSON object.
pub fn build_index_schema(dimension: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(NAMESPACE_COL, DataType::Utf8, false),
		Field::new(ID_COL, DataType::Utf8, false),
		Field::new(METADATA_COL, DataType::Utf8, false),
		Field::new(VECTOR_COL, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32), true),
	]))
}

// Simple key/value meta table for per-index settings
pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
