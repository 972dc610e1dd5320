// Infrastructure adapters behind the app ports

pub mod column_mapping;
pub mod error_classifier;
pub mod record_output_adapter;
pub mod supabase_store;

pub use column_mapping::ColumnMapping;
pub use record_output_adapter::FileRecordOutputAdapter;
pub use supabase_store::SupabaseStore;
