pub mod count_use_case;
pub mod import_use_case;
pub mod ports;
pub mod run_stats;

pub use count_use_case::CountUseCase;
pub use import_use_case::{extract_records, open_units, ImportUseCase};
pub use run_stats::RunStats;
