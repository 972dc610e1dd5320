use anyhow::Result;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};

use nutrition_seeder::app::ports::{StoreError, StoreErrorKind};
use nutrition_seeder::app::{extract_records, open_units, ImportUseCase, RunStats};
use nutrition_seeder::infra::FileRecordOutputAdapter;
use nutrition_seeder::pipeline::processing::normalize::{NormalizationRegistry, RecordNormalizer};
use nutrition_seeder::pipeline::storage::{DuplicatePolicy, InMemoryStore};
use nutrition_seeder::pipeline::upload::UploadOptions;
use nutrition_seeder::types::{Category, NutritionRecord};

const OFF_HEADER: &str = "product_name\tcategories_en\tenergy-kcal_100g\tproteins_100g\tcarbohydrates_100g\tfat_100g\tfiber_100g";

fn write_input(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn off_export(names: &[&str]) -> Result<NamedTempFile> {
    let mut contents = format!("{}\n", OFF_HEADER);
    for name in names {
        contents.push_str(&format!("{}\tSnacks\t120\t3\t20\t2\t1\n", name));
    }
    write_input(&contents)
}

fn options(batch_size: usize, individual_retry: bool) -> UploadOptions {
    UploadOptions {
        batch_size,
        individual_retry,
        ..UploadOptions::default()
    }
}

async fn import(store: &InMemoryStore, upload: UploadOptions, profile: &str, input: &Path) -> Result<RunStats> {
    let registry = NormalizationRegistry::new();
    let definition = registry.resolve(profile)?.clone();
    let units = open_units(&definition, input, None)?;
    let normalizer = RecordNormalizer::new(definition.normalizer);
    let use_case = ImportUseCase::new(Arc::new(store.clone()), upload);
    Ok(use_case.run(profile, &normalizer, units).await?)
}

#[tokio::test]
async fn test_export_rows_are_validated_and_imported() -> Result<()> {
    let input = write_input(&format!(
        "{}\nRice\tCereals\t130\t2.7\t28\t0.3\t0.4\n\tSnacks\t200\t1\t1\t1\t0\nOil\tFats\t0\t0\t0\t100\t0\n",
        OFF_HEADER
    ))?;
    let store = InMemoryStore::default();

    let stats = import(&store, UploadOptions::default(), "openfoodfacts", input.path()).await?;

    assert_eq!(stats.units_read, 3);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected_at_validation, 2);
    assert_eq!(stats.rejected_by_reason["MISSING_NAME"], 1);
    assert_eq!(stats.rejected_by_reason["OUT_OF_RANGE(calories)"], 1);
    assert_eq!(stats.imported(), 1);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Rice");
    assert_eq!(rows[0].calories_per_serving, 130);
    assert_eq!(rows[0].protein_g, 2.7);
    assert_eq!(rows[0].category, Category::Global);
    assert!(!rows[0].is_custom);
    Ok(())
}

#[tokio::test]
async fn test_records_are_submitted_in_batches() -> Result<()> {
    let input = off_export(&["Rice", "Oats", "Dal", "Poha", "Upma"])?;
    let store = InMemoryStore::default();

    let stats = import(&store, options(2, false), "openfoodfacts", input.path()).await?;

    assert_eq!(store.submissions(), vec![2, 2, 1]);
    assert_eq!(stats.upload.submissions, 3);
    assert_eq!(stats.imported(), 5);
    assert_eq!(stats.duplicate_conflicts(), 0);
    assert_eq!(stats.other_errors(), 0);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_batch_is_counted_and_run_continues() -> Result<()> {
    let input = off_export(&["Rice", "Oats", "Dal", "Poha"])?;
    let store = InMemoryStore::new(DuplicatePolicy::Reject);
    store.seed(
        [NutritionRecord {
            name: "Oats".to_string(),
            localized_name: None,
            category: Category::Global,
            serving_size_g: 100.0,
            calories_per_serving: 389,
            protein_g: 16.9,
            carbs_g: 66.3,
            fats_g: 6.9,
            fiber_g: 10.6,
            source: "OpenFoodFacts".to_string(),
            is_custom: false,
            user_id: None,
        }],
        &["name".to_string()],
    );

    let stats = import(&store, options(2, false), "openfoodfacts", input.path()).await?;

    assert_eq!(stats.duplicate_conflicts(), 1);
    assert_eq!(stats.imported(), 2);
    assert_eq!(stats.other_errors(), 0);
    assert_eq!(store.submissions(), vec![2, 2]);
    let names: Vec<String> = store.rows().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Oats", "Dal", "Poha"]);
    Ok(())
}

#[tokio::test]
async fn test_failed_batch_is_retried_record_by_record() -> Result<()> {
    let input = off_export(&["Rice", "Oats", "Dal"])?;
    let store = InMemoryStore::default();
    store.fail_next([
        StoreError::new(StoreErrorKind::Transport, "connection reset by peer"),
        StoreError::new(StoreErrorKind::Other, "value too long for type character varying"),
    ]);

    let stats = import(&store, options(3, true), "openfoodfacts", input.path()).await?;

    // the batch, then one call per record
    assert_eq!(store.submissions(), vec![3, 1, 1, 1]);
    assert_eq!(stats.imported(), 2);
    assert_eq!(stats.other_errors(), 1);
    assert_eq!(stats.upload.submissions, 1);
    assert_eq!(stats.upload.retry_submissions, 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_batch_without_retry_counts_every_record() -> Result<()> {
    let input = off_export(&["Rice", "Oats", "Dal"])?;
    let store = InMemoryStore::default();
    store.fail_next([StoreError::new(StoreErrorKind::Unauthorized, "permission denied for table foods").with_status(403)]);

    let stats = import(&store, options(2, false), "openfoodfacts", input.path()).await?;

    assert_eq!(stats.other_errors(), 2);
    assert_eq!(stats.imported(), 1);
    assert_eq!(stats.upload.failed_batches, 1);
    Ok(())
}

#[tokio::test]
async fn test_ocr_text_is_imported_end_to_end() -> Result<()> {
    let input = write_input(
        "Food Name Water Protcnt Fatce\n\
         A001 Amaranth seed, black (Amaranthus cruentus) 9.89 14.59 2.78 5.74 61.46 7.47\n\
         \n\
         page 12\n",
    )?;
    let store = InMemoryStore::default();

    let stats = import(&store, UploadOptions::default(), "ifct-ocr", input.path()).await?;

    assert_eq!(stats.units_read, 4);
    assert_eq!(stats.skipped_at_extraction, 3);
    assert_eq!(stats.imported(), 1);

    let rows = store.rows();
    assert_eq!(rows[0].name, "Amaranth seed, black");
    assert_eq!(rows[0].calories_per_serving, 356);
    assert_eq!(rows[0].category, Category::Indian);
    assert_eq!(rows[0].source, "IFCT2017_OCR");
    Ok(())
}

#[tokio::test]
async fn test_extract_writes_ndjson() -> Result<()> {
    let input = off_export(&["Rice", "Oats"])?;
    let dir = tempdir()?;
    let output_path = dir.path().join("accepted.ndjson");

    let registry = NormalizationRegistry::new();
    let definition = registry.resolve("openfoodfacts")?.clone();
    let units = open_units(&definition, input.path(), None)?;
    let normalizer = RecordNormalizer::new(definition.normalizer);
    let mut output = FileRecordOutputAdapter::create(&output_path)?;

    let stats = extract_records("openfoodfacts", &normalizer, units, &mut output, None)?;
    assert_eq!(stats.accepted, 2);

    let written = std::fs::read_to_string(&output_path)?;
    let records: Vec<NutritionRecord> = written
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].name, "Oats");
    assert_eq!(records[1].calories_per_serving, 120);
    Ok(())
}
