//! CSV inputs: labelled document manifests and precomputed predictions.

use anyhow::{Context, Result};
use doc_classify_common::Category;
use doc_classify_evaluation::{BatchEntry, EvaluationItem};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ManifestRow {
    filename: String,
    #[serde(default)]
    true_label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    filename: String,
    #[serde(default)]
    true_label: Option<String>,
    predicted_label: String,
    confidence: f64,
}

fn parse_label(raw: Option<&str>, line: usize) -> Result<Option<Category>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(label) => label
            .parse::<Category>()
            .map(Some)
            .with_context(|| format!("line {line}: invalid label")),
    }
}

/// Read `filename,true_label` rows and load each document from `dir`.
/// An empty label means the document is classified but not graded.
pub fn load_manifest(manifest: &Path, dir: &Path) -> Result<Vec<BatchEntry>> {
    let mut reader = csv::Reader::from_path(manifest)
        .with_context(|| format!("Failed to open manifest {}", manifest.display()))?;

    let mut entries = Vec::new();
    for (i, row) in reader.deserialize::<ManifestRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("line {line}: malformed manifest row"))?;
        let true_label = parse_label(row.true_label.as_deref(), line)?;

        let path = dir.join(&row.filename);
        let document = std::fs::read(&path)
            .with_context(|| format!("Failed to read document {}", path.display()))?;
        entries.push(BatchEntry::new(row.filename, document, true_label));
    }
    Ok(entries)
}

/// Read `filename,true_label,predicted_label,confidence` rows.
pub fn load_predictions(path: &Path) -> Result<Vec<EvaluationItem>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open predictions {}", path.display()))?;

    reader
        .deserialize::<PredictionRow>()
        .enumerate()
        .map(|(i, row)| {
            let line = i + 2;
            let row = row.with_context(|| format!("line {line}: malformed prediction row"))?;
            let true_label = parse_label(row.true_label.as_deref(), line)?;
            let predicted = parse_label(Some(&row.predicted_label), line)?
                .with_context(|| format!("line {line}: missing predicted_label"))?;
            anyhow::ensure!(
                (0.0..=1.0).contains(&row.confidence),
                "line {line}: confidence {} outside [0, 1]",
                row.confidence
            );
            Ok(EvaluationItem::predicted(row.filename, true_label, predicted, row.confidence))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF-a").unwrap();
        fs::write(dir.path().join("b.pdf"), b"%PDF-b").unwrap();
        let manifest = dir.path().join("labels.csv");
        fs::write(&manifest, "filename,true_label\na.pdf,Bank Statement\nb.pdf,\n").unwrap();

        let entries = load_manifest(&manifest, dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].true_label, Some(Category::BankStatement));
        assert_eq!(&*entries[0].document, b"%PDF-a");
        assert_eq!(entries[1].true_label, None);
    }

    #[test]
    fn test_manifest_rejects_bad_label() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        let manifest = dir.path().join("labels.csv");
        fs::write(&manifest, "filename,true_label\na.pdf,Tax Return\n").unwrap();

        let err = load_manifest(&manifest, dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_manifest_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("labels.csv");
        fs::write(&manifest, "filename,true_label\nmissing.pdf,Payslip\n").unwrap();

        assert!(load_manifest(&manifest, dir.path()).is_err());
    }

    #[test]
    fn test_load_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.csv");
        fs::write(
            &path,
            "filename,true_label,predicted_label,confidence\n\
             a.pdf,Payslip,Payslip,0.9\n\
             b.pdf,,utility_bill,0.4\n",
        )
        .unwrap();

        let items = load_predictions(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].correct);
        assert_eq!(items[1].true_label, None);
        assert_eq!(items[1].predicted_label, Category::UtilityBill);
    }

    #[test]
    fn test_predictions_reject_bad_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.csv");
        fs::write(
            &path,
            "filename,true_label,predicted_label,confidence\na.pdf,Payslip,Payslip,95\n",
        )
        .unwrap();

        assert!(load_predictions(&path).is_err());
    }
}
