//! Common routines for handling input data.
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read a series of type Ts from a CSV file into a Vec<T>.
///
/// # Arguments
///
/// * `file_path`: Path to the CSV file
pub fn read_vec_from_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = read_csv_allow_empty(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec)
}

/// Read a CSV file like [`read_vec_from_csv`], but permit an empty file.
pub fn read_csv_allow_empty<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Error reading {}", file_path.display()))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T =
            result.with_context(|| format!("Error reading {}", file_path.display()))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file into the specified type.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read {}", file_path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Error parsing {}", file_path.display()))
}

/// Read a wide CSV file of per-column time series.
///
/// The first column holds the row label (e.g. a snapshot timestamp) and is
/// discarded; every other column becomes an entry mapping the column header to
/// the column's values, in file order.
pub fn read_series_columns(file_path: &Path) -> Result<IndexMap<String, Vec<f64>>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Error reading {}", file_path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Error reading {}", file_path.display()))?
        .iter()
        .skip(1)
        .map(String::from)
        .collect();

    let mut columns: IndexMap<String, Vec<f64>> =
        headers.iter().map(|h| (h.clone(), Vec::new())).collect();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("Error reading {}", file_path.display()))?;
        ensure!(
            record.len() == headers.len() + 1,
            "Ragged row in {}",
            file_path.display()
        );
        for (header, field) in headers.iter().zip(record.iter().skip(1)) {
            let value: f64 = field.trim().parse().with_context(|| {
                format!("Invalid value {:?} in {}", field, file_path.display())
            })?;
            columns.get_mut(header).unwrap().push(value);
        }
    }

    Ok(columns)
}

/// Check that a slice is sorted and contains no duplicates
pub fn is_sorted_and_unique<T: PartialOrd>(items: &[T]) -> bool {
    items.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Record {
        id: String,
        value: f64,
    }

    #[test]
    fn test_read_vec_from_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value\na,1.0\nb,2.5").unwrap();
        }

        let records: Vec<Record> = read_vec_from_csv(&file_path).unwrap();
        assert_eq!(
            records,
            vec![
                Record {
                    id: "a".to_string(),
                    value: 1.0
                },
                Record {
                    id: "b".to_string(),
                    value: 2.5
                }
            ]
        );
    }

    #[test]
    fn test_read_vec_from_csv_empty() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("data.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value").unwrap();
        }

        assert!(read_vec_from_csv::<Record>(&file_path).is_err());
        assert!(read_csv_allow_empty::<Record>(&file_path).unwrap().is_empty());
    }

    #[test]
    fn test_read_series_columns() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("profile.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "snapshot,DE0 0,DE0 1").unwrap();
            writeln!(file, "2013-01-01 00:00,1.0,2.0").unwrap();
            writeln!(file, "2013-01-01 01:00,3.0,4.0").unwrap();
        }

        let columns = read_series_columns(&file_path).unwrap();
        assert_eq!(columns["DE0 0"], vec![1.0, 3.0]);
        assert_eq!(columns["DE0 1"], vec![2.0, 4.0]);
    }

    #[test]
    fn test_is_sorted_and_unique() {
        assert!(is_sorted_and_unique(&[2020, 2030, 2040]));
        assert!(!is_sorted_and_unique(&[2020, 2020]));
        assert!(!is_sorted_and_unique(&[2030, 2020]));
    }
}
