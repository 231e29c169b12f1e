//! Sample annotation: individual, batch and well for every sample

use serde::{Deserialize, Serialize};

use crate::error::{CvError, Result};

/// Which annotation column defines the groups compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Batch,
    Individual,
}

impl std::str::FromStr for GroupBy {
    type Err = CvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "batch" => Ok(GroupBy::Batch),
            "individual" => Ok(GroupBy::Individual),
            other => Err(CvError::InvalidInput {
                reason: format!("Unknown grouping '{}'. Use 'batch' or 'individual'.", other),
            }),
        }
    }
}

/// One annotation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub individual: String,
    pub batch: String,
    pub well: String,
}

/// Per-sample annotation table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    records: Vec<SampleRecord>,
}

impl Annotation {
    pub fn new(records: Vec<SampleRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(CvError::EmptyData {
                reason: "Annotation has no samples".to_string(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for record in &records {
            if !seen.insert(record.sample_id.as_str()) {
                return Err(CvError::InvalidAnnotation {
                    reason: format!("Duplicate sample ID '{}'", record.sample_id),
                });
            }
        }
        Ok(Self { records })
    }

    pub fn n_samples(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn sample_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.sample_id.as_str()).collect()
    }

    /// Group label of every sample under the given grouping
    pub fn labels(&self, by: GroupBy) -> Vec<String> {
        self.records
            .iter()
            .map(|r| match by {
                GroupBy::Batch => r.batch.clone(),
                GroupBy::Individual => r.individual.clone(),
            })
            .collect()
    }

    /// Distinct group labels in order of first appearance
    pub fn groups(&self, by: GroupBy) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for label in self.labels(by) {
            if !out.contains(&label) {
                out.push(label);
            }
        }
        out
    }

    /// Sample indices belonging to `group`
    pub fn samples_in(&self, by: GroupBy, group: &str) -> Vec<usize> {
        self.labels(by)
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == group)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sample indices of every batch except `excluded`
    pub fn samples_excluding_batch(&self, excluded: Option<&str>) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| excluded.map_or(true, |b| r.batch != b))
            .map(|(i, _)| i)
            .collect()
    }

    /// Reorder the annotation to match `sample_ids` exactly.
    ///
    /// Every matrix column must have exactly one annotation record and vice versa.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        if sample_ids.len() != self.records.len() {
            return Err(CvError::InvalidAnnotation {
                reason: format!(
                    "Sample count mismatch: matrix has {} samples, annotation has {} samples",
                    sample_ids.len(),
                    self.records.len()
                ),
            });
        }
        let mut ordered = Vec::with_capacity(sample_ids.len());
        let mut missing = Vec::new();
        for id in sample_ids {
            match self.records.iter().find(|r| &r.sample_id == id) {
                Some(r) => ordered.push(r.clone()),
                None => missing.push(id.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(CvError::InvalidAnnotation {
                reason: format!("Samples missing from annotation: {:?}", missing),
            });
        }
        Self::new(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, individual: &str, batch: &str) -> SampleRecord {
        SampleRecord {
            sample_id: id.to_string(),
            individual: individual.to_string(),
            batch: batch.to_string(),
            well: "A01".to_string(),
        }
    }

    fn toy() -> Annotation {
        Annotation::new(vec![
            record("s1", "NA19098", "NA19098.r1"),
            record("s2", "NA19098", "NA19098.r2"),
            record("s3", "NA19101", "NA19101.r1"),
            record("s4", "NA19101", "NA19101.r1"),
        ])
        .unwrap()
    }

    #[test]
    fn test_groups_and_members() {
        let ann = toy();
        assert_eq!(ann.groups(GroupBy::Individual), vec!["NA19098", "NA19101"]);
        assert_eq!(ann.groups(GroupBy::Batch).len(), 3);
        assert_eq!(ann.samples_in(GroupBy::Individual, "NA19101"), vec![2, 3]);
    }

    #[test]
    fn test_exclude_batch() {
        let ann = toy();
        assert_eq!(ann.samples_excluding_batch(Some("NA19098.r2")), vec![0, 2, 3]);
        assert_eq!(ann.samples_excluding_batch(None).len(), 4);
    }

    #[test]
    fn test_align_to_reorders() {
        let ann = toy();
        let order: Vec<String> = ["s3", "s1", "s4", "s2"].iter().map(|s| s.to_string()).collect();
        let aligned = ann.align_to(&order).unwrap();
        assert_eq!(aligned.sample_ids(), vec!["s3", "s1", "s4", "s2"]);
    }

    #[test]
    fn test_align_to_missing_sample() {
        let ann = toy();
        let order: Vec<String> = ["s1", "s2", "s3", "s9"].iter().map(|s| s.to_string()).collect();
        assert!(ann.align_to(&order).is_err());
    }
}
