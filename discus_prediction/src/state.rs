use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Ordered class names. Index `i` of the model output is `labels[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> io::Result<Self> {
        if labels.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Label set is empty",
            ));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Duplicate label: {}", label),
                ));
            }
        }

        Ok(Self { labels })
    }

    pub fn load(filepath: &Path) -> io::Result<Self> {
        let file = File::open(filepath)?;
        Self::parse(io::BufReader::new(file))
    }

    /// One label per line; blank lines are skipped.
    pub fn parse(reader: impl BufRead) -> io::Result<Self> {
        let mut labels = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let label = line.trim();
            if label.is_empty() {
                continue;
            }
            labels.push(label.to_string());
        }

        Self::new(labels)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}
