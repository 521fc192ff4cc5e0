//! Label index built during Pass 1.

use std::collections::HashMap;

/// Label to location map, filled during Pass 1 and read by Pass 2.
#[derive(Debug, Default, Clone)]
pub struct LabelIndex {
    labels: HashMap<String, u32>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self {
            labels: HashMap::with_capacity(64),
        }
    }

    /// Declare a label. A second declaration of the same name is an error
    /// and hands the label back.
    pub fn declare(&mut self, label: String, location: u32) -> Result<(), String> {
        if self.labels.contains_key(&label) {
            return Err(label);
        }
        self.labels.insert(label, location);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
