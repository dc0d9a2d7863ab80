//! Dataset partition definitions

use serde::{Deserialize, Serialize};

/// One split of a benchmark dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Validate,
    Test,
}

impl Partition {
    pub fn all() -> Vec<Partition> {
        vec![Partition::Train, Partition::Validate, Partition::Test]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Validate => "validate",
            Partition::Test => "test",
        }
    }
}

impl std::str::FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "train" => Ok(Partition::Train),
            "validate" | "validation" | "dev" => Ok(Partition::Validate),
            "test" => Ok(Partition::Test),
            _ => Err(format!("Unknown partition: {}", s)),
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which partitions a benchmark instance loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetScope {
    Train,
    #[default]
    Validate,
    Test,
    All,
}

impl DatasetScope {
    /// Case-insensitive parse that falls back to `default` for unknown values
    pub fn from_value(value: &str, default: DatasetScope) -> DatasetScope {
        value.parse().unwrap_or(default)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetScope::Train => "train",
            DatasetScope::Validate => "validate",
            DatasetScope::Test => "test",
            DatasetScope::All => "all",
        }
    }

    /// Partitions covered by this scope
    pub fn partitions(&self) -> Vec<Partition> {
        match self {
            DatasetScope::Train => vec![Partition::Train],
            DatasetScope::Validate => vec![Partition::Validate],
            DatasetScope::Test => vec![Partition::Test],
            DatasetScope::All => Partition::all(),
        }
    }

    pub fn includes(&self, partition: Partition) -> bool {
        self.partitions().contains(&partition)
    }
}

impl From<Partition> for DatasetScope {
    fn from(partition: Partition) -> Self {
        match partition {
            Partition::Train => DatasetScope::Train,
            Partition::Validate => DatasetScope::Validate,
            Partition::Test => DatasetScope::Test,
        }
    }
}

impl std::str::FromStr for DatasetScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(DatasetScope::All),
            other => other.parse::<Partition>().map(DatasetScope::from),
        }
    }
}
