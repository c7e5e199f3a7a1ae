//! Runtime settings, loaded from an optional JSON file and overridden by CLI flags.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Keyword sets driving the SMS classifier.
///
/// Bank templates drift, so every list can be replaced from the settings file
/// without touching the correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    /// At least one must appear (case-insensitive) for an SMS to be considered.
    pub relevance_tokens: Vec<String>,
    /// Words that, after a `txn`/`transaction` mention, mark success.
    pub success_keywords: Vec<String>,
    /// Words that, after a `txn`/`transaction` mention, mark failure.
    pub failure_keywords: Vec<String>,
    /// Reference labels in addition to the built-in UPI Ref/UPI Txn/UTR family.
    pub extra_reference_labels: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            relevance_tokens: ["upi", "transaction", "payment", "transfer", "money"]
                .map(String::from)
                .to_vec(),
            success_keywords: ["successful", "completed", "success"]
                .map(String::from)
                .to_vec(),
            failure_keywords: ["failed", "declined", "reversed", "timeout", "unsuccessful"]
                .map(String::from)
                .to_vec(),
            extra_reference_labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How long to wait for a confirmation SMS after dialing.
    pub timeout_secs: u64,
    /// SIM slot to dial from on dual-SIM devices.
    pub sim_slot: Option<u8>,
    /// Number of payments kept in history.
    pub history_limit: usize,
    pub classifier: ClassifierRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            sim_slot: None,
            history_limit: 50,
            classifier: ClassifierRules::default(),
        }
    }
}

impl Settings {
    /// Reads settings from `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                Ok(serde_json::from_reader(reader)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
