//! Ordered, typed station-name correction rules
//!
//! Rules are configuration data. Applying one consumes a record set version
//! and produces the next, together with the number of rows it changed. The
//! engine runs rules strictly in configured order because later rules may
//! rely on names consolidated by earlier ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{ReconcileError, Result};
use crate::models::{Role, TripRecord};

/// A single deterministic correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionRule {
    /// Rename `old_name` to `new_name` wherever it appears, regardless of id
    ExactReplace { old_name: String, new_name: String },

    /// Rename only where both the station id and the stored name match
    ConditionalReassign {
        station_id: String,
        wrong_name: String,
        correct_name: String,
    },

    /// Fold byte-distinct spellings of one name into `canonical`, for one id only
    EncodingNormalize {
        station_id: String,
        variants: Vec<String>,
        canonical: String,
    },
}

impl CorrectionRule {
    pub fn exact_replace(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::ExactReplace {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    pub fn conditional_reassign(
        station_id: impl Into<String>,
        wrong_name: impl Into<String>,
        correct_name: impl Into<String>,
    ) -> Self {
        Self::ConditionalReassign {
            station_id: station_id.into(),
            wrong_name: wrong_name.into(),
            correct_name: correct_name.into(),
        }
    }

    pub fn encoding_normalize<I, S>(
        station_id: impl Into<String>,
        variants: I,
        canonical: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::EncodingNormalize {
            station_id: station_id.into(),
            variants: variants.into_iter().map(Into::into).collect(),
            canonical: canonical.into(),
        }
    }

    /// Short rule kind name as used in rule files
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExactReplace { .. } => "exact_replace",
            Self::ConditionalReassign { .. } => "conditional_reassign",
            Self::EncodingNormalize { .. } => "encoding_normalize",
        }
    }

    /// Reject rules that can never apply or would produce empty names
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(ReconcileError::configuration(format!(
                "invalid {} rule ({}): {}",
                self.kind(),
                self,
                reason
            )))
        };

        match self {
            Self::ExactReplace { old_name, new_name } => {
                if old_name.is_empty() || new_name.trim().is_empty() {
                    return invalid("names must not be empty");
                }
                if old_name == new_name {
                    return invalid("old and new names are identical");
                }
            }
            Self::ConditionalReassign {
                station_id,
                wrong_name,
                correct_name,
            } => {
                if station_id.trim().is_empty() {
                    return invalid("station id must not be empty");
                }
                if wrong_name.is_empty() || correct_name.trim().is_empty() {
                    return invalid("names must not be empty");
                }
                if wrong_name == correct_name {
                    return invalid("wrong and correct names are identical");
                }
            }
            Self::EncodingNormalize {
                station_id,
                variants,
                canonical,
            } => {
                if station_id.trim().is_empty() {
                    return invalid("station id must not be empty");
                }
                if canonical.trim().is_empty() {
                    return invalid("canonical name must not be empty");
                }
                if variants.is_empty() {
                    return invalid("at least one variant spelling is required");
                }
                if variants.iter().any(|v| v == canonical) {
                    return invalid("canonical spelling listed among its variants");
                }
            }
        }

        Ok(())
    }

    /// Replacement name for one station cell, if this rule rewrites it
    fn rewrite_for(&self, station_id: &str, name: &str) -> Option<&str> {
        match self {
            Self::ExactReplace { old_name, new_name } => (name == old_name).then_some(new_name.as_str()),
            Self::ConditionalReassign {
                station_id: rule_id,
                wrong_name,
                correct_name,
            } => (station_id == rule_id && name == wrong_name).then_some(correct_name.as_str()),
            Self::EncodingNormalize {
                station_id: rule_id,
                variants,
                canonical,
            } => (station_id == rule_id && name != canonical && variants.iter().any(|v| v == name))
                .then_some(canonical.as_str()),
        }
    }

    /// Apply to every record, returning the next version and the rows changed
    ///
    /// Origin and destination columns are evaluated independently; a row whose
    /// two ends both change counts once.
    pub fn apply(&self, mut records: Vec<TripRecord>) -> Result<(Vec<TripRecord>, usize)> {
        let mut affected = 0;

        for (row, record) in records.iter_mut().enumerate() {
            let mut changed = false;

            for role in Role::ALL {
                let replacement = self
                    .rewrite_for(record.station_id(role), record.station_name(role))
                    .map(str::to_string);

                if let Some(name) = replacement {
                    record.set_station_name(role, &name);
                    changed = true;
                }
            }

            if changed {
                self.check_identity(record, row)?;
                affected += 1;
            }
        }

        Ok((records, affected))
    }

    /// A rewritten record must still carry a usable id and name at both ends
    fn check_identity(&self, record: &TripRecord, row: usize) -> Result<()> {
        for role in Role::ALL {
            let broken = if record.station_id(role).trim_ascii().is_empty() {
                Some(role.id_column())
            } else if record.station_name(role).trim_ascii().is_empty() {
                Some(role.name_column())
            } else {
                None
            };

            if let Some(column) = broken {
                return Err(ReconcileError::CorrectionInvariant {
                    rule: self.to_string(),
                    row,
                    reason: format!("{} is empty after rewrite", column),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for CorrectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactReplace { old_name, new_name } => {
                write!(f, "replace {:?} -> {:?}", old_name, new_name)
            }
            Self::ConditionalReassign {
                station_id,
                wrong_name,
                correct_name,
            } => write!(
                f,
                "reassign {}: {:?} -> {:?}",
                station_id, wrong_name, correct_name
            ),
            Self::EncodingNormalize {
                station_id,
                variants,
                canonical,
            } => write!(
                f,
                "normalize {}: {} variant(s) -> {:?}",
                station_id,
                variants.len(),
                canonical
            ),
        }
    }
}

/// Result of one full pass of the rule list
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub records: Vec<TripRecord>,
    /// Rows changed by each rule, aligned with the engine's rule order
    pub rows_affected: Vec<usize>,
}

impl PassOutcome {
    pub fn total_affected(&self) -> usize {
        self.rows_affected.iter().sum()
    }
}

/// Applies an ordered rule list to a record set
#[derive(Debug, Clone, Default)]
pub struct CorrectionEngine {
    rules: Vec<CorrectionRule>,
}

impl CorrectionEngine {
    pub fn new(rules: Vec<CorrectionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CorrectionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule once, in order
    pub fn run_pass(&self, records: Vec<TripRecord>) -> Result<PassOutcome> {
        let mut current = records;
        let mut rows_affected = Vec::with_capacity(self.rules.len());

        for rule in &self.rules {
            let (next, affected) = rule.apply(current)?;
            if affected > 0 {
                debug!("Rule [{}] rewrote {} rows", rule, affected);
            }
            rows_affected.push(affected);
            current = next;
        }

        Ok(PassOutcome {
            records: current,
            rows_affected,
        })
    }
}
