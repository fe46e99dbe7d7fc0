//! Fitted category tables and the encoding bundle that carries them.

use std::collections::{BTreeMap, HashMap};
use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Label → id table for one categorical column.
///
/// Accepts either a list of labels (id = position, as a label encoder
/// assigns them) or an object of explicit ids. For the object form the
/// table's ordering is the sorted label order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "TableRepr")]
pub struct CategoryTable {
    entries: Vec<(String, i64)>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableRepr {
    Labels(Vec<String>),
    Ids(BTreeMap<String, i64>),
}

impl From<TableRepr> for CategoryTable {
    fn from(repr: TableRepr) -> Self {
        match repr {
            TableRepr::Labels(labels) => labels
                .into_iter()
                .enumerate()
                .map(|(i, l)| (l, i as i64))
                .collect(),
            TableRepr::Ids(ids) => ids.into_iter().collect(),
        }
    }
}

impl FromIterator<(String, i64)> for CategoryTable {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut table = CategoryTable::default();
        for (label, id) in iter {
            if table.index.contains_key(&label) {
                continue; // first occurrence wins
            }
            table.index.insert(label.clone(), table.entries.len());
            table.entries.push((label, id));
        }
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Known,
    /// Unseen label; the id of the table's first category was used.
    FirstKnown,
    EmptyTable,
    /// The stored id was not a valid category id; 0 was used.
    LookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub id: u32,
    pub source: EncodingSource,
}

impl CategoryTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Always yields an id. Unseen labels map to the first category's id,
    /// not to a dedicated "unknown" value.
    pub fn encode(&self, label: &str) -> Encoded {
        let (raw, source) = match self.index.get(label).and_then(|&i| self.entries.get(i)) {
            Some((_, id)) => (*id, EncodingSource::Known),
            None => match self.entries.first() {
                Some((first, id)) => {
                    tracing::warn!(label, fallback = %first, "unseen category, using first known class");
                    (*id, EncodingSource::FirstKnown)
                }
                None => {
                    tracing::warn!(label, "empty category table, encoding as 0");
                    return Encoded {
                        id: 0,
                        source: EncodingSource::EmptyTable,
                    };
                }
            },
        };

        match u32::try_from(raw) {
            Ok(id) => Encoded { id, source },
            Err(e) => {
                tracing::warn!(label, raw, "Error in category lookup: {}", e);
                Encoded {
                    id: 0,
                    source: EncodingSource::LookupFailed,
                }
            }
        }
    }
}

/// Everything the model expects about its inputs: one table per categorical
/// column plus the authoritative column order.
#[derive(Debug, Clone, Deserialize)]
pub struct EncodingBundle {
    pub le_from: CategoryTable,
    pub le_to: CategoryTable,
    pub feature_order: Vec<String>,
}

impl EncodingBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read encoder bundle at {}", path.display()))?;
        let bundle: EncodingBundle =
            serde_json::from_str(&txt).with_context(|| "failed to parse encoder bundle")?;
        if bundle.feature_order.is_empty() {
            bail!("encoder bundle has an empty feature_order");
        }
        tracing::debug!(
            from_classes = bundle.le_from.len(),
            to_classes = bundle.le_to.len(),
            feature_order = ?bundle.feature_order,
            "loaded encoder bundle"
        );
        Ok(bundle)
    }
}
