//! Entity Embedding Store
//!
//! Precomputed knowledge-graph entity embeddings, restricted to drug
//! compounds. Built once per session and read concurrently without locking.

use crate::drug_map::DrugIdMap;
use crate::error::{DdiError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entity name prefix for drug compounds
pub const COMPOUND_PREFIX: &str = "Compound::";

pub type Embedding = Vec<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub name: String,
    pub embedding: Embedding,
}

/// Ordered, immutable table of compound embeddings sharing one dimension
#[derive(Debug, Clone)]
pub struct EntityTable {
    rows: Vec<EntityRow>,
    dimension: usize,
}

impl EntityTable {
    /// Build a table from raw rows, keeping only `Compound::` entities in
    /// their original order.
    pub fn from_rows<I, S>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Embedding)>,
        S: Into<String>,
    {
        let mut kept = Vec::new();
        let mut dropped = 0usize;
        let mut dimension: Option<usize> = None;

        for (name, embedding) in rows {
            let name = name.into();
            if !name.starts_with(COMPOUND_PREFIX) {
                dropped += 1;
                continue;
            }
            if embedding.is_empty() {
                return Err(DdiError::Table(format!("Entity {} has an empty embedding", name)));
            }
            match dimension {
                None => dimension = Some(embedding.len()),
                Some(d) if d != embedding.len() => {
                    return Err(DdiError::Table(format!(
                        "Entity {} has {} components, expected {}",
                        name,
                        embedding.len(),
                        d
                    )));
                }
                Some(_) => {}
            }
            kept.push(EntityRow { name, embedding });
        }

        if dropped > 0 {
            debug!("Dropped {} non-compound entities", dropped);
        }

        Ok(Self {
            rows: kept,
            dimension: dimension.unwrap_or(0),
        })
    }

    /// Load the flat embedding file: first column is the entity name, every
    /// remaining column is one embedding component.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let columns = df.get_columns();
        if columns.len() < 2 {
            return Err(DdiError::Table(format!(
                "{} needs an entity name column and at least one embedding column",
                path.display()
            )));
        }

        let names = columns[0].cast(&DataType::String)?;
        let names = names.str()?;
        let components: Vec<Series> = columns[1..]
            .iter()
            .map(|s| s.cast(&DataType::Float64))
            .collect::<PolarsResult<_>>()?;
        let components: Vec<&Float64Chunked> = components
            .iter()
            .map(|s| s.f64())
            .collect::<PolarsResult<_>>()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let name = names
                .get(i)
                .ok_or_else(|| DdiError::Table(format!("Row {} has no entity name", i)))?;
            let embedding = components
                .iter()
                .map(|c| {
                    c.get(i).ok_or_else(|| {
                        DdiError::Table(format!("Entity {} has a missing embedding component", name))
                    })
                })
                .collect::<Result<Embedding>>()?;
            rows.push((name.to_string(), embedding));
        }

        let table = Self::from_rows(rows)?;
        if table.is_empty() {
            warn!("Embedding file {} contains no Compound:: entities", path.display());
        }
        info!(
            "Loaded {} compound embeddings (dimension {}) from {}",
            table.len(),
            table.dimension,
            path.display()
        );
        Ok(table)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[EntityRow] {
        &self.rows
    }

    /// First row (in table order) selected by `policy` for the id fragment
    pub fn find(&self, id: &str, policy: MatchPolicy) -> Option<&EntityRow> {
        let needle = id.to_lowercase();
        match policy {
            MatchPolicy::Substring => self
                .rows
                .iter()
                .find(|row| row.name.to_lowercase().contains(&needle)),
            MatchPolicy::Exact => {
                let target = format!("{}{}", COMPOUND_PREFIX.to_lowercase(), needle);
                self.rows.iter().find(|row| row.name.to_lowercase() == target)
            }
        }
    }
}

/// How an id fragment selects a table row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Case-insensitive containment; an id that is a substring of another
    /// id can select the other entity if it appears first.
    #[default]
    Substring,
    /// Row name must equal `Compound::<id>`, ignoring case.
    Exact,
}

impl std::str::FromStr for MatchPolicy {
    type Err = DdiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "substring" => Ok(MatchPolicy::Substring),
            "exact" => Ok(MatchPolicy::Exact),
            other => Err(DdiError::Config(format!(
                "Unknown match policy '{}' (expected 'substring' or 'exact')",
                other
            ))),
        }
    }
}

/// Resolves display names to embeddings through the drug map
#[derive(Debug, Clone)]
pub struct EntityLookup {
    drug_map: Arc<DrugIdMap>,
    table: Arc<EntityTable>,
    policy: MatchPolicy,
}

impl EntityLookup {
    pub fn new(drug_map: Arc<DrugIdMap>, table: Arc<EntityTable>, policy: MatchPolicy) -> Self {
        Self {
            drug_map,
            table,
            policy,
        }
    }

    pub fn drug_map(&self) -> &DrugIdMap {
        &self.drug_map
    }

    pub fn table(&self) -> &EntityTable {
        &self.table
    }

    pub fn resolve(&self, name: &str) -> Result<&[f64]> {
        let id = self.drug_map.map_drug_to_id(name)?;
        let row = self.table.find(id, self.policy).ok_or_else(|| DdiError::NotFound {
            drug: name.to_string(),
            id: id.to_string(),
        })?;
        debug!("Resolved {} -> {} ({})", name, id, row.name);
        Ok(&row.embedding)
    }
}
