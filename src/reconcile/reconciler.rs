//! Declared-vs-observed reconciliation
//!
//! Computes which entities to create and delete so the cluster matches the
//! local declaration, then issues those operations through an [`Applier`].
//! Entities present on both sides must agree on their comparable fields;
//! otherwise the whole push stops with `SpecMismatch` before touching the
//! cluster.

use crate::error::{Error, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A field whose declared and observed values differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
    pub field: &'static str,
    pub declared: String,
    pub observed: String,
}

impl FieldDiff {
    pub fn new(field: &'static str, declared: impl ToString, observed: impl ToString) -> Self {
        Self {
            field,
            declared: declared.to_string(),
            observed: observed.to_string(),
        }
    }
}

/// An entity family that can be diffed by logical name
pub trait Reconcilable: Clone + Send + Sync {
    /// Family name used in logs and errors
    const KIND: &'static str;

    /// Logical name, the identity key
    fn name(&self) -> &str;

    /// Compare the fields that must agree between the declaration (`self`)
    /// and the cluster, returning the first that differs.
    ///
    /// `observed` holds every cluster record carrying this name, never empty.
    fn diff(&self, observed: &[&Self]) -> Result<Option<FieldDiff>>;
}

/// Issues cluster operations for one entity family
#[async_trait]
pub trait Applier<E: Reconcilable>: Send + Sync {
    /// Provision an entity
    async fn create(&self, entity: &E) -> Result<()>;

    /// Tear down an entity
    async fn delete(&self, entity: &E) -> Result<()>;

    /// Read the live version of an entity by logical name
    async fn fetch(&self, name: &str) -> Result<Option<E>>;
}

/// Operations needed to converge one family
#[derive(Debug, Clone)]
pub struct Plan<E> {
    pub to_create: Vec<E>,
    pub to_delete: Vec<E>,
    pub unchanged: Vec<String>,
}

impl<E> Plan<E> {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}

/// Outcome of a push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub kind: String,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl std::fmt::Display for PushSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} created, {} deleted, {} unchanged",
            self.kind,
            self.created.len(),
            self.deleted.len(),
            self.unchanged.len()
        )
    }
}

pub(crate) fn mismatch<E: Reconcilable>(name: &str, diff: FieldDiff) -> Error {
    Error::SpecMismatch {
        kind: E::KIND.to_string(),
        name: name.to_string(),
        field: diff.field.to_string(),
        declared: diff.declared,
        observed: diff.observed,
    }
}

/// Compute the create/delete partition of `declared ∪ observed`.
///
/// `observed` may hold several records per name. All of them are handed to
/// [`Reconcilable::diff`]; a name to delete is deleted once, through its first
/// record. Declared names are expected to be unique.
pub fn plan<E: Reconcilable>(declared: &[E], observed: &[E]) -> Result<Plan<E>> {
    let mut declared_by_name: IndexMap<&str, &E> = IndexMap::new();
    for entity in declared {
        declared_by_name.entry(entity.name()).or_insert(entity);
    }
    let mut observed_by_name: IndexMap<&str, Vec<&E>> = IndexMap::new();
    for entity in observed {
        observed_by_name.entry(entity.name()).or_default().push(entity);
    }

    let mut to_delete = Vec::new();
    let mut unchanged = Vec::new();
    for (name, records) in &observed_by_name {
        match declared_by_name.get(name) {
            None => to_delete.push(records[0].clone()),
            Some(wanted) => {
                if let Some(diff) = wanted.diff(records)? {
                    return Err(mismatch::<E>(name, diff));
                }
                unchanged.push(name.to_string());
            }
        }
    }

    let to_create = declared_by_name
        .iter()
        .filter(|(name, _)| !observed_by_name.contains_key(*name))
        .map(|(_, e)| (*e).clone())
        .collect();

    Ok(Plan {
        to_create,
        to_delete,
        unchanged,
    })
}

/// Converge the cluster to the declaration.
///
/// The first failing operation is returned as is; operations already issued
/// are not rolled back, re-running the push picks up the remainder.
pub async fn push<E, A>(declared: &[E], observed: &[E], applier: &A) -> Result<PushSummary>
where
    E: Reconcilable,
    A: Applier<E> + ?Sized,
{
    let plan = plan(declared, observed)?;
    let noop = plan.is_noop();
    let mut summary = PushSummary {
        kind: E::KIND.to_string(),
        unchanged: plan.unchanged,
        ..Default::default()
    };

    if noop {
        debug!(kind = E::KIND, "Nothing to push");
        return Ok(summary);
    }

    for entity in &plan.to_delete {
        info!(kind = E::KIND, name = entity.name(), "Deleting locally removed entity");
        applier.delete(entity).await?;
        summary.deleted.push(entity.name().to_string());
    }

    for entity in &plan.to_create {
        info!(kind = E::KIND, name = entity.name(), "Creating entity");
        match applier.create(entity).await {
            Ok(()) => summary.created.push(entity.name().to_string()),
            Err(err) if err.is_already_exists() => {
                let live = applier.fetch(entity.name()).await?.ok_or(err)?;
                if let Some(diff) = entity.diff(&[&live])? {
                    return Err(mismatch::<E>(entity.name(), diff));
                }
                warn!(
                    kind = E::KIND,
                    name = entity.name(),
                    "Entity was created concurrently and already matches the declaration"
                );
                summary.unchanged.push(entity.name().to_string());
            }
            Err(err) => return Err(err),
        }
    }

    info!("{}", summary);
    Ok(summary)
}
