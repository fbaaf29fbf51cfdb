//! Descriptor engines and the adapter that isolates their failures.
//!
//! A [`DescriptorSource`] turns one SMILES string into an ordered vector of
//! numeric descriptors. The [`DescriptorAdapter`] wraps a source so that no
//! failure inside the engine (rejection, panic, overrun, malformed output)
//! can escape: every call yields a [`DescriptorVector`].
//!
//! # Implementing a source
//!
//! ```rust,ignore
//! use lex_descriptors::descriptors::DescriptorSource;
//! use lex_descriptors::types::{ColumnSpec, DescriptorType, DescriptorVector, InvalidReason};
//!
//! struct LengthSource;
//!
//! impl DescriptorSource for LengthSource {
//!     fn name(&self) -> &str {
//!         "Length"
//!     }
//!
//!     fn schema(&self) -> Vec<ColumnSpec> {
//!         vec![
//!             ColumnSpec::new("Length_calculated", DescriptorType::Bool),
//!             ColumnSpec::float("SmilesLength"),
//!         ]
//!     }
//!
//!     fn process(&self, smiles: &str) -> DescriptorVector {
//!         if smiles.is_empty() {
//!             return DescriptorVector::Invalid(InvalidReason::rejected("empty"));
//!         }
//!         DescriptorVector::Valid(vec![smiles.len() as f64])
//!     }
//! }
//! ```

mod graph;
mod smiles;

pub use graph::GraphDescriptorSource;
pub use smiles::{Atom, Bond, BondOrder, MolecularGraph, SmilesError, parse_smiles};

use crate::error::{FeaturizeError, Result};
use crate::types::{ColumnSpec, DescriptorVector, InvalidReason};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// A descriptor engine.
///
/// Implementations must be `Send + Sync`; the pipeline shares one instance
/// for the whole run and may call it from a worker thread when a timeout
/// is configured.
pub trait DescriptorSource: Send + Sync {
    /// Short engine name used in logs and reports.
    fn name(&self) -> &str;

    /// Ordered column schema. The first entry is the validity flag and is
    /// not part of the feature columns.
    fn schema(&self) -> Vec<ColumnSpec>;

    /// Compute descriptors for one identifier.
    ///
    /// A valid vector holds one value per schema entry after the flag.
    fn process(&self, smiles: &str) -> DescriptorVector;
}

/// Wraps a [`DescriptorSource`] and guarantees a [`DescriptorVector`] for
/// every identifier.
pub struct DescriptorAdapter {
    source: Arc<dyn DescriptorSource>,
    feature_columns: Vec<ColumnSpec>,
    timeout: Option<Duration>,
}

static_assertions::assert_impl_all!(DescriptorAdapter: Send, Sync);

impl DescriptorAdapter {
    /// Create an adapter, querying the source schema once.
    ///
    /// # Errors
    ///
    /// Returns [`FeaturizeError::DescriptorSchema`] if the source reports no
    /// columns at all (not even the validity flag).
    pub fn new(source: Arc<dyn DescriptorSource>) -> Result<Self> {
        let mut schema = source.schema();
        if schema.is_empty() {
            return Err(FeaturizeError::DescriptorSchema(source.name().to_string()));
        }
        let flag = schema.remove(0);
        debug!(
            "Descriptor source '{}': flag '{}', {} feature columns",
            source.name(),
            flag.name,
            schema.len()
        );

        Ok(Self {
            source,
            feature_columns: schema,
            timeout: None,
        })
    }

    /// Limit how long a single molecule may take.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the wrapped source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Full schema of the wrapped source, validity flag included.
    pub fn schema(&self) -> Vec<ColumnSpec> {
        self.source.schema()
    }

    /// Feature columns (schema without the validity flag).
    pub fn feature_columns(&self) -> &[ColumnSpec] {
        &self.feature_columns
    }

    /// Feature column names in order.
    pub fn feature_names(&self) -> Vec<String> {
        self.feature_columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.feature_columns.len()
    }

    /// Compute descriptors for one identifier. Never panics.
    pub fn compute(&self, smiles: &str) -> DescriptorVector {
        let vector = match self.timeout {
            Some(limit) => self.compute_with_timeout(smiles, limit),
            None => guarded_process(self.source.as_ref(), smiles),
        };

        match vector {
            DescriptorVector::Valid(values) if values.len() != self.width() => {
                warn!(
                    "Descriptor source '{}' returned {} values for '{}', expected {}",
                    self.source.name(),
                    values.len(),
                    smiles,
                    self.width()
                );
                DescriptorVector::Invalid(InvalidReason::WidthMismatch {
                    expected: self.width(),
                    actual: values.len(),
                })
            }
            other => other,
        }
    }

    fn compute_with_timeout(&self, smiles: &str, limit: Duration) -> DescriptorVector {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let owned = smiles.to_string();

        let spawned = thread::Builder::new()
            .name("descriptor-worker".to_string())
            .spawn(move || {
                // the receiver may have given up already
                let _ = tx.send(guarded_process(source.as_ref(), &owned));
            });

        if let Err(e) = spawned {
            warn!("Could not spawn descriptor worker ({}), computing inline", e);
            return guarded_process(self.source.as_ref(), smiles);
        }

        match rx.recv_timeout(limit) {
            Ok(vector) => vector,
            Err(RecvTimeoutError::Timeout) => {
                debug!("Descriptor computation for '{}' timed out", smiles);
                DescriptorVector::Invalid(InvalidReason::TimedOut {
                    limit_ms: limit.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => DescriptorVector::Invalid(InvalidReason::Panicked),
        }
    }
}

/// Run the source, mapping a panic to `Invalid(Panicked)`.
fn guarded_process(source: &dyn DescriptorSource, smiles: &str) -> DescriptorVector {
    match catch_unwind(AssertUnwindSafe(|| source.process(smiles))) {
        Ok(vector) => vector,
        Err(_) => {
            warn!(
                "Descriptor source '{}' panicked on '{}'",
                source.name(),
                smiles
            );
            DescriptorVector::Invalid(InvalidReason::Panicked)
        }
    }
}
