//! # State Views
//!
//! The read interface shared by committed stores and in-flight
//! transformations. The pipeline only ever sees a `StateView`, which is
//! how read-your-writes inside a batch comes for free.
//!
//! Field values are never stored directly: they are reconstructed by
//! walking an object's history newest-first and keeping the first update
//! seen for each field, until the creation update is consumed.

use crate::errors::StoreError;
use shared_types::{
    ConsensusConfig, FieldSignature, Request, Response, StorageReference, StorageValue,
    TransactionReference, Update,
};
use std::collections::BTreeMap;

/// The current, fully folded state of one storage object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectState {
    /// The class the object was created with.
    pub class: String,
    /// Live value of every field ever assigned, newest wins.
    pub fields: BTreeMap<FieldSignature, StorageValue>,
}

impl ObjectState {
    /// The live value of `field`, if assigned.
    #[must_use]
    pub fn field(&self, field: &FieldSignature) -> Option<&StorageValue> {
        self.fields.get(field)
    }
}

/// Read access to one consistent state: a committed snapshot, or a
/// transformation overlaying its staged effects.
pub trait StateView {
    /// The response of a delivered transaction, if present.
    fn get_response(&self, reference: &TransactionReference)
        -> Result<Option<Response>, StoreError>;

    /// The request of a delivered transaction, if present.
    fn get_request(&self, reference: &TransactionReference) -> Result<Option<Request>, StoreError>;

    /// The newest-first list of transactions that updated `object`.
    /// Empty for unknown objects.
    fn get_history(&self, object: &StorageReference)
        -> Result<Vec<TransactionReference>, StoreError>;

    /// The manifest pointer, once initialization has set it.
    fn get_manifest(&self) -> Result<Option<StorageReference>, StoreError>;

    /// The consensus snapshot this state was built under.
    fn get_consensus(&self) -> Result<Option<ConsensusConfig>, StoreError>;

    /// Folds the live state of `object` out of its history.
    ///
    /// Returns `None` for objects with no history. A history that is
    /// exhausted without reaching the creation update means the store has
    /// lost the object's origin: that is corruption, not absence.
    fn get_state(&self, object: &StorageReference) -> Result<Option<ObjectState>, StoreError> {
        let history = self.get_history(object)?;
        if history.is_empty() {
            return Ok(None);
        }

        let mut fields = BTreeMap::new();
        let mut class: Option<String> = None;

        for transaction in &history {
            let response = self.get_response(transaction)?.ok_or_else(|| {
                StoreError::Corrupted(format!(
                    "history of {object} references {transaction} which has no response"
                ))
            })?;
            for update in response.updates() {
                if update.object() != object {
                    continue;
                }
                match update {
                    Update::ClassTag { class: tag, .. } => class = Some(tag.clone()),
                    Update::Field { field, value, .. } => {
                        fields.entry(field.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
            if class.is_some() {
                // The creation update has been consumed; older entries
                // cannot exist for this object.
                break;
            }
        }

        let class = class.ok_or_else(|| {
            StoreError::Corrupted(format!("history of {object} has no creation update"))
        })?;
        Ok(Some(ObjectState { class, fields }))
    }

    /// The live value of one field, or `None` if the object or the field
    /// is absent. This is the optional-typed getter: a missing creation
    /// update surfaces as `None` here, not as corruption.
    fn get_field(
        &self,
        object: &StorageReference,
        field: &FieldSignature,
    ) -> Result<Option<StorageValue>, StoreError> {
        for transaction in self.get_history(object)? {
            let response = self.get_response(&transaction)?.ok_or_else(|| {
                StoreError::Corrupted(format!(
                    "history of {object} references {transaction} which has no response"
                ))
            })?;
            let mut created_here = false;
            for update in response.updates() {
                if update.object() != object {
                    continue;
                }
                match update {
                    Update::Field { field: f, value, .. } if f == field => {
                        return Ok(Some(value.clone()));
                    }
                    Update::ClassTag { .. } => created_here = true,
                    Update::Field { .. } => {}
                }
            }
            if created_here {
                break;
            }
        }
        Ok(None)
    }
}
