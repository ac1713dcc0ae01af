//! Contract amendments (append-only change log) and the acting user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tracked-field snapshot of an entity.
pub type Snapshot = BTreeMap<String, Value>;

/// The user (or system process) performing a mutation. Passed explicitly
/// through every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Option<Uuid>,
    pub name: String,
}

impl Actor {
    pub fn user(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            name: name.into(),
        }
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self {
            user_id: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmendmentType {
    ItemUpdated,
    PricePeriodAdded,
}

impl AmendmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemUpdated => "item_updated",
            Self::PricePeriodAdded => "price_period_added",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Compare two snapshots and return the fields whose values differ. Keys
/// present on only one side are reported with `null` on the other.
pub fn compute_diff(old: &Snapshot, new: &Snapshot) -> BTreeMap<String, FieldChange> {
    let mut diff = BTreeMap::new();
    for (key, old_value) in old {
        let new_value = new.get(key).cloned().unwrap_or(Value::Null);
        if *old_value != new_value {
            diff.insert(
                key.clone(),
                FieldChange {
                    old: old_value.clone(),
                    new: new_value,
                },
            );
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) && !new_value.is_null() {
            diff.insert(
                key.clone(),
                FieldChange {
                    old: Value::Null,
                    new: new_value.clone(),
                },
            );
        }
    }
    diff
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContractAmendment {
    pub amendment_id: Uuid,
    pub tenant_id: Uuid,
    pub contract_id: Uuid,
    pub item_id: Option<Uuid>,
    pub amendment_type: String,
    pub changes: Value,
    pub actor_user_id: Option<Uuid>,
    pub actor_name: String,
    pub created_utc: DateTime<Utc>,
}

/// Amendment to append.
#[derive(Debug, Clone)]
pub struct NewAmendment {
    pub contract_id: Uuid,
    pub item_id: Option<Uuid>,
    pub amendment_type: AmendmentType,
    pub changes: BTreeMap<String, FieldChange>,
    pub actor: Actor,
}

impl NewAmendment {
    pub fn changes_json(&self) -> Value {
        serde_json::to_value(&self.changes).unwrap_or(Value::Null)
    }
}
