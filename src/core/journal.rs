//! Wallet journal value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Name reported for the division whose upstream name is empty.
pub const MAIN_DIVISION: &str = "Main";

/// Identity of one authenticated upstream account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    pub character_id: i64,
    pub corporation_id: i64,
}

impl AccountId {
    pub fn new(character_id: i64, corporation_id: i64) -> Self {
        Self {
            character_id,
            corporation_id,
        }
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "corporation {} (character {})",
            self.corporation_id, self.character_id
        )
    }
}

pub type DivisionId = i32;

/// A wallet division (sub-ledger) of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Division {
    pub id: DivisionId,
    pub name: String,
}

impl Division {
    pub fn new(id: DivisionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Name used in reports; the unnamed primary division becomes "Main".
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            MAIN_DIVISION
        } else {
            &self.name
        }
    }
}

/// One wallet journal entry as returned by the upstream API.
///
/// `amount` is positive when ISK was deposited and negative when it was withdrawn,
/// `balance` is the wallet balance after the transaction. The remaining fields are
/// context that only some ref types populate; they are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    pub amount: f64,
    pub balance: f64,
    pub ref_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub context_id: Option<i64>,
    #[serde(default)]
    pub context_id_type: Option<String>,
    #[serde(default)]
    pub first_party_id: Option<i32>,
    #[serde(default)]
    pub second_party_id: Option<i32>,
    #[serde(default)]
    pub tax: Option<f64>,
    #[serde(default)]
    pub tax_receiver_id: Option<i32>,
}

impl LedgerRecord {
    /// Minimal record, mostly useful for adapters and tests that fill context later.
    pub fn new(
        id: i64,
        amount: f64,
        ref_type: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            amount,
            balance: 0.0,
            ref_type: ref_type.into(),
            timestamp,
            description: String::new(),
            reason: None,
            context_id: None,
            context_id_type: None,
            first_party_id: None,
            second_party_id: None,
            tax: None,
            tax_receiver_id: None,
        }
    }

    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }

    /// Checks the fields aggregation relies on.
    pub fn validate(&self) -> Result<(), String> {
        if !self.amount.is_finite() {
            return Err(format!("record {} has non-finite amount", self.id));
        }
        if !self.balance.is_finite() {
            return Err(format!("record {} has non-finite balance", self.id));
        }
        if self.ref_type.is_empty() {
            return Err(format!("record {} has empty ref_type", self.id));
        }
        Ok(())
    }
}
