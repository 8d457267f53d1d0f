//! Medical-expense reimbursement ledger
//!
//! Receipts are submitted as pending and may be reimbursed later. While a
//! receipt is pending its claimable value grows under the ledger's
//! [`GrowthBasis`]; reimbursing it pays `amount * growth factor` and closes it.
//! The realized value is always re-derived from the receipt, never stored.

mod growth;

pub use growth::{GrowthBasis, DAYS_PER_YEAR, DEFAULT_LEDGER_GROWTH_RATE};

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier assigned at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(pub u64);

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReimbursementState {
    Pending,
    Reimbursed { on: NaiveDate },
}

/// A submitted medical expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub amount: f64,
    pub incurred: NaiveDate,
    pub state: ReimbursementState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Receipt {
    pub fn is_pending(&self) -> bool {
        self.state == ReimbursementState::Pending
    }
}

/// Totals across the ledger on a given date
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub as_of: NaiveDate,
    pub pending_count: usize,
    pub pending_principal: f64,
    pub pending_value: f64,
    pub reimbursed_count: usize,
}

/// Receipts plus the growth basis applied to them
#[derive(Debug, Clone, Default)]
pub struct MedicalLedger {
    basis: GrowthBasis,
    receipts: BTreeMap<ReceiptId, Receipt>,
    next_id: u64,
}

impl MedicalLedger {
    pub fn new(basis: GrowthBasis) -> Self {
        Self {
            basis,
            receipts: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn with_fixed_rate(rate: f64) -> Self {
        Self::new(GrowthBasis::FixedRate(rate))
    }

    /// Rebuild a ledger from receipts held by an external store
    pub fn from_receipts(basis: GrowthBasis, receipts: Vec<Receipt>) -> Result<Self> {
        let mut ledger = Self::new(basis);
        for receipt in receipts {
            check_amount(receipt.amount)?;
            if ledger.receipts.contains_key(&receipt.id) {
                return Err(Error::Config(format!("duplicate receipt id {}", receipt.id)));
            }
            ledger.next_id = ledger.next_id.max(receipt.id.0 + 1);
            ledger.receipts.insert(receipt.id, receipt);
        }
        debug!("Ledger rehydrated with {} receipts", ledger.receipts.len());
        Ok(ledger)
    }

    pub fn basis(&self) -> &GrowthBasis {
        &self.basis
    }

    pub fn receipts(&self) -> impl Iterator<Item = &Receipt> {
        self.receipts.values()
    }

    pub fn receipt(&self, id: ReceiptId) -> Option<&Receipt> {
        self.receipts.get(&id)
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    pub fn submit_receipt(&mut self, amount: f64, incurred: NaiveDate) -> Result<ReceiptId> {
        self.submit(amount, incurred, None)
    }

    pub fn submit_with_description(
        &mut self,
        amount: f64,
        incurred: NaiveDate,
        description: impl Into<String>,
    ) -> Result<ReceiptId> {
        self.submit(amount, incurred, Some(description.into()))
    }

    fn submit(
        &mut self,
        amount: f64,
        incurred: NaiveDate,
        description: Option<String>,
    ) -> Result<ReceiptId> {
        check_amount(amount)?;
        // Default-constructed ledgers start at 0
        let id = ReceiptId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.receipts.insert(
            id,
            Receipt {
                id,
                amount,
                incurred,
                state: ReimbursementState::Pending,
                description,
            },
        );
        debug!("Receipt {} submitted: {:.2} incurred {}", id, amount, incurred);
        Ok(id)
    }

    /// What reimbursing `id` on `as_of` would pay, without changing anything
    pub fn pending_value(&self, id: ReceiptId, as_of: NaiveDate) -> Result<f64> {
        let receipt = self.receipts.get(&id).ok_or(Error::UnknownReceipt(id))?;
        if !receipt.is_pending() {
            return Err(Error::AlreadyReimbursed(id));
        }
        self.value_on(receipt, as_of)
    }

    /// Pay out `id` as of `as_of` and close it
    pub fn reimburse(&mut self, id: ReceiptId, as_of: NaiveDate) -> Result<f64> {
        let value = self.pending_value(id, as_of)?;
        let receipt = self.receipts.get_mut(&id).ok_or(Error::UnknownReceipt(id))?;
        receipt.state = ReimbursementState::Reimbursed { on: as_of };
        info!("Receipt {} reimbursed on {}: {:.2}", id, as_of, value);
        Ok(value)
    }

    /// Amount paid for a reimbursed receipt, re-derived from its dates.
    /// `None` while the receipt is still pending.
    pub fn realized_value(&self, id: ReceiptId) -> Result<Option<f64>> {
        let receipt = self.receipts.get(&id).ok_or(Error::UnknownReceipt(id))?;
        match receipt.state {
            ReimbursementState::Pending => Ok(None),
            ReimbursementState::Reimbursed { on } => self.value_on(receipt, on).map(Some),
        }
    }

    /// Drop a receipt (the external store deleted it)
    pub fn remove_receipt(&mut self, id: ReceiptId) -> Result<Receipt> {
        self.receipts.remove(&id).ok_or(Error::UnknownReceipt(id))
    }

    /// Pending receipts incurred after `as_of` are left out of the totals
    pub fn summary(&self, as_of: NaiveDate) -> Result<LedgerSummary> {
        let mut summary = LedgerSummary {
            as_of,
            pending_count: 0,
            pending_principal: 0.0,
            pending_value: 0.0,
            reimbursed_count: 0,
        };

        for receipt in self.receipts.values() {
            match receipt.state {
                ReimbursementState::Reimbursed { .. } => summary.reimbursed_count += 1,
                ReimbursementState::Pending if receipt.incurred <= as_of => {
                    summary.pending_count += 1;
                    summary.pending_principal += receipt.amount;
                    summary.pending_value += self.value_on(receipt, as_of)?;
                }
                ReimbursementState::Pending => {}
            }
        }
        Ok(summary)
    }

    fn value_on(&self, receipt: &Receipt, as_of: NaiveDate) -> Result<f64> {
        if as_of < receipt.incurred {
            return Err(Error::FutureDate {
                incurred: receipt.incurred,
                as_of,
            });
        }
        Ok(receipt.amount * self.basis.factor(receipt.incurred, as_of)?)
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidAmount(amount))
    }
}
