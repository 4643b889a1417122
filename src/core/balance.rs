//! Summary shapes produced by the aggregator.
//!
//! Every shape keeps income (positive) and expenses (negative) apart and can be
//! summed with another value of the same shape. Summation is plain addition per
//! key, so combining per-account partials is independent of account order.

use super::window::Window;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub type AmountByKey = BTreeMap<String, f64>;

fn sum_into(target: &mut AmountByKey, other: &AmountByKey) {
    for (key, amount) in other {
        *target.entry(key.clone()).or_insert(0.0) += amount;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Balance {
    pub income: f64,
    pub expenses: f64,
}

impl Balance {
    /// Net result; expenses are stored negative.
    pub fn balance(&self) -> f64 {
        self.income + self.expenses
    }

    pub fn record(&mut self, amount: f64) {
        if amount > 0.0 {
            self.income += amount;
        } else if amount < 0.0 {
            self.expenses += amount;
        }
    }

    pub fn sum(&mut self, other: &Balance) {
        self.income += other.income;
        self.expenses += other.expenses;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceByType {
    pub income_by_type: AmountByKey,
    pub expenses_by_type: AmountByKey,
}

impl BalanceByType {
    pub fn record(&mut self, category: &str, amount: f64) {
        if amount > 0.0 {
            *self.income_by_type.entry(category.to_string()).or_insert(0.0) += amount;
        } else if amount < 0.0 {
            *self
                .expenses_by_type
                .entry(category.to_string())
                .or_insert(0.0) += amount;
        }
    }

    pub fn sum(&mut self, other: &BalanceByType) {
        sum_into(&mut self.income_by_type, &other.income_by_type);
        sum_into(&mut self.expenses_by_type, &other.expenses_by_type);
    }

    pub fn total(&self) -> Balance {
        Balance {
            income: self.income_by_type.values().sum(),
            expenses: self.expenses_by_type.values().sum(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceByDivision {
    pub income_by_division: AmountByKey,
    pub expenses_by_division: AmountByKey,
}

impl BalanceByDivision {
    /// Registers a division so it shows up with zero totals when it had no activity.
    pub fn touch(&mut self, division: &str) {
        self.income_by_division
            .entry(division.to_string())
            .or_insert(0.0);
        self.expenses_by_division
            .entry(division.to_string())
            .or_insert(0.0);
    }

    pub fn record(&mut self, division: &str, amount: f64) {
        if amount > 0.0 {
            *self
                .income_by_division
                .entry(division.to_string())
                .or_insert(0.0) += amount;
        } else if amount < 0.0 {
            *self
                .expenses_by_division
                .entry(division.to_string())
                .or_insert(0.0) += amount;
        }
    }

    pub fn sum(&mut self, other: &BalanceByDivision) {
        sum_into(&mut self.income_by_division, &other.income_by_division);
        sum_into(&mut self.expenses_by_division, &other.expenses_by_division);
    }

    pub fn total(&self) -> Balance {
        Balance {
            income: self.income_by_division.values().sum(),
            expenses: self.expenses_by_division.values().sum(),
        }
    }
}

/// Division name to category totals.
pub type AmountByDivisionByType = BTreeMap<String, AmountByKey>;

/// One day of the per-day series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceByDivisionByType {
    pub date: NaiveDate,
    pub income: AmountByDivisionByType,
    pub expenses: AmountByDivisionByType,
}

impl BalanceByDivisionByType {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            income: BTreeMap::new(),
            expenses: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, division: &str) {
        self.income.entry(division.to_string()).or_default();
        self.expenses.entry(division.to_string()).or_default();
    }

    pub fn record(&mut self, division: &str, category: &str, amount: f64) {
        let side = if amount > 0.0 {
            &mut self.income
        } else if amount < 0.0 {
            &mut self.expenses
        } else {
            return;
        };
        *side
            .entry(division.to_string())
            .or_default()
            .entry(category.to_string())
            .or_insert(0.0) += amount;
    }

    pub fn sum(&mut self, other: &BalanceByDivisionByType) {
        for (division, by_type) in &other.income {
            sum_into(self.income.entry(division.clone()).or_default(), by_type);
        }
        for (division, by_type) in &other.expenses {
            sum_into(self.expenses.entry(division.clone()).or_default(), by_type);
        }
    }

    /// Net result of one division on this day.
    pub fn division_balance(&self, division: &str) -> f64 {
        let income: f64 = self
            .income
            .get(division)
            .map_or(0.0, |by_type| by_type.values().sum());
        let expenses: f64 = self
            .expenses
            .get(division)
            .map_or(0.0, |by_type| by_type.values().sum());
        income + expenses
    }

    pub fn total(&self) -> Balance {
        let income = self.income.values().flat_map(|m| m.values()).sum();
        let expenses = self.expenses.values().flat_map(|m| m.values()).sum();
        Balance { income, expenses }
    }
}

/// Result of a monthly threshold check, handed to notification collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBalanceNotification {
    pub threshold: f64,
    pub balance: Balance,
    pub window: Window,
}
