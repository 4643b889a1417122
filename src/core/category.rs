//! Grouping of raw journal ref types into report categories.

use std::collections::HashMap;

pub const MARKET_TRANSACTION: &str = "Market Transaction";
pub const CONTRACTS: &str = "Contracts";
pub const PLAYER_WALLET_ACTION: &str = "Player Wallet Action";
pub const CLONE_TAX: &str = "Clone Tax";
pub const INDUSTRY_TAX: &str = "Industry Tax";
pub const PI_TAX: &str = "PI Tax";
pub const KRAB_TAX: &str = "Krab Tax";
pub const JOB_COSTS: &str = "Job Costs";
pub const FEE: &str = "Fee";

const DEFAULT_GROUPS: &[(&str, &str)] = &[
    ("market_transaction", MARKET_TRANSACTION),
    ("brokers_fee", MARKET_TRANSACTION),
    ("transaction_tax", MARKET_TRANSACTION),
    ("market_escrow", MARKET_TRANSACTION),
    ("contract_price", CONTRACTS),
    ("contract_deposit_refund", CONTRACTS),
    ("contract_auction_bid_refund", CONTRACTS),
    ("contract_auction_sold", CONTRACTS),
    ("contract_sales_tax", CONTRACTS),
    ("contract_brokers_fee_corp", CONTRACTS),
    ("contract_auction_bid_corp", CONTRACTS),
    ("contract_deposit_corp", CONTRACTS),
    ("contract_reward_deposited_corp", CONTRACTS),
    ("contract_price_payment_corp", CONTRACTS),
    ("contract_reward_refund", CONTRACTS),
    ("player_donation", PLAYER_WALLET_ACTION),
    ("corporation_account_withdrawal", PLAYER_WALLET_ACTION),
    ("jump_clone_activation_fee", CLONE_TAX),
    ("jump_clone_installation_fee", CLONE_TAX),
    ("industry_job_tax", INDUSTRY_TAX),
    ("reprocessing_tax", INDUSTRY_TAX),
    ("planetary_export_tax", PI_TAX),
    ("planetary_import_tax", PI_TAX),
    ("insurance", KRAB_TAX),
    ("bounty_prizes", KRAB_TAX),
    ("corporate_reward_payout", KRAB_TAX),
    ("project_discovery_reward", KRAB_TAX),
    ("agent_mission_reward", KRAB_TAX),
    ("agent_mission_time_bonus_reward", KRAB_TAX),
    ("ess_escrow_transfer", KRAB_TAX),
    ("researching_technology", JOB_COSTS),
    ("researching_time_productivity", JOB_COSTS),
    ("researching_material_productivity", JOB_COSTS),
    ("copying", JOB_COSTS),
    ("reaction", JOB_COSTS),
    ("manufacturing", JOB_COSTS),
    ("alliance_maintainance_fee", FEE),
    ("office_rental_fee", FEE),
];

/// Immutable mapping from ref type to category.
///
/// Lookups are total: a ref type without an entry is its own category.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    groups: HashMap<String, String>,
}

impl CategoryTable {
    /// Builds a table containing only the given pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            groups: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Default table extended (or overridden) by `overrides`.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (ref_type, category) in overrides {
            table.groups.insert(ref_type.clone(), category.clone());
        }
        table
    }

    pub fn category<'a>(&'a self, ref_type: &'a str) -> &'a str {
        self.groups
            .get(ref_type)
            .map(String::as_str)
            .unwrap_or(ref_type)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_GROUPS.iter().copied())
    }
}
