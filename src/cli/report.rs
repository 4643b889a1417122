use super::ui;
use crate::core::{
    Accountant, AccountId, Aggregator, Balance, BalanceByDivision, BalanceByDivisionByType,
    BalanceByType, JournalSource, ThresholdCheck, Window,
};
use crate::store::JournalStore;
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::BTreeSet;

fn titled(title: &str, window: &Window, table: &comfy_table::Table) -> String {
    format!(
        "{}\n\n{}",
        ui::style_text(&format!("{title} {}", window.title()), ui::StyleType::Title),
        table
    )
}

impl Balance {
    pub fn display_as_table(&self, window: &Window) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell(""), ui::header_cell("ISK")]);
        table.add_row(vec![Cell::new("Income"), ui::amount_cell(self.income)]);
        table.add_row(vec![Cell::new("Expenses"), ui::amount_cell(self.expenses)]);
        table.add_row(vec![
            Cell::new(ui::style_text("Balance", ui::StyleType::TotalLabel)),
            ui::total_cell(self.balance()),
        ]);
        titled("Balance", window, &table)
    }
}

impl BalanceByDivision {
    pub fn display_as_table(&self, window: &Window) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Division"),
            ui::header_cell("Income"),
            ui::header_cell("Expenses"),
            ui::header_cell("Balance"),
        ]);

        let divisions: BTreeSet<&String> = self
            .income_by_division
            .keys()
            .chain(self.expenses_by_division.keys())
            .collect();
        for division in divisions {
            let income = self.income_by_division.get(division).copied().unwrap_or(0.0);
            let expenses = self
                .expenses_by_division
                .get(division)
                .copied()
                .unwrap_or(0.0);
            table.add_row(vec![
                Cell::new(division),
                ui::amount_cell(income),
                ui::amount_cell(expenses),
                ui::amount_cell(income + expenses),
            ]);
        }

        let total = self.total();
        table.add_row(vec![
            Cell::new(ui::style_text("Total", ui::StyleType::TotalLabel)),
            ui::total_cell(total.income),
            ui::total_cell(total.expenses),
            ui::total_cell(total.balance()),
        ]);
        titled("Balance by division", window, &table)
    }
}

impl BalanceByType {
    pub fn display_as_table(&self, window: &Window) -> String {
        let mut rows: Vec<(&String, f64)> = self
            .income_by_type
            .iter()
            .chain(self.expenses_by_type.iter())
            .map(|(category, amount)| (category, *amount))
            .filter(|(_, amount)| *amount != 0.0)
            .collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Category"), ui::header_cell("ISK")]);
        for (category, amount) in rows {
            table.add_row(vec![Cell::new(category), ui::amount_cell(amount)]);
        }

        let total = self.total();
        table.add_row(vec![
            Cell::new(ui::style_text("Income", ui::StyleType::TotalLabel)),
            ui::total_cell(total.income),
        ]);
        table.add_row(vec![
            Cell::new(ui::style_text("Expenses", ui::StyleType::TotalLabel)),
            ui::total_cell(total.expenses),
        ]);
        titled("Balance by type", window, &table)
    }
}

/// Daily net balance per division, one row per day.
pub fn daily_table(series: &[BalanceByDivisionByType], window: &Window) -> String {
    let divisions: BTreeSet<&String> = series
        .iter()
        .flat_map(|day| day.income.keys().chain(day.expenses.keys()))
        .collect();

    let mut header = vec![ui::header_cell("Date")];
    header.extend(divisions.iter().map(|d| ui::header_cell(d)));
    header.push(ui::header_cell("Total"));

    let mut table = ui::new_styled_table();
    table.set_header(header);
    for day in series {
        let mut row = vec![Cell::new(day.date.format("%Y-%m-%d"))];
        row.extend(
            divisions
                .iter()
                .map(|d| ui::amount_cell(day.division_balance(d))),
        );
        row.push(ui::total_cell(day.total().balance()));
        table.add_row(row);
    }
    titled("Daily balance", window, &table)
}

impl ThresholdCheck {
    pub fn display(&self) -> String {
        let notification = &self.notification;
        let verdict = if self.below {
            ui::style_text(
                &format!(
                    "{} < {}",
                    ui::format_isk(notification.balance.balance()),
                    ui::format_isk(notification.threshold)
                ),
                ui::StyleType::Error,
            )
        } else {
            ui::style_text(
                &format!(
                    "{} >= {}",
                    ui::format_isk(notification.balance.balance()),
                    ui::format_isk(notification.threshold)
                ),
                ui::StyleType::TotalValue,
            )
        };
        format!(
            "{}\n\n{verdict}\n\nIncome: {}\nExpenses: {}\n\n{}",
            ui::style_text(
                &format!("Monthly balance {}", notification.window.title()),
                ui::StyleType::Title
            ),
            ui::format_isk(notification.balance.income),
            ui::format_isk(notification.balance.expenses),
            ui::style_text(
                "For more details run `walletbook by-division` or `walletbook by-type`",
                ui::StyleType::Subtle
            ),
        )
    }
}

pub async fn balance(accountant: &Accountant, window: Option<Window>) -> Result<()> {
    let window = accountant.resolve_window(window);
    let pb = ui::new_spinner("Fetching wallet journals...");
    let result = accountant.balance(Some(window)).await;
    pb.finish_and_clear();
    println!("{}", result?.display_as_table(&window));
    Ok(())
}

pub async fn by_division(accountant: &Accountant, window: Option<Window>) -> Result<()> {
    let window = accountant.resolve_window(window);
    let pb = ui::new_spinner("Fetching wallet journals...");
    let result = accountant.balance_by_division(Some(window)).await;
    pb.finish_and_clear();
    println!("{}", result?.display_as_table(&window));
    Ok(())
}

pub async fn by_type(accountant: &Accountant, window: Option<Window>) -> Result<()> {
    let window = accountant.resolve_window(window);
    let pb = ui::new_spinner("Fetching wallet journals...");
    let result = accountant.balance_by_type(Some(window)).await;
    pb.finish_and_clear();
    println!("{}", result?.display_as_table(&window));
    Ok(())
}

pub async fn daily(accountant: &Accountant, window: Option<Window>) -> Result<()> {
    let window = accountant.resolve_window(window);
    let pb = ui::new_spinner("Fetching wallet journals...");
    let result = accountant
        .balance_by_day_by_division_by_type(Some(window))
        .await;
    pb.finish_and_clear();
    println!("{}", daily_table(&result?, &window));
    Ok(())
}

pub async fn check(accountant: &Accountant, threshold: f64) -> Result<()> {
    let pb = ui::new_spinner("Checking monthly balance...");
    let result = accountant.monthly_balance_below_threshold(threshold).await;
    pb.finish_and_clear();
    println!("{}", result?.display());
    Ok(())
}

/// Cached record counts and last refresh per division.
pub async fn status(aggregator: &Aggregator) -> Result<()> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Account"),
        ui::header_cell("Division"),
        ui::header_cell("Records"),
        ui::header_cell("Last refresh"),
    ]);

    let store = aggregator.cache().store();
    for source in aggregator.sources() {
        let account: AccountId = source.account();
        let divisions = source
            .divisions()
            .await
            .with_context(|| format!("Failed to list divisions of {account}"))?;
        for division in divisions {
            let count = store.count(&account, division.id).await?;
            let metadata = store.metadata(&account, division.id).await?;
            let refreshed = metadata.updated_at.map_or_else(
                || ui::style_text("never", ui::StyleType::Subtle),
                |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
            table.add_row(vec![
                Cell::new(account.corporation_id),
                Cell::new(division.display_name()),
                Cell::new(count),
                Cell::new(refreshed),
            ]);
        }
    }
    println!("{table}");
    Ok(())
}
