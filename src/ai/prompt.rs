//! Natural-language prompt for the AI forecast.

use chrono::NaiveDate;

use crate::domain::Indicator;

/// What the prompt needs to know about the run.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub indicator: Indicator,
    pub today: NaiveDate,
    pub first_month: NaiveDate,
    pub last_month: NaiveDate,
    /// Name of the attached history file.
    pub file_name: &'a str,
}

pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let today = ctx.today.format("%B %d, %Y");
    let target = ctx.indicator.target_column();
    format!(
        "Assume that you are in {today}. \
Please give me your best forecast of {description}, for {first} to {last}. \
Use the historical data from the attached CSV file named \"{file}\", where \"{target}\" is the target column, \
\"date\" is the date column and the others are exogenous variables. \
Please give me numeric values for these forecasts, in a CSV like format with a header, and nothing more. \
Do not use any information that was not available to you as of {today} to formulate these forecasts.",
        description = ctx.indicator.description(),
        first = ctx.first_month.format("%B %Y"),
        last = ctx.last_month.format("%B %Y"),
        file = ctx.file_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_dates_file_and_cutoff() {
        let ctx = PromptContext {
            indicator: Indicator::Selic,
            today: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            first_month: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            last_month: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            file_name: "selic.csv",
        };
        let p = build_prompt(&ctx);
        assert!(p.starts_with("Assume that you are in July 15, 2024."));
        assert!(p.contains("for July 2024 to June 2025"));
        assert!(p.contains("named \"selic.csv\", where \"selic\" is the target column"));
        assert!(p.contains("Banco Central do Brasil"));
        assert!(p.ends_with("available to you as of July 15, 2024 to formulate these forecasts."));
    }
}
