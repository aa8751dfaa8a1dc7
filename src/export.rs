// 📤 CSV export of expenses (spreadsheet-friendly)

use crate::entities::Expense;
use crate::error::TrackerResult;
use chrono::SecondsFormat;
use std::io::Write;

pub const CSV_HEADER: [&str; 5] = ["Title", "Category", "Amount", "Description", "Created"];

/// Write expenses as CSV with a header row. Quoting is handled by the csv
/// writer; amounts use two decimals.
pub fn write_csv<W: Write>(writer: W, expenses: &[Expense]) -> TrackerResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for expense in expenses {
        let amount = format!("{:.2}", expense.amount);
        let created = expense.created_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        wtr.write_record([
            expense.title.as_str(),
            expense.category.as_str(),
            amount.as_str(),
            expense.description.as_str(),
            created.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(expenses: &[Expense]) -> TrackerResult<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, expenses)?;
    // csv only writes the UTF-8 we hand it
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Default download name, e.g. `expenses_2024-05-01.csv`
pub fn export_filename(date: chrono::NaiveDate) -> String {
    format!("expenses_{}.csv", date.format("%Y-%m-%d"))
}
