//! Spreadsheet export of a finalized collection.
//!
//! The workbook has four fixed sheets. Rows are assembled as plain strings
//! first so the layout can be checked without reading the file back.
use crate::record::{Record, WinningBook};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

const PLACEHOLDER: &str = "No data available";

#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub name: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
    pub column_width: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub awards: usize,
    pub winning_books: usize,
    pub competitors: usize,
    pub categories: usize,
}

/// Build the rows of every sheet, in workbook order.
pub fn build_sheets(records: &[Record]) -> Vec<SheetData> {
    let overview = records
        .iter()
        .map(|record| {
            vec![
                record.name.clone(),
                record.organization.clone(),
                record.registration_url.clone(),
                record.categories.join(", "),
                record.latest_submission_date.clone().unwrap_or_default(),
                record.description.clone().unwrap_or_default(),
                if record.is_enriched() {
                    "enriched".to_string()
                } else {
                    "not enriched".to_string()
                },
            ]
        })
        .collect();

    let books = records
        .iter()
        .flat_map(|record| {
            record
                .winning_books
                .iter()
                .filter(|book| !book.is_placeholder())
                .map(|book| book_row(&record.name, book))
        })
        .collect();

    let competition = records
        .iter()
        .flat_map(|record| {
            record
                .competitors
                .iter()
                .map(|competitor| vec![record.name.clone(), competitor.clone()])
        })
        .collect();

    let categories = records
        .iter()
        .flat_map(|record| {
            record
                .categories
                .iter()
                .map(|category| vec![record.name.clone(), category.clone()])
        })
        .collect();

    vec![
        SheetData {
            name: "Awards Overview",
            headers: &[
                "Award Name",
                "Organization",
                "Registration URL",
                "Categories",
                "Latest Submission Date",
                "Description",
                "Status",
            ],
            rows: overview,
            column_width: 20.0,
        },
        SheetData {
            name: "Winning Books",
            headers: &[
                "Award Name",
                "Author",
                "Title",
                "Publishing Year",
                "Publisher",
                "ISBN",
                "Link",
            ],
            rows: books,
            column_width: 20.0,
        },
        SheetData {
            name: "Competition",
            headers: &["Award Name", "Competitor"],
            rows: competition,
            column_width: 30.0,
        },
        SheetData {
            name: "Categories",
            headers: &["Award Name", "Category"],
            rows: categories,
            column_width: 30.0,
        },
    ]
}

fn book_row(award: &str, book: &WinningBook) -> Vec<String> {
    vec![
        award.to_string(),
        book.author.clone(),
        book.title.clone(),
        book.year.clone(),
        book.publisher.clone(),
        book.identifier.clone(),
        book.link.clone(),
    ]
}

/// Write `records` to an `.xlsx` workbook at `path`.
pub fn export_workbook(records: &[Record], path: &Path) -> Result<ExportStats> {
    let start = Instant::now();
    let sheets = build_sheets(records);
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x366092))
        .set_align(FormatAlign::Center)
        .set_text_wrap();

    let mut workbook = Workbook::new();
    for sheet in &sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(sheet.name)
            .with_context(|| format!("create sheet {}", sheet.name))?;
        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .with_context(|| format!("write header in {}", sheet.name))?;
            worksheet
                .set_column_width(col as u16, sheet.column_width)
                .with_context(|| format!("size column in {}", sheet.name))?;
        }
        worksheet
            .set_freeze_panes(1, 0)
            .with_context(|| format!("freeze header in {}", sheet.name))?;
        if sheet.rows.is_empty() {
            tracing::warn!(sheet = sheet.name, "no rows; writing placeholder");
            worksheet
                .write_string(1, 0, PLACEHOLDER)
                .with_context(|| format!("write placeholder in {}", sheet.name))?;
            continue;
        }
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                worksheet
                    .write_string(row_idx as u32 + 1, col as u16, value)
                    .with_context(|| format!("write row {} in {}", row_idx + 1, sheet.name))?;
            }
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;

    let stats = ExportStats {
        awards: sheets[0].rows.len(),
        winning_books: sheets[1].rows.len(),
        competitors: sheets[2].rows.len(),
        categories: sheets[3].rows.len(),
    };
    tracing::info!(
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        awards = stats.awards,
        winning_books = stats.winning_books,
        "exported workbook"
    );
    Ok(stats)
}
