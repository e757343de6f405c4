use super::*;
use serde_json::json;
use std::cell::RefCell;

/// In-memory table serving fixed pages keyed by cursor.
#[derive(Default)]
struct PagedTable {
    pages: Vec<Page>,
    requested: RefCell<Vec<Option<String>>>,
    batches: RefCell<Vec<usize>>,
}

impl PagedTable {
    fn with_page_sizes(sizes: &[usize]) -> Self {
        let mut pages = Vec::new();
        let mut next_row = 0;
        for (idx, size) in sizes.iter().enumerate() {
            let rows = (0..*size)
                .map(|_| {
                    next_row += 1;
                    row(&format!("rec{next_row}"), json!({ "Award Name": format!("Award {next_row}") }))
                })
                .collect();
            let cursor = (idx + 1 < sizes.len()).then(|| format!("cursor-{}", idx + 1));
            pages.push(Page { rows, cursor });
        }
        Self {
            pages,
            ..Self::default()
        }
    }
}

impl RemoteTable for PagedTable {
    fn fetch_page(&self, _table: &str, cursor: Option<&str>) -> Result<Page, RemoteError> {
        self.requested.borrow_mut().push(cursor.map(str::to_string));
        let idx = match cursor {
            None => 0,
            Some(token) => token
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| RemoteError::Malformed(format!("unknown cursor {token}")))?,
        };
        Ok(self.pages[idx].clone())
    }

    fn update_batch(&self, _table: &str, rows: &[RowUpdate]) -> Result<usize, RemoteError> {
        self.batches.borrow_mut().push(rows.len());
        Ok(rows.len())
    }
}

fn row(id: &str, fields: Value) -> RemoteRow {
    let Value::Object(fields) = fields else {
        panic!("fields must be an object");
    };
    RemoteRow {
        id: id.to_string(),
        fields,
    }
}

#[test]
fn fetch_all_walks_every_page_in_order() {
    let table = PagedTable::with_page_sizes(&[100, 100, 17]);

    let names = fetch_all(&table, "Awards Overview", "Award Name").expect("fetch");

    assert_eq!(names.len(), 217);
    assert_eq!(names[0], "Award 1");
    assert_eq!(names[100], "Award 101");
    assert_eq!(names[216], "Award 217");
    assert_eq!(
        *table.requested.borrow(),
        vec![None, Some("cursor-1".to_string()), Some("cursor-2".to_string())]
    );
}

#[test]
fn empty_and_missing_values_are_skipped() {
    let table = PagedTable {
        pages: vec![Page {
            rows: vec![
                row("a", json!({ "Award Name": "Hugo Award" })),
                row("b", json!({ "Award Name": "   " })),
                row("c", json!({ "Other": "x" })),
                row("d", json!({ "Award Name": "Nebula Award" })),
            ],
            cursor: None,
        }],
        ..PagedTable::default()
    };

    let names = fetch_all(&table, "Awards", "Award Name").expect("fetch");

    assert_eq!(names, vec!["Hugo Award", "Nebula Award"]);
}

#[test]
fn repeated_cursor_is_malformed() {
    struct StuckTable;
    impl RemoteTable for StuckTable {
        fn fetch_page(&self, _table: &str, _cursor: Option<&str>) -> Result<Page, RemoteError> {
            Ok(Page {
                rows: Vec::new(),
                cursor: Some("same".to_string()),
            })
        }
        fn update_batch(&self, _table: &str, _rows: &[RowUpdate]) -> Result<usize, RemoteError> {
            Ok(0)
        }
    }

    let err = fetch_all(&StuckTable, "Awards", "Award Name").expect_err("should stop");
    assert!(matches!(err, RemoteError::Malformed(_)));
}

#[test]
fn fetch_awards_reads_categories_in_both_shapes() {
    let table = PagedTable {
        pages: vec![Page {
            rows: vec![
                row(
                    "rec1",
                    json!({
                        "Award Name": "Hugo Award",
                        "Organization": "WSFS",
                        "Categories": ["Novel", "Novella"]
                    }),
                ),
                row(
                    "rec2",
                    json!({ "Award Name": "Booker Prize", "Categories": "Fiction, , Debut" }),
                ),
                row("rec3", json!({ "Categories": "orphan" })),
            ],
            cursor: None,
        }],
        ..PagedTable::default()
    };

    let records = fetch_awards(&table, "Awards", &RemoteFieldNames::default()).expect("fetch");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Hugo Award");
    assert_eq!(records[0].organization, "WSFS");
    assert_eq!(records[0].categories, vec!["Novel", "Novella"]);
    assert_eq!(records[0].remote_id.as_deref(), Some("rec1"));
    assert_eq!(records[1].categories, vec!["Fiction", "Debut"]);
    assert!(!records[1].is_enriched());
}

#[test]
fn updates_are_sent_in_batches_of_ten() {
    let table = PagedTable::default();
    let updates: Vec<RowUpdate> = (0..23)
        .map(|n| RowUpdate {
            id: format!("rec{n}"),
            fields: Map::new(),
        })
        .collect();

    let updated = update_rows(&table, "Awards", &updates).expect("update");

    assert_eq!(updated, 23);
    assert_eq!(*table.batches.borrow(), vec![10, 10, 3]);
}

#[test]
fn only_records_with_row_ids_produce_updates() {
    let fields = RemoteFieldNames::default();
    let mut record = Record::named("Hugo Award");
    assert!(row_update_for(&record, &fields).is_none());

    record.remote_id = Some("rec42".to_string());
    record.categories = vec!["Novel".to_string(), "Novella".to_string()];
    let update = row_update_for(&record, &fields).expect("update");

    assert_eq!(update.id, "rec42");
    assert_eq!(update.fields["Award Name"], json!("Hugo Award"));
    assert_eq!(update.fields["Categories"], json!("Novel, Novella"));
    assert!(!update.fields.contains_key("Description"));
}
