// Client-side view filter: free-text search plus one categorical selector
//
// Everything here is a pure function of the loaded records; nothing talks
// to the backend.

use crate::query::Constraint;
use crate::record::Record;
use serde::Serialize;
use serde_json::Value;

/// Selector key that disables the categorical predicate.
pub const ALL: &str = "all";

/// True when any of `fields` contains `needle` (already lowercased).
pub fn matches_search(record: &Record, fields: &[String], needle: &str) -> bool {
    fields.iter().any(|field| {
        record
            .text(field)
            .map(|text| text.to_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

/// Case-insensitive substring search over string fields.
///
/// An empty (or whitespace-only) term keeps every record. Null and
/// non-string fields never match. Input order is preserved.
pub fn search<'a, I>(records: I, fields: &[String], term: &str) -> Vec<&'a Record>
where
    I: IntoIterator<Item = &'a Record>,
{
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return records.into_iter().collect();
    }
    records
        .into_iter()
        .filter(|record| matches_search(record, fields, &needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOption {
    /// Selector key (what the user picks).
    pub key: String,
    pub label: String,
    /// Value the filtered field must equal.
    pub value: Value,
}

impl FilterOption {
    pub fn new(key: &str, label: &str, value: impl Into<Value>) -> Self {
        FilterOption {
            key: key.to_string(),
            label: label.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOptions {
    /// Fixed list, e.g. active / inactive.
    Static(Vec<FilterOption>),
    /// One option per loaded record: key and value come from `value_field`,
    /// the label from `label_fields` ("Name (code)").
    FromRecords {
        value_field: String,
        label_fields: Vec<String>,
    },
}

/// Categorical selector narrowing a view by field equality.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalFilter {
    pub field: String,
    pub label: String,
    pub all_label: String,
    pub options: FilterOptions,
}

impl CategoricalFilter {
    /// Active / inactive selector over a boolean field.
    pub fn status(field: &str) -> Self {
        CategoricalFilter {
            field: field.to_string(),
            label: "Status".to_string(),
            all_label: "All".to_string(),
            options: FilterOptions::Static(vec![
                FilterOption::new("active", "Active", true),
                FilterOption::new("inactive", "Inactive", false),
            ]),
        }
    }

    /// Pick one record by its key field, labelled from other fields.
    pub fn by_record(field: &str, label: &str, label_fields: &[&str]) -> Self {
        CategoricalFilter {
            field: field.to_string(),
            label: label.to_string(),
            all_label: format!("All {}", label),
            options: FilterOptions::FromRecords {
                value_field: field.to_string(),
                label_fields: label_fields.iter().map(|f| f.to_string()).collect(),
            },
        }
    }

    /// Options offered for the given records, "all" first.
    pub fn options(&self, records: &[Record]) -> Vec<FilterOption> {
        let mut options = vec![FilterOption::new(ALL, &self.all_label, Value::Null)];
        match &self.options {
            FilterOptions::Static(list) => options.extend(list.iter().cloned()),
            FilterOptions::FromRecords {
                value_field,
                label_fields,
            } => {
                for record in records {
                    let (Some(key), Some(value)) = (record.key(value_field), record.get(value_field)) else {
                        continue;
                    };
                    if options.iter().any(|o| o.key == key) {
                        continue;
                    }
                    options.push(FilterOption {
                        label: record_label(record, label_fields).unwrap_or_else(|| key.clone()),
                        key,
                        value: value.clone(),
                    });
                }
            }
        }
        options
    }

    /// Option a selection refers to. `None` (predicate disabled) for unset,
    /// "all" and keys that match no option.
    pub fn resolve(&self, records: &[Record], selection: Option<&str>) -> Option<FilterOption> {
        let key = selection.map(str::trim).filter(|k| !k.is_empty() && *k != ALL)?;
        self.options(records).into_iter().find(|o| o.key == key)
    }

    /// Keep records whose field equals the option's value.
    pub fn apply<'a>(&self, records: Vec<&'a Record>, option: &FilterOption) -> Vec<&'a Record> {
        let constraint = Constraint::Eq {
            column: self.field.clone(),
            value: option.value.clone(),
        };
        records.into_iter().filter(|r| constraint.matches(r)).collect()
    }
}

fn record_label(record: &Record, fields: &[String]) -> Option<String> {
    let mut parts = fields.iter().filter_map(|f| record.key(f));
    let head = parts.next()?;
    let rest: Vec<String> = parts.collect();
    if rest.is_empty() {
        Some(head)
    } else {
        Some(format!("{} ({})", head, rest.join(", ")))
    }
}

/// Search then narrow by the selected category.
pub fn filter_records<'a>(
    records: &'a [Record],
    search_fields: &[String],
    term: &str,
    filter: Option<&CategoricalFilter>,
    selection: Option<&str>,
) -> Vec<&'a Record> {
    let searched = search(records, search_fields, term);
    match filter.and_then(|f| f.resolve(records, selection).map(|o| (f, o))) {
        Some((filter, option)) => filter.apply(searched, &option),
        None => searched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn currencies() -> Vec<Record> {
        vec![
            Record::new().with("id", "1").with("code", "USD").with("name", "US Dollar").with("is_active", true),
            Record::new().with("id", "2").with("code", "EUR").with("name", "Euro").with("is_active", false),
        ]
    }

    #[test]
    fn test_currency_scenario() {
        let records = currencies();
        let search_fields = fields(&["code", "name"]);
        let status = CategoricalFilter::status("is_active");

        let active = filter_records(&records, &search_fields, "", Some(&status), Some("active"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].text("code"), Some("USD"));

        let eur = filter_records(&records, &search_fields, "eur", Some(&status), Some(ALL));
        assert_eq!(eur.len(), 1);
        assert_eq!(eur[0].text("code"), Some("EUR"));
    }

    #[test]
    fn test_empty_term_returns_everything_in_order() {
        let records = currencies();
        let result = search(&records, &fields(&["name"]), "   ");
        let ids: Vec<&str> = result.iter().filter_map(|r| r.text("id")).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_search_results_contain_term() {
        let records = vec![
            Record::new().with("name", "Acme").with("domain", "acme.example").with("contact_email", Value::Null),
            Record::new().with("name", "Globex").with("domain", Value::Null).with("contact_email", "ops@ACME.example"),
            Record::new().with("name", "Initech").with("domain", "initech.example").with("contact_email", "x@y.z"),
        ];
        let search_fields = fields(&["name", "domain", "contact_email"]);

        let result = search(&records, &search_fields, "AcMe");
        assert_eq!(result.len(), 2);
        for record in &result {
            assert!(matches_search(record, &search_fields, "acme"));
        }

        assert!(search(&records, &search_fields, "nothing-here").is_empty());
    }

    #[test]
    fn test_selector_values_narrow_by_equality() {
        let records = currencies();
        let status = CategoricalFilter::status("is_active");

        let inactive = filter_records(&records, &[], "", Some(&status), Some("inactive"));
        assert!(inactive.iter().all(|r| r.flag("is_active") == Some(false)));
        assert_eq!(inactive.len(), 1);

        assert_eq!(filter_records(&records, &[], "", Some(&status), None).len(), 2);
        assert_eq!(filter_records(&records, &[], "", Some(&status), Some("bogus")).len(), 2);
    }

    #[test]
    fn test_record_derived_options() {
        let languages = vec![
            Record::new().with("id", "l1").with("name", "English").with("code", "en"),
            Record::new().with("id", "l2").with("name", "Spanish").with("code", "es"),
        ];
        let selector = CategoricalFilter::by_record("id", "Languages", &["name", "code"]);

        let options = selector.options(&languages);
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["All Languages", "English (en)", "Spanish (es)"]);

        let picked = filter_records(&languages, &fields(&["name"]), "", Some(&selector), Some("l2"));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].text("code"), Some("es"));
    }
}
