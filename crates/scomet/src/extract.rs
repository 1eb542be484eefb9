//! Per-field extraction rules for the portal pages.
//!
//! Every rule is a pure function over one page's HTML and is independent of
//! the others: a layout change that breaks one field only empties that
//! field. Failures are logged at `warn` and surface as `None`.
//!
//! The `parse_*` functions take an already parsed [`Html`] and return the
//! reason on failure; the `extract_*` functions take raw text and log it.
//! `scraper` types are `!Send`, so parse only after the last `.await`.

use std::fmt::Debug;

use scraper::{ElementRef, Html, Selector};

use crate::types::{Field, ScometError, ScometResult};

/// Heading of the occupant-count box on the situation page.
pub const OCCUPANTS_MARKER: &str = "Numar curent  persoane";
/// Heading of the outstanding-balance box on the situation page.
pub const SOLD_MARKER: &str = "Sold profilul curent";
/// Heading above the cold-water consumption table.
pub const WATER_HEADING: &str = "Apa rece General";

const TOTAL_LABEL: &str = "Valoare";
const INVOICE_DATE_LABEL: &str = "Data";
const DUE_DATE_LABEL: &str = "Data scadenta";

// ── Page-level extraction ────────────────────────────────────────────────────

/// Values read from the apartment situation page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SituationValues {
    pub occupants: Option<u32>,
    pub sold: Option<f64>,
}

/// Values read from the invoices page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceValues {
    pub total: Option<f64>,
    pub invoice_date: Option<String>,
    pub due_date: Option<String>,
}

/// Parse the situation page once and run both of its rules.
pub fn extract_situation(html: &str) -> SituationValues {
    let document = Html::parse_document(html);
    SituationValues {
        occupants: logged(Field::Occupants, parse_occupants(&document)),
        sold: logged(Field::Sold, parse_sold(&document)),
    }
}

/// Parse the invoices page once and run its three rules.
pub fn extract_invoices(html: &str) -> InvoiceValues {
    let document = Html::parse_document(html);
    InvoiceValues {
        total: logged(Field::Total, parse_total(&document)),
        invoice_date: logged(Field::InvoiceDate, parse_invoice_date(&document)),
        due_date: logged(Field::DueDate, parse_due_date(&document)),
    }
}

// ── Single-field extraction ──────────────────────────────────────────────────

pub fn extract_occupants(html: &str) -> Option<u32> {
    logged(Field::Occupants, parse_occupants(&Html::parse_document(html)))
}

pub fn extract_sold(html: &str) -> Option<f64> {
    logged(Field::Sold, parse_sold(&Html::parse_document(html)))
}

pub fn extract_total(html: &str) -> Option<f64> {
    logged(Field::Total, parse_total(&Html::parse_document(html)))
}

pub fn extract_invoice_date(html: &str) -> Option<String> {
    logged(Field::InvoiceDate, parse_invoice_date(&Html::parse_document(html)))
}

pub fn extract_due_date(html: &str) -> Option<String> {
    logged(Field::DueDate, parse_due_date(&Html::parse_document(html)))
}

pub fn extract_water_consumption(html: &str) -> Option<f64> {
    logged(
        Field::WaterConsumption,
        parse_water_consumption(&Html::parse_document(html)),
    )
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Occupant count from the "Numar curent  persoane" box.
///
/// The portal sometimes renders the count as "4.0"; fractional values are
/// truncated. Negative or out-of-range values are rejected.
pub fn parse_occupants(document: &Html) -> ScometResult<u32> {
    let field = Field::Occupants;
    let text = section_headline(document, OCCUPANTS_MARKER, field)?;
    let value = parse_decimal(&text)
        .ok_or_else(|| ScometError::extraction(field, format!("'{text}' is not a number")))?;
    if !(0.0..=u32::MAX as f64).contains(&value) {
        return Err(ScometError::extraction(
            field,
            format!("{value} is not a valid occupant count"),
        ));
    }
    Ok(value.trunc() as u32)
}

/// Outstanding balance from the "Sold profilul curent" box.
pub fn parse_sold(document: &Html) -> ScometResult<f64> {
    let field = Field::Sold;
    let text = section_headline(document, SOLD_MARKER, field)?;
    parse_decimal(&text)
        .ok_or_else(|| ScometError::extraction(field, format!("'{text}' is not an amount")))
}

/// Value of the most recent invoice.
pub fn parse_total(document: &Html) -> ScometResult<f64> {
    let field = Field::Total;
    let text = labelled_cell(document, TOTAL_LABEL, field)?;
    parse_decimal(&text)
        .ok_or_else(|| ScometError::extraction(field, format!("'{text}' is not an amount")))
}

/// Issue date of the most recent invoice, as displayed.
pub fn parse_invoice_date(document: &Html) -> ScometResult<String> {
    labelled_cell(document, INVOICE_DATE_LABEL, Field::InvoiceDate)
}

/// Due date of the most recent invoice, as displayed.
pub fn parse_due_date(document: &Html) -> ScometResult<String> {
    labelled_cell(document, DUE_DATE_LABEL, Field::DueDate)
}

/// Latest cold-water consumption in m³.
///
/// Reads the first table after the "Apa rece General" heading, then the
/// third cell of the first row that has at least three cells.
pub fn parse_water_consumption(document: &Html) -> ScometResult<f64> {
    let field = Field::WaterConsumption;
    let row_sel = selector("tr", field)?;
    let cell_sel = selector("td", field)?;

    let table = table_after_heading(document, WATER_HEADING, field)?;

    let rows: Vec<ElementRef<'_>> = table.select(&row_sel).collect();
    if rows.len() < 2 {
        return Err(ScometError::extraction(
            field,
            format!("table after '{WATER_HEADING}' has {} row(s)", rows.len()),
        ));
    }

    let cells = rows
        .iter()
        .map(|row| row.select(&cell_sel).collect::<Vec<_>>())
        .find(|cells| cells.len() >= 3)
        .ok_or_else(|| ScometError::extraction(field, "no row with a consumption column"))?;

    let text = element_text(cells[2]).replace('\u{a0}', "");
    parse_decimal(&text)
        .ok_or_else(|| ScometError::extraction(field, format!("'{}' is not a volume", text.trim())))
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Parse a number written with a comma decimal separator ("341,63").
///
/// Whitespace (including NBSP) is ignored. When both `.` and `,` appear, the
/// one that comes first is taken as the thousands separator.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn selector(css: &str, field: Field) -> ScometResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ScometError::extraction(field, format!("bad selector '{css}': {e:?}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Text of the `h1.no-margins` inside the `div.ibox` whose title contains `marker`.
fn section_headline(document: &Html, marker: &str, field: Field) -> ScometResult<String> {
    let title_sel = selector("div.ibox-title", field)?;
    let heading_sel = selector("h5", field)?;
    let value_sel = selector("div.ibox-content h1.no-margins", field)?;
    let marker = collapse_whitespace(marker);

    let title = document
        .select(&title_sel)
        .find(|title| {
            title
                .select(&heading_sel)
                .next()
                .is_some_and(|h5| collapse_whitespace(&element_text(h5)).contains(&marker))
        })
        .ok_or_else(|| ScometError::extraction(field, format!("no section titled '{marker}'")))?;

    let section = title
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div" && has_class(el, "ibox"))
        .ok_or_else(|| ScometError::extraction(field, format!("'{marker}' title has no ibox")))?;

    let value = section
        .select(&value_sel)
        .next()
        .ok_or_else(|| ScometError::extraction(field, format!("no value under '{marker}'")))?;

    Ok(element_text(value).trim().to_string())
}

/// Trimmed text of the first `td` with the given `data-label`.
fn labelled_cell(document: &Html, label: &str, field: Field) -> ScometResult<String> {
    let sel = selector(&format!(r#"td[data-label="{label}"]"#), field)?;
    let cell = document
        .select(&sel)
        .next()
        .ok_or_else(|| ScometError::extraction(field, format!("no cell labelled '{label}'")))?;

    let text = element_text(cell).trim().to_string();
    if text.is_empty() {
        return Err(ScometError::extraction(
            field,
            format!("cell labelled '{label}' is empty"),
        ));
    }
    Ok(text)
}

/// First `table` following an `h5` whose text is `heading`, in document order.
fn table_after_heading<'a>(
    document: &'a Html,
    heading: &str,
    field: Field,
) -> ScometResult<ElementRef<'a>> {
    let mut seen_heading = false;
    for node in document.root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if !seen_heading {
            seen_heading =
                el.value().name() == "h5" && collapse_whitespace(&element_text(el)) == heading;
            continue;
        }
        if el.value().name() == "table" {
            return Ok(el);
        }
    }

    let reason = if seen_heading {
        format!("no table after '{heading}'")
    } else {
        format!("no '{heading}' heading")
    };
    Err(ScometError::extraction(field, reason))
}

fn logged<T: Debug>(field: Field, result: ScometResult<T>) -> Option<T> {
    match result {
        Ok(value) => {
            tracing::debug!("Extracted {field}: {value:?}");
            Some(value)
        }
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITUATION: &str = include_str!("../tests/fixtures/situatie.html");
    const INVOICES: &str = include_str!("../tests/fixtures/facturi.html");
    const WATER: &str = include_str!("../tests/fixtures/consumuri.html");

    fn ibox(title: &str, value: &str) -> String {
        format!(
            r#"<div class="ibox">
                 <div class="ibox-title"><h5>{title}</h5></div>
                 <div class="ibox-content"><h1 class="no-margins">{value}</h1></div>
               </div>"#
        )
    }

    #[test]
    fn test_occupants_from_fixture() {
        assert_eq!(extract_occupants(SITUATION), Some(4));
    }

    #[test]
    fn test_occupants_minimal_fragment() {
        let html = ibox("Numar curent  persoane", "4");
        assert_eq!(extract_occupants(&html), Some(4));
    }

    #[test]
    fn test_occupants_single_space_heading() {
        let html = ibox("Numar curent persoane", "2");
        assert_eq!(extract_occupants(&html), Some(2));
    }

    #[test]
    fn test_occupants_fraction_truncated() {
        assert_eq!(extract_occupants(&ibox(OCCUPANTS_MARKER, "4.0")), Some(4));
        assert_eq!(extract_occupants(&ibox(OCCUPANTS_MARKER, "3,7")), Some(3));
    }

    #[test]
    fn test_occupants_rejects_negative_and_text() {
        assert_eq!(extract_occupants(&ibox(OCCUPANTS_MARKER, "-1")), None);
        assert_eq!(extract_occupants(&ibox(OCCUPANTS_MARKER, "n/a")), None);
    }

    #[test]
    fn test_occupants_missing_section() {
        let html = ibox("Sold profilul curent", "10,00");
        assert_eq!(extract_occupants(&html), None);
    }

    #[test]
    fn test_occupants_value_outside_ibox_ignored() {
        let html = r#"<div class="row">
            <div class="ibox-title"><h5>Numar curent  persoane</h5></div>
            <h1 class="no-margins">4</h1>
        </div>"#;
        assert_eq!(extract_occupants(html), None);
    }

    #[test]
    fn test_sold_from_fixture() {
        assert_eq!(extract_sold(SITUATION), Some(341.63));
    }

    #[test]
    fn test_situation_page_both_fields() {
        let values = extract_situation(SITUATION);
        assert_eq!(
            values,
            SituationValues {
                occupants: Some(4),
                sold: Some(341.63),
            }
        );
    }

    #[test]
    fn test_situation_one_box_broken() {
        let html = format!(
            "{}{}",
            ibox(OCCUPANTS_MARKER, "3"),
            ibox(SOLD_MARKER, "indisponibil")
        );
        let values = extract_situation(&html);
        assert_eq!(values.occupants, Some(3));
        assert_eq!(values.sold, None);
    }

    #[test]
    fn test_invoices_from_fixture() {
        let values = extract_invoices(INVOICES);
        assert_eq!(values.total, Some(125.0));
        assert_eq!(values.invoice_date.as_deref(), Some("01.03.2025"));
        assert_eq!(values.due_date.as_deref(), Some("31.03.2025"));
    }

    #[test]
    fn test_invoice_cells_independent() {
        let html = r#"<table><tr>
            <td data-label="Data">01.03.2025</td>
            <td data-label="Valoare">de calculat</td>
        </tr></table>"#;
        assert_eq!(extract_total(html), None);
        assert_eq!(extract_invoice_date(html).as_deref(), Some("01.03.2025"));
        assert_eq!(extract_due_date(html), None);

        let html = r#"<table><tr>
            <td data-label="Valoare">125,00</td>
        </tr></table>"#;
        assert_eq!(extract_total(html), Some(125.0));
        assert_eq!(extract_invoice_date(html), None);
    }

    #[test]
    fn test_date_label_is_exact() {
        // "Data scadenta" must not satisfy the "Data" rule.
        let html = r#"<table><tr><td data-label="Data scadenta">31.03.2025</td></tr></table>"#;
        assert_eq!(extract_invoice_date(html), None);
        assert_eq!(extract_due_date(html).as_deref(), Some("31.03.2025"));
    }

    #[test]
    fn test_empty_date_cell_is_missing() {
        let html = r#"<table><tr><td data-label="Data">  </td></tr></table>"#;
        assert_eq!(extract_invoice_date(html), None);
    }

    #[test]
    fn test_water_from_fixture() {
        assert_eq!(extract_water_consumption(WATER), Some(7.25));
    }

    #[test]
    fn test_water_table_too_short() {
        let html = r#"<h5>Apa rece General</h5>
            <table><tr><td>02.2025</td><td>100</td><td>5,0</td></tr></table>"#;
        assert_eq!(extract_water_consumption(html), None);
    }

    #[test]
    fn test_water_missing_heading() {
        let html = r#"<h5>Apa calda</h5>
            <table>
              <tr><th>Luna</th><th>Index</th><th>Consum</th></tr>
              <tr><td>02.2025</td><td>100</td><td>5,0</td></tr>
            </table>"#;
        assert_eq!(extract_water_consumption(html), None);
    }

    #[test]
    fn test_water_no_table_after_heading() {
        let html = r#"<table>
              <tr><td>a</td><td>b</td><td>1</td></tr>
              <tr><td>a</td><td>b</td><td>2</td></tr>
            </table>
            <h5>Apa rece General</h5><p>Nu exista citiri.</p>"#;
        assert_eq!(extract_water_consumption(html), None);
    }

    #[test]
    fn test_water_skips_narrow_rows() {
        let html = r#"<h5>Apa rece General</h5>
            <table>
              <tr><td colspan="3">Februarie</td></tr>
              <tr><td>02.2025</td><td>1&nbsp;204</td><td>12,5</td></tr>
            </table>"#;
        assert_eq!(extract_water_consumption(html), Some(12.5));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("341,63"), Some(341.63));
        assert_eq!(parse_decimal("125,00"), Some(125.0));
        assert_eq!(parse_decimal("7,5"), Some(7.5));
        assert_eq!(parse_decimal("12"), Some(12.0));
        assert_eq!(parse_decimal(" 4.0 "), Some(4.0));
        assert_eq!(parse_decimal("1.234,56"), Some(1234.56));
        assert_eq!(parse_decimal("1,234.56"), Some(1234.56));
        assert_eq!(parse_decimal("1\u{a0}204,5"), Some(1204.5));
        assert_eq!(parse_decimal("-15,20"), Some(-15.2));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("lei"), None);
        assert_eq!(parse_decimal("inf"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }
}
