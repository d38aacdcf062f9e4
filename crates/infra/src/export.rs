//! CSV rendering of the product catalog.

use chrono::SecondsFormat;

use stockledger_products::Product;

pub const EXPORT_HEADERS: [&str; 7] = [
    "SKU",
    "Name",
    "Category",
    "Current Stock",
    "Min Stock",
    "Description",
    "Created At",
];

/// Quote a field if it contains a delimiter, quote or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<I, T>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let row: Vec<String> = fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()))
        .collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Header row plus one row per product, in the given order.
pub fn render_products_csv(products: &[Product]) -> String {
    let mut out = String::new();
    push_row(&mut out, EXPORT_HEADERS);
    for p in products {
        push_row(
            &mut out,
            [
                p.sku().to_string(),
                p.name().to_string(),
                p.category().to_string(),
                p.current_stock().to_string(),
                p.min_stock().to_string(),
                p.description().to_string(),
                p.created_at().to_rfc3339_opts(SecondsFormat::Secs, true),
            ],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockledger_core::ProductId;
    use stockledger_products::ProductDetails;

    #[test]
    fn plain_fields_are_untouched() {
        assert_eq!(escape_field("Widget"), "Widget");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn empty_catalog_is_header_only() {
        assert_eq!(
            render_products_csv(&[]),
            "SKU,Name,Category,Current Stock,Min Stock,Description,Created At\n"
        );
    }

    #[test]
    fn rows_follow_header_order() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let p = Product::create(
            ProductId::new(),
            ProductDetails {
                sku: "A1".to_string(),
                name: "Bolt, steel".to_string(),
                description: "M8 \"hex\"".to_string(),
                category: "Hardware".to_string(),
                current_stock: 40,
                min_stock: 5,
            },
            created,
        )
        .unwrap();

        let csv = render_products_csv(&[p]);
        let mut lines = csv.lines();
        lines.next();
        assert_eq!(
            lines.next().unwrap(),
            "A1,\"Bolt, steel\",Hardware,40,5,\"M8 \"\"hex\"\"\",2024-03-01T12:00:00Z"
        );
        assert!(lines.next().is_none());
    }
}
