use chrono::NaiveDate;

/// Formats an order number as `PREFIX-YYYYMMDD-NNNN`.
///
/// The sequence is zero-padded to four digits and simply grows wider past
/// 9999.
pub fn format_order_number(prefix: &str, day: NaiveDate, sequence: u32) -> String {
    format!("{prefix}-{}-{sequence:04}", day.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_order_number() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(format_order_number("ORD", day, 1), "ORD-20240309-0001");
        assert_eq!(format_order_number("WEB", day, 42), "WEB-20240309-0042");
        assert_eq!(format_order_number("ORD", day, 12345), "ORD-20240309-12345");
    }
}
