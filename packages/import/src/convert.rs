//! Row validation and conversion to insertable records.

use unclaimed_property_models::NewPropertyRecord;

use crate::CsvRecord;

/// Parses a money or share amount, ignoring everything but digits, `.`
/// and `-`.
///
/// The longest leading number is taken, so `"12.50-"` is `12.5` and
/// `"1.2.3"` is `1.2`. Input with no leading number is `0.0`.
#[must_use]
pub fn parse_decimal(value: &str) -> f64 {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned[..numeric_prefix_len(&cleaned)].parse().unwrap_or(0.0)
}

/// Length of the leading `-?digits(.digits)?` run of `s`.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut seen_dot = false;

    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    end
}

/// Parses a count, ignoring everything but digits and `-`. Unparseable
/// input is `0`.
#[must_use]
pub fn parse_int(value: &str) -> i64 {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    cleaned.parse().unwrap_or(0)
}

/// Returns one message per missing required field.
#[must_use]
pub fn validate(record: &CsvRecord) -> Vec<String> {
    [
        (&record.property_id, "Property ID is required"),
        (&record.owner_name, "Owner name is required"),
        (&record.property_type, "Property type is required"),
    ]
    .into_iter()
    .filter(|(value, _)| value.trim().is_empty())
    .map(|(_, message)| message.to_string())
    .collect()
}

#[must_use]
pub fn to_new_record(record: &CsvRecord) -> NewPropertyRecord {
    NewPropertyRecord {
        property_id: record.property_id.clone(),
        property_type: record.property_type.clone(),
        cash_reported: parse_decimal(&record.cash_reported),
        shares_reported: parse_decimal(&record.shares_reported),
        name_of_securities_reported: record.name_of_securities_reported.clone(),
        no_of_owners: record.no_of_owners.clone(),
        owner_name: record.owner_name.clone(),
        owner_street_1: record.owner_street_1.clone(),
        owner_street_2: record.owner_street_2.clone(),
        owner_street_3: record.owner_street_3.clone(),
        owner_city: record.owner_city.clone(),
        owner_state: record.owner_state.clone(),
        owner_zip: record.owner_zip.clone(),
        owner_country_code: record.owner_country_code.clone(),
        current_cash_balance: parse_decimal(&record.current_cash_balance),
        number_of_pending_claims: parse_int(&record.number_of_pending_claims),
        number_of_paid_claims: parse_int(&record.number_of_paid_claims),
        holder_name: record.holder_name.clone(),
        holder_street_1: record.holder_street_1.clone(),
        holder_street_2: record.holder_street_2.clone(),
        holder_street_3: record.holder_street_3.clone(),
        holder_city: record.holder_city.clone(),
        holder_state: record.holder_state.clone(),
        holder_zip: record.holder_zip.clone(),
        cusip: record.cusip.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_drop_currency_noise() {
        assert!((parse_decimal("$1,234.50") - 1234.5).abs() < f64::EPSILON);
        assert!((parse_decimal("-12.25") - -12.25).abs() < f64::EPSILON);
        assert!(parse_decimal("").abs() < f64::EPSILON);
        assert!(parse_decimal("n/a").abs() < f64::EPSILON);
    }

    #[test]
    fn decimals_take_the_leading_number() {
        assert!((parse_decimal("12.50-") - 12.5).abs() < f64::EPSILON);
        assert!((parse_decimal("1.2.3") - 1.2).abs() < f64::EPSILON);
        assert!((parse_decimal("-.5") - -0.5).abs() < f64::EPSILON);
        assert!((parse_decimal("7.") - 7.0).abs() < f64::EPSILON);
        assert!(parse_decimal("-").abs() < f64::EPSILON);
        assert!(parse_decimal("--3").abs() < f64::EPSILON);
        assert!(parse_decimal(".").abs() < f64::EPSILON);
    }

    #[test]
    fn ints_drop_noise_and_default_to_zero() {
        assert_eq!(parse_int("1,024"), 1024);
        assert_eq!(parse_int("-3"), -3);
        assert_eq!(parse_int("2.5"), 25);
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_int("1-2"), 0);
    }

    #[test]
    fn validation_lists_every_missing_field() {
        let record = CsvRecord {
            property_id: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            validate(&record),
            [
                "Property ID is required",
                "Owner name is required",
                "Property type is required"
            ]
        );

        let ok = CsvRecord {
            property_id: "1".to_string(),
            owner_name: "JANE DOE".to_string(),
            property_type: "CK15".to_string(),
            ..Default::default()
        };
        assert!(validate(&ok).is_empty());
    }

    #[test]
    fn converts_numeric_columns() {
        let record = CsvRecord {
            property_id: "P1".to_string(),
            cash_reported: "$10.00".to_string(),
            current_cash_balance: "bogus".to_string(),
            number_of_pending_claims: "3".to_string(),
            owner_country_code: "US".to_string(),
            ..Default::default()
        };
        let new = to_new_record(&record);
        assert!((new.cash_reported - 10.0).abs() < f64::EPSILON);
        assert!(new.current_cash_balance.abs() < f64::EPSILON);
        assert_eq!(new.number_of_pending_claims, 3);
        assert_eq!(new.number_of_paid_claims, 0);
        assert_eq!(new.owner_country_code, "US");
    }
}
