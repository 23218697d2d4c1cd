#![forbid(unsafe_code)]

use time::{Date, Month};

/// Parses protocol dates written the way the survey clerks wrote them,
/// e.g. `15 maja 1930 rok`.
pub fn parse_protocol_date(value: &str) -> Option<Date> {
    let lowered = value.to_lowercase().replace("rok", "");
    let mut parts = lowered.split_whitespace();
    let day = parts.next()?.trim_end_matches('.').parse::<u8>().ok()?;
    let month = month_from_genitive(parts.next()?)?;
    let year = parts.next()?.trim_end_matches('.').parse::<i32>().ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

fn month_from_genitive(name: &str) -> Option<Month> {
    let month = match name {
        "stycznia" => Month::January,
        "luty" | "lutego" => Month::February,
        "marca" => Month::March,
        "kwietnia" => Month::April,
        "maja" => Month::May,
        "czerwca" => Month::June,
        "lipca" => Month::July,
        "sierpnia" => Month::August,
        "września" => Month::September,
        "października" => Month::October,
        "listopada" => Month::November,
        "grudnia" => Month::December,
        _ => return None,
    };
    Some(month)
}

pub fn parse_iso_date(value: &str) -> Option<Date> {
    let mut parts = value.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u8>().ok()?;
    let day = parts.next()?.parse::<u8>().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// `Option<Date>` as `"YYYY-MM-DD"` or `null`.
pub mod iso_date_opt {
    use super::{format_iso_date, parse_iso_date};
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&format_iso_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_iso_date(text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom("expected a YYYY-MM-DD date")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_genitive_month_names() {
        let date = parse_protocol_date("15 maja 1930 rok").expect("date");
        assert_eq!(format_iso_date(date), "1930-05-15");

        let date = parse_protocol_date("3 Lutego 1931").expect("date");
        assert_eq!(format_iso_date(date), "1931-02-03");

        let date = parse_protocol_date("1 października 1929 r.").expect("date");
        assert_eq!(format_iso_date(date), "1929-10-01");
    }

    #[test]
    fn rejects_unknown_or_short_dates() {
        assert_eq!(parse_protocol_date(""), None);
        assert_eq!(parse_protocol_date("15 maja"), None);
        assert_eq!(parse_protocol_date("15 may 1930"), None);
        assert_eq!(parse_protocol_date("31 lutego 1930"), None);
    }

    #[test]
    fn iso_dates_round_trip_through_text() {
        let date = parse_iso_date("1930-05-15").expect("iso date");
        assert_eq!(format_iso_date(date), "1930-05-15");
        assert_eq!(parse_iso_date("1930-13-01"), None);
        assert_eq!(parse_iso_date("not a date"), None);
    }
}
