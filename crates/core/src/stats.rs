#![forbid(unsafe_code)]

use crate::model::{Gender, Person};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

const TOP_SURNAMES: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DecadeSeries {
    pub labels: Vec<String>,
    pub data: Vec<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GenealogyStats {
    pub total_people: u64,
    pub male_count: u64,
    pub female_count: u64,
    pub top_surnames: Vec<NameCount>,
    pub births_by_decade: DecadeSeries,
}

impl GenealogyStats {
    pub fn from_persons<'a>(persons: impl IntoIterator<Item = &'a Person>) -> Self {
        let mut stats = Self::default();
        let mut surnames: BTreeMap<&str, u64> = BTreeMap::new();
        let mut decades: BTreeMap<i32, u64> = BTreeMap::new();

        for person in persons {
            stats.total_people += 1;
            match person.gender {
                Some(Gender::Male) => stats.male_count += 1,
                Some(Gender::Female) => stats.female_count += 1,
                None => {}
            }
            if let Some(surname) = person.surname() {
                *surnames.entry(surname).or_default() += 1;
            }
            if let Some(year) = person.birth_year {
                *decades.entry(year.div_euclid(10) * 10).or_default() += 1;
            }
        }

        let mut ranked: Vec<NameCount> = surnames
            .into_iter()
            .map(|(name, count)| NameCount {
                name: name.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(TOP_SURNAMES);
        stats.top_surnames = ranked;

        for (decade, count) in decades {
            stats.births_by_decade.labels.push(format!("{decade}s"));
            stats.births_by_decade.data.push(count);
        }
        stats
    }
}

/// Natural order for parcel numbers: `2 < 10 < 100`, `800/2 < 800/10`.
/// Numbers without leading digits sort first, by text.
pub fn parcel_sort_key(number: &str) -> (Option<u64>, u64, String) {
    let mut runs = number
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty());
    let leading = if number.starts_with(|c: char| c.is_ascii_digit()) {
        runs.next().and_then(|run| run.parse().ok())
    } else {
        None
    };
    let second = if leading.is_some() {
        runs.next().and_then(|run| run.parse().ok()).unwrap_or(0)
    } else {
        0
    };
    (leading, second, number.to_string())
}

pub fn compare_parcel_numbers(a: &str, b: &str) -> Ordering {
    parcel_sort_key(a).cmp(&parcel_sort_key(b))
}
