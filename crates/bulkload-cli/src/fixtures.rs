//! Synthetic users and schools, and a sports league, for load runs.

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use bulkload_core::Fields;

/// Role assigned to every generated user.
pub const DEFAULT_ROLE: &str = "Admin";

/// Rounds of SHA-256 applied to a salted password.
pub const HASH_ITERATIONS: u32 = 1000;

/// Lowest generated `SchoolId`.
const FIRST_SCHOOL_ID: u64 = 10_000;

/// Year of the first generated season.
pub const FIRST_SEASON_YEAR: i32 = 2022;

/// Race formats, cycled through by race index.
pub const RACE_TYPES: [&str; 4] = ["Individual", "Mass start", "Sprint", "Pursuit"];

const FIRST_NAMES: [&str; 12] = [
    "Olena", "Taras", "Iryna", "Dmytro", "Kateryna", "Andrii", "Yulia", "Serhii", "Marta",
    "Bohdan", "Sofiia", "Ostap",
];

const LAST_NAMES: [&str; 10] = [
    "Kovalenko",
    "Shevchenko",
    "Bondarenko",
    "Tkachenko",
    "Kravchenko",
    "Melnyk",
    "Boiko",
    "Oliinyk",
    "Lysenko",
    "Moroz",
];

const COUNTRIES: [&str; 8] = [
    "Ukraine", "Norway", "France", "Germany", "Sweden", "Italy", "Austria", "Finland",
];

const VENUES: [&str; 9] = [
    "Lviv",
    "Oberhof",
    "Ruhpolding",
    "Antholz",
    "Kontiolahti",
    "Hochfilzen",
    "Ostersund",
    "Oslo",
    "Le Grand-Bornand",
];

/// Days from September 1st to May 1st, the span a season's races are spread over.
const SEASON_DAYS: i64 = 242;

/// Hash `plain` with a fresh random 16-character salt.
///
/// The result has the form `sha256$<salt>$<iterations>$<hex digest>`.
#[must_use]
pub fn hash_password(plain: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    hash_password_with_salt(plain, &salt[..16])
}

/// Hash `plain` with the given salt.
#[must_use]
pub fn hash_password_with_salt(plain: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(plain.as_bytes())
        .finalize();
    for _ in 1..HASH_ITERATIONS {
        digest = Sha256::digest(digest);
    }
    format!("sha256${salt}${HASH_ITERATIONS}${}", hex::encode(digest))
}

/// Check `plain` against a hash produced by [`hash_password`].
#[must_use]
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("sha256"), Some(salt), Some(iterations), Some(_), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if iterations.parse::<u32>().ok() != Some(HASH_ITERATIONS) {
        return false;
    }
    constant_time_eq(&hash_password_with_salt(plain, salt), stored)
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `count` users with hashed random passwords and an empty `schools` list.
#[must_use]
pub fn users(count: usize) -> Vec<Fields> {
    let created_at = Utc::now().to_rfc3339();
    (0..count)
        .map(|i| {
            let password = uuid::Uuid::new_v4().simple().to_string();
            object(json!({
                "UserName": format!("user{i:05}"),
                "Password": hash_password(&password),
                "Role": DEFAULT_ROLE,
                "schools": [],
                "createdAt": created_at,
            }))
        })
        .collect()
}

/// `count` schools with unique sequential `SchoolId`s.
#[must_use]
pub fn schools(count: usize) -> Vec<Fields> {
    let created_at = Utc::now().to_rfc3339();
    (0..count)
        .map(|i| {
            object(json!({
                "SchoolName": format!("School {i}"),
                "SchoolId": FIRST_SCHOOL_ID + i as u64,
                "DeanName": format!("Dean {i}"),
                "Email": format!("dean{i}@school{i}.example"),
                "createdAt": created_at,
            }))
        })
        .collect()
}

/// `count` consecutive seasons starting at [`FIRST_SEASON_YEAR`].
#[must_use]
pub fn seasons(count: usize) -> Vec<Fields> {
    (FIRST_SEASON_YEAR..)
        .take(count)
        .map(|year| {
            object(json!({
                "year": year,
                "name": format!("Season {year}-{}", year + 1),
            }))
        })
        .collect()
}

/// `count` athletes with names and countries drawn from fixed pools.
#[must_use]
pub fn athletes(count: usize) -> Vec<Fields> {
    (0..count)
        .map(|i| {
            object(json!({
                "firstName": FIRST_NAMES[i % FIRST_NAMES.len()],
                "lastName": LAST_NAMES[(i / FIRST_NAMES.len()) % LAST_NAMES.len()],
                "country": COUNTRIES[i % COUNTRIES.len()],
            }))
        })
        .collect()
}

/// Race `index` of `of` in the season starting in `year`.
///
/// Races are spread evenly from September 1st of `year` to May 1st of the next year.
#[must_use]
pub fn race(season_id: &str, year: i32, index: usize, of: usize) -> Fields {
    let offset = SEASON_DAYS * index as i64 / of.max(1) as i64;
    let date = NaiveDate::from_ymd_opt(year, 9, 1)
        .map(|start| (start + Duration::days(offset)).to_string())
        .unwrap_or_default();
    object(json!({
        "seasonId": season_id,
        "date": date,
        "type": RACE_TYPES[index % RACE_TYPES.len()],
        "location": VENUES[index % VENUES.len()],
    }))
}

/// Finishing order for one race: up to `per_race` distinct athletes, placed from 1.
///
/// The field is a window into `athlete_ids` whose start moves with `race_index`, so
/// different races draw different athletes.
#[must_use]
pub fn results(
    race_id: &str,
    race_index: usize,
    athlete_ids: &[String],
    per_race: usize,
) -> Vec<Fields> {
    if athlete_ids.is_empty() {
        return Vec::new();
    }
    let start = race_index.wrapping_mul(per_race.max(1) + 7) % athlete_ids.len();
    athlete_ids
        .iter()
        .cycle()
        .skip(start)
        .take(per_race.min(athlete_ids.len()))
        .enumerate()
        .map(|(place, athlete_id)| {
            object(json!({
                "raceId": race_id,
                "athleteId": athlete_id,
                "place": place + 1,
            }))
        })
        .collect()
}

fn object(value: Value) -> Fields {
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips() {
        let stored = hash_password("hunter2");
        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn salt_changes_the_hash() {
        assert_ne!(hash_password("same"), hash_password("same"));
        assert_eq!(
            hash_password_with_salt("same", "0123456789abcdef"),
            hash_password_with_salt("same", "0123456789abcdef")
        );
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$salt$1000$abcd"));
        assert!(!verify_password("x", "sha256$salt$7$abcd"));
        assert!(!verify_password("x", "sha256$a$1000$b$c"));
    }

    #[test]
    fn users_have_expected_shape() {
        let users = users(3);
        assert_eq!(users.len(), 3);
        assert_eq!(users[0]["UserName"], json!("user00000"));
        assert_eq!(users[2]["Role"], json!(DEFAULT_ROLE));
        assert_eq!(users[1]["schools"], json!([]));
        assert_ne!(users[0]["Password"], users[1]["Password"]);
    }

    #[test]
    fn school_ids_are_unique() {
        let schools = schools(50);
        let mut ids: Vec<u64> = schools
            .iter()
            .map(|s| s["SchoolId"].as_u64().unwrap())
            .collect();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert_eq!(ids[0], 10_000);
    }

    #[test]
    fn seasons_are_consecutive() {
        let seasons = seasons(6);
        assert_eq!(seasons.len(), 6);
        assert_eq!(seasons[0]["year"], json!(2022));
        assert_eq!(seasons[0]["name"], json!("Season 2022-2023"));
        assert_eq!(seasons[5]["name"], json!("Season 2027-2028"));
    }

    #[test]
    fn races_fall_inside_their_season() {
        let first = race("s1", 2024, 0, 50);
        let last = race("s1", 2024, 49, 50);
        assert_eq!(first["seasonId"], json!("s1"));
        assert_eq!(first["date"], json!("2024-09-01"));
        assert!(last["date"].as_str().unwrap() < "2025-05-01");
        assert!(RACE_TYPES.contains(&first["type"].as_str().unwrap()));
    }

    #[test]
    fn results_place_distinct_athletes() {
        let ids: Vec<String> = (0..20).map(|i| format!("a{i}")).collect();
        let results = results("r1", 3, &ids, 8);

        assert_eq!(results.len(), 8);
        let places: Vec<u64> = results.iter().map(|r| r["place"].as_u64().unwrap()).collect();
        assert_eq!(places, (1..=8).collect::<Vec<_>>());
        let mut athletes: Vec<&str> = results
            .iter()
            .map(|r| r["athleteId"].as_str().unwrap())
            .collect();
        athletes.sort_unstable();
        athletes.dedup();
        assert_eq!(athletes.len(), 8);
    }

    #[test]
    fn results_never_exceed_the_athlete_pool() {
        let ids: Vec<String> = (0..5).map(|i| format!("a{i}")).collect();
        assert_eq!(results("r1", 0, &ids, 50).len(), 5);
        assert!(results("r1", 0, &[], 50).is_empty());
    }
}
