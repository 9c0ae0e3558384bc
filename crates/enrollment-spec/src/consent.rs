use chrono::{Datelike, NaiveDate};

/// Students younger than this need explicit parental consent.
pub const CONSENT_AGE: i32 = 13;

/// Age in whole years on `today`, counting a birthday only once it has occurred.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age - 1
    } else {
        age
    }
}

pub fn consent_required(birth: NaiveDate, today: NaiveDate) -> bool {
    age_on(birth, today) < CONSENT_AGE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_waits_for_birthday() {
        let birth = date(2010, 6, 15);
        assert_eq!(age_on(birth, date(2023, 6, 14)), 12);
        assert_eq!(age_on(birth, date(2023, 6, 15)), 13);
        assert_eq!(age_on(birth, date(2023, 12, 1)), 13);
    }

    #[test]
    fn leap_day_birthday_counts_from_march_in_common_years() {
        let birth = date(2012, 2, 29);
        assert_eq!(age_on(birth, date(2025, 2, 28)), 12);
        assert_eq!(age_on(birth, date(2025, 3, 1)), 13);
    }

    #[test]
    fn consent_flips_on_thirteenth_birthday() {
        let today = date(2026, 10, 18);
        assert!(consent_required(date(2013, 10, 19), today));
        assert!(!consent_required(date(2013, 10, 18), today));
    }

    #[test]
    fn future_birth_date_requires_consent() {
        assert!(consent_required(date(2030, 1, 1), date(2026, 1, 1)));
    }
}
