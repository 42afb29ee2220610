use bujo_core::{
    bucket_for, created_on, date_for_bucket, display_label, is_future, is_past, is_today,
    is_tomorrow, Bucket, Clock, FixedClock,
};
use chrono::{Days, NaiveDate, TimeDelta};

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

#[test]
fn every_date_lands_in_exactly_one_bucket() {
    let today = day("2024-02-28");
    let start = day("2023-12-01");

    for offset in 0..200u64 {
        let date = start.checked_add_days(Days::new(offset)).unwrap();
        let bucket = bucket_for(date, today);

        let predicates = [
            is_today(date, today),
            is_tomorrow(date, today),
            is_past(date, today),
            is_future(date, today),
        ];
        assert_eq!(
            predicates.iter().filter(|hit| **hit).count(),
            1,
            "predicates overlap for {date}"
        );

        let expected = if date <= today {
            Bucket::Today
        } else if date == day("2024-02-29") {
            Bucket::Tomorrow
        } else {
            Bucket::Future
        };
        assert_eq!(bucket, expected, "wrong bucket for {date}");
    }
}

#[test]
fn tomorrow_crosses_month_and_year_boundaries() {
    assert_eq!(bucket_for(day("2024-03-01"), day("2024-02-29")), Bucket::Tomorrow);
    assert_eq!(bucket_for(day("2025-01-01"), day("2024-12-31")), Bucket::Tomorrow);
    assert_eq!(bucket_for(day("2025-01-02"), day("2024-12-31")), Bucket::Future);
}

#[test]
fn bucket_drop_dates_round_trip_to_their_bucket() {
    let today = day("2024-12-31");
    for bucket in Bucket::ALL {
        assert_eq!(bucket_for(date_for_bucket(bucket, today), today), bucket);
    }
    assert_eq!(date_for_bucket(Bucket::Future, today), day("2025-01-02"));
}

#[test]
fn display_labels_follow_relative_day() {
    let today = day("2024-01-01");
    assert_eq!(display_label(today, today), "Today");
    assert_eq!(display_label(day("2024-01-02"), today), "Tomorrow");
    assert_eq!(display_label(day("2023-12-31"), today), "Dec 31");
    assert_eq!(display_label(day("2024-11-15"), today), "Nov 15");
}

#[test]
fn fixed_clock_drives_today_and_creation_day() {
    let clock = FixedClock::on(day("2024-01-01"));
    let created_at = clock.now_epoch_ms();
    assert_eq!(clock.today(), day("2024-01-01"));
    assert!(created_on(created_at, clock.today()));

    clock.advance(TimeDelta::hours(13));
    assert_eq!(clock.today(), day("2024-01-02"));
    assert!(!created_on(created_at, clock.today()));
    assert!(clock.now_epoch_ms() > created_at);

    clock.set_today(day("2023-06-15"));
    assert_eq!(clock.today(), day("2023-06-15"));
}
