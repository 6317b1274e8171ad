// libs/office-hours-cell/tests/slots_test.rs

use assert_matches::assert_matches;
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use uuid::Uuid;

use office_hours_cell::models::{DoctorName, OfficeHourRule, OfficeHoursError};
use office_hours_cell::services::slots::generate_slots;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn rule_for(date: NaiveDate, start: NaiveTime, end: NaiveTime, duration: i32) -> OfficeHourRule {
    OfficeHourRule {
        id: Uuid::new_v4(),
        receiving_doctor_id: Uuid::new_v4(),
        day_of_week: date.weekday().num_days_from_sunday() as u8,
        start_time: start,
        end_time: end,
        slot_duration_minutes: duration,
        break_start_time: None,
        break_end_time: None,
        is_active: true,
        doctor: Some(DoctorName { full_name: Some("Peter Horváth".to_string()) }),
    }
}

#[test]
fn break_window_excludes_exactly_overlapping_slots() {
    let date = monday();
    let mut rule = rule_for(date, time(8, 0), time(16, 0), 30);
    rule.break_start_time = Some(time(12, 0));
    rule.break_end_time = Some(time(13, 0));

    let now = Utc.with_ymd_and_hms(2030, 1, 6, 12, 0, 0).unwrap();
    let slots = generate_slots(date, &[rule], &now).unwrap();

    assert_eq!(slots.len(), 14);

    let starts: Vec<(u32, u32)> = slots.iter()
        .map(|s| (s.start_time.hour(), s.start_time.minute()))
        .collect();
    assert!(starts.contains(&(11, 30)), "slot ending at break start stays");
    assert!(starts.contains(&(13, 0)), "slot starting at break end stays");
    assert!(!starts.contains(&(12, 0)));
    assert!(!starts.contains(&(12, 30)));
}

#[test]
fn slot_count_is_ceiling_of_range_over_duration() {
    let date = monday();
    let rule = rule_for(date, time(8, 0), time(9, 0), 25);
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    let slots = generate_slots(date, &[rule], &now).unwrap();

    assert_eq!(slots.len(), 3);
    let last = slots.last().unwrap();
    assert_eq!((last.start_time.hour(), last.start_time.minute()), (8, 50));
    assert_eq!((last.end_time.hour(), last.end_time.minute()), (9, 15));
}

#[test]
fn past_and_current_slots_are_excluded() {
    let date = monday();
    let rule = rule_for(date, time(0, 0), time(23, 59), 60);
    let now = Utc.with_ymd_and_hms(2030, 1, 7, 15, 0, 0).unwrap();

    let slots = generate_slots(date, &[rule], &now).unwrap();

    // 16:00 through 23:00; the 15:00 slot is not strictly after now
    assert_eq!(slots.len(), 8);
    assert!(slots.iter().all(|s| s.start_time > now));
    assert_eq!(slots[0].start_time.hour(), 16);
}

#[test]
fn whole_day_in_the_past_yields_nothing() {
    let date = monday();
    let rule = rule_for(date, time(8, 0), time(16, 0), 30);
    let now = Utc.with_ymd_and_hms(2030, 1, 8, 0, 0, 0).unwrap();

    assert!(generate_slots(date, &[rule], &now).unwrap().is_empty());
}

#[test]
fn inactive_and_other_weekday_rules_are_ignored() {
    let date = monday();
    let mut inactive = rule_for(date, time(8, 0), time(10, 0), 30);
    inactive.is_active = false;
    let mut tuesday = rule_for(date, time(8, 0), time(10, 0), 30);
    tuesday.day_of_week = (tuesday.day_of_week + 1) % 7;
    // Invalid, but never consulted for this date
    tuesday.slot_duration_minutes = 0;

    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    assert!(generate_slots(date, &[inactive, tuesday], &now).unwrap().is_empty());
}

#[test]
fn non_positive_duration_is_rejected() {
    let date = monday();
    let rule = rule_for(date, time(8, 0), time(10, 0), -15);
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    assert_matches!(
        generate_slots(date, &[rule], &now),
        Err(OfficeHoursError::InvalidConfiguration(_))
    );
}

#[test]
fn slots_from_several_doctors_are_interleaved_in_time_order() {
    let date = monday();
    let mut first = rule_for(date, time(9, 0), time(10, 0), 30);
    first.doctor = Some(DoctorName { full_name: Some("Anna Kováčová".to_string()) });
    let second = rule_for(date, time(8, 45), time(9, 45), 30);

    let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    let slots = generate_slots(date, &[first.clone(), second.clone()], &now).unwrap();

    let labels: Vec<&str> = slots.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec![
        "08:45 - MUDr. Peter Horváth",
        "09:00 - MUDr. Anna Kováčová",
        "09:15 - MUDr. Peter Horváth",
        "09:30 - MUDr. Anna Kováčová",
    ]);
    assert_eq!(slots[0].receiving_doctor_id, second.receiving_doctor_id);
    assert_eq!(slots[1].receiving_doctor_id, first.receiving_doctor_id);
}

#[test]
fn wall_clock_follows_the_timezone_of_now() {
    let date = monday();
    let rule = rule_for(date, time(8, 0), time(9, 0), 60);
    let offset = FixedOffset::east_opt(3600).unwrap();
    let now = offset.with_ymd_and_hms(2030, 1, 7, 7, 30, 0).unwrap();

    let slots = generate_slots(date, &[rule], &now).unwrap();

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start_time, Utc.with_ymd_and_hms(2030, 1, 7, 7, 0, 0).unwrap());
    assert!(slots[0].label.starts_with("08:00"));
}

#[test]
fn repeated_calls_are_identical() {
    let date = monday();
    let rules = vec![rule_for(date, time(8, 0), time(12, 0), 20)];
    let now = Utc.with_ymd_and_hms(2030, 1, 7, 9, 10, 0).unwrap();

    assert_eq!(
        generate_slots(date, &rules, &now).unwrap(),
        generate_slots(date, &rules, &now).unwrap()
    );
}
