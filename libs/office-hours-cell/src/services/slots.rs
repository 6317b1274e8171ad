use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::models::{
    format_doctor_name, minutes_from_midnight, BookableSlot, OfficeHourRule, OfficeHoursError,
};

/// Minute offsets from midnight at which `rule` produces a slot, skipping any
/// slot that overlaps the break window. `[start, start + duration)` overlaps
/// `[break_start, break_end)` when `start < break_end && start + duration > break_start`.
///
/// The iterator borrows nothing, so calling this again restarts the sequence.
pub fn rule_slot_offsets(rule: &OfficeHourRule) -> Result<impl Iterator<Item = u32>, OfficeHoursError> {
    if rule.slot_duration_minutes <= 0 {
        return Err(OfficeHoursError::InvalidConfiguration(format!(
            "Office hour {} has non-positive slot duration {}",
            rule.id, rule.slot_duration_minutes
        )));
    }

    let step = rule.slot_duration_minutes as u32;
    let start = minutes_from_midnight(rule.start_time);
    let end = minutes_from_midnight(rule.end_time);
    let window = rule
        .break_window()
        .map(|(s, e)| (minutes_from_midnight(s), minutes_from_midnight(e)));

    Ok((start..end)
        .step_by(step as usize)
        .filter(move |&minute| match window {
            Some((break_start, break_end)) => !(minute < break_end && minute + step > break_start),
            None => true,
        }))
}

/// Turns the weekly rules into bookable slots on `date`.
///
/// Only active rules for the date's weekday are used. Slot times are wall-clock
/// times in `now`'s timezone; a slot is kept only when it starts strictly after
/// `now`. Output is ordered by start time, then doctor.
pub fn generate_slots<Tz: TimeZone>(
    date: NaiveDate,
    rules: &[OfficeHourRule],
    now: &DateTime<Tz>,
) -> Result<Vec<BookableSlot>, OfficeHoursError> {
    let day_of_week = date.weekday().num_days_from_sunday() as u8;
    let timezone = now.timezone();

    let mut slots = Vec::new();

    for rule in rules.iter().filter(|r| r.is_active && r.day_of_week == day_of_week) {
        let duration = Duration::minutes(rule.slot_duration_minutes as i64);

        for minute in rule_slot_offsets(rule)? {
            let Some(local) = date.and_hms_opt(minute / 60, minute % 60, 0) else {
                continue;
            };

            // Wall-clock times skipped by a DST jump produce no slot.
            let Some(start) = timezone.from_local_datetime(&local).earliest() else {
                debug!("Skipping nonexistent local time {} for rule {}", local, rule.id);
                continue;
            };

            if start <= *now {
                continue;
            }

            let start_time = start.with_timezone(&Utc);
            slots.push(BookableSlot {
                start_time,
                end_time: start_time + duration,
                label: format!(
                    "{} - {}",
                    local.format("%H:%M"),
                    format_doctor_name(rule.doctor_name())
                ),
                receiving_doctor_id: rule.receiving_doctor_id,
                receiving_doctor_name: rule.doctor_name().map(str::to_string),
            });
        }
    }

    slots.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.receiving_doctor_name.cmp(&b.receiving_doctor_name))
            .then_with(|| a.receiving_doctor_id.cmp(&b.receiving_doctor_id))
    });

    debug!("Generated {} slots for {}", slots.len(), date);
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn rule(start: (u32, u32), end: (u32, u32), duration: i32) -> OfficeHourRule {
        OfficeHourRule {
            id: Uuid::new_v4(),
            receiving_doctor_id: Uuid::new_v4(),
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            slot_duration_minutes: duration,
            break_start_time: None,
            break_end_time: None,
            is_active: true,
            doctor: None,
        }
    }

    #[test]
    fn last_slot_may_run_past_end() {
        // 08:00-09:00 with 25 minute slots: 08:00, 08:25, 08:50
        let offsets: Vec<u32> = rule_slot_offsets(&rule((8, 0), (9, 0), 25)).unwrap().collect();
        assert_eq!(offsets, vec![480, 505, 530]);
    }

    #[test]
    fn inverted_range_yields_nothing() {
        assert_eq!(rule_slot_offsets(&rule((10, 0), (9, 0), 30)).unwrap().count(), 0);
        assert_eq!(rule_slot_offsets(&rule((9, 0), (9, 0), 30)).unwrap().count(), 0);
    }

    #[test]
    fn half_defined_break_is_ignored() {
        let mut r = rule((8, 0), (10, 0), 30);
        r.break_start_time = NaiveTime::from_hms_opt(9, 0, 0);
        assert_eq!(rule_slot_offsets(&r).unwrap().count(), 4);
    }

    #[test]
    fn sequence_restarts() {
        let r = rule((8, 0), (9, 0), 15);
        let first: Vec<u32> = rule_slot_offsets(&r).unwrap().collect();
        let second: Vec<u32> = rule_slot_offsets(&r).unwrap().collect();
        assert_eq!(first, second);
    }
}
