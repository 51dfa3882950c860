use chrono::{NaiveDate, TimeDelta, Utc};
use keyward_types::{Clock, ManualClock, SystemClock};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn system_clock_is_close_to_now() {
    let clock = SystemClock;
    let delta = (clock.now() - Utc::now()).num_seconds().abs();
    assert!(delta < 5);
}

#[test]
fn manual_clock_at_date() {
    let clock = ManualClock::at_date(date(2030, 6, 15));
    assert_eq!(clock.today(), date(2030, 6, 15));
}

#[test]
fn manual_clock_does_not_move_on_its_own() {
    let clock = ManualClock::at_date(date(2030, 6, 15));
    let a = clock.now();
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert_eq!(a, clock.now());
}

#[test]
fn manual_clock_advance_crosses_days() {
    let clock = ManualClock::at_date(date(2030, 6, 15));
    clock.advance(TimeDelta::hours(13));
    assert_eq!(clock.today(), date(2030, 6, 16));
}

#[test]
fn manual_clock_set() {
    let clock = ManualClock::at_date(date(2030, 6, 15));
    let target = date(2040, 1, 1).and_hms_opt(0, 0, 0).unwrap().and_utc();
    clock.set(target);
    assert_eq!(clock.now(), target);
}
