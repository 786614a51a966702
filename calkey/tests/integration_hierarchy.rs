//! Integration tests for roll-up and drill-down through a period hierarchy.

use calkey::error::{CalkeyError, HierarchyError};
use calkey::{KeyScheme, PeriodHierarchy, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// Minutes and days roll up into months, months into years; hours into
/// 6-hour blocks and days.
fn calendar_scheme(compression: bool) -> Result<KeyScheme> {
    let mut hierarchy = PeriodHierarchy::new();
    hierarchy.add("1M", "1N")?;
    hierarchy.add("1Y", "1M")?;
    hierarchy.add("6H", "1H")?;
    hierarchy.add("1D", "1H")?;
    hierarchy.add("1M", "1D")?;
    Ok(KeyScheme::new(hierarchy, compression))
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

#[test]
fn test_upper_level_keys() -> Result<()> {
    let scheme = calendar_scheme(true)?;

    assert_eq!(
        scheme.upper_level_keys("1H2015031217")?,
        ["6H201503122", "1D20150312"]
    );
    assert_eq!(scheme.upper_level_key("1H2015031217")?.as_deref(), Some("6H201503122"));
    assert_eq!(scheme.upper_level_key("1N201503121703")?.as_deref(), Some("1M201503"));
    assert_eq!(scheme.upper_level_key("1M201503")?.as_deref(), Some("1Y2015"));
    assert_eq!(scheme.upper_level_key("1Y2015")?, None);
    assert!(scheme.upper_level_keys("1Y2015")?.is_empty());
    Ok(())
}

#[test]
fn test_first_lower_level_key() -> Result<()> {
    let scheme = calendar_scheme(false)?;

    assert_eq!(scheme.first_lower_level_key("1Y2015")?.as_deref(), Some("1M201501"));
    assert_eq!(
        scheme.first_lower_level_key("1M201503")?.as_deref(),
        Some("1N201503010000")
    );
    assert_eq!(scheme.first_lower_level_key("1N201503010000")?, None);
    assert_eq!(scheme.first_lower_level_key("6H2015031212")?.as_deref(), Some("1H2015031212"));
    Ok(())
}

#[test]
fn test_roll_up_and_drill_down_agree() -> Result<()> {
    let instants = [
        at(2015, 3, 1, 0, 7),
        at(2015, 3, 12, 17, 3),
        at(2015, 12, 31, 23, 59),
        at(2016, 2, 29, 5, 45),
    ];

    for compression in [false, true] {
        let scheme = calendar_scheme(compression)?;
        for code in ["1H", "1N", "1M", "1D"] {
            let period = *scheme.hierarchy().get(code)?;
            for t in instants {
                let key = scheme.generate_key(&period, &t)?;
                let start = scheme.start_time(&key)?;
                let Some(upper) = scheme.upper_level_key(&key)? else {
                    continue;
                };
                let upper_start = scheme.start_time(&upper)?;
                let upper_end = scheme.end_time(&upper)?.naive_local();
                assert!(upper_start <= start && start < upper_end, "{upper} misses {key}");

                let first = scheme.first_lower_level_key(&upper)?.unwrap();
                assert!(scheme.start_time(&first)? <= start, "{first} starts after {key}");

                // Walking the upper bucket in `key`'s period reaches `key`.
                let mut sibling = scheme.generate_key(&period, &upper_start)?;
                while scheme.start_time(&sibling)? < start {
                    sibling = scheme.next_key(&sibling)?;
                }
                assert_eq!(sibling, key, "walking {upper}");
            }
        }
    }
    Ok(())
}

#[test]
fn test_unregistered_period_is_rejected() -> Result<()> {
    let scheme = calendar_scheme(false)?;

    assert!(matches!(
        scheme.upper_level_key("1W201511"),
        Err(CalkeyError::Hierarchy(HierarchyError::UnknownPeriod { .. }))
    ));
    assert!(scheme.generate_key_for_code("1W", &NaiveDateTime::MIN).is_err());

    // Navigation within a period does not need the hierarchy.
    assert_eq!(scheme.next_key("1W201511")?, "1W201512");
    Ok(())
}

#[test]
fn test_zoned_hierarchy() -> Result<()> {
    let mut hierarchy = PeriodHierarchy::new();
    hierarchy.add("1D(Europe/Paris)", "1H(Europe/Paris)")?;
    let scheme = KeyScheme::new(hierarchy, false);

    assert_eq!(
        scheme.upper_level_key("1H(Europe/Paris)2015032923")?.as_deref(),
        Some("1D(Europe/Paris)20150329")
    );
    // Paris springs forward on 2015-03-29, so that day is 23 hours long.
    let (start, end) = scheme.time_range("1D(Europe/Paris)20150329")?;
    assert_eq!((end - start).num_hours(), 23);
    Ok(())
}

#[test]
fn test_cycles_are_rejected() {
    let mut hierarchy = PeriodHierarchy::new();
    hierarchy.add("1D", "1H").unwrap();
    hierarchy.add("1M", "1D").unwrap();

    assert!(matches!(
        hierarchy.add("1H", "1M"),
        Err(CalkeyError::Hierarchy(HierarchyError::Cycle { .. }))
    ));
    // The rejected edge left no trace.
    let hour = *hierarchy.get("1H").unwrap();
    assert!(hierarchy.lower_level_period(&hour).unwrap().is_none());
}

#[test]
fn test_scheme_is_shareable_across_threads() -> Result<()> {
    let scheme = calendar_scheme(true)?;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let scheme = &scheme;
                s.spawn(move || {
                    let key = format!("1H20150312{:02}", 6 * i);
                    scheme.upper_level_keys(&key)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let uppers = handle.join().unwrap().unwrap();
            assert_eq!(uppers[0], format!("6H20150312{i}"));
            assert_eq!(uppers[1], "1D20150312");
        }
    });
    Ok(())
}
