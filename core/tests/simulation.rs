//! Properties of the metrics generator.
//!
//! Every dataset the toolkit seeds is built from these functions, so a
//! regression here shows up as checksum drift in every tenant.

use adsim_core::{
    rng::{Seed, SeededRng},
    simulation::{generate_daily_metrics, generate_date_range_metrics, DailyMetrics, SimulationParams},
    types::{Platform, TrendProfile},
};
use chrono::NaiveDate;

// ── Test helpers ────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// 2024-01-03 is a Wednesday.
fn weekday() -> NaiveDate {
    date(2024, 1, 3)
}

fn params(trend: TrendProfile, base: u64, platform: Option<Platform>) -> SimulationParams {
    SimulationParams {
        date: weekday(),
        trend_profile: trend,
        base_impressions: base,
        day_index: 0,
        total_days: 1,
        platform,
    }
}

fn mean_impressions(platform: Platform, samples: usize) -> f64 {
    let mut rng = SeededRng::from_seed(&Seed::from("platform-scaling"));
    let p = params(TrendProfile::Stable, 10_000, Some(platform));
    let total: u64 = (0..samples)
        .map(|_| generate_daily_metrics(&p, &mut rng).impressions)
        .sum();
    total as f64 / samples as f64
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn funnel_holds_for_every_platform_and_trend() {
    let mut rng = SeededRng::new(7);
    for platform in Platform::ALL {
        for trend in [TrendProfile::Stable, TrendProfile::Growth, TrendProfile::Decline] {
            for base in [0, 1, 17, 10_000, 5_000_000] {
                for day in 0..30 {
                    let p = SimulationParams {
                        date: date(2024, 1, 1) + chrono::Duration::days(i64::from(day)),
                        trend_profile: trend,
                        base_impressions: base,
                        day_index: day,
                        total_days: 30,
                        platform: Some(platform),
                    };
                    let m = generate_daily_metrics(&p, &mut rng);
                    assert!(m.funnel_holds(), "funnel broken for {platform} {trend} base={base}: {m:?}");
                    assert!(m.all_finite(), "non-finite metric for {platform} {trend} base={base}: {m:?}");
                }
            }
        }
    }
}

#[test]
fn same_seed_same_metrics() {
    let run = |seed: &str| {
        let mut rng = SeededRng::from_seed(&Seed::from(seed));
        generate_date_range_metrics(
            date(2024, 2, 1),
            date(2024, 2, 29),
            TrendProfile::Growth,
            25_000,
            Some(Platform::Facebook),
            &mut rng,
        )
    };
    assert_eq!(run("acme-q1"), run("acme-q1"));
    assert_ne!(run("acme-q1"), run("acme-q2"));
}

#[test]
fn zero_base_yields_all_zero() {
    let mut rng = SeededRng::new(1);
    for platform in Platform::ALL {
        let m = generate_daily_metrics(&params(TrendProfile::Growth, 0, Some(platform)), &mut rng);
        assert_eq!(m, DailyMetrics::default(), "expected all-zero metrics for {platform}, got {m:?}");
    }
}

#[test]
fn zero_volume_day_consumes_the_same_draws() {
    let mut a = SeededRng::new(99);
    let mut b = SeededRng::new(99);
    generate_daily_metrics(&params(TrendProfile::Stable, 0, None), &mut a);
    generate_daily_metrics(&params(TrendProfile::Stable, 10_000, None), &mut b);
    assert_eq!(a.next_u64(), b.next_u64(), "streams diverged after a zero-volume day");
}

#[test]
fn very_large_base_does_not_overflow() {
    let mut rng = SeededRng::new(3);
    for platform in Platform::ALL {
        let m = generate_daily_metrics(&params(TrendProfile::Decline, 100_000_000, Some(platform)), &mut rng);
        assert!(m.impressions > 0);
        assert!(m.funnel_holds());
        assert!(m.all_finite(), "non-finite metric at 100M base: {m:?}");
    }
    let m = generate_daily_metrics(&params(TrendProfile::Growth, u64::MAX, Some(Platform::TikTok)), &mut rng);
    assert!(m.funnel_holds());
    assert!(m.all_finite());
}

#[test]
fn money_has_two_decimals() {
    let mut rng = SeededRng::new(11);
    let days = generate_date_range_metrics(
        date(2024, 3, 1),
        date(2024, 3, 31),
        TrendProfile::Stable,
        12_345,
        Some(Platform::LinkedIn),
        &mut rng,
    );
    for d in &days {
        let m = &d.metrics;
        for (label, v) in [("cost", m.cost), ("revenue", m.revenue), ("ctr", m.ctr), ("roas", m.roas)] {
            let cents = v * 100.0;
            assert!(
                (cents - cents.round()).abs() < 1e-6,
                "{label} on {} has more than two decimals: {v}",
                d.date
            );
        }
    }
}

#[test]
fn seven_day_range_yields_seven_ascending_entries() {
    let mut rng = SeededRng::new(5);
    let days = generate_date_range_metrics(
        date(2024, 1, 1),
        date(2024, 1, 7),
        TrendProfile::Stable,
        10_000,
        None,
        &mut rng,
    );
    assert_eq!(days.len(), 7);
    assert_eq!(days[0].date, date(2024, 1, 1));
    assert_eq!(days[6].date, date(2024, 1, 7));
    assert!(days.windows(2).all(|w| w[0].date < w[1].date));
}

#[test]
fn inverted_range_is_empty() {
    let mut rng = SeededRng::new(5);
    let days = generate_date_range_metrics(
        date(2024, 1, 7),
        date(2024, 1, 1),
        TrendProfile::Stable,
        10_000,
        None,
        &mut rng,
    );
    assert!(days.is_empty());
}

#[test]
fn platform_multipliers_scale_volume() {
    let google = mean_impressions(Platform::GoogleAds, 400);
    for (platform, expected) in [
        (Platform::Facebook, 1.5),
        (Platform::TikTok, 1.8),
        (Platform::LinkedIn, 0.6),
        (Platform::MicrosoftAds, 0.8),
    ] {
        let ratio = mean_impressions(platform, 400) / google;
        assert!(
            (ratio - expected).abs() / expected < 0.05,
            "{platform}: expected ~{expected}x GoogleAds volume, got {ratio:.3}x"
        );
    }
}

#[test]
fn growth_beats_decline_on_the_final_day() {
    let last = |trend| SimulationParams {
        date: weekday(),
        trend_profile: trend,
        base_impressions: 10_000,
        day_index: 29,
        total_days: 30,
        platform: Some(Platform::GoogleAds),
    };
    for seed in 0..50 {
        let growth = generate_daily_metrics(&last(TrendProfile::Growth), &mut SeededRng::new(seed));
        let decline = generate_daily_metrics(&last(TrendProfile::Decline), &mut SeededRng::new(seed));
        assert!(
            growth.impressions > decline.impressions,
            "seed {seed}: growth {} <= decline {}",
            growth.impressions,
            decline.impressions
        );
    }
}

#[test]
fn stable_weekday_stays_within_twenty_percent() {
    let mut rng = SeededRng::new(21);
    let p = params(TrendProfile::Stable, 10_000, Some(Platform::GoogleAds));
    for _ in 0..500 {
        let m = generate_daily_metrics(&p, &mut rng);
        assert!(
            (8_000..=12_000).contains(&m.impressions),
            "stable weekday drifted to {}",
            m.impressions
        );
    }
}

#[test]
fn weekends_are_quieter_than_weekdays_on_search() {
    let sunday = SimulationParams { date: date(2024, 1, 7), ..params(TrendProfile::Stable, 10_000, None) };
    let wednesday = params(TrendProfile::Stable, 10_000, None);
    let mut total_sun = 0u64;
    let mut total_wed = 0u64;
    for seed in 0..100 {
        total_sun += generate_daily_metrics(&sunday, &mut SeededRng::new(seed)).impressions;
        total_wed += generate_daily_metrics(&wednesday, &mut SeededRng::new(seed)).impressions;
    }
    assert!(total_sun < total_wed, "weekend {total_sun} not below weekday {total_wed}");
}
