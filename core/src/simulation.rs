//! Synthetic daily ad metrics.
//!
//! The generator is pure and CPU-only: every call consumes exactly
//! DRAWS_PER_DAY values from the caller's stream, whatever the input,
//! so a zero-volume day never shifts the numbers of the days after it.
//!
//! Composition (all multiplicative):
//!   impressions = base × trend(progress) × seasonality(weekday) × platform
//!   clicks      = floor(impressions × ctr draw)
//!   conversions = floor(clicks × cvr draw)

use crate::{
    rng::SeededRng,
    types::{Platform, TrendProfile},
};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const DRAWS_PER_DAY: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub date:             NaiveDate,
    pub trend_profile:    TrendProfile,
    pub base_impressions: u64,
    pub day_index:        u32,
    pub total_days:       u32,
    pub platform:         Option<Platform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub impressions: u64,
    pub clicks:      u64,
    pub conversions: u64,
    pub cost:        f64,
    pub revenue:     f64,
    pub ctr:         f64,
    pub cpc:         f64,
    pub cvr:         f64,
    pub roas:        f64,
    pub aov:         f64,
}

impl DailyMetrics {
    pub fn funnel_holds(&self) -> bool {
        self.clicks <= self.impressions && self.conversions <= self.clicks
    }

    pub fn all_finite(&self) -> bool {
        [self.cost, self.revenue, self.ctr, self.cpc, self.cvr, self.roas, self.aov]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedMetrics {
    pub date:    NaiveDate,
    pub metrics: DailyMetrics,
}

/// Noise bands applied on top of the deterministic shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// ± fraction applied to the trend factor.
    pub trend_noise:  f64,
    /// ± fraction applied to the seasonality factor.
    pub daily_jitter: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self { trend_noise: 0.05, daily_jitter: 0.05 }
    }
}

/// Fixed per-platform shape of volume and unit economics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformProfile {
    pub multiplier:     f64,
    pub weekend_factor: f64,
    pub ctr:            (f64, f64),
    pub cvr:            (f64, f64),
    pub cpc:            (f64, f64),
    pub aov:            (f64, f64),
}

pub const WEEKDAY_FACTOR: f64 = 1.0;

pub fn platform_profile(platform: Platform) -> PlatformProfile {
    match platform {
        Platform::GoogleAds => PlatformProfile {
            multiplier: 1.0, weekend_factor: 0.70,
            ctr: (0.020, 0.060), cvr: (0.020, 0.080),
            cpc: (0.80, 2.50),   aov: (40.0, 160.0),
        },
        Platform::Facebook => PlatformProfile {
            multiplier: 1.5, weekend_factor: 0.90,
            ctr: (0.008, 0.025), cvr: (0.010, 0.050),
            cpc: (0.40, 1.50),   aov: (30.0, 120.0),
        },
        Platform::Instagram => PlatformProfile {
            multiplier: 1.3, weekend_factor: 0.95,
            ctr: (0.006, 0.020), cvr: (0.010, 0.040),
            cpc: (0.50, 1.80),   aov: (30.0, 110.0),
        },
        Platform::TikTok => PlatformProfile {
            multiplier: 1.8, weekend_factor: 1.05,
            ctr: (0.005, 0.018), cvr: (0.005, 0.030),
            cpc: (0.20, 1.00),   aov: (20.0, 80.0),
        },
        Platform::LinkedIn => PlatformProfile {
            multiplier: 0.6, weekend_factor: 0.50,
            ctr: (0.004, 0.012), cvr: (0.020, 0.060),
            cpc: (3.00, 8.00),   aov: (150.0, 600.0),
        },
        Platform::MicrosoftAds => PlatformProfile {
            multiplier: 0.8, weekend_factor: 0.75,
            ctr: (0.015, 0.050), cvr: (0.020, 0.070),
            cpc: (0.60, 2.00),   aov: (40.0, 150.0),
        },
    }
}

/// Position of `day_index` within the run, in [0, 1].
/// A single-day run sits at 0.
pub fn progress_ratio(day_index: u32, total_days: u32) -> f64 {
    if total_days <= 1 {
        return 0.0;
    }
    (f64::from(day_index) / f64::from(total_days - 1)).clamp(0.0, 1.0)
}

/// Expected trend multiplier before noise.
pub fn trend_baseline(profile: TrendProfile, progress: f64) -> f64 {
    match profile {
        TrendProfile::Stable  => 1.0,
        TrendProfile::Growth  => 0.7 + 0.6 * progress,
        TrendProfile::Decline => 1.3 - 0.6 * progress,
    }
}

pub fn seasonality_baseline(date: NaiveDate, platform: Platform) -> f64 {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => platform_profile(platform).weekend_factor,
        _ => WEEKDAY_FACTOR,
    }
}

pub fn round2(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    (x * 100.0).round() / 100.0
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { round2(num / den) } else { 0.0 }
}

pub fn generate_daily_metrics(params: &SimulationParams, rng: &mut SeededRng) -> DailyMetrics {
    generate_daily_metrics_with(params, &NoiseSettings::default(), rng)
}

pub fn generate_daily_metrics_with(
    params: &SimulationParams,
    noise: &NoiseSettings,
    rng: &mut SeededRng,
) -> DailyMetrics {
    let platform = params.platform.unwrap_or_default();
    let profile = platform_profile(platform);

    // Fixed draw order. Do not reorder: seeded datasets depend on it.
    let trend_noise = rng.jitter(noise.trend_noise);
    let season_noise = rng.jitter(noise.daily_jitter);
    let ctr_draw = rng.range_f64(profile.ctr.0, profile.ctr.1);
    let cvr_draw = rng.range_f64(profile.cvr.0, profile.cvr.1);
    let cpc_draw = rng.range_f64(profile.cpc.0, profile.cpc.1);
    let aov_draw = rng.range_f64(profile.aov.0, profile.aov.1);

    let progress = progress_ratio(params.day_index, params.total_days);
    let trend = (trend_baseline(params.trend_profile, progress) * (1.0 + trend_noise)).max(0.0);
    let season = (seasonality_baseline(params.date, platform) * (1.0 + season_noise)).max(0.0);

    let raw = params.base_impressions as f64 * trend * season * profile.multiplier;
    // `as` saturates, so absurd bases clamp at u64::MAX instead of wrapping.
    let impressions = if raw.is_finite() && raw > 0.0 { raw.round() as u64 } else { 0 };

    let clicks = ((impressions as f64 * ctr_draw).floor() as u64).min(impressions);
    let conversions = ((clicks as f64 * cvr_draw).floor() as u64).min(clicks);

    let cost = round2(clicks as f64 * cpc_draw);
    let revenue = round2(conversions as f64 * aov_draw);

    DailyMetrics {
        impressions,
        clicks,
        conversions,
        cost,
        revenue,
        ctr:  ratio(clicks as f64, impressions as f64),
        cpc:  ratio(cost, clicks as f64),
        cvr:  ratio(conversions as f64, clicks as f64),
        roas: ratio(revenue, cost),
        aov:  ratio(revenue, conversions as f64),
    }
}

/// One entry per calendar day in `[start, end]`, ascending.
/// An inverted range yields no entries.
pub fn generate_date_range_metrics(
    start: NaiveDate,
    end: NaiveDate,
    trend_profile: TrendProfile,
    base_impressions: u64,
    platform: Option<Platform>,
    rng: &mut SeededRng,
) -> Vec<DatedMetrics> {
    if end < start {
        return Vec::new();
    }
    let total_days = u32::try_from((end - start).num_days() + 1).unwrap_or(u32::MAX);

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .enumerate()
        .map(|(i, date)| {
            let params = SimulationParams {
                date,
                trend_profile,
                base_impressions,
                day_index: i as u32,
                total_days,
                platform,
            };
            DatedMetrics { date, metrics: generate_daily_metrics(&params, rng) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn single_day_run_has_zero_progress() {
        assert_eq!(progress_ratio(0, 1), 0.0);
        assert_eq!(progress_ratio(0, 0), 0.0);
        assert_eq!(progress_ratio(9, 10), 1.0);
    }

    #[test]
    fn weekend_is_quieter_on_default_platform() {
        let sat = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert!(seasonality_baseline(sat, Platform::GoogleAds) < seasonality_baseline(monday(), Platform::GoogleAds));
    }

    #[test]
    fn every_call_consumes_the_same_number_of_draws() {
        let zero = SimulationParams {
            date: monday(),
            trend_profile: TrendProfile::Stable,
            base_impressions: 0,
            day_index: 0,
            total_days: 1,
            platform: None,
        };
        let busy = SimulationParams { base_impressions: 50_000, ..zero.clone() };

        let mut a = SeededRng::new(5);
        let mut b = SeededRng::new(5);
        generate_daily_metrics(&zero, &mut a);
        generate_daily_metrics(&busy, &mut b);
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn round2_drops_non_finite() {
        assert_eq!(round2(f64::NAN), 0.0);
        assert_eq!(round2(f64::INFINITY), 0.0);
        assert_eq!(round2(1.005_1), 1.01);
    }
}
