//! Conversion of exposure time and averaging count into firmware clock ticks.

use crate::{error::TimingViolation, firmware::FirmwareProfile};
use core::fmt;
use serde::{Deserialize, Serialize};

pub const MIN_AVERAGES: u32 = 1;
pub const MAX_AVERAGES: u32 = 255;

/// What the user asked for, before it is resolved against a firmware profile
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingRequest {
    pub exposure_seconds: f64,
    pub averages: u32,
    pub continuous: bool,
}

impl TimingRequest {
    pub fn resolve(&self, profile: FirmwareProfile) -> Result<TimingConfig, TimingViolation> {
        Ok(compute(self.exposure_seconds, self.averages, profile)?.with_continuous(self.continuous))
    }
}

impl Default for TimingRequest {
    fn default() -> Self {
        TimingRequest {
            exposure_seconds: 0.01,
            averages: 1,
            continuous: false,
        }
    }
}

/// Firmware-legal timing. Only [`compute`] and [`TimingConfig::validate`] hand these out
/// for a given profile, so `sh_ticks` is in range and `icg_ticks` is a multiple of it.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct TimingConfig {
    /// Achieved exposure, `sh_ticks / mclk_hz`
    pub exposure_seconds: f64,
    pub sh_ticks: u32,
    pub icg_ticks: u32,
    pub averages: u8,
    pub continuous: bool,
}

/// Resolves an exposure time and averaging count into SH and ICG periods.
///
/// SH is the exposure rounded to the nearest tick and is rejected rather than clamped when
/// out of range. ICG is the smallest multiple of SH that covers the sensor readout.
pub fn compute(
    exposure_seconds: f64,
    averages: u32,
    profile: FirmwareProfile,
) -> Result<TimingConfig, TimingViolation> {
    let params = profile.params();
    if !exposure_seconds.is_finite() || exposure_seconds < 0.0 {
        return Err(TimingViolation::InvalidExposure(exposure_seconds));
    }

    // f64::round rounds half away from zero
    let ticks = (exposure_seconds * params.mclk_hz as f64).round();
    let sh = if ticks > u64::MAX as f64 {
        u64::MAX
    } else {
        ticks as u64
    };
    if sh < params.min_sh_ticks as u64 || sh > params.max_sh_ticks as u64 {
        return Err(TimingViolation::ShOutOfRange {
            ticks: sh,
            min: params.min_sh_ticks,
            max: params.max_sh_ticks,
        });
    }

    if !(MIN_AVERAGES..=MAX_AVERAGES).contains(&averages) {
        return Err(TimingViolation::AveragesOutOfRange(averages));
    }

    let min_icg = params.min_icg_ticks as u64;
    let n = ((min_icg + sh - 1) / sh).max(1);
    let icg = n * sh;
    debug_assert!(icg >= min_icg && icg >= sh);
    debug_assert_eq!(icg % sh, 0);
    // sh >= min_icg gives n == 1, otherwise icg < min_icg + sh, both fit in u32
    let icg = icg as u32;
    let sh = sh as u32;

    Ok(TimingConfig {
        exposure_seconds: sh as f64 / params.mclk_hz as f64,
        sh_ticks: sh,
        icg_ticks: icg,
        averages: averages as u8,
        continuous: false,
    })
}

impl TimingConfig {
    pub fn with_continuous(self, continuous: bool) -> Self {
        TimingConfig { continuous, ..self }
    }

    /// Checks a config that did not come out of [`compute`], a decoded command for example
    pub fn validate(&self, profile: FirmwareProfile) -> Result<(), TimingViolation> {
        let p = profile.params();
        if self.sh_ticks < p.min_sh_ticks || self.sh_ticks > p.max_sh_ticks {
            return Err(TimingViolation::ShOutOfRange {
                ticks: self.sh_ticks.into(),
                min: p.min_sh_ticks,
                max: p.max_sh_ticks,
            });
        }
        if self.icg_ticks < p.min_icg_ticks || self.icg_ticks < self.sh_ticks {
            return Err(TimingViolation::IcgTooShort {
                icg: self.icg_ticks,
                min: p.min_icg_ticks.max(self.sh_ticks),
            });
        }
        if self.icg_ticks % self.sh_ticks != 0 {
            return Err(TimingViolation::IcgNotMultiple {
                icg: self.icg_ticks,
                sh: self.sh_ticks,
            });
        }
        if self.averages == 0 {
            return Err(TimingViolation::AveragesOutOfRange(0));
        }
        Ok(())
    }

    /// Time between two spectra, device side averaging included
    pub fn frame_time_seconds(&self, profile: FirmwareProfile) -> f64 {
        let ticks = self.icg_ticks as u64 * self.averages as u64;
        ticks as f64 / profile.params().mclk_hz as f64
    }

    pub fn rate_hz(&self, profile: FirmwareProfile) -> f64 {
        1.0 / self.frame_time_seconds(profile)
    }
}

/// Human readable breakdown of a timing config
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct TimingInfo {
    pub profile: FirmwareProfile,
    pub mclk_hz: u64,
    pub exposure_ms: f64,
    pub sh_ticks: u32,
    pub sh_us: f64,
    pub icg_ticks: u32,
    pub icg_ms: f64,
    pub averages: u8,
    pub frame_time_ms: f64,
    pub rate_hz: f64,
    pub icg_sh_ratio: u32,
}

impl TimingInfo {
    pub fn new(config: &TimingConfig, profile: FirmwareProfile) -> Self {
        let mclk = profile.params().mclk_hz as f64;
        TimingInfo {
            profile,
            mclk_hz: profile.params().mclk_hz,
            exposure_ms: config.exposure_seconds * 1e3,
            sh_ticks: config.sh_ticks,
            sh_us: config.sh_ticks as f64 / mclk * 1e6,
            icg_ticks: config.icg_ticks,
            icg_ms: config.icg_ticks as f64 / mclk * 1e3,
            averages: config.averages,
            frame_time_ms: config.frame_time_seconds(profile) * 1e3,
            rate_hz: config.rate_hz(profile),
            icg_sh_ratio: config.icg_ticks / config.sh_ticks,
        }
    }
}

impl fmt::Display for TimingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SH: {:.1}µs | ICG: {:.2}ms | Frame: {:.2}ms | Rate: {:.2}Hz",
            self.sh_us, self.icg_ms, self.frame_time_ms, self.rate_hz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::MIN_ICG_TICKS;
    use claims::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use FirmwareProfile::*;

    #[test]
    fn ten_ms_exposure() {
        let config = compute(0.01, 1, Stm32F40x).unwrap();
        assert_eq!(config.sh_ticks, 20_000);
        assert_eq!(config.icg_ticks, 20_000);
        assert_eq!(config.frame_time_seconds(Stm32F40x), 0.01);
        assert_eq!(config.rate_hz(Stm32F40x), 100.0);
    }

    #[test]
    fn ten_ms_exposure_ten_averages() {
        let config = compute(0.01, 10, Stm32F40x).unwrap();
        assert_eq!(config.frame_time_seconds(Stm32F40x), 0.1);
        assert_eq!(config.rate_hz(Stm32F40x), 10.0);
    }

    #[test]
    fn short_exposure_stretches_icg() {
        let config = compute(0.001, 1, Stm32F40x).unwrap();
        assert_eq!(config.sh_ticks, 2000);
        assert_eq!(config.icg_ticks, 16_000);
    }

    #[test]
    fn slow_clock_profile() {
        let config = compute(0.01, 1, Stm32F103).unwrap();
        assert_eq!(config.sh_ticks, 8000);
        assert_eq!(config.icg_ticks, 16_000);
    }

    #[test]
    fn achieved_exposure_is_tick_aligned() {
        let config = compute(0.0100000004, 1, Stm32F40x).unwrap();
        assert_eq!(config.sh_ticks, 20_000);
        assert_eq!(config.exposure_seconds, 0.01);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 2^-8 s is exactly 7812.5 ticks at 2 MHz
        let config = compute(0.00390625, 1, Stm32F40x).unwrap();
        assert_eq!(config.sh_ticks, 7813);
    }

    #[test]
    fn sh_boundaries() {
        let config = compute(20.0 / 2e6, 1, Stm32F40x).unwrap();
        assert_eq!(config.sh_ticks, 20);
        assert_err_eq!(
            compute(19.0 / 2e6, 1, Stm32F40x),
            TimingViolation::ShOutOfRange {
                ticks: 19,
                min: 20,
                max: u32::MAX
            }
        );
        assert_ok!(compute(65535.0 / 8e5, 1, Stm32F103Sh16));
        assert_err!(compute(65536.0 / 8e5, 1, Stm32F103Sh16));
        assert_ok!(compute(65536.0 / 8e5, 1, Stm32F103));
        assert_err!(compute(1e12, 1, Stm32F40x));
    }

    #[test]
    fn averages_range() {
        assert_err_eq!(compute(0.01, 0, Stm32F40x), TimingViolation::AveragesOutOfRange(0));
        assert_err_eq!(compute(0.01, 256, Stm32F40x), TimingViolation::AveragesOutOfRange(256));
        assert_eq!(compute(0.01, 255, Stm32F40x).unwrap().averages, 255);
    }

    #[test]
    fn rejects_nonsense_exposure() {
        assert_err!(compute(f64::NAN, 1, Stm32F40x));
        assert_err!(compute(-0.01, 1, Stm32F40x));
        assert_err!(compute(f64::INFINITY, 1, Stm32F40x));
    }

    #[test]
    fn icg_is_minimal_multiple_of_sh() {
        for profile in FirmwareProfile::iter() {
            let p = profile.params();
            let max_sh = p.max_sh_ticks.min(40_000);
            for sh in (p.min_sh_ticks..=max_sh).step_by(7) {
                let exposure = sh as f64 / p.mclk_hz as f64;
                let config = compute(exposure, 1, profile).unwrap();
                assert_eq!(config.sh_ticks, sh);
                assert_eq!(config.icg_ticks % config.sh_ticks, 0);
                assert!(config.icg_ticks >= MIN_ICG_TICKS);
                assert!(config.icg_ticks >= config.sh_ticks);
                let n = config.icg_ticks / config.sh_ticks;
                assert!(n == 1 || (n - 1) * config.sh_ticks < MIN_ICG_TICKS);
                assert_ok!(config.validate(profile));
            }
        }
    }

    #[test]
    fn validate_foreign_config() {
        let mut config = compute(0.001, 1, Stm32F40x).unwrap();
        config.icg_ticks = 16_001;
        assert_err_eq!(
            config.validate(Stm32F40x),
            TimingViolation::IcgNotMultiple { icg: 16_001, sh: 2000 }
        );
        config.icg_ticks = 14_000;
        assert_err!(config.validate(Stm32F40x));
        config.icg_ticks = 16_000;
        config.averages = 0;
        assert_err_eq!(config.validate(Stm32F40x), TimingViolation::AveragesOutOfRange(0));
    }

    #[test]
    fn timing_info_summary() {
        let config = compute(0.01, 10, Stm32F40x).unwrap();
        let info = TimingInfo::new(&config, Stm32F40x);
        assert_eq!(info.icg_sh_ratio, 1);
        assert_eq!(
            info.to_string(),
            "SH: 10000.0µs | ICG: 10.00ms | Frame: 100.00ms | Rate: 10.00Hz"
        );
    }

    #[test]
    fn request_resolution_keeps_continuous_flag() {
        let request = TimingRequest {
            exposure_seconds: 0.1,
            averages: 1,
            continuous: true,
        };
        let config = request.resolve(Stm32F40x).unwrap();
        assert!(config.continuous);
        assert_eq!(config.sh_ticks, 200_000);
        assert_eq!(config.icg_ticks, 200_000);
    }
}
