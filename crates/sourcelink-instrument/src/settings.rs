//! Working settings of the source instrument.
//!
//! Enumerated ranges carry the numeric codes used on the wire. Validation
//! lives here so that any remote interface applies the same bounds.

/// Output mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputMode {
    /// Voltage source output.
    Voltage = 0,
    /// Current source output.
    Current = 1,
}

/// Output waveform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputShape {
    /// DC output.
    Dc = 0,
    /// Sine output at the working frequency.
    Sine = 1,
}

/// Voltage output ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoltageRange {
    /// 10 mV full scale.
    Mv10 = 1,
    /// 100 mV full scale.
    Mv100 = 2,
    /// 1 V full scale.
    V1 = 3,
    /// 10 V full scale.
    V10 = 4,
    /// 100 V full scale.
    V100 = 5,
}

/// Current output ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CurrentRange {
    /// 1 µA full scale.
    Ua1 = 1,
    /// 10 µA full scale.
    Ua10 = 2,
    /// 100 µA full scale.
    Ua100 = 3,
    /// 1 mA full scale.
    Ma1 = 4,
    /// 10 mA full scale.
    Ma10 = 5,
    /// 100 mA full scale.
    Ma100 = 6,
    /// High-voltage AC bypass path.
    HvAcBypass = 7,
}

/// Current compliance voltage ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComplianceRange {
    /// 10 V compliance.
    V10 = 1,
    /// 100 V compliance.
    V100 = 2,
}

/// Front/rear terminal selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Terminals {
    /// Front panel terminals.
    Front = 0,
    /// Rear panel terminals.
    Rear = 1,
}

macro_rules! code_enum {
    ($type:ty { $($variant:ident),+ $(,)? }) => {
        impl TryFrom<i64> for $type {
            type Error = ();

            fn try_from(code: i64) -> Result<Self, ()> {
                $(
                    if code == <$type>::$variant as i64 {
                        return Ok(<$type>::$variant);
                    }
                )+
                Err(())
            }
        }
    };
}

code_enum!(OutputMode { Voltage, Current });
code_enum!(OutputShape { Dc, Sine });
code_enum!(VoltageRange { Mv10, Mv100, V1, V10, V100 });
code_enum!(CurrentRange { Ua1, Ua10, Ua100, Ma1, Ma10, Ma100, HvAcBypass });
code_enum!(ComplianceRange { V10, V100 });
code_enum!(Terminals { Front, Rear });

impl VoltageRange {
    /// Full-scale output for the range, in volts.
    pub fn full_scale(&self) -> f64 {
        match self {
            VoltageRange::Mv10 => 0.010,
            VoltageRange::Mv100 => 0.100,
            VoltageRange::V1 => 1.0,
            VoltageRange::V10 => 10.0,
            VoltageRange::V100 => 100.0,
        }
    }
}

impl CurrentRange {
    /// Full-scale output for the range, in amps.
    pub fn full_scale(&self) -> f64 {
        match self {
            CurrentRange::Ua1 => 1e-6,
            CurrentRange::Ua10 => 1e-5,
            CurrentRange::Ua100 => 1e-4,
            CurrentRange::Ma1 => 1e-3,
            CurrentRange::Ma10 => 1e-2,
            CurrentRange::Ma100 => 0.100,
            CurrentRange::HvAcBypass => 0.100,
        }
    }
}

/// Amplitude/offset pair for an output level.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutputLevel {
    /// Peak amplitude of the programmed output.
    pub amplitude: f64,
    /// DC offset of the programmed output.
    pub offset: f64,
}

/// Static identification reported over the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentInfo {
    /// Human readable model number.
    pub model_number: &'static str,
    /// Firmware target instrument, used by package management.
    pub firmware_type: &'static str,
    /// Firmware version name.
    pub version_name: &'static str,
    /// Hardware board revision.
    pub board_revision: &'static str,
    /// Whether the instrument can source current.
    pub current_capability: bool,
}

/// Lowest frequency the output stage can generate, in Hz.
pub const MIN_FREQUENCY_HZ: f64 = 0.100;
/// Highest frequency the output stage can generate, in Hz.
pub const MAX_FREQUENCY_HZ: f64 = 100_000.0;

/// Frequency bound check for the remote interface.
pub fn validate_frequency(frequency_hz: f64) -> bool {
    (MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz)
}

/// Bound check for an amplitude/offset pair against a range's full scale.
///
/// In DC mode only the amplitude drives the output, so the offset is
/// ignored; otherwise the combined peak must stay within the range.
pub fn validate_level(level: OutputLevel, shape: OutputShape, full_scale: f64) -> bool {
    let mut peak = level.amplitude;
    if shape != OutputShape::Dc {
        peak += level.offset;
    }
    (-full_scale..=full_scale).contains(&peak)
}

/// The complete working settings of the instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Voltage or current sourcing.
    pub mode: OutputMode,
    /// Whether the output terminals are driven.
    pub output_enabled: bool,
    /// Whether calibration data is write-protected.
    pub calibration_locked: bool,
    /// Working output frequency in Hz; 0 while the shape is DC.
    pub frequency_hz: f64,
    /// Working waveform shape.
    pub shape: OutputShape,
    /// Active voltage range.
    pub voltage_range: VoltageRange,
    /// Voltage autoranging enabled.
    pub voltage_autorange: bool,
    /// Programmed voltage output level.
    pub voltage_level: OutputLevel,
    /// Programmed current output level.
    pub current_level: OutputLevel,
    /// Active current range.
    pub current_range: CurrentRange,
    /// Current autoranging enabled.
    pub current_autorange: bool,
    /// Selected compliance range.
    pub compliance_range: ComplianceRange,
    /// Whether the current output is in compliance limit.
    pub compliance_active: bool,
    /// Whether the voltage output is in current limit.
    pub protection_active: bool,
    /// Selected output terminals.
    pub terminals: Terminals,
    /// Static identification.
    pub info: InstrumentInfo,
}

impl Settings {
    /// The power-on state: output disabled, calibration locked, lowest
    /// ranges selected, levels at zero.
    pub fn power_on_defaults() -> Self {
        Settings {
            mode: OutputMode::Voltage,
            output_enabled: false,
            calibration_locked: true,
            frequency_hz: 0.0,
            shape: OutputShape::Dc,
            voltage_range: VoltageRange::Mv10,
            voltage_autorange: false,
            voltage_level: OutputLevel::default(),
            current_level: OutputLevel::default(),
            current_range: CurrentRange::Ua1,
            current_autorange: false,
            compliance_range: ComplianceRange::V10,
            compliance_active: false,
            protection_active: false,
            terminals: Terminals::Rear,
            info: InstrumentInfo {
                model_number: "Model 155",
                firmware_type: "155acdc",
                version_name: "1.0.0",
                board_revision: "0",
                current_capability: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_codes_round_trip() {
        assert_eq!(VoltageRange::try_from(1), Ok(VoltageRange::Mv10));
        assert_eq!(VoltageRange::try_from(5), Ok(VoltageRange::V100));
        assert!(VoltageRange::try_from(0).is_err());
        assert!(VoltageRange::try_from(6).is_err());

        assert_eq!(CurrentRange::try_from(7), Ok(CurrentRange::HvAcBypass));
        assert!(CurrentRange::try_from(8).is_err());
    }

    #[test]
    fn frequency_bounds_are_inclusive() {
        assert!(validate_frequency(MIN_FREQUENCY_HZ));
        assert!(validate_frequency(MAX_FREQUENCY_HZ));
        assert!(!validate_frequency(0.099));
        assert!(!validate_frequency(100_001.0));
    }

    #[test]
    fn level_validation_uses_the_range_full_scale() {
        let level = OutputLevel {
            amplitude: 9.5,
            offset: -1.0,
        };
        assert!(validate_level(
            level,
            OutputShape::Sine,
            VoltageRange::V10.full_scale()
        ));
        assert!(!validate_level(
            level,
            OutputShape::Sine,
            VoltageRange::V1.full_scale()
        ));
    }

    #[test]
    fn dc_level_validation_ignores_the_offset() {
        let level = OutputLevel {
            amplitude: 0.05,
            offset: -0.2,
        };
        let full_scale = VoltageRange::Mv100.full_scale();
        assert!(validate_level(level, OutputShape::Dc, full_scale));
        assert!(!validate_level(level, OutputShape::Sine, full_scale));
    }

    #[test]
    fn power_on_defaults_are_safe() {
        let settings = Settings::power_on_defaults();
        assert!(!settings.output_enabled);
        assert!(settings.calibration_locked);
        assert_eq!(settings.voltage_range, VoltageRange::Mv10);
        assert_eq!(settings.current_range, CurrentRange::Ua1);
        assert_eq!(settings.voltage_level, OutputLevel::default());
    }
}
