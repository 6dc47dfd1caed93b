//! Climate arguments — HVAC mode synonyms and temperature parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const TEMPERATURE_KEYWORDS: [&str; 3] = ["temp", "temperature", "温度"];
const TEMPERATURE_SUFFIXES: [&str; 4] = ["°c", "℃", "度", "c"];

/// HVAC mode understood by the `climate` verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Cool,
    Heat,
    FanOnly,
    Off,
}

impl HvacMode {
    /// Map a user-typed mode (English or Chinese synonym) onto the enum.
    #[must_use]
    pub fn from_synonym(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "cool" | "cooling" | "制冷" | "冷" => Some(Self::Cool),
            "heat" | "heating" | "制热" | "热" | "暖" => Some(Self::Heat),
            "fan" | "fan_only" | "fanonly" | "通风" | "送风" => Some(Self::FanOnly),
            "off" | "关闭" | "关" => Some(Self::Off),
            _ => None,
        }
    }

    /// Platform value for `hvac_mode`.
    #[must_use]
    pub fn as_platform_str(self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Heat => "heat",
            Self::FanOnly => "fan_only",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_platform_str())
    }
}

/// Requested climate change. At least one field is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateSettings {
    pub mode: Option<HvacMode>,
    pub temperature: Option<f64>,
}

impl ClimateSettings {
    /// Parse the setting arguments that follow the climate target.
    ///
    /// Accepts a mode synonym, a bare temperature (`26`, `26.5`, `26℃`,
    /// `26度`) or a keyword followed by a temperature (`temp 25`). Later
    /// values override earlier ones.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidTemperature`] for a malformed number
    /// - [`ValidationError::UnknownClimateArgument`] for anything else unrecognised
    /// - [`ValidationError::MissingClimateSetting`] when neither mode nor temperature is given
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ValidationError> {
        let mut settings = Self {
            mode: None,
            temperature: None,
        };
        let mut iter = args.iter().map(|arg| arg.as_ref());
        while let Some(arg) = iter.next() {
            if let Some(mode) = HvacMode::from_synonym(arg) {
                settings.mode = Some(mode);
            } else if TEMPERATURE_KEYWORDS.contains(&arg.to_lowercase().as_str()) {
                let value = iter
                    .next()
                    .ok_or_else(|| ValidationError::InvalidTemperature(arg.to_string()))?;
                settings.temperature = Some(parse_temperature(value)?);
            } else if looks_numeric(arg) {
                settings.temperature = Some(parse_temperature(arg)?);
            } else {
                return Err(ValidationError::UnknownClimateArgument(arg.to_string()));
            }
        }

        if settings.mode.is_none() && settings.temperature.is_none() {
            return Err(ValidationError::MissingClimateSetting);
        }
        Ok(settings)
    }
}

fn looks_numeric(raw: &str) -> bool {
    raw.trim_start_matches(['+', '-'])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

/// Parse a temperature token, stripping a trailing unit.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTemperature`] unless the token is a
/// finite number.
pub fn parse_temperature(raw: &str) -> Result<f64, ValidationError> {
    let lowered = raw.trim().to_lowercase();
    let number = TEMPERATURE_SUFFIXES
        .iter()
        .find_map(|suffix| lowered.strip_suffix(suffix))
        .unwrap_or(&lowered)
        .trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ValidationError::InvalidTemperature(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_chinese_synonyms_onto_modes() {
        assert_eq!(HvacMode::from_synonym("制冷"), Some(HvacMode::Cool));
        assert_eq!(HvacMode::from_synonym("制热"), Some(HvacMode::Heat));
        assert_eq!(HvacMode::from_synonym("通风"), Some(HvacMode::FanOnly));
        assert_eq!(HvacMode::from_synonym("关闭"), Some(HvacMode::Off));
    }

    #[test]
    fn should_map_english_modes_case_insensitively() {
        assert_eq!(HvacMode::from_synonym("COOL"), Some(HvacMode::Cool));
        assert_eq!(HvacMode::from_synonym("fan"), Some(HvacMode::FanOnly));
        assert_eq!(HvacMode::from_synonym("dry"), None);
    }

    #[test]
    fn should_parse_mode_and_temperature() {
        let settings = ClimateSettings::parse(&["cool", "26"]).unwrap();
        assert_eq!(settings.mode, Some(HvacMode::Cool));
        assert_eq!(settings.temperature, Some(26.0));
    }

    #[test]
    fn should_parse_temperature_after_keyword() {
        let settings = ClimateSettings::parse(&["temp", "25.5"]).unwrap();
        assert_eq!(settings.mode, None);
        assert_eq!(settings.temperature, Some(25.5));
    }

    #[test]
    fn should_strip_temperature_suffixes() {
        assert_eq!(parse_temperature("26℃"), Ok(26.0));
        assert_eq!(parse_temperature("26°C"), Ok(26.0));
        assert_eq!(parse_temperature("24度"), Ok(24.0));
        assert_eq!(parse_temperature("22c"), Ok(22.0));
    }

    #[test]
    fn should_reject_malformed_temperature() {
        let result = ClimateSettings::parse(&["cool", "2x6"]);
        assert_eq!(
            result,
            Err(ValidationError::InvalidTemperature("2x6".to_string()))
        );
    }

    #[test]
    fn should_reject_keyword_without_value() {
        let result = ClimateSettings::parse(&["temp"]);
        assert!(matches!(result, Err(ValidationError::InvalidTemperature(_))));
    }

    #[test]
    fn should_require_mode_or_temperature() {
        let empty: [&str; 0] = [];
        assert_eq!(
            ClimateSettings::parse(&empty),
            Err(ValidationError::MissingClimateSetting)
        );
    }

    #[test]
    fn should_reject_unknown_argument() {
        let result = ClimateSettings::parse(&["turbo"]);
        assert_eq!(
            result,
            Err(ValidationError::UnknownClimateArgument("turbo".to_string()))
        );
    }

    #[test]
    fn should_let_later_mode_win() {
        let settings = ClimateSettings::parse(&["heat", "off"]).unwrap();
        assert_eq!(settings.mode, Some(HvacMode::Off));
    }
}
