//! 桩号格式化：把沿线距离写成 `XX+YY` 形式（百位以上 + 两位余数）。

use std::fmt;

use crate::errors::EngineError;

/// 非负整数桩号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StationValue(u64);

impl StationValue {
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// 按银行家舍入（逢五取偶）取整后的沿线距离。
    pub fn from_distance(distance: f64) -> Result<Self, EngineError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(EngineError::InvalidStationValue(distance));
        }
        let rounded = distance.round_ties_even();
        if rounded >= u64::MAX as f64 {
            return Err(EngineError::InvalidStationValue(distance));
        }
        Ok(Self(rounded as u64))
    }
}

impl TryFrom<i64> for StationValue {
    type Error = EngineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| EngineError::InvalidStationValue(value as f64))
    }
}

impl fmt::Display for StationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        match digits.len() {
            1 => write!(f, "0+0{digits}"),
            2 => write!(f, "0+{digits}"),
            len => {
                let (head, tail) = digits.split_at(len - 2);
                write!(f, "{head}+{tail}")
            }
        }
    }
}

/// `1234 → "12+34"`；负数返回 `InvalidStationValue`。
pub fn format_station(value: i64) -> Result<String, EngineError> {
    StationValue::try_from(value).map(|station| station.to_string())
}

pub fn station_from_distance(distance: f64) -> Result<String, EngineError> {
    StationValue::from_distance(distance).map(|station| station.to_string())
}

/// 标注框文字：桩号后可跟管线编号，如 `"12+34 LINE 2"`。
pub fn format_callout_station(
    value: StationValue,
    line_number: Option<&str>,
) -> String {
    match line_number.map(str::trim).filter(|line| !line.is_empty()) {
        Some(line) => format!("{value} LINE {line}"),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_reference_table() {
        let table = [
            (0, "0+00"),
            (7, "0+07"),
            (99, "0+99"),
            (100, "1+00"),
            (1234, "12+34"),
            (2599, "25+99"),
            (100_000, "1000+00"),
        ];
        for (value, expected) in table {
            assert_eq!(format_station(value).unwrap(), expected, "value {value}");
        }
    }

    #[test]
    fn negative_values_are_rejected() {
        assert_eq!(
            format_station(-1),
            Err(EngineError::InvalidStationValue(-1.0))
        );
        assert!(station_from_distance(-0.2).is_err());
        assert!(station_from_distance(f64::NAN).is_err());
        assert!(station_from_distance(f64::INFINITY).is_err());
    }

    #[test]
    fn distances_round_half_to_even() {
        assert_eq!(station_from_distance(150.5).unwrap(), "1+50");
        assert_eq!(station_from_distance(151.5).unwrap(), "1+52");
        assert_eq!(station_from_distance(149.5).unwrap(), "1+50");
        assert_eq!(station_from_distance(149.49).unwrap(), "1+49");
        assert_eq!(station_from_distance(2.5).unwrap(), "0+02");
        assert_eq!(station_from_distance(0.5).unwrap(), "0+00");
        assert_eq!(station_from_distance(0.51).unwrap(), "0+01");
    }

    #[test]
    fn callout_appends_line_number() {
        let value = StationValue::new(1234);
        assert_eq!(format_callout_station(value, Some("2")), "12+34 LINE 2");
        assert_eq!(format_callout_station(value, Some("  ")), "12+34");
        assert_eq!(format_callout_station(value, None), "12+34");
    }
}
