use std::fmt;

/// vertical resolution of a stream, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Quality {
    #[default]
    Unknown,
    Height(u32),
}

impl Quality {
    /// reads the first run of digits in a label such as `v720`, `720p` or `1080`.
    pub fn from_name(name: &str) -> Self {
        let digits: String = name
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        match digits.parse::<u32>() {
            Ok(0) | Err(_) => Self::Unknown,
            Ok(height) => Self::Height(height),
        }
    }

    pub fn from_height(height: u32) -> Self {
        if height == 0 {
            Self::Unknown
        } else {
            Self::Height(height)
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Height(_))
    }

    /// `self` unless it is unknown, in which case `hint`.
    pub fn or(self, hint: Quality) -> Self {
        match self {
            Self::Unknown => hint,
            known => known,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Height(h) => write!(f, "{h}p"),
        }
    }
}

/// drops the conventional non-digit prefix of a mirror quality label (`v720` -> `720`).
pub fn strip_label_prefix(label: &str) -> &str {
    label.trim_start_matches(|c: char| !c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_reads_first_number() {
        assert_eq!(Quality::from_name("v720"), Quality::Height(720));
        assert_eq!(Quality::from_name("1080p"), Quality::Height(1080));
        assert_eq!(Quality::from_name("HD 480 (x264)"), Quality::Height(480));
        assert_eq!(Quality::from_name("auto"), Quality::Unknown);
        assert_eq!(Quality::from_name(""), Quality::Unknown);
    }

    #[test]
    fn or_prefers_known_quality() {
        assert_eq!(Quality::Height(360).or(Quality::Height(720)), Quality::Height(360));
        assert_eq!(Quality::Unknown.or(Quality::Height(720)), Quality::Height(720));
    }

    #[test]
    fn strip_label_prefix_keeps_digits() {
        assert_eq!(strip_label_prefix("v720"), "720");
        assert_eq!(strip_label_prefix("480"), "480");
        assert_eq!(strip_label_prefix("hd"), "");
    }

    #[test]
    fn display_uses_p_suffix() {
        assert_eq!(Quality::Height(720).to_string(), "720p");
        assert_eq!(Quality::Unknown.to_string(), "unknown");
    }
}
