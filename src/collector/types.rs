//! Input categories delivered by the capture layer.
//!
//! Only a coarse category is carried - never which key or button was pressed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a single physical input action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputCategory {
    /// Key press
    Keyboard,
    /// Left button press
    MouseLeft,
    /// Right button press
    MouseRight,
    /// Middle button press
    MouseMiddle,
    /// Side/extra button press
    MouseExtra,
    /// Wheel notch
    MouseWheel,
}

/// Statistics bucket an input category is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatCategory {
    Keyboard,
    Mouse,
}

impl InputCategory {
    /// All categories in declaration order.
    pub const ALL: [InputCategory; 6] = [
        InputCategory::Keyboard,
        InputCategory::MouseLeft,
        InputCategory::MouseRight,
        InputCategory::MouseMiddle,
        InputCategory::MouseExtra,
        InputCategory::MouseWheel,
    ];

    /// Collapse mouse variants into a single mouse bucket.
    pub fn stat_category(self) -> StatCategory {
        match self {
            InputCategory::Keyboard => StatCategory::Keyboard,
            InputCategory::MouseLeft
            | InputCategory::MouseRight
            | InputCategory::MouseMiddle
            | InputCategory::MouseExtra
            | InputCategory::MouseWheel => StatCategory::Mouse,
        }
    }

    /// Whether this is a mouse button press (wheel excluded).
    pub fn is_click(self) -> bool {
        matches!(
            self,
            InputCategory::MouseLeft
                | InputCategory::MouseRight
                | InputCategory::MouseMiddle
                | InputCategory::MouseExtra
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            InputCategory::Keyboard => "keyboard",
            InputCategory::MouseLeft => "mouse_left",
            InputCategory::MouseRight => "mouse_right",
            InputCategory::MouseMiddle => "mouse_middle",
            InputCategory::MouseExtra => "mouse_extra",
            InputCategory::MouseWheel => "mouse_wheel",
        }
    }
}

impl fmt::Display for InputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized category tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown input category: {0:?}")]
pub struct UnknownCategory(pub String);

impl FromStr for InputCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "k" | "key" | "keyboard" => Ok(InputCategory::Keyboard),
            "l" | "left" | "mouse_left" => Ok(InputCategory::MouseLeft),
            "r" | "right" | "mouse_right" => Ok(InputCategory::MouseRight),
            "m" | "middle" | "mouse_middle" => Ok(InputCategory::MouseMiddle),
            "x" | "extra" | "mouse_extra" => Ok(InputCategory::MouseExtra),
            "w" | "wheel" | "mouse_wheel" => Ok(InputCategory::MouseWheel),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// A captured input action with its capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Timestamp when the capture layer saw the event
    pub timestamp: DateTime<Utc>,
    pub category: InputCategory,
}

impl InputEvent {
    pub fn new(category: InputCategory) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_variants_collapse() {
        for category in InputCategory::ALL {
            let expected = if category == InputCategory::Keyboard {
                StatCategory::Keyboard
            } else {
                StatCategory::Mouse
            };
            assert_eq!(category.stat_category(), expected);
        }
    }

    #[test]
    fn test_wheel_is_not_a_click() {
        assert!(InputCategory::MouseLeft.is_click());
        assert!(InputCategory::MouseExtra.is_click());
        assert!(!InputCategory::MouseWheel.is_click());
        assert!(!InputCategory::Keyboard.is_click());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("k".parse::<InputCategory>(), Ok(InputCategory::Keyboard));
        assert_eq!(" Wheel ".parse::<InputCategory>(), Ok(InputCategory::MouseWheel));
        assert_eq!(
            "mouse_right".parse::<InputCategory>(),
            Ok(InputCategory::MouseRight)
        );
        assert!("joystick".parse::<InputCategory>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for category in InputCategory::ALL {
            assert_eq!(category.to_string().parse::<InputCategory>(), Ok(category));
        }
    }
}
