use serde::Serialize;

/// Colour family a badge is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Blue,
    Yellow,
    Green,
    Red,
    Purple,
    Indigo,
}

/// Fixed visual treatment for a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub tone: BadgeTone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
}

impl Badge {
    pub const fn new(label: &'static str, tone: BadgeTone) -> Self {
        Self {
            label,
            tone,
            icon: None,
        }
    }

    pub const fn with_icon(self, icon: &'static str) -> Self {
        Self {
            icon: Some(icon),
            ..self
        }
    }
}

/// One headline number on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
}

impl StatCard {
    pub fn new(title: &'static str, value: impl ToString) -> Self {
        Self {
            title,
            value: value.to_string(),
        }
    }
}
