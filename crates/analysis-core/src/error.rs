use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stage of the pipeline an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Technical,
    Fundamental,
    Sentiment,
    Composer,
    Risk,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Technical => "technical",
            Component::Fundamental => "fundamental",
            Component::Sentiment => "sentiment",
            Component::Composer => "composer",
            Component::Risk => "risk",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification used by callers to decide between recovery and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Not enough usable data. Recovered by excluding the affected pillar.
    DataInsufficiency,
    /// Caller supplied invalid parameters. Fatal to the call.
    ConfigurationInvalidity,
    /// Nothing left to base a judgment on. Fatal, and distinct from a hold.
    NoSignal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data for {component} `{subject}`: need {required}, have {available}")]
    InsufficientData {
        component: Component,
        subject: String,
        required: usize,
        available: usize,
    },

    #[error("Invalid {component} item #{index} (`{field}`): {reason}")]
    InvalidItem {
        component: Component,
        index: usize,
        field: String,
        reason: String,
    },

    #[error("Invalid {component} data `{subject}`: {reason}")]
    InvalidData {
        component: Component,
        subject: String,
        reason: String,
    },

    #[error("Invalid risk parameter `{parameter}`: {reason}")]
    InvalidRiskParameters { parameter: String, reason: String },

    #[error("Invalid {component} configuration `{parameter}`: {reason}")]
    InvalidConfiguration {
        component: Component,
        parameter: String,
        reason: String,
    },

    #[error("No signal: zero effective weight for {}", join_components(.pillars))]
    NoSignal { pillars: Vec<Component> },
}

fn join_components(components: &[Component]) -> String {
    components
        .iter()
        .map(Component::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AnalysisError {
    pub fn insufficient(component: Component, subject: impl Into<String>, required: usize, available: usize) -> Self {
        AnalysisError::InsufficientData {
            component,
            subject: subject.into(),
            required,
            available,
        }
    }

    pub fn invalid_item(component: Component, index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidItem {
            component,
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_risk(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidRiskParameters {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(component: Component, parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidConfiguration {
            component,
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::InsufficientData { .. }
            | AnalysisError::InvalidItem { .. }
            | AnalysisError::InvalidData { .. } => ErrorCategory::DataInsufficiency,
            AnalysisError::InvalidRiskParameters { .. } | AnalysisError::InvalidConfiguration { .. } => {
                ErrorCategory::ConfigurationInvalidity
            }
            AnalysisError::NoSignal { .. } => ErrorCategory::NoSignal,
        }
    }

    /// Whether the orchestrator may drop the affected pillar and carry on.
    pub fn is_recoverable(&self) -> bool {
        self.category() == ErrorCategory::DataInsufficiency
    }

    /// The component or parameter this error points at, for diagnostics.
    pub fn subject(&self) -> String {
        match self {
            AnalysisError::InsufficientData { component, subject, .. }
            | AnalysisError::InvalidData { component, subject, .. } => format!("{}.{}", component, subject),
            AnalysisError::InvalidItem { component, index, field, .. } => {
                format!("{}[{}].{}", component, index, field)
            }
            AnalysisError::InvalidRiskParameters { parameter, .. } => format!("risk.{}", parameter),
            AnalysisError::InvalidConfiguration { component, parameter, .. } => {
                format!("{}.{}", component, parameter)
            }
            AnalysisError::NoSignal { pillars } => join_components(pillars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = AnalysisError::insufficient(Component::Technical, "rsi_14", 15, 3);
        assert_eq!(err.category(), ErrorCategory::DataInsufficiency);
        assert!(err.is_recoverable());

        let err = AnalysisError::invalid_risk("max_risk_per_trade", "must be in (0, 1]");
        assert_eq!(err.category(), ErrorCategory::ConfigurationInvalidity);
        assert!(!err.is_recoverable());

        let err = AnalysisError::NoSignal { pillars: vec![Component::Technical] };
        assert_eq!(err.category(), ErrorCategory::NoSignal);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_subject() {
        let err = AnalysisError::insufficient(Component::Technical, "ma_trend", 50, 20);
        assert_eq!(
            err.to_string(),
            "Insufficient data for technical `ma_trend`: need 50, have 20"
        );
        assert_eq!(err.subject(), "technical.ma_trend");

        let err = AnalysisError::NoSignal {
            pillars: vec![Component::Technical, Component::Fundamental, Component::Sentiment],
        };
        assert_eq!(
            err.to_string(),
            "No signal: zero effective weight for technical, fundamental, sentiment"
        );

        let err = AnalysisError::invalid_item(Component::Sentiment, 2, "timestamp", "in the future");
        assert_eq!(err.subject(), "sentiment[2].timestamp");
    }
}
