//! Path categorization by ordered substring rules

use msp_mcp_shared::CategoryRule;

pub const DEFAULT_CATEGORY: &str = "Other";

/// Built-in table for MSP-style APIs. More specific markers come first so a
/// path carrying two markers lands in the earlier category.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("/ticket", "Tickets"),
    ("/alert", "Alerts"),
    ("/patch", "Patching"),
    ("/backup", "Backup"),
    ("/script", "Scripting"),
    ("/software", "Software"),
    ("/polic", "Policies"),
    ("/device", "Devices"),
    ("/asset", "Assets"),
    ("/organization", "Organizations"),
    ("/compan", "Companies"),
    ("/client", "Clients"),
    ("/contact", "Contacts"),
    ("/user", "Users"),
    ("/contract", "Contracts"),
    ("/invoice", "Billing"),
    ("/billing", "Billing"),
    ("/project", "Projects"),
    ("/timeentr", "Time Tracking"),
    ("/activit", "Activities"),
    ("/report", "Reports"),
    ("/location", "Locations"),
    ("/webhook", "Webhooks"),
    ("/job", "Jobs"),
];

#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    /// Patterns are matched case-insensitively
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| CategoryRule::new(rule.pattern.to_lowercase(), rule.category))
            .collect();
        Self { rules }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_RULES
                .iter()
                .map(|(pattern, category)| CategoryRule::new(*pattern, *category))
                .collect(),
        )
    }

    /// Configured rules, or the built-in table when none are given
    pub fn from_config(rules: &[CategoryRule]) -> Self {
        if rules.is_empty() {
            Self::builtin()
        } else {
            Self::new(rules.to_vec())
        }
    }

    /// First matching rule wins
    pub fn categorize(&self, path: &str) -> &str {
        let path = path.to_lowercase();
        self.rules
            .iter()
            .find(|rule| path.contains(&rule.pattern))
            .map(|rule| rule.category.as_str())
            .unwrap_or(DEFAULT_CATEGORY)
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self::builtin()
    }
}
