//! Validator output attached to blocks at code-save time.

use serde::{Deserialize, Serialize};

/// Stable identifiers for validator rules, referenced in issue reports and
/// author-facing tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    /// Source did not parse.
    ParseError,
    /// Dynamic code evaluation (`eval`).
    DynamicEval,
    /// Dynamic function construction from strings (`Function`, `new`).
    DynamicFunction,
    /// `import`/`export`/`require` of external modules.
    ModuleImport,
    /// Access to process/filesystem/network host primitives.
    HostAccess,
    /// Free identifier not reachable from the declared parameters.
    UnknownIdentifier,
    /// Source is not a single two-parameter top-level function.
    FunctionShape,
    /// Not every reachable path provably returns a string.
    ReturnPath,
    /// Declared dependency not on the allow-list.
    DisallowedDependency,
    /// Interpolated value not wrapped in an escaping helper.
    UnescapedInterpolation,
    /// Statements that can never execute.
    UnreachableCode,
    /// Source exceeds the soft length threshold.
    SourceLength,
}

impl RuleId {
    /// Short machine-readable code, stable across releases.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ParseError => "VC000",
            Self::DynamicEval => "VC001",
            Self::DynamicFunction => "VC002",
            Self::ModuleImport => "VC003",
            Self::HostAccess => "VC004",
            Self::UnknownIdentifier => "VC005",
            Self::FunctionShape => "VC010",
            Self::ReturnPath => "VC011",
            Self::DisallowedDependency => "VC012",
            Self::UnescapedInterpolation => "VC020",
            Self::UnreachableCode => "VC021",
            Self::SourceLength => "VC022",
        }
    }
}

/// A single finding, tagged with the rule and the offending location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub rule: RuleId,
    pub message: String,
    /// 1-based line in the source text.
    pub line: u32,
    /// 1-based column in the source text.
    pub column: u32,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}:{}: {}",
            self.rule.code(),
            self.line,
            self.column,
            self.message
        )
    }
}

/// Pass/fail plus structured findings from the Code Validator.
///
/// Deterministic for identical input; attached to a block at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub security_issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A passing result with no findings.
    #[must_use]
    pub const fn passing() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            security_issues: Vec::new(),
        }
    }

    /// All fatal findings (errors and security issues), in report order.
    pub fn fatal_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(self.security_issues.iter())
    }
}

/// A [`ValidationResult`] pinned to the code version it judged.
///
/// The executor re-checks this pairing before running a block; a cached
/// result for an older version never authorizes newer source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub code_version: u64,
    pub result: ValidationResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_codes_are_unique() {
        let rules = [
            RuleId::ParseError,
            RuleId::DynamicEval,
            RuleId::DynamicFunction,
            RuleId::ModuleImport,
            RuleId::HostAccess,
            RuleId::UnknownIdentifier,
            RuleId::FunctionShape,
            RuleId::ReturnPath,
            RuleId::DisallowedDependency,
            RuleId::UnescapedInterpolation,
            RuleId::UnreachableCode,
            RuleId::SourceLength,
        ];
        let mut codes: Vec<&str> = rules.iter().map(RuleId::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), rules.len());
    }

    #[test]
    fn test_issue_display_includes_code_and_location() {
        let issue = ValidationIssue {
            rule: RuleId::ModuleImport,
            message: "require is not available".to_string(),
            line: 2,
            column: 5,
        };
        assert_eq!(issue.to_string(), "[VC003] 2:5: require is not available");
    }
}
