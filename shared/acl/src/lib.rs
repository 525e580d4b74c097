//! ACL engine: `ACTION ":" rule ("," rule)*` where ACTION is PERMIT|DENY and
//! each rule is `ALL`, a decimal ID, or an inclusive `start-end` range.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclParseError {
    #[error("missing ':' separating action from rule list")]
    MissingColon,

    #[error("unknown action {0:?}, expected PERMIT or DENY")]
    UnknownAction(String),

    #[error("rule list is empty")]
    EmptyRuleList,

    #[error("non-numeric token {0:?}")]
    NonNumericToken(String),

    #[error("inverted range {start}-{end}: start must be <= end")]
    InvertedRange { start: u32, end: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Permit,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    All,
    Id(u32),
    Range(u32, u32),
}

impl Rule {
    fn matches(&self, id: u32) -> bool {
        match self {
            Rule::All => true,
            Rule::Id(n) => *n == id,
            Rule::Range(start, end) => (*start..=*end).contains(&id),
        }
    }
}

/// A compiled access control list. `check(id)` is deterministic and does
/// not depend on rule ordering: under PERMIT it returns true iff some rule
/// matches; under DENY it returns true (admitted) iff no rule matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acl {
    action: Action,
    rules: Vec<Rule>,
}

impl Acl {
    pub fn parse(text: &str) -> Result<Self, AclParseError> {
        let (action_str, rules_str) = text.split_once(':').ok_or(AclParseError::MissingColon)?;

        let action = match action_str.trim().to_ascii_uppercase().as_str() {
            "PERMIT" => Action::Permit,
            "DENY" => Action::Deny,
            other => return Err(AclParseError::UnknownAction(other.to_string())),
        };

        let mut rules = Vec::new();
        for token in rules_str.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            rules.push(parse_rule(token)?);
        }

        if rules.is_empty() {
            return Err(AclParseError::EmptyRuleList);
        }

        Ok(Self { action, rules })
    }

    /// `true` means the ID is admitted.
    pub fn check(&self, id: u32) -> bool {
        let matches = self.rules.iter().any(|r| r.matches(id));
        match self.action {
            Action::Permit => matches,
            Action::Deny => !matches,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Renders back to the normalized textual form (uppercase action,
    /// rules in parsed order, comma-separated).
    pub fn to_normalized_string(&self) -> String {
        let action = match self.action {
            Action::Permit => "PERMIT",
            Action::Deny => "DENY",
        };
        let rules = self
            .rules
            .iter()
            .map(|r| match r {
                Rule::All => "ALL".to_string(),
                Rule::Id(n) => n.to_string(),
                Rule::Range(s, e) => format!("{s}-{e}"),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{action}:{rules}")
    }
}

fn parse_rule(token: &str) -> Result<Rule, AclParseError> {
    if token.eq_ignore_ascii_case("ALL") {
        return Ok(Rule::All);
    }
    if let Some((start_str, end_str)) = token.split_once('-') {
        let start: u32 = start_str
            .trim()
            .parse()
            .map_err(|_| AclParseError::NonNumericToken(token.to_string()))?;
        let end: u32 = end_str
            .trim()
            .parse()
            .map_err(|_| AclParseError::NonNumericToken(token.to_string()))?;
        if start > end {
            return Err(AclParseError::InvertedRange { start, end });
        }
        return Ok(Rule::Range(start, end));
    }
    let id: u32 = token
        .parse()
        .map_err(|_| AclParseError::NonNumericToken(token.to_string()))?;
    Ok(Rule::Id(id))
}
