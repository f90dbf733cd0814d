//! Classification rules.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Reserved id for the always-present, always-matchable-last default rule.
pub const DEFAULT_RULE_ID: i64 = 0;

/// How a rule matches an event. Exactly one of `match_string`/`trap_oid`
/// is meaningful for a given match kind; this type makes that an invariant
/// of construction rather than something every caller has to remember to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSpec {
    Contains(String),
    /// The pattern source is kept alongside the compiled `Regex` so the
    /// type can still be cloned/compared/serialized; `Regex` itself is
    /// neither `Eq` nor cheap to rebuild per event.
    Regex { pattern: String, compiled: CompiledRegex },
    OidPrefix(String),
}

/// Wrapper giving `Regex` the trait impls `MatchSpec` needs without
/// pretending two `Regex`es are `Eq` by value identity.
#[derive(Debug, Clone)]
pub struct CompiledRegex(pub Regex);

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}
impl Eq for CompiledRegex {}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("exactly one of match_string/trap_oid must be set for match_type {0:?}")]
    AmbiguousMatch(MatchTypeTag),
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(String),
    #[error("oid_prefix rules require a trap_oid-shaped value")]
    MissingOidPrefix,
    #[error("priority must be in 2..=1000 (priority 1 is reserved for the default rule)")]
    PriorityOutOfRange,
}

/// The wire/DB discriminant for [`MatchSpec`] — kept separate from the
/// enum itself so `(match_type, match_value)` round-trips through a
/// two-column DB row without a custom serde visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTypeTag {
    Contains,
    Regex,
    OidPrefix,
}

impl MatchSpec {
    pub fn tag(&self) -> MatchTypeTag {
        match self {
            MatchSpec::Contains(_) => MatchTypeTag::Contains,
            MatchSpec::Regex { .. } => MatchTypeTag::Regex,
            MatchSpec::OidPrefix(_) => MatchTypeTag::OidPrefix,
        }
    }

    /// Build from the persisted `(match_type, match_value)` pair,
    /// compiling regexes eagerly so a broken pattern fails at cache-load
    /// time, never mid-match.
    pub fn from_tagged(tag: MatchTypeTag, value: &str) -> Result<Self, RuleValidationError> {
        match tag {
            MatchTypeTag::Contains => Ok(MatchSpec::Contains(value.to_string())),
            MatchTypeTag::Regex => {
                let compiled = Regex::new(value)
                    .map_err(|e| RuleValidationError::InvalidRegex(e.to_string()))?;
                Ok(MatchSpec::Regex {
                    pattern: value.to_string(),
                    compiled: CompiledRegex(compiled),
                })
            }
            MatchTypeTag::OidPrefix => {
                if value.is_empty() {
                    return Err(RuleValidationError::MissingOidPrefix);
                }
                Ok(MatchSpec::OidPrefix(value.to_string()))
            }
        }
    }

    /// `contains`/`regex` match against `message`; `oid_prefix` matches a
    /// dot-numeric `trap_oid` at a component boundary (prefix followed by
    /// end-of-string or `.`).
    pub fn matches(&self, message: &str, trap_oid: Option<&str>) -> bool {
        match self {
            MatchSpec::Contains(needle) => message.contains(needle.as_str()),
            MatchSpec::Regex { compiled, .. } => compiled.0.is_match(message),
            MatchSpec::OidPrefix(prefix) => match trap_oid {
                Some(oid) => {
                    oid == prefix.as_str()
                        || oid
                            .strip_prefix(prefix.as_str())
                            .is_some_and(|rest| rest.starts_with('.'))
                }
                None => false,
            },
        }
    }
}

/// Handling decision for an event on a production host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handling {
    PageAndTicket,
    TicketOnly,
    EmailOnly,
    LogOnly,
}

/// Handling decision for an event on a dev host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevHandling {
    TicketOnly,
    EmailOnly,
    LogOnly,
    Suppress,
}

impl Handling {
    /// Whether this handling forwards the event to the Deliverer.
    pub fn forwards(self) -> bool {
        matches!(self, Handling::PageAndTicket | Handling::TicketOnly)
    }
}

impl DevHandling {
    pub fn forwards(self) -> bool {
        matches!(self, DevHandling::TicketOnly)
    }
}

/// A classification rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: i64,
    pub r#match: MatchSpec,
    pub priority: u16,
    pub prod_handling: Handling,
    pub dev_handling: DevHandling,
    pub team_assignment: String,
    pub is_active: bool,
}

impl Rule {
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if !(2..=1000).contains(&self.priority) {
            return Err(RuleValidationError::PriorityOutOfRange);
        }
        if self.r#match.tag() == MatchTypeTag::OidPrefix
            && matches!(&self.r#match, MatchSpec::OidPrefix(v) if v.is_empty())
        {
            return Err(RuleValidationError::MissingOidPrefix);
        }
        Ok(())
    }

    /// The system-wide default rule: priority 1, always active, never
    /// deleted, `LogOnly` handling on both host classes. Priority 1 is
    /// reserved for this rule alone — `validate()` rejects it on any
    /// user rule — so no tie-break against another priority-1 rule can
    /// ever place the default ahead of something else in cache order.
    /// Built directly rather than through `validate()`, since priority 1
    /// would otherwise be self-rejecting.
    pub fn default_rule() -> Self {
        Rule {
            id: DEFAULT_RULE_ID,
            r#match: MatchSpec::Contains(String::new()),
            priority: 1,
            prod_handling: Handling::LogOnly,
            dev_handling: DevHandling::LogOnly,
            team_assignment: "unassigned".to_string(),
            is_active: true,
        }
    }
}

/// Sort rules by priority desc, ties broken by lower id asc — the order
/// the Classifier's cache walks when matching.
pub fn sort_for_matching(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: i64, priority: u16) -> Rule {
        Rule {
            id,
            r#match: MatchSpec::Contains("x".into()),
            priority,
            prod_handling: Handling::LogOnly,
            dev_handling: DevHandling::Suppress,
            team_assignment: "t".into(),
            is_active: true,
        }
    }

    #[test]
    fn contains_is_case_sensitive_substring() {
        let m = MatchSpec::Contains("down".to_string());
        assert!(m.matches("Interface down", None));
        assert!(!m.matches("Interface Down", None));
    }

    #[test]
    fn oid_prefix_matches_at_component_boundary() {
        let m = MatchSpec::OidPrefix("1.3.6.1".to_string());
        assert!(m.matches("", Some("1.3.6.1")));
        assert!(m.matches("", Some("1.3.6.1.4.1")));
        assert!(!m.matches("", Some("1.3.6.15")));
        assert!(!m.matches("", None));
    }

    #[test]
    fn invalid_regex_is_rejected_at_construction() {
        let err = MatchSpec::from_tagged(MatchTypeTag::Regex, "(unterminated").unwrap_err();
        assert!(matches!(err, RuleValidationError::InvalidRegex(_)));
    }

    #[test]
    fn empty_oid_prefix_rejected() {
        let err = MatchSpec::from_tagged(MatchTypeTag::OidPrefix, "").unwrap_err();
        assert_eq!(err, RuleValidationError::MissingOidPrefix);
    }

    #[test]
    fn priority_out_of_range_rejected() {
        let mut r = rule(1, 1001);
        assert_eq!(r.validate().unwrap_err(), RuleValidationError::PriorityOutOfRange);
        r.priority = 0;
        assert_eq!(r.validate().unwrap_err(), RuleValidationError::PriorityOutOfRange);
    }

    #[test]
    fn priority_one_reserved_for_default_rule() {
        let r = rule(99, 1);
        assert_eq!(r.validate().unwrap_err(), RuleValidationError::PriorityOutOfRange);
    }

    #[test]
    fn sorts_by_priority_desc_then_id_asc() {
        let mut rules = vec![rule(5, 10), rule(2, 50), rule(3, 50), rule(1, 1)];
        sort_for_matching(&mut rules);
        let ids: Vec<i64> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 5, 1]);
    }

    #[test]
    fn default_rule_is_lowest_priority_and_log_only() {
        let d = Rule::default_rule();
        assert_eq!(d.priority, 1);
        assert_eq!(d.prod_handling, Handling::LogOnly);
        assert!(!d.prod_handling.forwards());
    }

    #[test]
    fn handling_forwards_only_paging_and_ticketing_variants() {
        assert!(Handling::PageAndTicket.forwards());
        assert!(Handling::TicketOnly.forwards());
        assert!(!Handling::EmailOnly.forwards());
        assert!(!Handling::LogOnly.forwards());
        assert!(DevHandling::TicketOnly.forwards());
        assert!(!DevHandling::Suppress.forwards());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn contains_match_is_reflexive_over_any_substring(
                prefix in ".{0,20}", needle in ".{1,20}", suffix in ".{0,20}",
            ) {
                let haystack = format!("{prefix}{needle}{suffix}");
                prop_assert!(MatchSpec::Contains(needle).matches(&haystack, None));
            }

            #[test]
            fn sort_for_matching_never_reorders_within_equal_priority_id_pairs(
                ids in prop::collection::vec(0i64..1000, 1..20),
            ) {
                let mut rules: Vec<Rule> = ids.iter().map(|&id| rule(id, 50)).collect();
                sort_for_matching(&mut rules);
                let mut sorted_ids: Vec<i64> = ids.clone();
                sorted_ids.sort();
                let actual: Vec<i64> = rules.iter().map(|r| r.id).collect();
                prop_assert_eq!(actual, sorted_ids);
            }

            #[test]
            fn validate_rejects_priority_one_for_every_match_kind(team in "[a-z]{1,10}") {
                let r = Rule {
                    id: 7,
                    r#match: MatchSpec::Contains("x".into()),
                    priority: 1,
                    prod_handling: Handling::LogOnly,
                    dev_handling: DevHandling::Suppress,
                    team_assignment: team,
                    is_active: true,
                };
                prop_assert_eq!(r.validate().unwrap_err(), RuleValidationError::PriorityOutOfRange);
            }
        }
    }
}
