use crate::expression::MatchExpression;
use crate::rules::RuleTable;
use std::sync::Arc;

/// Everything that changed between the client's version and the latest one.
///
/// Expressions keep the order they were pushed in (the manifest walk order,
/// most recent change first). Once a full refresh is forced the expressions
/// are discarded and every key matches.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    rules: Arc<RuleTable>,
    expressions: Vec<MatchExpression>,
    force_refresh: bool,
}

impl ChangeSet {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self {
            rules,
            expressions: Vec::new(),
            force_refresh: false,
        }
    }

    pub fn push(&mut self, expression: MatchExpression) {
        self.expressions.push(expression);
    }

    /// Drop all accumulated expressions and match every key from now on.
    pub fn force_full_refresh(&mut self) {
        self.expressions.clear();
        self.force_refresh = true;
    }

    /// Replace all accumulated expressions with a single one.
    pub fn reset_to(&mut self, expression: MatchExpression) {
        self.expressions.clear();
        self.expressions.push(expression);
    }

    pub fn is_force_refresh(&self) -> bool {
        self.force_refresh
    }

    pub fn expressions(&self) -> &[MatchExpression] {
        &self.expressions
    }

    /// `true` if nothing can match: no expressions and no forced refresh.
    pub fn is_empty(&self) -> bool {
        !self.force_refresh && self.expressions.is_empty()
    }

    pub fn matches(&self, key: &str) -> bool {
        self.force_refresh || self.expressions.iter().any(|expression| expression.matches(key, &self.rules))
    }
}
