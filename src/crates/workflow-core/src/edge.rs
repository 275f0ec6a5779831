//! Edges and edge groups: the typed links between executors.
//!
//! An [`Edge`] is a directed link with an optional predicate. [`EdgeGroup`] expresses the four
//! routing shapes the scheduler understands: single, fan-out, fan-in, and switch-case. Grouping
//! exists because fan-out/fan-in/switch-case need more than one edge's worth of shared context
//! (a selection function over *all* targets, or a buffer keyed by *all* sources) — see
//! [`crate::edge_runner`] for how each group is driven.

use std::sync::Arc;

use crate::message::Payload;

/// A predicate over a payload, used by [`Edge::should_route`] and by fan-out/switch-case
/// selection functions.
pub type Predicate = Arc<dyn Fn(&dyn Payload) -> bool + Send + Sync>;

/// A directed link between two executors.
///
/// Identity is the pair `(source_id, target_id)` within the context of its group — the same pair
/// is only valid once per [`EdgeGroup`], checked by the validator's `EdgeDuplication` rule.
#[derive(Clone)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub predicate: Option<Predicate>,
}

impl Edge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn should_route(&self, payload: &dyn Payload) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(payload))
    }
}

/// A selection function for a [`FanOutEdgeGroup`]: given the payload and the group's declared
/// targets, returns the subset to deliver to. `None` means broadcast to all.
pub type SelectionFn = Arc<dyn Fn(&dyn Payload, &[String]) -> Vec<String> + Send + Sync>;

/// One ordered case in a [`SwitchCaseEdgeGroup`]: route to `target` if `predicate` matches.
#[derive(Clone)]
pub struct Case {
    pub target: String,
    pub predicate: Predicate,
}

/// A single edge, optionally predicated.
#[derive(Clone)]
pub struct SingleEdgeGroup {
    pub edge: Edge,
}

/// One source fanning out to two or more targets.
#[derive(Clone)]
pub struct FanOutEdgeGroup {
    pub source_id: String,
    pub target_ids: Vec<String>,
    pub selection: Option<SelectionFn>,
}

impl FanOutEdgeGroup {
    /// Per spec §3: fan-out requires at least two targets.
    pub fn new(source_id: impl Into<String>, target_ids: Vec<String>) -> Result<Self, String> {
        if target_ids.len() < 2 {
            return Err(format!(
                "fan-out group for source '{}' must have at least 2 targets, got {}",
                source_id.into(),
                target_ids.len()
            ));
        }
        Ok(Self {
            source_id: source_id.into(),
            target_ids,
            selection: None,
        })
    }

    pub fn with_selection(mut self, selection: SelectionFn) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// Two or more sources converging on one target, buffered until every source has contributed.
#[derive(Clone)]
pub struct FanInEdgeGroup {
    pub source_ids: Vec<String>,
    pub target_id: String,
}

impl FanInEdgeGroup {
    /// Per spec §3: fan-in requires at least two sources.
    pub fn new(source_ids: Vec<String>, target_id: impl Into<String>) -> Result<Self, String> {
        if source_ids.len() < 2 {
            return Err(format!(
                "fan-in group must have at least 2 sources, got {}",
                source_ids.len()
            ));
        }
        Ok(Self {
            source_ids,
            target_id: target_id.into(),
        })
    }
}

/// A fan-out specialization: ordered cases evaluated first-match, falling through to `default`.
#[derive(Clone)]
pub struct SwitchCaseEdgeGroup {
    pub source_id: String,
    pub cases: Vec<Case>,
    pub default: String,
}

impl SwitchCaseEdgeGroup {
    pub fn new(source_id: impl Into<String>, cases: Vec<Case>, default: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            cases,
            default: default.into(),
        }
    }

    /// All targets reachable from this group: every case's target plus the default, in order,
    /// deduplicated. Used by the validator's type-compatibility and reachability checks and by
    /// [`crate::edge_runner::SwitchCaseEdgeRunner`] to build the underlying fan-out's target list.
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cases.iter().map(|c| c.target.clone()).collect();
        if !ids.contains(&self.default) {
            ids.push(self.default.clone());
        }
        ids
    }
}

/// One of the four routing shapes a group of edges can express.
#[derive(Clone)]
pub enum EdgeGroup {
    Single(SingleEdgeGroup),
    FanOut(FanOutEdgeGroup),
    FanIn(FanInEdgeGroup),
    SwitchCase(SwitchCaseEdgeGroup),
}

impl EdgeGroup {
    /// Every executor id this group reads messages from.
    pub fn source_ids(&self) -> Vec<String> {
        match self {
            EdgeGroup::Single(g) => vec![g.edge.source_id.clone()],
            EdgeGroup::FanOut(g) => vec![g.source_id.clone()],
            EdgeGroup::FanIn(g) => g.source_ids.clone(),
            EdgeGroup::SwitchCase(g) => vec![g.source_id.clone()],
        }
    }

    /// Every executor id this group may deliver to.
    pub fn target_ids(&self) -> Vec<String> {
        match self {
            EdgeGroup::Single(g) => vec![g.edge.target_id.clone()],
            EdgeGroup::FanOut(g) => g.target_ids.clone(),
            EdgeGroup::FanIn(g) => vec![g.target_id.clone()],
            EdgeGroup::SwitchCase(g) => g.target_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_rejects_fewer_than_two_targets() {
        assert!(FanOutEdgeGroup::new("a", vec!["b".into()]).is_err());
        assert!(FanOutEdgeGroup::new("a", vec!["b".into(), "c".into()]).is_ok());
    }

    #[test]
    fn fan_in_rejects_fewer_than_two_sources() {
        assert!(FanInEdgeGroup::new(vec!["a".into()], "t").is_err());
        assert!(FanInEdgeGroup::new(vec!["a".into(), "b".into()], "t").is_ok());
    }

    #[test]
    fn switch_case_target_ids_includes_default_once() {
        let group = SwitchCaseEdgeGroup::new(
            "a",
            vec![
                Case { target: "p".into(), predicate: Arc::new(|_| true) },
                Case { target: "z".into(), predicate: Arc::new(|_| false) },
            ],
            "z",
        );
        assert_eq!(group.target_ids(), vec!["p".to_string(), "z".to_string()]);
    }

    #[test]
    fn edge_without_predicate_always_routes() {
        let edge = Edge::new("a", "b");
        let payload = "x".to_string();
        assert!(edge.should_route(&payload));
    }
}
