//! Agent strategies for autonomous debugging.

/// How the agent explores the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentStrategy {
    /// Follow the most promising lead deeply before exploring alternatives.
    #[default]
    DepthFirst,
    /// Survey the landscape before diving deep.
    BreadthFirst,
    /// Form and test hypotheses about the program's behavior.
    HypothesisDriven,
}

impl AgentStrategy {
    /// Parse a strategy name; unknown names fall back to depth-first.
    pub fn parse(name: &str) -> Self {
        match name {
            "breadth-first" => AgentStrategy::BreadthFirst,
            "hypothesis-driven" => AgentStrategy::HypothesisDriven,
            _ => AgentStrategy::DepthFirst,
        }
    }

    /// The stable strategy name.
    pub fn label(&self) -> &'static str {
        match self {
            AgentStrategy::DepthFirst => "depth-first",
            AgentStrategy::BreadthFirst => "breadth-first",
            AgentStrategy::HypothesisDriven => "hypothesis-driven",
        }
    }

    /// Guidance text injected into the system prompt.
    pub fn description(&self) -> &'static str {
        match self {
            AgentStrategy::DepthFirst => {
                "Follow the most promising lead deeply before exploring alternatives. \
                 Set breakpoints on the most relevant function first, step through it \
                 completely, then move to the next candidate."
            }
            AgentStrategy::BreadthFirst => {
                "Survey the landscape first before diving deep. \
                 List all relevant functions/symbols, examine their signatures, \
                 then selectively deep-dive into the most interesting ones."
            }
            AgentStrategy::HypothesisDriven => {
                "Form hypotheses about the program's behavior and test them. \
                 State your hypothesis, design an experiment (breakpoint + conditions), \
                 run it, and update your hypothesis based on results."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        assert_eq!(
            AgentStrategy::parse("breadth-first"),
            AgentStrategy::BreadthFirst
        );
        assert_eq!(
            AgentStrategy::parse("hypothesis-driven"),
            AgentStrategy::HypothesisDriven
        );
        assert_eq!(AgentStrategy::parse("depth-first"), AgentStrategy::DepthFirst);
    }

    #[test]
    fn unknown_names_fall_back_to_depth_first() {
        assert_eq!(AgentStrategy::parse("sideways"), AgentStrategy::DepthFirst);
    }

    #[test]
    fn descriptions_differ() {
        let all = [
            AgentStrategy::DepthFirst,
            AgentStrategy::BreadthFirst,
            AgentStrategy::HypothesisDriven,
        ];
        for a in &all {
            for b in &all {
                if a != b {
                    assert_ne!(a.description(), b.description());
                }
            }
        }
    }
}
