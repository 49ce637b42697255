//! Extraction of the plans reported on the standard output of the planner during an anytime run.

const PLAN_START: &str = "Solution found!";
const PLAN_END: &str = "step(s).";

/// Turns a step line of the output, e.g. `move a b (1)`, into the plan syntax `(move a b)`.
/// Returns `None` for log lines.
pub fn parse_plan_line(line: &str) -> Option<String> {
    if line.starts_with("[t=") {
        return None;
    }
    let step = line.split('(').next().unwrap_or_default().trim();
    if step.is_empty() {
        None
    } else {
        Some(format!("({step})"))
    }
}

/// Line by line reader of the planner output, collecting the steps of each reported plan.
#[derive(Debug, Default)]
pub struct AnytimeOutput {
    /// Steps of the plan being read, `None` outside of a plan.
    current: Option<Vec<String>>,
    num_plans: usize,
}

impl AnytimeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a line of output, returning the text of a plan when its last line was reached.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end();
        if line.ends_with(PLAN_END) {
            let steps = self.current.take()?;
            self.num_plans += 1;
            let mut plan = steps.join("\n");
            plan.push('\n');
            return Some(plan);
        }
        if line.contains(PLAN_START) {
            self.current = Some(Vec::new());
            return None;
        }
        if let Some(steps) = &mut self.current {
            steps.extend(parse_plan_line(line));
        }
        None
    }

    pub fn num_plans(&self) -> usize {
        self.num_plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_lines() {
        assert_eq!(parse_plan_line("move a b (1)"), Some("(move a b)".to_string()));
        assert_eq!(parse_plan_line("reach_goal (0)"), Some("(reach_goal)".to_string()));
        assert_eq!(parse_plan_line("[t=0.01s, 9 KB] Plan length: 2 step(s)."), None);
        assert_eq!(parse_plan_line(""), None);
    }

    #[test]
    fn anytime_plans() {
        let output = "\
[t=0.001s, 9 KB] reading input...
[t=0.01s, 9 KB] Solution found!
[t=0.01s, 9 KB] Actual search time: 0.0001s
open b2 (1)
open b1 (1)
[t=0.01s, 9 KB] Plan length: 2 step(s).
[t=0.01s, 9 KB] Plan cost: 2
[t=0.02s, 9 KB] Solution found!
open b2 (1)
[t=0.02s, 9 KB] Plan length: 1 step(s).
Search stopped without finding a solution.
";
        let mut parser = AnytimeOutput::new();
        let plans: Vec<String> = output.lines().filter_map(|l| parser.feed(l)).collect();
        assert_eq!(plans, vec!["(open b2)\n(open b1)\n", "(open b2)\n"]);
        assert_eq!(parser.num_plans(), 2);
    }

    #[test]
    fn end_without_start_is_ignored() {
        let mut parser = AnytimeOutput::new();
        assert_eq!(parser.feed("Plan length: 0 step(s)."), None);
        assert_eq!(parser.feed("open b2 (1)"), None);
        assert_eq!(parser.num_plans(), 0);
    }
}
