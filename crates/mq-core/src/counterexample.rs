//! Counterexample representation and rendering.
//!
//! When a queue invariant is violated, a counterexample shows the
//! sequence of puts and gets that led to the failure, one column per
//! thread.

/// A counterexample showing the failure path.
#[derive(Debug, Clone, Default)]
pub struct Counterexample {
    /// Queue state after selected steps
    pub states: Vec<StateSnapshot>,
    /// Thread interleaving that caused the failure
    pub interleaving: Vec<ThreadAction>,
    /// DST seed for reproduction (if applicable)
    pub dst_seed: Option<u64>,
    /// Human-readable description of the failure
    pub description: Option<String>,
}

/// Snapshot of queue state at a point in time.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Step number in the execution
    pub step: u64,
    /// Description of the state
    pub description: String,
    /// Variable values at this point
    pub variables: Vec<(String, String)>,
}

/// Action taken by a thread.
#[derive(Debug, Clone)]
pub struct ThreadAction {
    /// Thread identifier
    pub thread_id: u64,
    /// Step number when this action occurred
    pub step: u64,
    /// Description of the action, e.g. `put(3)` or `get() blocked`
    pub action: String,
    /// Whether this action completed
    pub success: bool,
}

impl Counterexample {
    /// Create a new empty counterexample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counterexample with DST seed for reproduction.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        Self {
            dst_seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set the description for this counterexample.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a state snapshot. Steps must be strictly increasing.
    pub fn add_state(&mut self, state: StateSnapshot) {
        debug_assert!(
            self.states.last().map_or(true, |last| state.step > last.step),
            "States must be added in order"
        );
        self.states.push(state);
    }

    /// Add a thread action.
    pub fn add_action(&mut self, action: ThreadAction) {
        self.interleaving.push(action);
    }

    /// Queue snapshot recorded for `step`, if any.
    #[must_use]
    pub fn state_at(&self, step: u64) -> Option<&StateSnapshot> {
        self.states.iter().find(|s| s.step == step)
    }

    /// Render the counterexample as a step table, one column per thread.
    ///
    /// ```text
    /// DST_SEED=12345
    /// Failure: get() refused with 1 buffered items
    ///
    /// step | t0     | t2         | queue
    /// -----+--------+------------+-------------------
    ///    1 | put(1) |            | len=1 contents=[1]
    ///    2 |        | get() -> 1 | len=0 contents=[]
    ///    3 |        | get()*     | len=0 contents=[]
    /// (* did not complete)
    /// ```
    ///
    /// Snapshots taken at a step with no action, such as the final state an
    /// invariant was checked against, follow the table one variable per line.
    #[must_use]
    pub fn render_diagram(&self) -> String {
        let mut output = String::new();

        if let Some(seed) = self.dst_seed {
            output.push_str(&format!("DST_SEED={}\n", seed));
        }
        if let Some(ref desc) = self.description {
            output.push_str(&format!("Failure: {}\n", desc));
        }

        let mut threads: Vec<u64> = self.interleaving.iter().map(|a| a.thread_id).collect();
        threads.sort_unstable();
        threads.dedup();
        let mut steps: Vec<u64> = self.interleaving.iter().map(|a| a.step).collect();
        steps.sort_unstable();
        steps.dedup();

        if !steps.is_empty() {
            let mut header = vec!["step".to_string()];
            header.extend(threads.iter().map(|tid| format!("t{}", tid)));
            header.push("queue".to_string());

            let mut rows = vec![header];
            for &step in &steps {
                let mut row = vec![step.to_string()];
                for &tid in &threads {
                    let cell: Vec<String> = self
                        .interleaving
                        .iter()
                        .filter(|a| a.step == step && a.thread_id == tid)
                        .map(ThreadAction::label)
                        .collect();
                    row.push(cell.join("; "));
                }
                row.push(self.state_at(step).map(StateSnapshot::summary).unwrap_or_default());
                rows.push(row);
            }

            output.push('\n');
            render_table(&mut output, &rows);
            if self.interleaving.iter().any(|a| !a.success) {
                output.push_str("(* did not complete)\n");
            }
        }

        for state in self.states.iter().filter(|s| !steps.contains(&s.step)) {
            output.push_str(&format!("\nstate at step {}: {}\n", state.step, state.description));
            for (name, value) in &state.variables {
                output.push_str(&format!("  {} = {}\n", name, value));
            }
        }

        output
    }
}

impl StateSnapshot {
    /// Description followed by `name=value` for each variable.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = self.description.clone();
        for (name, value) in &self.variables {
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(&format!("{}={}", name, value));
        }
        summary
    }
}

impl ThreadAction {
    fn label(&self) -> String {
        if self.success {
            self.action.clone()
        } else {
            format!("{}*", self.action)
        }
    }
}

/// Left-aligned columns, step column right-aligned, rule under the header.
fn render_table(output: &mut String, rows: &[Vec<String>]) {
    let columns = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|c| rows.iter().map(|row| row[c].len()).max().unwrap_or(0))
        .collect();

    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(c, (cell, &width))| {
                if c == 0 {
                    format!("{:>1$}", cell, width)
                } else {
                    format!("{:<1$}", cell, width)
                }
            })
            .collect();
        output.push_str(cells.join(" | ").trim_end());
        output.push('\n');

        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            output.push_str(&rule.join("-+-"));
            output.push('\n');
        }
    }
}
