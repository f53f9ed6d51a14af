/// Exploration bounds of the rizin engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Instructions a single state may retire.
    pub max_depth: usize,
    /// States created over a whole run.
    pub max_states: usize,
    /// Values a symbolic control transfer is concretized to.
    pub max_concretizations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_depth: 10_000,
            max_states: 4_096,
            max_concretizations: 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Successor values solved per hit of the target instruction.
    pub undirected_max_solves: usize,
    /// Successor values solved per completed path.
    pub directed_max_solves: usize,
    pub limits: Limits,
    /// Log every retired instruction pointer.
    pub trace_rip: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            undirected_max_solves: 5,
            directed_max_solves: 1,
            limits: Limits::default(),
            trace_rip: false,
        }
    }
}
