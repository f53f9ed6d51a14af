use crate::address::Address;
use crate::aggregator::TargetKey;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::path::PathSet;
use crate::plugins::{DirectedExtractor, RipTracer, UndirectedExtractor};
use crate::report::{DirectedReport, UndirectedReport};
use crate::session::RunSession;
use log::info;
use std::sync::Arc;

/// Installs the extractor plugins on an engine, runs it and reports.
///
/// Engine failures are not retried; they abort the run and are returned as is.
pub struct ExecutionController<E: Engine> {
    engine: E,
    config: Config,
}

impl<E: Engine> ExecutionController<E> {
    pub fn new(engine: E, config: Config) -> Self {
        ExecutionController { engine, config }
    }

    /// Successors of the instruction at `address` over any execution.
    pub fn execute(mut self, address: Address) -> Result<UndirectedReport> {
        let session = Arc::new(RunSession::undirected());
        if self.config.trace_rip {
            self.engine.add_hook(None, Arc::new(RipTracer));
        }
        let extractor = UndirectedExtractor::new(
            address,
            self.config.undirected_max_solves,
            session.clone(),
        );
        self.engine.add_hook(Some(address.value()), Arc::new(extractor));

        info!("exploring successors of {}", address);
        self.engine.run()?;

        Ok(UndirectedReport {
            address,
            targets: session
                .targets()
                .get(TargetKey::Global)
                .unwrap_or_default(),
        })
    }

    /// Successors at the end of each path in `paths`, exploring only states
    /// that follow one of them.
    pub fn execute_directed(mut self, paths: PathSet) -> Result<DirectedReport> {
        let session = Arc::new(RunSession::new(paths));
        if self.config.trace_rip {
            self.engine.add_hook(None, Arc::new(RipTracer));
        }
        let extractor = DirectedExtractor::new(self.config.directed_max_solves, session.clone());
        self.engine.add_hook(None, Arc::new(extractor));

        info!("exploring {} candidate paths", session.paths().len());
        self.engine.run()?;

        Ok(DirectedReport::new(
            session.paths(),
            &session.targets().snapshot(),
        ))
    }
}
