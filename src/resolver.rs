//! Variable resolution.
//!
//! The resolver collects the time series, models and filters available
//! for a request and tracks which node produces and which nodes consume
//! each variable. Nodes whose requirements cannot be met contribute
//! nothing; [`VariableResolver::reduce`] then removes every producer that
//! no remaining consumer needs, leaving the minimal pipeline that yields
//! the requested output variables.
//!
//! The first node producing a variable wins: sources and models are added
//! in priority order and later producers of an already available
//! variable are ignored for that variable.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::ResolverError;
use crate::filter::{Filter, RejectAll};
use crate::model::Model;
use crate::series::TimeSeries;

/// Node added to the resolver after the master.
#[derive(Clone)]
pub enum Consumer {
    /// Slave time series aligned to the master.
    TimeSeries(Arc<dyn TimeSeries>),
    Model(Arc<dyn Model>),
    Filter(Arc<dyn Filter>),
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeSeries(series) => write!(f, "TimeSeries({})", series.identifier()),
            Self::Model(model) => write!(f, "Model({})", model.name()),
            Self::Filter(filter) => write!(f, "Filter({filter})"),
        }
    }
}

/// Index of a node in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct NodeId(usize);

/// Consumer of a variable: a node or the request output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Slot {
    Node(NodeId),
    Output,
}

/// Producer/consumer graph of a request.
#[derive(Default)]
pub struct VariableResolver {
    nodes: Vec<Consumer>,
    /// Available variables in the order they became available.
    available: Vec<String>,
    producers: HashMap<String, NodeId>,
    consumers: HashMap<String, BTreeSet<Slot>>,
    unresolved: HashMap<String, BTreeSet<Slot>>,
    sources: Vec<NodeId>,
    models: Vec<NodeId>,
    filters: Vec<NodeId>,
    unresolved_filters: Vec<NodeId>,
    output_variables: Vec<String>,
}

impl fmt::Debug for VariableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableResolver")
            .field("available", &self.available)
            .field("unresolved", &self.unresolved())
            .field("output_variables", &self.output_variables)
            .finish_non_exhaustive()
    }
}

impl VariableResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the master time series; all its variables become available.
    ///
    /// # Errors
    ///
    /// Returns `MasterAlreadySet` if a master exists.
    pub fn add_master(&mut self, master: Arc<dyn TimeSeries>) -> Result<(), ResolverError> {
        if !self.sources.is_empty() {
            return Err(ResolverError::MasterAlreadySet);
        }
        debug!(series = master.identifier(), "master added");
        let variables = master.variables().to_vec();
        let id = self.push(Consumer::TimeSeries(master));
        self.add_producer(&variables, id);
        self.sources.push(id);
        Ok(())
    }

    /// Adds a slave, model or filter.
    ///
    /// # Errors
    ///
    /// Returns `NoMaster` for a slave added before the master.
    pub fn add_consumer(&mut self, consumer: Consumer) -> Result<(), ResolverError> {
        match consumer {
            Consumer::TimeSeries(series) => self.add_slave(series),
            Consumer::Model(model) => {
                self.add_model(model);
                Ok(())
            }
            Consumer::Filter(filter) => {
                self.add_filter(filter);
                Ok(())
            }
        }
    }

    /// Adds a slave time series.
    ///
    /// The slave is dropped silently when its required variables are not
    /// available or it offers no new variable.
    ///
    /// # Errors
    ///
    /// Returns `NoMaster` if no master is set.
    pub fn add_slave(&mut self, slave: Arc<dyn TimeSeries>) -> Result<(), ResolverError> {
        if self.sources.is_empty() {
            return Err(ResolverError::NoMaster);
        }
        let required = slave.required_variables().to_vec();
        let variables = slave.variables().to_vec();
        let identifier = slave.identifier().to_string();
        let id = self.push(Consumer::TimeSeries(slave));
        let unresolved = self.add_consumer_slot(&required, id);
        if !unresolved.is_empty() {
            debug!(series = %identifier, unresolved = ?unresolved, "slave not resolved");
            return Ok(());
        }
        if self.add_producer(&variables, id).is_empty() {
            debug!(series = %identifier, "slave offers no new variable");
            self.remove_consumers(&BTreeSet::from([Slot::Node(id)]));
        } else {
            self.sources.push(id);
        }
        Ok(())
    }

    /// Adds a model after its requirements; unresolvable models are
    /// dropped silently.
    pub fn add_model(&mut self, model: Arc<dyn Model>) {
        let required = model.required_variables().to_vec();
        let variables = model.variables().to_vec();
        let name = model.name().to_string();
        let id = self.push(Consumer::Model(model));
        let unresolved = self.add_consumer_slot(&required, id);
        if !unresolved.is_empty() {
            debug!(model = %name, unresolved = ?unresolved, "model not resolved");
            return;
        }
        if self.add_producer(&variables, id).is_empty() {
            debug!(model = %name, "model offers no new variable");
            self.remove_consumers(&BTreeSet::from([Slot::Node(id)]));
        } else {
            self.models.push(id);
        }
    }

    /// Adds a filter. A filter with unavailable requirements is kept as
    /// unresolved and turns [`filters`](Self::filters) into reject-all.
    pub fn add_filter(&mut self, filter: Arc<dyn Filter>) {
        let required = filter.required_variables().to_vec();
        let id = self.push(Consumer::Filter(filter));
        let unresolved = self.add_consumer_slot(&required, id);
        if unresolved.is_empty() {
            self.filters.push(id);
        } else {
            debug!(unresolved = ?unresolved, "filter not resolved");
            self.unresolved_filters.push(id);
        }
    }

    pub fn add_filters(&mut self, filters: impl IntoIterator<Item = Arc<dyn Filter>>) {
        for filter in filters {
            self.add_filter(filter);
        }
    }

    /// Requests output variables (every available variable when `None`).
    /// Unavailable variables are ignored.
    pub fn add_output_variables(&mut self, variables: Option<&[String]>) {
        let variables = match variables {
            Some(variables) => variables.to_vec(),
            None => self.available.clone(),
        };
        let unresolved: BTreeSet<&String> = variables
            .iter()
            .filter(|v| !self.producers.contains_key(v.as_str()))
            .collect();
        let resolved: Vec<String> = variables
            .iter()
            .filter(|v| !unresolved.contains(v))
            .cloned()
            .collect();
        self.add_consumer_slot(&variables, Slot::Output);
        for variable in resolved {
            if !self.output_variables.contains(&variable) {
                self.output_variables.push(variable);
            }
        }
    }

    /// Removes the producers nobody consumes, repeatedly, until a fixed
    /// point is reached.
    ///
    /// Consumers with unresolved requirements are discarded first, so the
    /// producers only they needed are removed as well. The master stays a
    /// source even when none of its variables is consumed.
    pub fn reduce(&mut self) {
        let dropped: BTreeSet<Slot> = self
            .unresolved
            .values()
            .flatten()
            .copied()
            .filter(|slot| *slot != Slot::Output)
            .collect();
        self.remove_consumers(&dropped);

        loop {
            let removed = self.nonconsumed_producers();
            if removed.is_empty() {
                break;
            }
            debug!(removed = ?self.describe(&removed), "non-consumed producers removed");
            self.remove_producers(&removed);
            let slots: BTreeSet<Slot> = removed.iter().copied().map(Slot::Node).collect();
            self.remove_consumers(&slots);
        }
    }

    /// Variables requested as output and available.
    #[must_use]
    pub fn output_variables(&self) -> &[String] {
        &self.output_variables
    }

    /// Currently available variables, in the order they became available.
    #[must_use]
    pub fn available(&self) -> &[String] {
        &self.available
    }

    /// Variables consumed by at least one consumer, sorted.
    #[must_use]
    pub fn required(&self) -> Vec<&str> {
        let mut required: Vec<&str> = self.consumers.keys().map(String::as_str).collect();
        required.sort_unstable();
        required
    }

    /// Variables requested but not available, sorted.
    #[must_use]
    pub fn unresolved(&self) -> Vec<&str> {
        let mut unresolved: Vec<&str> = self.unresolved.keys().map(String::as_str).collect();
        unresolved.sort_unstable();
        unresolved
    }

    /// Master followed by the accepted slaves.
    #[must_use]
    pub fn time_series(&self) -> Vec<Arc<dyn TimeSeries>> {
        self.sources.iter().filter_map(|id| self.series(*id)).collect()
    }

    #[must_use]
    pub fn master(&self) -> Option<&Arc<dyn TimeSeries>> {
        self.sources.first().and_then(|id| match &self.nodes[id.0] {
            Consumer::TimeSeries(series) => Some(series),
            _ => None,
        })
    }

    #[must_use]
    pub fn slaves(&self) -> Vec<Arc<dyn TimeSeries>> {
        self.sources.iter().skip(1).filter_map(|id| self.series(*id)).collect()
    }

    /// Resolved models in evaluation order.
    #[must_use]
    pub fn models(&self) -> Vec<Arc<dyn Model>> {
        self.models
            .iter()
            .filter_map(|id| match &self.nodes[id.0] {
                Consumer::Model(model) => Some(Arc::clone(model)),
                _ => None,
            })
            .collect()
    }

    /// Resolved filters, or a single reject-all filter when any declared
    /// filter is unresolved.
    #[must_use]
    pub fn filters(&self) -> Vec<Arc<dyn Filter>> {
        if self.unresolved_filters.is_empty() {
            self.filter_nodes(&self.filters)
        } else {
            vec![RejectAll::shared()]
        }
    }

    #[must_use]
    pub fn unresolved_filters(&self) -> Vec<Arc<dyn Filter>> {
        self.filter_nodes(&self.unresolved_filters)
    }

    /// Products read so far by the accepted time series and models.
    #[must_use]
    pub fn products(&self) -> BTreeSet<String> {
        let mut products: BTreeSet<String> = self.models().iter().flat_map(|m| m.products()).collect();
        for series in self.time_series() {
            products.extend(series.products());
        }
        products
    }

    fn push(&mut self, node: Consumer) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn series(&self, id: NodeId) -> Option<Arc<dyn TimeSeries>> {
        match &self.nodes[id.0] {
            Consumer::TimeSeries(series) => Some(Arc::clone(series)),
            _ => None,
        }
    }

    fn filter_nodes(&self, ids: &[NodeId]) -> Vec<Arc<dyn Filter>> {
        ids.iter()
            .filter_map(|id| match &self.nodes[id.0] {
                Consumer::Filter(filter) => Some(Arc::clone(filter)),
                _ => None,
            })
            .collect()
    }

    /// Registers `id` as producer of the variables not produced yet and
    /// returns them.
    fn add_producer(&mut self, variables: &[String], id: NodeId) -> Vec<String> {
        let mut offered = Vec::new();
        for variable in variables {
            if !self.producers.contains_key(variable) {
                self.producers.insert(variable.clone(), id);
                self.available.push(variable.clone());
                offered.push(variable.clone());
            }
        }
        offered
    }

    /// Registers `slot` as consumer of `required` and returns the
    /// unavailable variables.
    fn add_consumer_slot(&mut self, required: &[String], slot: impl Into<Slot>) -> Vec<String> {
        let slot = slot.into();
        let mut unresolved = Vec::new();
        for variable in required {
            if self.producers.contains_key(variable) {
                self.consumers.entry(variable.clone()).or_default().insert(slot);
            } else {
                self.unresolved.entry(variable.clone()).or_default().insert(slot);
                unresolved.push(variable.clone());
            }
        }
        unresolved
    }

    fn remove_consumers(&mut self, removed: &BTreeSet<Slot>) {
        self.consumers.retain(|_, consumers| {
            consumers.retain(|slot| !removed.contains(slot));
            !consumers.is_empty()
        });
    }

    fn remove_producers(&mut self, removed: &BTreeSet<NodeId>) {
        self.producers.retain(|_, id| !removed.contains(id));
        let producers = &self.producers;
        self.available.retain(|variable| producers.contains_key(variable));
        self.models.retain(|id| !removed.contains(id));
        if let Some((master, slaves)) = self.sources.split_first() {
            let mut sources = vec![*master];
            sources.extend(slaves.iter().copied().filter(|id| !removed.contains(id)));
            self.sources = sources;
        }
    }

    /// Producers none of whose variables is consumed.
    fn nonconsumed_producers(&self) -> BTreeSet<NodeId> {
        let mut consumed = BTreeSet::new();
        let mut nonconsumed = BTreeSet::new();
        for (variable, id) in &self.producers {
            if self.consumers.contains_key(variable) {
                consumed.insert(*id);
            } else {
                nonconsumed.insert(*id);
            }
        }
        nonconsumed.difference(&consumed).copied().collect()
    }

    fn describe(&self, ids: &BTreeSet<NodeId>) -> Vec<String> {
        ids.iter().map(|id| format!("{:?}", self.nodes[id.0])).collect()
    }
}

impl From<NodeId> for Slot {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::error::FusionResult;
    use crate::filter::ScalarRangeFilter;
    use crate::model::{Identity, VectorIntensity};
    use crate::series::Chunks;
    use crate::time::TimeRange;

    /// Series that only declares variables.
    struct Declared {
        identifier: String,
        variables: Vec<String>,
        required: Vec<String>,
    }

    impl Declared {
        fn master(identifier: &str, variables: &[&str]) -> Arc<dyn TimeSeries> {
            Arc::new(Self {
                identifier: identifier.to_string(),
                variables: variables.iter().map(|v| (*v).to_string()).collect(),
                required: Vec::new(),
            })
        }

        fn slave(identifier: &str, variables: &[&str]) -> Arc<dyn TimeSeries> {
            Arc::new(Self {
                identifier: identifier.to_string(),
                variables: variables.iter().map(|v| (*v).to_string()).collect(),
                required: vec!["Timestamp".to_string()],
            })
        }
    }

    impl TimeSeries for Declared {
        fn identifier(&self) -> &str {
            &self.identifier
        }

        fn time_variable(&self) -> &str {
            "Timestamp"
        }

        fn variables(&self) -> &[String] {
            &self.variables
        }

        fn required_variables(&self) -> &[String] {
            &self.required
        }

        fn subset<'a>(&'a self, _window: &TimeRange, _variables: Option<&[String]>) -> FusionResult<Chunks<'a>> {
            Ok(Box::new(std::iter::empty()))
        }

        fn interpolate(&self, _times: &[i64], _variables: Option<&[String]>) -> FusionResult<Dataset> {
            Ok(Dataset::new())
        }

        fn products(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn model_names(resolver: &VariableResolver) -> Vec<String> {
        resolver.models().iter().map(|m| m.name().to_string()).collect()
    }

    #[test]
    fn test_master_once() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "F"])).unwrap();
        let err = resolver.add_master(Declared::master("AUX", &["Timestamp"])).unwrap_err();
        assert!(matches!(err, ResolverError::MasterAlreadySet));
    }

    #[test]
    fn test_slave_requires_master() {
        let mut resolver = VariableResolver::new();
        let err = resolver
            .add_consumer(Consumer::TimeSeries(Declared::slave("AUX", &["Timestamp", "Kp"])))
            .unwrap_err();
        assert!(matches!(err, ResolverError::NoMaster));
    }

    #[test]
    fn test_first_producer_wins() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "F"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "F", "Kp"])).unwrap();
        resolver.add_slave(Declared::slave("DUP", &["Timestamp", "F"])).unwrap();

        assert_eq!(resolver.available(), &["Timestamp", "F", "Kp"]);
        let sources: Vec<String> = resolver
            .time_series()
            .iter()
            .map(|s| s.identifier().to_string())
            .collect();
        assert_eq!(sources, vec!["MAG".to_string(), "AUX".to_string()]);
    }

    #[test]
    fn test_unresolved_model_is_dropped() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC"])).unwrap();
        resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
        resolver.add_model(Arc::new(Identity::new("B_missing", "B_copy")));
        resolver.add_output_variables(Some(strings(&["Timestamp", "F", "B_copy"]).as_slice()));
        resolver.reduce();

        assert_eq!(model_names(&resolver), vec!["VectorIntensity(F)".to_string()]);
        assert_eq!(resolver.output_variables(), &["Timestamp", "F"]);
        assert_eq!(resolver.unresolved(), vec!["B_copy", "B_missing"]);
    }

    #[test]
    fn test_reduce_removes_unused_chain() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
        resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
        resolver.add_model(Arc::new(Identity::new("F", "F_copy")));
        resolver.add_output_variables(Some(strings(&["Timestamp"]).as_slice()));
        resolver.reduce();

        assert!(resolver.models().is_empty());
        assert!(resolver.slaves().is_empty());
        assert_eq!(resolver.master().unwrap().identifier(), "MAG");
        assert_eq!(resolver.available(), &["Timestamp", "B_NEC"]);
    }

    /// Every remaining producer other than the master feeds a live
    /// consumer, and every consumer is a live node or the output.
    fn assert_no_dangling(resolver: &VariableResolver) {
        let master = resolver.sources.first().copied();
        let live: BTreeSet<Slot> = resolver
            .sources
            .iter()
            .chain(&resolver.models)
            .chain(&resolver.filters)
            .copied()
            .map(Slot::Node)
            .chain([Slot::Output])
            .collect();
        for slots in resolver.consumers.values() {
            assert!(slots.is_subset(&live), "dead consumer in {slots:?}");
        }
        for (variable, id) in &resolver.producers {
            let consumed = resolver
                .producers
                .iter()
                .any(|(v, p)| p == id && resolver.consumers.contains_key(v));
            assert!(
                consumed || Some(*id) == master,
                "producer of {variable} has no consumer"
            );
        }
    }

    #[test]
    fn test_shadowed_model_releases_its_inputs() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC"])).unwrap();
        resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
        resolver.add_model(Arc::new(Identity::new("B_NEC", "Y")));
        resolver.add_model(Arc::new(Identity::new("Y", "F")));
        resolver.add_output_variables(Some(strings(&["Timestamp", "F"]).as_slice()));
        resolver.reduce();

        assert_eq!(model_names(&resolver), vec!["VectorIntensity(F)".to_string()]);
        assert_eq!(resolver.available(), &["Timestamp", "B_NEC", "F"]);
        assert_no_dangling(&resolver);
    }

    #[test]
    fn test_shadowed_slave_releases_its_inputs() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "F"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
        resolver.add_model(Arc::new(Identity::new("Kp", "Kp_copy")));
        resolver.add_model(Arc::new(Identity::new("Kp_copy", "F")));
        resolver.add_output_variables(Some(strings(&["Timestamp", "F"]).as_slice()));
        resolver.reduce();

        assert!(resolver.models().is_empty());
        assert!(resolver.slaves().is_empty());
        assert_eq!(resolver.available(), &["Timestamp", "F"]);
        assert_no_dangling(&resolver);
    }

    #[test]
    fn test_no_dangling_consumption_after_reduce() {
        let outputs: [&[&str]; 4] = [
            &["Timestamp"],
            &["Timestamp", "F"],
            &["Timestamp", "Kp_copy", "Y"],
            &["F_copy", "Dst"],
        ];
        for output in outputs {
            let mut resolver = VariableResolver::new();
            resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC", "Q"])).unwrap();
            resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
            resolver.add_slave(Declared::slave("DUP", &["Timestamp", "Kp", "Q"])).unwrap();
            resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
            resolver.add_model(Arc::new(Identity::new("F", "F_copy")));
            resolver.add_model(Arc::new(Identity::new("Kp", "Kp_copy")));
            resolver.add_model(Arc::new(Identity::new("Kp_copy", "F")));
            resolver.add_model(Arc::new(Identity::new("B_NEC", "Y")));
            resolver.add_model(Arc::new(Identity::new("Missing", "Z")));
            resolver.add_filter(Arc::new(ScalarRangeFilter::new("Kp", 0.0, 3.0)));
            resolver.add_output_variables(Some(strings(output).as_slice()));
            resolver.reduce();
            assert_no_dangling(&resolver);
        }
    }

    #[test]
    fn test_reduce_keeps_filter_inputs() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
        resolver.add_filter(Arc::new(ScalarRangeFilter::new("Kp", 0.0, 3.0)));
        resolver.add_output_variables(Some(strings(&["Timestamp", "B_NEC"]).as_slice()));
        resolver.reduce();

        assert_eq!(resolver.slaves().len(), 1);
        assert_eq!(resolver.filters().len(), 1);
        assert_eq!(resolver.filters()[0].to_string(), "Kp: [0, 3]");
    }

    #[test]
    fn test_unresolved_filter_rejects_all() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "F"])).unwrap();
        resolver.add_filter(Arc::new(ScalarRangeFilter::new("F", 0.0, 10.0)));
        resolver.add_filter(Arc::new(ScalarRangeFilter::new("Dst", -50.0, 50.0)));
        resolver.add_output_variables(None);
        resolver.reduce();

        let filters = resolver.filters();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].to_string(), "RejectAll()");
        assert_eq!(resolver.unresolved_filters().len(), 1);
    }

    #[test]
    fn test_output_defaults_to_available() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "F"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
        resolver.add_output_variables(None);
        assert_eq!(resolver.output_variables(), &["Timestamp", "F", "Kp"]);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let mut resolver = VariableResolver::new();
        resolver.add_master(Declared::master("MAG", &["Timestamp", "B_NEC", "Q"])).unwrap();
        resolver.add_slave(Declared::slave("AUX", &["Timestamp", "Kp"])).unwrap();
        resolver.add_model(Arc::new(VectorIntensity::new("B_NEC", "F")));
        resolver.add_model(Arc::new(Identity::new("Kp", "Kp_copy")));
        resolver.add_output_variables(Some(strings(&["Timestamp", "F"]).as_slice()));
        resolver.reduce();
        let available = resolver.available().to_vec();
        let required: Vec<String> = resolver.required().iter().map(|v| (*v).to_string()).collect();
        let models = model_names(&resolver);

        resolver.reduce();
        assert_eq!(resolver.available(), available.as_slice());
        assert_eq!(resolver.required(), required);
        assert_eq!(model_names(&resolver), models);
    }
}
