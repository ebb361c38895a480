//! Strategy capability trait, registry, and per-prefix strategy choice.
//!
//! A strategy is instantiated from an instance name such as
//! `/localhost/rnfd/strategy/best-route/v=5`; the version suffix is
//! validated against the version the strategy implements.

use crate::fw::Forwarder;
use crate::tables::fib::NextHop;
use crate::tables::pit::PitEntryId;
use log::debug;
use rust_rnfd_common::name::NameComponent;
use rust_rnfd_common::packet::{Data, Interest, Nack, NackReason};
use rust_rnfd_common::{Error, FaceId, Name};
use std::collections::HashMap;
use std::rc::Rc;

/// The capability set every strategy may implement. Defaults cover the
/// common cases: Data goes to all pending downstreams, a Content Store hit
/// answers the requester, everything else is a no-op.
pub trait Strategy {
    /// The instance name this strategy was constructed with.
    fn instance_name(&self) -> &Name;

    fn after_receive_interest(
        &self,
        fw: &mut Forwarder,
        interest: Interest,
        ingress: FaceId,
        pit_entry: PitEntryId,
    );

    fn after_receive_data(
        &self,
        fw: &mut Forwarder,
        data: &Data,
        ingress: FaceId,
        pit_entry: PitEntryId,
    ) {
        fw.send_data_to_all(pit_entry, ingress, data);
    }

    fn before_satisfy_interest(
        &self,
        _fw: &mut Forwarder,
        _data: &Data,
        _ingress: FaceId,
        _pit_entry: PitEntryId,
    ) {
    }

    fn after_receive_nack(
        &self,
        _fw: &mut Forwarder,
        _nack: &Nack,
        _ingress: FaceId,
        _pit_entry: PitEntryId,
    ) {
    }

    fn after_content_store_hit(
        &self,
        fw: &mut Forwarder,
        data: &Data,
        ingress: FaceId,
        _pit_entry: PitEntryId,
    ) {
        fw.on_outgoing_data(data, ingress);
    }

    fn after_new_next_hop(&self, _fw: &mut Forwarder, _next_hop: &NextHop, _pit_entry: PitEntryId) {}

    fn on_dropped_interest(&self, _fw: &mut Forwarder, _interest: &Interest, _egress: FaceId) {}
}

/// Shared NACK processing: once every pending upstream has NACKed, the
/// least severe reason is propagated to all downstreams and the entry is
/// rejected.
pub fn process_nack(fw: &mut Forwarder, nack: &Nack, ingress: FaceId, pit_entry: PitEntryId) {
    let now = std::time::Instant::now();
    let (outstanding, reason, downstreams) = {
        let Some(entry) = fw.pit.entry(pit_entry) else {
            return;
        };
        let outstanding = entry.has_pending_out_records(now);
        let reason = entry
            .out_records
            .iter()
            .filter_map(|r| r.incoming_nack)
            .fold(NackReason::None, NackReason::least_severe);
        let downstreams: Vec<FaceId> = entry.in_records.iter().map(|r| r.face).collect();
        (outstanding, reason, downstreams)
    };

    if outstanding {
        debug!(
            "process-nack in={} nack={}~{} waiting for other upstreams",
            ingress, nack.interest.name, nack.reason
        );
        return;
    }

    for downstream in downstreams {
        fw.on_outgoing_nack(reason, downstream, pit_entry);
    }
    fw.reject_pending_interest(pit_entry);
}

/* ---------------------------------------------------------------- *\
 * Instance names
\* ---------------------------------------------------------------- */

/// A strategy instance name split into its base, version, and parameters.
#[derive(Debug, Clone)]
pub struct ParsedInstanceName {
    pub base: Name,
    pub version: Option<u64>,
    pub parameters: Vec<NameComponent>,
}

/// Splits `name` at the first version component.
pub fn parse_instance_name(name: &Name) -> ParsedInstanceName {
    for i in 0..name.len() {
        if let Some(version) = name.get(i as isize).and_then(NameComponent::as_version) {
            return ParsedInstanceName {
                base: name.get_prefix(i as isize),
                version: Some(version),
                parameters: (i + 1..name.len())
                    .filter_map(|j| name.get(j as isize).cloned())
                    .collect(),
            };
        }
    }
    ParsedInstanceName {
        base: name.clone(),
        version: None,
        parameters: Vec::new(),
    }
}

/// Validates the version suffix against the strategy's own version and
/// returns the canonical instance name.
pub fn make_instance_name(
    parsed: &ParsedInstanceName,
    strategy_name: &Name,
) -> Result<Name, Error> {
    let own_version = strategy_name
        .get(-1)
        .and_then(NameComponent::as_version)
        .expect("strategy names carry a version");
    if let Some(version) = parsed.version {
        if version != own_version {
            return Err(Error::InvalidStrategyVersion {
                strategy: parsed.base.to_string(),
                version,
            });
        }
    }
    Ok(strategy_name.clone())
}

/* ---------------------------------------------------------------- *\
 * Registry and per-prefix choice
\* ---------------------------------------------------------------- */

pub type StrategyFactory = fn(&Name) -> Result<Rc<dyn Strategy>, Error>;

/// Maps versionless strategy base names to factories.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: HashMap<Name, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, base_name: Name, factory: StrategyFactory) {
        self.factories.insert(base_name, factory);
    }

    /// Instantiates the strategy named by `instance_name`.
    pub fn create(&self, instance_name: &Name) -> Result<Rc<dyn Strategy>, Error> {
        let parsed = parse_instance_name(instance_name);
        let factory = self
            .factories
            .get(&parsed.base)
            .ok_or_else(|| Error::UnknownStrategy(parsed.base.to_string()))?;
        factory(instance_name)
    }

    pub fn registered_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Per-prefix strategy choice. The root choice always exists, so every
/// name has an effective strategy.
pub struct StrategyChoice {
    choices: HashMap<Name, Rc<dyn Strategy>>,
}

impl StrategyChoice {
    pub fn new(default_strategy: Rc<dyn Strategy>) -> Self {
        let mut choices = HashMap::new();
        choices.insert(Name::new(), default_strategy);
        Self { choices }
    }

    pub fn set(&mut self, prefix: &Name, strategy: Rc<dyn Strategy>) {
        self.choices.insert(prefix.strip_reflexive(), strategy);
    }

    /// Removes the choice at `prefix`; the root choice cannot be unset.
    pub fn unset(&mut self, prefix: &Name) -> bool {
        if prefix.is_empty() {
            return false;
        }
        self.choices.remove(&prefix.strip_reflexive()).is_some()
    }

    /// Longest-prefix effective strategy for `name`.
    pub fn find_effective(&self, name: &Name) -> Rc<dyn Strategy> {
        let stripped = name.strip_reflexive();
        for k in (0..=stripped.len()).rev() {
            if let Some(strategy) = self.choices.get(&stripped.get_prefix(k as isize)) {
                return Rc::clone(strategy);
            }
        }
        unreachable!("the root strategy choice always exists")
    }

    pub fn entries(&self) -> Vec<(Name, Name)> {
        let mut out: Vec<(Name, Name)> = self
            .choices
            .iter()
            .map(|(prefix, strategy)| (prefix.clone(), strategy.instance_name().clone()))
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fw::best_route::BestRouteStrategy;
    use crate::fw::multicast::MulticastStrategy;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn registry() -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        registry.register(BestRouteStrategy::strategy_base_name(), BestRouteStrategy::factory);
        registry.register(MulticastStrategy::strategy_base_name(), MulticastStrategy::factory);
        registry
    }

    #[test]
    fn parse_splits_at_the_version() {
        let instance = name("/localhost/rnfd/strategy/best-route")
            .appending(NameComponent::version(5))
            .appending(NameComponent::generic(&b"param"[..]));
        let parsed = parse_instance_name(&instance);
        assert_eq!(parsed.base, name("/localhost/rnfd/strategy/best-route"));
        assert_eq!(parsed.version, Some(5));
        assert_eq!(parsed.parameters.len(), 1);

        let bare = parse_instance_name(&name("/localhost/rnfd/strategy/best-route"));
        assert_eq!(bare.version, None);
    }

    #[test]
    fn versionless_and_matching_versions_instantiate() {
        let registry = registry();
        assert!(registry.create(&name("/localhost/rnfd/strategy/best-route")).is_ok());
        let versioned = name("/localhost/rnfd/strategy/best-route").appending(NameComponent::version(5));
        assert!(registry.create(&versioned).is_ok());
    }

    #[test]
    fn wrong_version_is_rejected() {
        let registry = registry();
        let wrong = name("/localhost/rnfd/strategy/best-route").appending(NameComponent::version(99));
        assert!(matches!(
            registry.create(&wrong),
            Err(Error::InvalidStrategyVersion { version: 99, .. })
        ));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.create(&name("/localhost/rnfd/strategy/warp")),
            Err(Error::UnknownStrategy(_))
        ));
    }

    #[test]
    fn choice_walks_to_the_longest_prefix() {
        let registry = registry();
        let best_route = registry.create(&name("/localhost/rnfd/strategy/best-route")).unwrap();
        let multicast = registry.create(&name("/localhost/rnfd/strategy/multicast")).unwrap();

        let mut choice = StrategyChoice::new(best_route);
        choice.set(&name("/broadcast"), multicast);

        let effective = choice.find_effective(&name("/broadcast/app/1"));
        assert_eq!(
            effective.instance_name(),
            &name("/localhost/rnfd/strategy/multicast").appending(NameComponent::version(4))
        );
        let effective = choice.find_effective(&name("/elsewhere"));
        assert_eq!(
            effective.instance_name(),
            &name("/localhost/rnfd/strategy/best-route").appending(NameComponent::version(5))
        );

        assert!(!choice.unset(&Name::new()));
        assert!(choice.unset(&name("/broadcast")));
        assert!(!choice.unset(&name("/broadcast")));
    }
}
