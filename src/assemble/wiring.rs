use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::{
    error::{IflowError, IflowErrorLocation, Result},
    model::Connection,
};

/// A reference from `sequence`, `branching` or `error_handling` bound to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub index: usize,
    /// The component was already placed; render another instance under a fresh id.
    pub repeat: bool,
}

/// Resolves textual ids to component positions.
///
/// The k-th reference to an id binds to the k-th component declaring it, so duplicated ids stay
/// addressable. References past the last declaration repeat the last one. Declarations left over
/// once every reference to their id is spent are handed out by [`ReferenceTable::take_surplus`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    by_id: HashMap<String, Vec<usize>>,
    taken: HashMap<String, usize>,
    expected: HashMap<String, usize>,
    bound: HashSet<usize>,
}

impl ReferenceTable {
    pub fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, id) in ids.into_iter().enumerate() {
            by_id.entry(id.to_string()).or_default().push(idx);
        }
        ReferenceTable {
            by_id,
            ..Default::default()
        }
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.by_id.contains_key(reference)
    }

    pub fn resolve(&mut self, reference: &str, referenced_from: &str) -> Result<Binding> {
        let Some(indices) = self.by_id.get(reference) else {
            return Err(IflowError::DanglingReference {
                reference: reference.to_string(),
                referenced_from: referenced_from.to_string(),
                location: IflowErrorLocation::at_path(referenced_from),
            });
        };
        let taken = self.taken.entry(reference.to_string()).or_insert(0);
        let (index, repeat) = match indices.get(*taken) {
            Some(index) => (*index, false),
            None => (indices[indices.len() - 1], true),
        };
        *taken += 1;
        self.bound.insert(index);
        Ok(Binding { index, repeat })
    }

    /// Check a reference without binding it and count it towards its id.
    pub fn note(&mut self, reference: &str, referenced_from: &str) -> Result<()> {
        if !self.contains(reference) {
            return Err(IflowError::DanglingReference {
                reference: reference.to_string(),
                referenced_from: referenced_from.to_string(),
                location: IflowErrorLocation::at_path(referenced_from),
            });
        }
        *self.expected.entry(reference.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Once the last noted reference to `reference` is resolved, bind the declarations of that id
    /// no reference reached. `accept` filters by component index; rejected ones stay unbound.
    pub fn take_surplus(
        &mut self,
        reference: &str,
        accept: impl Fn(usize) -> bool,
    ) -> Vec<Binding> {
        let Some(indices) = self.by_id.get(reference) else {
            return Vec::new();
        };
        let taken = self.taken.get(reference).copied().unwrap_or(0);
        let expected = self.expected.get(reference).copied().unwrap_or(0);
        if taken == 0 || taken < expected || taken >= indices.len() {
            return Vec::new();
        }
        let surplus: Vec<Binding> = indices[taken..]
            .iter()
            .copied()
            .filter(|idx| accept(*idx))
            .map(|index| Binding {
                index,
                repeat: false,
            })
            .collect();
        self.taken.insert(reference.to_string(), indices.len());
        self.bound.extend(surplus.iter().map(|b| b.index));
        surplus
    }

    /// Number of components declaring `id`.
    pub fn declarations(&self, id: &str) -> usize {
        self.by_id.get(id).map_or(0, Vec::len)
    }

    pub fn is_bound(&self, index: usize) -> bool {
        self.bound.contains(&index)
    }
}

/// Linear order implied by `connections`. Forks, joins, cycles and disconnected pieces are
/// rejected; branching belongs in the `branching` block.
pub fn sequence_from_connections(connections: &[Connection], owner: &str) -> Result<Vec<String>> {
    let graph_error = |message: String| IflowError::Graph {
        message,
        location: IflowErrorLocation::at_path(format!("{owner}.connections")),
    };
    let mut next: IndexMap<&str, &str> = IndexMap::new();
    let mut targets: HashSet<&str> = HashSet::new();
    for conn in connections {
        if let Some(existing) = next.insert(conn.source.as_str(), conn.target.as_str()) {
            return Err(graph_error(format!(
                "'{}' connects to both '{existing}' and '{}'",
                conn.source, conn.target
            )));
        }
        if !targets.insert(conn.target.as_str()) {
            return Err(graph_error(format!(
                "'{}' has more than one incoming connection",
                conn.target
            )));
        }
    }
    let heads: Vec<&str> = next
        .keys()
        .copied()
        .filter(|source| !targets.contains(source))
        .collect();
    let head = match heads.as_slice() {
        [single] => *single,
        [] if connections.is_empty() => return Ok(Vec::new()),
        [] => return Err(graph_error("connections form a cycle".to_string())),
        _ => {
            return Err(graph_error(format!(
                "connections are disconnected; chains start at {}",
                heads.join(", ")
            )));
        }
    };

    let mut order = vec![head.to_string()];
    let mut seen: HashSet<&str> = HashSet::from([head]);
    let mut current = head;
    while let Some(target) = next.get(current).copied() {
        if !seen.insert(target) {
            return Err(graph_error(format!("connections loop back to '{target}'")));
        }
        order.push(target.to_string());
        current = target;
    }
    if order.len() != seen.len() || seen.len() != targets.len() + 1 {
        return Err(graph_error(
            "connections contain a cycle detached from the main chain".to_string(),
        ));
    }
    Ok(order)
}
