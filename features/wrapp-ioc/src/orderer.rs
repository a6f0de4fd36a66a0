//! Stable topological ordering of named items with `before:` / `after:` constraints.
//!
//! Ordering is best effort: constraints which would form a cycle, or which reference ids that
//! were never added, are dropped with a warning instead of failing the whole ordering.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    fmt::Display,
};

use thiserror::Error;

use crate::id_matcher::glob_matches;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrdererError {
    #[error("Could not add '{id}' to the {description}: an item with that id has already been added")]
    DuplicateId { description: String, id: String },
}

/// A constraint which could not be honoured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingWarning {
    /// Id of the item declaring the constraint
    pub item: String,
    /// The constraint as declared
    pub constraint: String,
    pub conflict: OrderingConflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingConflict {
    /// Honouring the constraint would make `other` depend on itself
    Cycle { other: String },
    /// The constraint names an id which was never added
    UnknownId(String),
    /// The constraint is neither `before:...`, `after:...` nor `none`
    Malformed,
}

impl Display for OrderingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.conflict {
            OrderingConflict::Cycle { other } => write!(
                f,
                "Constraint '{}' of '{}' was ignored as ordering it relative to '{}' forms a dependency cycle",
                self.constraint, self.item, other
            ),
            OrderingConflict::UnknownId(id) => write!(
                f,
                "Constraint '{}' of '{}' references '{}', which has not been added",
                self.constraint, self.item, id
            ),
            OrderingConflict::Malformed => write!(
                f,
                "Constraint '{}' of '{}' is not of the form 'before:<ids>' or 'after:<ids>'",
                self.constraint, self.item
            ),
        }
    }
}

/// Result of [Orderer::get_ordered]
#[derive(Debug)]
pub struct Ordered<T> {
    pub values: Vec<T>,
    pub warnings: Vec<OrderingWarning>,
}
impl<T> Ordered<T> {
    pub fn into_values(self) -> Vec<T> {
        self.values
    }
}

struct OrdererItem<T> {
    id: String,
    /// Placeholders take part in the ordering but produce no value
    value: Option<T>,
    constraints: Vec<String>,
}

/// Orders items by their constraints, ties are broken by insertion order
pub struct Orderer<T> {
    description: String,
    items: Vec<OrdererItem<T>>,
    ids: HashMap<String, usize>,
}

impl<T> Orderer<T> {
    /// `description` names what is being ordered, it is used in warnings and errors
    pub fn new(description: impl Into<String>) -> Self {
        Orderer {
            description: description.into(),
            items: Vec::new(),
            ids: HashMap::new(),
        }
    }

    pub fn add(&mut self, id: &str, value: T, constraints: &[&str]) -> Result<(), OrdererError> {
        self.insert(id, Some(value), constraints)
    }

    /// Adds an item other items can be ordered against, without contributing a value
    pub fn add_placeholder(&mut self, id: &str, constraints: &[&str]) -> Result<(), OrdererError> {
        self.insert(id, None, constraints)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn insert(
        &mut self,
        id: &str,
        value: Option<T>,
        constraints: &[&str],
    ) -> Result<(), OrdererError> {
        let key = id.to_lowercase();
        if self.ids.contains_key(&key) {
            return Err(OrdererError::DuplicateId {
                description: self.description.clone(),
                id: id.to_string(),
            });
        }

        self.ids.insert(key, self.items.len());
        self.items.push(OrdererItem {
            id: id.to_string(),
            value,
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
        });
        Ok(())
    }

    /// Orders all values
    ///
    /// Never fails, conflicting constraints are reported as [OrderingWarning]s and logged.
    pub fn get_ordered(self) -> Ordered<T> {
        let count = self.items.len();
        let mut warnings = Vec::new();
        // successors[a] contains b if a must come before b
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (index, item) in self.items.iter().enumerate() {
            for constraint in &item.constraints {
                let trimmed = constraint.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                    continue;
                }

                let before = match trimmed.split_once(':') {
                    Some((kind, _)) if kind.trim().eq_ignore_ascii_case("before") => true,
                    Some((kind, _)) if kind.trim().eq_ignore_ascii_case("after") => false,
                    _ => {
                        warnings.push(OrderingWarning {
                            item: item.id.clone(),
                            constraint: constraint.clone(),
                            conflict: OrderingConflict::Malformed,
                        });
                        continue;
                    }
                };
                let targets = trimmed.split_once(':').map(|(_, ids)| ids).unwrap_or("");

                for pattern in targets.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let matches: Vec<usize> = (0..count)
                        .filter(|other| *other != index)
                        .filter(|other| glob_matches(pattern, &self.items[*other].id))
                        .collect();

                    if matches.is_empty() && !pattern.contains('*') {
                        warnings.push(OrderingWarning {
                            item: item.id.clone(),
                            constraint: constraint.clone(),
                            conflict: OrderingConflict::UnknownId(pattern.to_string()),
                        });
                    }

                    for other in matches {
                        let (from, to) = match before {
                            true => (index, other),
                            false => (other, index),
                        };
                        if successors[from].contains(&to) {
                            continue;
                        }
                        // Adding from -> to closes a cycle if `to` already leads to `from`
                        if reaches(&successors, to, from) {
                            warnings.push(OrderingWarning {
                                item: item.id.clone(),
                                constraint: constraint.clone(),
                                conflict: OrderingConflict::Cycle {
                                    other: self.items[other].id.clone(),
                                },
                            });
                            continue;
                        }
                        successors[from].push(to);
                    }
                }
            }
        }

        // Kahn's algorithm, always picking the earliest inserted ready item
        let mut in_degree = vec![0usize; count];
        for targets in &successors {
            for target in targets {
                in_degree[*target] += 1;
            }
        }
        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|index| in_degree[*index] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(count);
        let mut placed = vec![false; count];
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            placed[index] = true;
            for target in &successors[index] {
                in_degree[*target] -= 1;
                if in_degree[*target] == 0 {
                    ready.push(Reverse(*target));
                }
            }
        }
        // Cycles are rejected while adding edges, anything left over is appended as inserted
        order.extend((0..count).filter(|index| !placed[*index]));

        for warning in &warnings {
            tracing::warn!(orderer = %self.description, "{warning}");
        }

        let mut items: Vec<Option<OrdererItem<T>>> = self.items.into_iter().map(Some).collect();
        let values = order
            .into_iter()
            .filter_map(|index| items[index].take().and_then(|item| item.value))
            .collect();

        Ordered { values, warnings }
    }
}

fn reaches(successors: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut visited = vec![false; successors.len()];
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if std::mem::replace(&mut visited[current], true) {
            continue;
        }
        stack.extend(successors[current].iter().copied());
    }
    false
}
