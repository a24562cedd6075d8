//! Query Surface (spec.md §4.4): adapts external reference-style arguments
//! into the `(process_ref, flow_ref)` pairs the ordering/background layers
//! index on. Grounded on `implementation.py::TarjanBackgroundImplementation._check_ref`.

use thiserror::Error;

use tarjan_core::{FlowRef, ProcessRef};

use crate::interfaces::{ExchangeHandle, IndexQuery, ProcessHandle};

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("'{process_ref}' has no reference exchange matching '{hint:?}'")]
    InvalidReference { process_ref: String, hint: Option<String> },

    #[error("unknown process '{0}'")]
    UnknownProcess(String),

    #[error("exchange argument must be a reference exchange")]
    NotAReferenceExchange,
}

/// The argument shapes spec.md §4.4 accepts.
pub enum RefArg<'a, X: ExchangeHandle> {
    /// `(process_ref)` — resolve "the" reference flow (must be unambiguous).
    ProcessRef(ProcessRef),
    /// `(process_ref, flow_ref)`.
    ProcessRefFlow(ProcessRef, FlowRef),
    /// `(process_entity)`.
    Entity(ProcessRef),
    /// `(process_entity, flow_ref)`.
    EntityFlow(ProcessRef, FlowRef),
    /// `(exchange)` — must be a reference exchange.
    Exchange(&'a X),
}

/// Normalize any of the argument shapes into `(process_ref, flow_ref)`,
/// consulting the index to resolve flow hints against reference exchanges.
pub fn normalize<I: IndexQuery>(arg: RefArg<'_, impl ExchangeHandle>, index: &I) -> Result<(ProcessRef, FlowRef), QueryError> {
    match arg {
        RefArg::ProcessRef(process_ref) => resolve_hint(index, process_ref, None),
        RefArg::ProcessRefFlow(process_ref, flow_ref) => resolve_hint(index, process_ref, Some(flow_ref)),
        RefArg::Entity(process_ref) => resolve_hint(index, process_ref, None),
        RefArg::EntityFlow(process_ref, flow_ref) => resolve_hint(index, process_ref, Some(flow_ref)),
        RefArg::Exchange(exch) => {
            if !exch.is_reference() {
                return Err(QueryError::NotAReferenceExchange);
            }
            Ok((exch.process_ref(), exch.flow_ref()))
        }
    }
}

fn resolve_hint<I: IndexQuery>(index: &I, process_ref: ProcessRef, hint: Option<FlowRef>) -> Result<(ProcessRef, FlowRef), QueryError> {
    let process = index.get(&process_ref).ok_or_else(|| QueryError::UnknownProcess(process_ref.clone()))?;
    let resolved = process
        .reference_flow(hint.as_deref())
        .ok_or_else(|| QueryError::InvalidReference { process_ref: process_ref.clone(), hint: hint.clone() })?;
    Ok((process_ref, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeProcess {
        external_ref: ProcessRef,
        reference_flows: Vec<FlowRef>,
    }

    impl ProcessHandle for FakeProcess {
        fn external_ref(&self) -> ProcessRef {
            self.external_ref.clone()
        }

        fn reference_flow(&self, hint: Option<&str>) -> Option<FlowRef> {
            match hint {
                Some(h) => self.reference_flows.iter().find(|f| f.as_str() == h).cloned(),
                None => {
                    if self.reference_flows.len() == 1 {
                        Some(self.reference_flows[0].clone())
                    } else {
                        None
                    }
                }
            }
        }
    }

    struct FakeExchange {
        is_reference: bool,
        process_ref: ProcessRef,
        flow_ref: FlowRef,
    }

    impl ExchangeHandle for FakeExchange {
        fn is_reference(&self) -> bool {
            self.is_reference
        }
        fn process_ref(&self) -> ProcessRef {
            self.process_ref.clone()
        }
        fn flow_ref(&self) -> FlowRef {
            self.flow_ref.clone()
        }
    }

    struct FakeIndex {
        processes: HashMap<ProcessRef, FakeProcess>,
    }

    impl IndexQuery for FakeIndex {
        type Process = FakeProcess;

        fn get(&self, external_ref: &str) -> Option<FakeProcess> {
            self.processes.get(external_ref).map(|p| FakeProcess {
                external_ref: p.external_ref.clone(),
                reference_flows: p.reference_flows.clone(),
            })
        }

        fn processes(&self) -> Vec<ProcessRef> {
            self.processes.keys().cloned().collect()
        }
    }

    fn fake_index() -> FakeIndex {
        let mut processes = HashMap::new();
        processes.insert(
            "p1".to_string(),
            FakeProcess { external_ref: "p1".to_string(), reference_flows: vec!["f1".to_string()] },
        );
        processes.insert(
            "p2".to_string(),
            FakeProcess { external_ref: "p2".to_string(), reference_flows: vec!["fa".to_string(), "fb".to_string()] },
        );
        FakeIndex { processes }
    }

    #[test]
    fn process_ref_alone_resolves_unambiguous_reference() {
        let index = fake_index();
        let result = normalize::<FakeIndex>(RefArg::ProcessRef::<FakeExchange>("p1".to_string()), &index).unwrap();
        assert_eq!(result, ("p1".to_string(), "f1".to_string()));
    }

    #[test]
    fn process_ref_alone_is_ambiguous_with_multiple_reference_flows() {
        let index = fake_index();
        let result = normalize::<FakeIndex>(RefArg::ProcessRef::<FakeExchange>("p2".to_string()), &index);
        assert!(matches!(result, Err(QueryError::InvalidReference { .. })));
    }

    #[test]
    fn process_ref_with_flow_hint_resolves_directly() {
        let index = fake_index();
        let result = normalize::<FakeIndex>(RefArg::ProcessRefFlow::<FakeExchange>("p2".to_string(), "fb".to_string()), &index).unwrap();
        assert_eq!(result, ("p2".to_string(), "fb".to_string()));
    }

    #[test]
    fn unknown_process_is_an_error() {
        let index = fake_index();
        let result = normalize::<FakeIndex>(RefArg::ProcessRef::<FakeExchange>("nope".to_string()), &index);
        assert!(matches!(result, Err(QueryError::UnknownProcess(_))));
    }

    #[test]
    fn exchange_must_be_reference() {
        let index = fake_index();
        let non_ref = FakeExchange { is_reference: false, process_ref: "p1".to_string(), flow_ref: "f1".to_string() };
        let result = normalize(RefArg::Exchange(&non_ref), &index);
        assert!(matches!(result, Err(QueryError::NotAReferenceExchange)));

        let is_ref = FakeExchange { is_reference: true, process_ref: "p1".to_string(), flow_ref: "f1".to_string() };
        let result = normalize(RefArg::Exchange(&is_ref), &index).unwrap();
        assert_eq!(result, ("p1".to_string(), "f1".to_string()));
    }
}
