//! Maps a rendered object back to the live object in the cluster.

use keel_core::types::LABEL_TRAIT_RESOURCE;
use keel_core::{ClusterReader, Labels, Unstructured};

use crate::error::ResolveError;

/// Find the live counterpart of `symbolic`.
///
/// A named object is fetched directly. Otherwise every object of its kind
/// carrying `labels` is listed; a single candidate wins outright, and among
/// several the first (ordered by namespace, then name) whose
/// `trait.oam.dev/resource` label equals `qualifier` is chosen. A missing
/// label reads as `""`. `qualifier` never narrows the listing itself.
pub fn resolve(
    symbolic: &Unstructured,
    reader: &dyn ClusterReader,
    namespace: &str,
    labels: &Labels,
    qualifier: &str,
) -> Result<Unstructured, ResolveError> {
    let gvk = symbolic.gvk();
    let name = symbolic.name();
    if !name.is_empty() {
        tracing::debug!(%gvk, namespace, name, "resolving by name");
        return Ok(reader.get(&gvk, namespace, name)?);
    }

    let mut candidates = reader.list(&gvk, namespace, labels)?;
    tracing::debug!(%gvk, namespace, candidates = candidates.len(), qualifier, "resolving by labels");
    match candidates.len() {
        0 => Err(ResolveError::NotFound {
            gvk,
            labels: labels.clone(),
        }),
        1 => Ok(candidates.remove(0)),
        n => {
            candidates.sort_by(|a, b| (a.namespace(), a.name()).cmp(&(b.namespace(), b.name())));
            candidates
                .into_iter()
                .find(|c| c.label(LABEL_TRAIT_RESOURCE).unwrap_or_default() == qualifier)
                .ok_or_else(|| ResolveError::Ambiguous {
                    gvk,
                    labels: labels.clone(),
                    qualifier: qualifier.to_string(),
                    candidates: n,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{ClusterError, MemoryReader};
    use serde_json::json;

    fn obj(v: serde_json::Value) -> Unstructured {
        Unstructured::from_json(v).unwrap()
    }

    fn svc(name: &str, resource: Option<&str>) -> Unstructured {
        let mut labels = json!({"app.oam.dev/name": "shop"});
        if let Some(r) = resource {
            labels["trait.oam.dev/resource"] = json!(r);
        }
        obj(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": name, "labels": labels}}))
    }

    fn shop() -> Labels {
        [("app.oam.dev/name".to_string(), "shop".to_string())].into_iter().collect()
    }

    fn symbolic_service() -> Unstructured {
        obj(json!({"apiVersion": "v1", "kind": "Service"}))
    }

    #[test]
    fn named_object_is_fetched_directly() {
        let reader = MemoryReader::new(vec![svc("a", None), svc("b", None)]);
        let symbolic = obj(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "b"}}));
        let found = resolve(&symbolic, &reader, "default", &Labels::new(), "").unwrap();
        assert_eq!(found.name(), "b");
    }

    #[test]
    fn missing_named_object_is_not_found() {
        let reader = MemoryReader::default();
        let symbolic = obj(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "b"}}));
        let err = resolve(&symbolic, &reader, "default", &Labels::new(), "").unwrap_err();
        assert!(matches!(err, ResolveError::Cluster(ClusterError::NotFound { .. })));
        assert!(err.is_not_found());
    }

    #[test]
    fn single_candidate_ignores_qualifier() {
        let reader = MemoryReader::new(vec![svc("only", Some("other"))]);
        let found = resolve(&symbolic_service(), &reader, "default", &shop(), "mine").unwrap();
        assert_eq!(found.name(), "only");
    }

    #[test]
    fn qualifier_picks_among_candidates() {
        let reader = MemoryReader::new(vec![svc("x1", Some("b")), svc("x2", Some("a"))]);
        let found = resolve(&symbolic_service(), &reader, "default", &shop(), "a").unwrap();
        assert_eq!(found.name(), "x2");
    }

    #[test]
    fn tie_break_is_by_name() {
        let reader = MemoryReader::new(vec![svc("zeta", None), svc("alpha", None), svc("mid", Some("q"))]);
        let found = resolve(&symbolic_service(), &reader, "default", &shop(), "").unwrap();
        assert_eq!(found.name(), "alpha");
    }

    #[test]
    fn no_candidates_is_not_found() {
        let reader = MemoryReader::new(vec![svc("a", None)]);
        let mut labels = shop();
        labels.insert("app.oam.dev/component".into(), "web".into());
        let err = resolve(&symbolic_service(), &reader, "default", &labels, "").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn unmatched_qualifier_is_ambiguous() {
        let reader = MemoryReader::new(vec![svc("a", Some("x")), svc("b", Some("y"))]);
        let err = resolve(&symbolic_service(), &reader, "default", &shop(), "z").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Ambiguous {
                gvk: symbolic_service().gvk(),
                labels: shop(),
                qualifier: "z".into(),
                candidates: 2,
            }
        );
    }
}
