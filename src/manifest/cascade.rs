//! Route option cascade.
//!
//! Nodes are ordered root-most layout first, leaf last. A node that defines
//! the option replaces whatever an outer node said; one that does not leaves
//! it alone. The leaf therefore wins, then the nearest layout that defines it.

use std::sync::Arc;

use crate::manifest::node::{Node, OptionValue, RouteOption};

/// Resolve `option` across `nodes`; `None` if no node defines it.
pub fn resolve_option(nodes: &[Option<Arc<Node>>], option: RouteOption) -> Option<&OptionValue> {
    nodes.iter().fold(None, |value, node| {
        node.as_deref().and_then(|n| n.option(option)).or(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::node::OptionsRecord;

    fn universal(option: RouteOption, value: impl Into<OptionValue>) -> Option<Arc<Node>> {
        Some(Arc::new(Node {
            universal: Some(OptionsRecord::new().with(option, value)),
            server: None,
        }))
    }

    #[test]
    fn test_leaf_wins() {
        let nodes = vec![universal(RouteOption::Ssr, true), universal(RouteOption::Ssr, false)];
        assert_eq!(resolve_option(&nodes, RouteOption::Ssr), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_inherits_from_layout() {
        let nodes = vec![universal(RouteOption::Ssr, true), Some(Arc::new(Node::default()))];
        assert_eq!(resolve_option(&nodes, RouteOption::Ssr), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_nearest_layout_and_gaps() {
        let nodes = vec![
            universal(RouteOption::TrailingSlash, "never"),
            None,
            universal(RouteOption::TrailingSlash, "always"),
            Some(Arc::new(Node {
                universal: None,
                server: Some(OptionsRecord::new().with(RouteOption::Csr, false)),
            })),
        ];
        assert_eq!(
            resolve_option(&nodes, RouteOption::TrailingSlash),
            Some(&OptionValue::Text("always".into()))
        );
        assert_eq!(resolve_option(&nodes, RouteOption::Csr), Some(&OptionValue::Bool(false)));
        assert_eq!(resolve_option(&nodes, RouteOption::Prerender), None);
        assert_eq!(resolve_option(&[], RouteOption::Ssr), None);
    }
}
