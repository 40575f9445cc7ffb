//! Node lists for drawing a token stream or an expression tree.
//!
//! Each node carries an id, a two-line label (`text` over `(KIND)`) and the id
//! of the node it hangs from. Nothing here knows how the graph is drawn; a
//! renderer consumes [`Graph`] directly, as JSON, or as Graphviz DOT.

use std::fmt::Write;

use serde::Serialize;

use crate::{lexer::Token, parser::Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: usize,
    pub label: String,
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
}

impl Graph {
    /// Numbers tree nodes in pre-order; `parent` is the enclosing node.
    pub fn from_tree(root: &Node<'_>) -> Self {
        let mut graph = Graph::default();
        let mut stack = vec![(root, None)];

        while let Some((node, parent)) = stack.pop() {
            let id = graph.nodes.len();
            graph.nodes.push(GraphNode {
                id,
                label: label(node.text(), node.kind_name()),
                parent,
            });

            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
        }

        graph
    }

    /// Numbers tokens left to right, each hanging from its predecessor.
    pub fn from_tokens(tokens: &[Token<'_>]) -> Self {
        let nodes = tokens
            .iter()
            .enumerate()
            .map(|(id, token)| GraphNode {
                id,
                label: label(token.slice, token.kind.name()),
                parent: id.checked_sub(1),
            })
            .collect();
        Graph { nodes }
    }

    /// `(from, to)` pairs, parent first.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.nodes
            .iter()
            .filter_map(|node| node.parent.map(|parent| (parent, node.id)))
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for node in &self.nodes {
            let _ = writeln!(out, "    {} [label={:?}];", node.id, node.label);
        }
        for (from, to) in self.edges() {
            let _ = writeln!(out, "    {} -> {};", from, to);
        }
        out.push('}');
        out.push('\n');
        out
    }
}

fn label(text: &str, kind: &str) -> String {
    format!("{text}\n({kind})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::tokenize, parser::parse};

    fn node(id: usize, label: &str, parent: Option<usize>) -> GraphNode {
        GraphNode {
            id,
            label: label.to_string(),
            parent,
        }
    }

    #[test]
    fn test_tree_is_numbered_in_pre_order() {
        let tokens = tokenize("2+3*4").unwrap();
        let graph = Graph::from_tree(&parse(&tokens).unwrap());

        assert_eq!(
            graph.nodes,
            vec![
                node(0, "+\n(OPERATOR)", None),
                node(1, "2\n(NUMBER)", Some(0)),
                node(2, "*\n(OPERATOR)", Some(0)),
                node(3, "3\n(NUMBER)", Some(2)),
                node(4, "4\n(NUMBER)", Some(2)),
            ]
        );
        assert_eq!(graph.edges().collect::<Vec<_>>(), [(0, 1), (0, 2), (2, 3), (2, 4)]);
    }

    #[test]
    fn test_tree_labels_every_kind() {
        let tokens = tokenize("sin(2^3!)").unwrap();
        let graph = Graph::from_tree(&parse(&tokens).unwrap());
        let labels: Vec<_> = graph.nodes.iter().map(|n| n.label.as_str()).collect();

        assert_eq!(
            labels,
            [
                "sin\n(FUNCTION)",
                "^\n(POWER)",
                "2\n(NUMBER)",
                "!\n(FACTORIAL)",
                "3\n(NUMBER)",
            ]
        );
    }

    #[test]
    fn test_tokens_form_a_chain() {
        let tokens = tokenize("(1)").unwrap();
        let graph = Graph::from_tokens(&tokens);

        assert_eq!(
            graph.nodes,
            vec![
                node(0, "(\n(PARENTHESIS)", None),
                node(1, "1\n(NUMBER)", Some(0)),
                node(2, ")\n(PARENTHESIS)", Some(1)),
            ]
        );
        assert!(Graph::from_tokens(&[]).nodes.is_empty());
    }

    #[test]
    fn test_dot_output() {
        let tokens = tokenize("1-2").unwrap();
        let dot = Graph::from_tree(&parse(&tokens).unwrap()).to_dot();

        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.contains(r#"    0 [label="-\n(OPERATOR)"];"#));
        assert!(dot.contains("    0 -> 2;\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_json_output() {
        let tokens = tokenize("7").unwrap();
        let json = serde_json::to_string(&Graph::from_tokens(&tokens)).unwrap();
        assert_eq!(json, r#"{"nodes":[{"id":0,"label":"7\n(NUMBER)","parent":null}]}"#);
    }
}
