//! Automaton dump emitters: Graphviz, LaTeX and JSON renditions of the
//! intermediate representations, written to fixed file names.
//!
//! Dumping is diagnostics only: write failures are logged and swallowed,
//! never surfaced to the caller. Requests write to fixed names, so
//! concurrent dumping requests need external exclusion.

use crate::ast::{Node, RegexAst};
use crate::dfa::DfaExecutor;
use crate::nfa::{EpsOp, Nfa, NfaGraph};
use crate::tracefinder::TraceFinderNfa;
use serde_json::json;
use std::fmt::Write as _;
use std::path::Path;

fn write_dump(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Err(e) = std::fs::write(&path, contents) {
        log::debug!(target: "tregex::dump", "failed to write {}: {e}", path.display());
    }
}

/// Escape a label for Graphviz.
fn gv_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape plain text for LaTeX.
fn tex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\^{}"),
            _ => out.push(c),
        }
    }
    out
}

fn eps_label(op: &EpsOp) -> String {
    match op {
        EpsOp::None => "ε".to_string(),
        EpsOp::GroupStart(g) => format!("({g}"),
        EpsOp::GroupEnd(g) => format!("){g}"),
        EpsOp::GroupReset { from, to } => format!("reset {from}..{to}"),
        EpsOp::LineStart => "^".to_string(),
        EpsOp::LineEnd => "$".to_string(),
        EpsOp::WordBoundary { negate: false } => "\\b".to_string(),
        EpsOp::WordBoundary { negate: true } => "\\B".to_string(),
        EpsOp::Lookaround { index } => format!("look[{index}]"),
    }
}

// AST

pub fn dump_ast(ast: &RegexAst, dir: &Path) {
    write_dump(dir, "ast.tex", &ast_to_tex(ast));
    match serde_json::to_string_pretty(&ast_to_json(ast)) {
        Ok(text) => write_dump(dir, "ast.json", &text),
        Err(e) => log::debug!(target: "tregex::dump", "ast.json: {e}"),
    }
}

fn ast_to_tex(ast: &RegexAst) -> String {
    let mut out = String::new();
    out.push_str("\\documentclass{standalone}\n\\usepackage{qtree}\n\\begin{document}\n");
    let _ = writeln!(out, "% {}", tex_escape(&ast.source().to_string()));
    out.push_str("\\Tree ");
    ast_node_tex(ast.root(), &mut out);
    out.push_str("\n\\end{document}\n");
    out
}

fn ast_node_tex(node: &Node, out: &mut String) {
    match node {
        Node::Cat(nodes) => {
            out.push_str("[.Cat ");
            for n in nodes {
                ast_node_tex(n, out);
                out.push(' ');
            }
            out.push(']');
        }
        Node::Alt(nodes) => {
            out.push_str("[.Alt ");
            for n in nodes {
                ast_node_tex(n, out);
                out.push(' ');
            }
            out.push(']');
        }
        Node::Group { node, .. } => {
            out.push_str("[.Group ");
            ast_node_tex(node, out);
            out.push(']');
        }
        Node::Loop { node, .. } => {
            out.push_str("[.Loop ");
            ast_node_tex(node, out);
            out.push(']');
        }
        Node::Lookaround { node, .. } => {
            out.push_str("[.Lookaround ");
            ast_node_tex(node, out);
            out.push(']');
        }
        leaf => {
            let _ = write!(out, "{{{}}}", tex_escape(&leaf_label(leaf)));
        }
    }
}

fn leaf_label(node: &Node) -> String {
    match node {
        Node::Empty => "Empty".to_string(),
        Node::Char(c) => format!("'{c}'"),
        Node::Class(set) => format!("[{set}]"),
        Node::Anchor(kind) => format!("{kind:?}"),
        Node::WordBoundary { negate } => if *negate { "\\B" } else { "\\b" }.to_string(),
        Node::BackRef(g) => format!("\\{g}"),
        _ => unreachable!("inner nodes handled by the caller"),
    }
}

fn ast_to_json(ast: &RegexAst) -> serde_json::Value {
    json!({
        "pattern": ast.source().pattern,
        "flags": ast.source().flags.to_string(),
        "properties": ast.properties(),
        "numberOfCaptureGroups": ast.num_capture_groups(),
        "numberOfNodes": ast.number_of_nodes(),
        "minPath": ast.min_path(),
        "dead": ast.is_dead(),
        "root": ast_node_json(ast.root()),
    })
}

fn ast_node_json(node: &Node) -> serde_json::Value {
    match node {
        Node::Empty => json!({"type": "Empty"}),
        Node::Char(c) => json!({"type": "Char", "value": c.to_string()}),
        Node::Class(set) => json!({"type": "Class", "set": set.to_string()}),
        Node::Cat(nodes) => {
            json!({"type": "Cat", "children": nodes.iter().map(ast_node_json).collect::<Vec<_>>()})
        }
        Node::Alt(nodes) => {
            json!({"type": "Alt", "children": nodes.iter().map(ast_node_json).collect::<Vec<_>>()})
        }
        Node::Anchor(kind) => json!({"type": "Anchor", "kind": format!("{kind:?}")}),
        Node::WordBoundary { negate } => json!({"type": "WordBoundary", "negate": negate}),
        Node::Group { capture, node } => {
            json!({"type": "Group", "capture": capture, "child": ast_node_json(node)})
        }
        Node::Loop { node, quant, .. } => json!({
            "type": "Loop",
            "min": quant.min,
            "max": quant.max,
            "greedy": quant.greedy,
            "child": ast_node_json(node),
        }),
        Node::Lookaround { behind, negate, node } => json!({
            "type": "Lookaround",
            "behind": behind,
            "negate": negate,
            "child": ast_node_json(node),
        }),
        Node::BackRef(g) => json!({"type": "BackRef", "group": g}),
    }
}

// NFA

pub fn dump_nfa(nfa: &Nfa, dir: &Path) {
    write_dump(dir, "nfa.gv", &graph_to_gv(nfa.graph(), "nfa", false));
    write_dump(dir, "nfa.tex", &graph_to_tex(nfa.graph()));
    write_dump(
        dir,
        "nfa_reverse.gv",
        &graph_to_gv(nfa.graph(), "nfa_reverse", true),
    );
    match serde_json::to_string_pretty(&nfa_to_json(nfa)) {
        Ok(text) => write_dump(dir, "nfa.json", &text),
        Err(e) => log::debug!(target: "tregex::dump", "nfa.json: {e}"),
    }
}

fn graph_to_gv(graph: &NfaGraph, name: &str, reverse: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {name} {{");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=circle]; s1 [shape=doublecircle];\n");
    let _ = writeln!(out, "  entry [shape=point]; entry -> s{};", graph.entry());
    for (id, state) in graph.states().iter().enumerate() {
        for (op, target) in &state.eps {
            let (from, to) = if reverse { (*target, id as u32) } else { (id as u32, *target) };
            let _ = writeln!(
                out,
                "  s{from} -> s{to} [style=dashed, label=\"{}\"];",
                gv_escape(&eps_label(op))
            );
        }
        for (set, target) in &state.transitions {
            let (from, to) = if reverse { (*target, id as u32) } else { (id as u32, *target) };
            let _ = writeln!(
                out,
                "  s{from} -> s{to} [label=\"{}\"];",
                gv_escape(&set.to_string())
            );
        }
    }
    out.push_str("}\n");
    out
}

fn graph_to_tex(graph: &NfaGraph) -> String {
    let mut out = String::new();
    out.push_str("\\documentclass{standalone}\n\\begin{document}\n");
    out.push_str("\\begin{tabular}{lll}\n");
    out.push_str("state & edge & target \\\\\n\\hline\n");
    for (id, state) in graph.states().iter().enumerate() {
        for (op, target) in &state.eps {
            let _ = writeln!(out, "$s_{{{id}}}$ & {} & $s_{{{target}}}$ \\\\", tex_escape(&eps_label(op)));
        }
        for (set, target) in &state.transitions {
            let _ = writeln!(out, "$s_{{{id}}}$ & {} & $s_{{{target}}}$ \\\\", tex_escape(&set.to_string()));
        }
    }
    out.push_str("\\end{tabular}\n\\end{document}\n");
    out
}

fn nfa_to_json(nfa: &Nfa) -> serde_json::Value {
    json!({
        "entry": nfa.graph().entry(),
        "numberOfStates": nfa.num_states(),
        "numberOfTransitions": nfa.num_transitions(),
        "dead": nfa.is_dead(),
        "hasReverseUnAnchoredEntry": nfa.has_reverse_unanchored_entry(),
        "states": nfa.graph().states().iter().enumerate().map(|(id, state)| json!({
            "id": id,
            "eps": state.eps.iter().map(|(op, t)| json!({
                "op": eps_label(op),
                "target": t,
            })).collect::<Vec<_>>(),
            "transitions": state.transitions.iter().map(|(set, t)| json!({
                "set": set.to_string(),
                "target": t,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

// TraceFinder

pub fn dump_trace_finder(tf: &TraceFinderNfa, dir: &Path) {
    let mut out = String::new();
    out.push_str("digraph trace_finder {\n  rankdir=RL;\n");
    for (id, state) in tf.states().iter().enumerate() {
        if let Some(result) = state.result {
            let _ = writeln!(out, "  t{id} [shape=doublecircle, label=\"t{id}/r{result}\"];");
        }
        for (set, target) in &state.transitions {
            let _ = writeln!(
                out,
                "  t{id} -> t{target} [label=\"{}\"];",
                gv_escape(&set.to_string())
            );
        }
    }
    out.push_str("}\n");
    write_dump(dir, "trace_finder.gv", &out);

    let value = json!({
        "numberOfStates": tf.num_states(),
        "results": tf.pre_calculated_results().iter().map(|r| json!({
            "length": r.length,
            "groups": r.group_spans,
        })).collect::<Vec<_>>(),
        "states": tf.states().iter().enumerate().map(|(id, state)| json!({
            "id": id,
            "result": state.result,
            "transitions": state.transitions.iter().map(|(set, t)| json!({
                "set": set.to_string(),
                "target": t,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => write_dump(dir, "nfa_trace_finder.json", &text),
        Err(e) => log::debug!(target: "tregex::dump", "nfa_trace_finder.json: {e}"),
    }
}

// DFA

pub fn dump_dfa(executor: &DfaExecutor, dir: &Path) {
    let name = executor.name().to_string();
    let mut out = String::new();
    let _ = writeln!(out, "digraph dfa_{name} {{");
    out.push_str("  rankdir=LR;\n");
    for (id, state) in executor.states().iter().enumerate() {
        if state.accept_mask != 0 {
            let _ = writeln!(out, "  d{id} [shape=doublecircle];");
        }
        for (iv, target) in &state.transitions {
            let label = if iv.first == iv.last {
                format!("{:#x}", iv.first)
            } else {
                format!("{:#x}-{:#x}", iv.first, iv.last)
            };
            let _ = writeln!(out, "  d{id} -> d{target} [label=\"{label}\"];");
        }
    }
    out.push_str("}\n");
    write_dump(dir, &format!("dfa_{name}.gv"), &out);

    let value = json!({
        "dfa": {
            "name": name,
            "numberOfStates": executor.num_states(),
            "forward": executor.props().forward,
            "searching": executor.props().searching,
            "trackCaptureGroups": executor.props().track_captures,
            "states": executor.states().iter().enumerate().map(|(id, state)| json!({
                "id": id,
                "acceptMask": state.accept_mask,
                "result": state.result,
                "transitions": state.transitions.iter().map(|(iv, t)| json!({
                    "first": iv.first,
                    "last": iv.last,
                    "target": t,
                })).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        }
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => write_dump(dir, &format!("dfa_{name}.json"), &text),
        Err(e) => log::debug!(target: "tregex::dump", "dfa json: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RegexOptions, RegexSource};
    use crate::buffer::CompilationBuffer;
    use crate::nfa::NfaGenerator;
    use crate::parse::Parser;
    use std::sync::Arc;

    fn build(pattern: &str) -> (Arc<RegexAst>, Nfa) {
        let source = RegexSource::new(pattern, "");
        let options = RegexOptions::default();
        let mut buffer = CompilationBuffer::new();
        let mut parser = Parser::new(&source, &options, &mut buffer).unwrap();
        let mut ast = parser.parse().unwrap();
        parser.prepare_for_dfa(&mut ast);
        let ast = Arc::new(ast);
        buffer.reset();
        let nfa = NfaGenerator::create(&ast, &mut buffer, &options).unwrap();
        (ast, nfa)
    }

    #[test]
    fn graphviz_output_is_wellformed() {
        let (_, nfa) = build("a(b|c)");
        let gv = graph_to_gv(nfa.graph(), "nfa", false);
        assert!(gv.starts_with("digraph nfa {"));
        assert!(gv.ends_with("}\n"));
        assert!(gv.contains("->"));

        let reversed = graph_to_gv(nfa.graph(), "nfa_reverse", true);
        assert!(reversed.contains("digraph nfa_reverse"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let (ast, nfa) = build("(a)\\d");
        let value = ast_to_json(&ast);
        assert_eq!(value["numberOfCaptureGroups"], 1);
        let value = nfa_to_json(&nfa);
        assert!(value["numberOfStates"].as_u64().unwrap() > 0);
    }

    #[test]
    fn tex_escaping() {
        assert_eq!(tex_escape("a_b"), "a\\_b");
        assert_eq!(tex_escape("50%"), "50\\%");
    }
}
