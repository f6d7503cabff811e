//! Canonical pretty-printer (spec §4.B, §4.G).
//!
//! Mirrors `c2_condition_node_to_str`'s traversal from
//! `original_source/src/c2.c`: parentheses around every branch, a
//! leaf's negation fused into its operator symbol (`!=`, never a
//! leading `!` before the target), non-printable pattern bytes
//! rendered as `\xHH`. Must be the left-inverse of [`crate::parser::parse`]
//! on well-formed input (spec §8 round-trip law).

use crate::ast::{BranchOp, CmpOp, Expr, Leaf, MatchMode, Pattern, Target};
use std::fmt::Write as _;

pub fn print(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(expr, &mut out);
    out
}

fn write_expr(expr: &Expr, out: &mut String) {
    match expr {
        Expr::True => out.push_str("true"),
        Expr::Branch { op, neg, lhs, rhs } => {
            if *neg {
                out.push('!');
            }
            out.push('(');
            write_expr(lhs, out);
            out.push(' ');
            out.push_str(branch_op_str(*op));
            out.push(' ');
            write_expr(rhs, out);
            out.push(')');
        }
        Expr::Leaf { neg, leaf } => write_leaf(leaf, *neg, out),
    }
}

fn branch_op_str(op: BranchOp) -> &'static str {
    match op {
        BranchOp::And => "&&",
        BranchOp::Or => "||",
        BranchOp::Xor => "XOR",
    }
}

fn write_leaf(leaf: &Leaf, neg: bool, out: &mut String) {
    write_target(leaf, out);

    if matches!(leaf.op, CmpOp::Exists) {
        return;
    }

    out.push(' ');
    if neg {
        out.push('!');
    }
    if let Some(prefix) = mode_prefix(leaf.mode) {
        out.push(prefix);
    }
    if leaf.case_insensitive {
        out.push('?');
    }
    out.push_str(cmp_str(leaf.op));
    out.push(' ');
    write_pattern(&leaf.pattern, out);
}

fn write_target(leaf: &Leaf, out: &mut String) {
    match &leaf.target {
        Target::Predefined(p) => {
            out.push_str(p.as_ref());
        }
        Target::Atom(name) => {
            out.push_str(&String::from_utf8_lossy(name));
            if leaf.target_on_client {
                out.push('@');
            }
            if leaf.index == -1 {
                out.push_str("[*]");
            } else {
                let _ = write!(out, "[{}]", leaf.index);
            }
            return;
        }
    }
    if leaf.target_on_client {
        out.push('@');
    }
}

fn mode_prefix(mode: MatchMode) -> Option<char> {
    match mode {
        MatchMode::Exact => None,
        MatchMode::Contains => Some('*'),
        MatchMode::StartsWith => Some('^'),
        MatchMode::Wildcard => Some('%'),
        MatchMode::Pcre => Some('~'),
    }
}

fn cmp_str(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Exists => "",
        CmpOp::Eq => "=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
    }
}

fn write_pattern(pattern: &Pattern, out: &mut String) {
    match pattern {
        Pattern::Undetermined => {}
        Pattern::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        Pattern::Str(bytes) => {
            out.push('"');
            for &b in bytes {
                match b {
                    b'"' => out.push_str("\\\""),
                    b'\\' => out.push_str("\\\\"),
                    b'\n' => out.push_str("\\n"),
                    b'\r' => out.push_str("\\r"),
                    b'\t' => out.push_str("\\t"),
                    0x20..=0x7e => out.push(b as char),
                    _ => {
                        let _ = write!(out, "\\x{:02x}", b);
                    }
                }
            }
            out.push('"');
        }
    }
}
