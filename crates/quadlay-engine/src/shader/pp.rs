//! The slice of the C preprocessor that `#include` expansion has to honour:
//! comments, `#define`/`#undef` and conditional blocks.

use std::collections::HashMap;

use super::include::IncludeKind;

/// Macro name to replacement text.
pub(crate) type Defines = HashMap<String, String>;

/// Nesting limit when a `#if` expression expands macros that expand macros.
const MAX_EXPANSION_DEPTH: usize = 16;

/// A directive line that affects expansion.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Directive<'a> {
    Include(IncludeKind, &'a str),
    Define(&'a str, &'a str),
    Undef(&'a str),
    If(&'a str),
    Ifdef(&'a str),
    Ifndef(&'a str),
    Elif(&'a str),
    Else,
    Endif,
}

impl<'a> Directive<'a> {
    /// Parses a comment-free line. Other directives (`#version`, `#pragma`, ...)
    /// and malformed ones yield `None`.
    pub(crate) fn parse(code: &'a str) -> Option<Self> {
        let rest = code.trim_start().strip_prefix('#')?.trim_start();
        let (word, args) = split_ident(rest);
        let args = args.trim();

        Some(match word {
            "include" => {
                if let Some(inner) = args.strip_prefix('"') {
                    Self::Include(IncludeKind::Local, inner.strip_suffix('"')?)
                } else {
                    let path = args.strip_prefix('<')?.strip_suffix('>')?;
                    Self::Include(IncludeKind::System, path)
                }
            }
            "define" => {
                let (name, value) = split_ident(args);
                if name.is_empty() {
                    return None;
                }
                Self::Define(name, value.trim())
            }
            "undef" => Self::Undef(non_empty(split_ident(args).0)?),
            "if" => Self::If(args),
            "ifdef" => Self::Ifdef(non_empty(split_ident(args).0)?),
            "ifndef" => Self::Ifndef(non_empty(split_ident(args).0)?),
            "elif" => Self::Elif(args),
            "else" => Self::Else,
            "endif" => Self::Endif,
            _ => return None,
        })
    }
}

fn split_ident(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Removes `//` and `/* */` comments from one line. `in_comment` carries an open
/// block comment across lines.
pub(crate) fn strip_comments(line: &str, in_comment: &mut bool) -> String {
    let mut code = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        if *in_comment {
            let Some(end) = rest.find("*/") else { return code };
            rest = &rest[end + 2..];
            *in_comment = false;
            code.push(' ');
            continue;
        }

        match (rest.find("/*"), rest.find("//")) {
            (Some(block), line_comment) if line_comment.is_none_or(|l| block < l) => {
                code.push_str(&rest[..block]);
                rest = &rest[block + 2..];
                *in_comment = true;
            }
            (_, Some(l)) => {
                code.push_str(&rest[..l]);
                return code;
            }
            _ => {
                code.push_str(rest);
                return code;
            }
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct Frame {
    parent_active: bool,
    active: bool,
    taken: bool,
}

/// Tracks `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif` nesting for one file.
#[derive(Debug, Default)]
pub(crate) struct Conditionals {
    stack: Vec<Frame>,
}

impl Conditionals {
    /// True when the current line is compiled.
    pub(crate) fn active(&self) -> bool {
        self.stack.last().is_none_or(|f| f.active)
    }

    /// Applies a non-include directive, updating `defines` inside active regions.
    pub(crate) fn apply(&mut self, directive: Directive<'_>, defines: &mut Defines) {
        let active = self.active();
        match directive {
            Directive::Define(name, value) if active => {
                defines.insert(name.to_string(), value.to_string());
            }
            Directive::Undef(name) if active => {
                defines.remove(name);
            }
            Directive::Ifdef(name) => self.push(active, active && defines.contains_key(name)),
            Directive::Ifndef(name) => self.push(active, active && !defines.contains_key(name)),
            Directive::If(expr) => self.push(active, active && eval_condition(expr, defines)),
            Directive::Elif(expr) => {
                if let Some(f) = self.stack.last_mut() {
                    let take = f.parent_active && !f.taken && eval_condition(expr, defines);
                    f.active = take;
                    f.taken |= take;
                }
            }
            Directive::Else => {
                if let Some(f) = self.stack.last_mut() {
                    f.active = f.parent_active && !f.taken;
                    f.taken = true;
                }
            }
            Directive::Endif => {
                self.stack.pop();
            }
            _ => {}
        }
    }

    fn push(&mut self, parent_active: bool, active: bool) {
        self.stack.push(Frame {
            parent_active,
            active,
            taken: active,
        });
    }
}

/// Evaluates a `#if` expression. Expressions outside the supported subset count
/// as true, so their region is still expanded.
pub(crate) fn eval_condition(expr: &str, defines: &Defines) -> bool {
    evaluate(expr, defines, 0).is_none_or(|v| v != 0)
}

fn evaluate(expr: &str, defines: &Defines, depth: usize) -> Option<i64> {
    if depth > MAX_EXPANSION_DEPTH {
        return None;
    }
    let mut eval = Eval {
        tokens: tokenize(expr)?,
        pos: 0,
        defines,
        depth,
    };
    let value = eval.or()?;
    (eval.pos == eval.tokens.len()).then_some(value)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Token<'a> {
    Num(i64),
    Ident(&'a str),
    Op(&'static str),
}

// Two-character operators first.
const OPERATORS: [&str; 12] = ["||", "&&", "==", "!=", "<=", ">=", "!", "<", ">", "(", ")", "-"];

fn tokenize(expr: &str) -> Option<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = expr.trim_start();
    while let Some(c) = rest.chars().next() {
        if c.is_ascii_digit() {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(rest.len());
            tokens.push(Token::Num(parse_int(&rest[..end])?));
            rest = &rest[end..];
        } else if c.is_ascii_alphabetic() || c == '_' {
            let (ident, tail) = split_ident(rest);
            tokens.push(Token::Ident(ident));
            rest = tail;
        } else {
            let op = OPERATORS.into_iter().find(|op| rest.starts_with(*op))?;
            tokens.push(Token::Op(op));
            rest = &rest[op.len()..];
        }
        rest = rest.trim_start();
    }
    Some(tokens)
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_end_matches(['u', 'U', 'l', 'L']);
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Recursive descent over `||`, `&&`, comparisons, `!`, unary `-`, parentheses,
/// integers, `defined` and object-like macros.
struct Eval<'a, 'd> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    defines: &'d Defines,
    depth: usize,
}

impl<'a> Eval<'a, '_> {
    fn next(&mut self) -> Option<Token<'a>> {
        let t = *self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t)
    }

    fn eat(&mut self, op: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(Token::Op(o)) if *o == op => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn or(&mut self) -> Option<i64> {
        let mut v = self.and()?;
        while self.eat("||") {
            let r = self.and()?;
            v = (v != 0 || r != 0) as i64;
        }
        Some(v)
    }

    fn and(&mut self) -> Option<i64> {
        let mut v = self.compare()?;
        while self.eat("&&") {
            let r = self.compare()?;
            v = (v != 0 && r != 0) as i64;
        }
        Some(v)
    }

    fn compare(&mut self) -> Option<i64> {
        let mut v = self.unary()?;
        loop {
            let op = match self.tokens.get(self.pos) {
                Some(Token::Op(o)) if matches!(*o, "==" | "!=" | "<" | ">" | "<=" | ">=") => *o,
                _ => return Some(v),
            };
            self.pos += 1;
            let r = self.unary()?;
            v = match op {
                "==" => v == r,
                "!=" => v != r,
                "<" => v < r,
                ">" => v > r,
                "<=" => v <= r,
                _ => v >= r,
            } as i64;
        }
    }

    fn unary(&mut self) -> Option<i64> {
        if self.eat("!") {
            return Some((self.unary()? == 0) as i64);
        }
        if self.eat("-") {
            return self.unary()?.checked_neg();
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<i64> {
        match self.next()? {
            Token::Num(n) => Some(n),
            Token::Op("(") => {
                let v = self.or()?;
                self.eat(")").then_some(v)
            }
            Token::Ident("defined") => {
                let paren = self.eat("(");
                let Token::Ident(name) = self.next()? else { return None };
                if paren && !self.eat(")") {
                    return None;
                }
                Some(self.defines.contains_key(name) as i64)
            }
            // Undefined identifiers evaluate to 0.
            Token::Ident(name) => match self.defines.get(name) {
                Some(value) => evaluate(value, self.defines, self.depth + 1),
                None => Some(0),
            },
            Token::Op(_) => None,
        }
    }
}
