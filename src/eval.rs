//! Parsed strings with embedded variable references, e.g. `cc $in -o $out`,
//! and the scopes they expand against.

use std::borrow::Cow;
use std::collections::HashMap;

/// An environment providing a mapping of variable name to variable value.
/// A given EvalString may be expanded with multiple environments as possible
/// context.
pub trait Env {
    fn get_var(&self, var: &str) -> Option<Cow<str>>;
}

/// One token within an EvalString, either literal text or a variable
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalPart {
    Literal(String),
    VarRef(String),
}

/// An unexpanded template string.  The manifest parser produces these;
/// expansion looks each reference up in the given scopes, first match wins,
/// and references nothing resolves expand to the empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalString(Vec<EvalPart>);

impl EvalString {
    pub fn new(parts: Vec<EvalPart>) -> Self {
        EvalString(parts)
    }

    /// True when the template has no content at all, i.e. the rule never
    /// declared it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn evaluate(&self, envs: &[&dyn Env]) -> String {
        let mut val = String::new();
        for part in &self.0 {
            match part {
                EvalPart::Literal(s) => val.push_str(s),
                EvalPart::VarRef(v) => {
                    for env in envs {
                        if let Some(v) = env.get_var(v) {
                            val.push_str(&v);
                            break;
                        }
                    }
                }
            }
        }
        val
    }
}

/// A single scope's worth of variable definitions.
#[derive(Debug, Default)]
pub struct Vars(HashMap<String, String>);

impl Vars {
    pub fn insert(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.0.insert(key.into(), val.into());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }
}

impl Env for Vars {
    fn get_var(&self, var: &str) -> Option<Cow<str>> {
        self.0.get(var).map(|val| Cow::Borrowed(val.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> EvalString {
        EvalString::new(vec![
            EvalPart::Literal("cc ".to_owned()),
            EvalPart::VarRef("flags".to_owned()),
            EvalPart::Literal(" -o ".to_owned()),
            EvalPart::VarRef("target".to_owned()),
        ])
    }

    #[test]
    fn expands_against_scope() {
        let mut vars = Vars::default();
        vars.insert("flags", "-O2");
        vars.insert("target", "a.out");
        assert_eq!(template().evaluate(&[&vars]), "cc -O2 -o a.out");
    }

    #[test]
    fn unresolved_vars_expand_empty() {
        let vars = Vars::default();
        assert_eq!(template().evaluate(&[&vars]), "cc  -o ");
    }

    #[test]
    fn earlier_scope_wins() {
        let mut inner = Vars::default();
        inner.insert("flags", "-g");
        let mut outer = Vars::default();
        outer.insert("flags", "-O2");
        outer.insert("target", "a.out");
        assert_eq!(template().evaluate(&[&inner, &outer]), "cc -g -o a.out");
    }
}
