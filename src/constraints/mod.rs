/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/* Constraints are only collected here. Whether a domain they mention exists is
 * checked in `ConstraintSet::finalize`, so a constraint may name a domain that
 * gets created later in the composition. */

use serde::Serialize;

use crate::common::Period;
use crate::crg::DomainTable;
#[allow(unused)]
use crate::log::*;


/// What a constraint applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A clock domain, by name
    Domain(String),
    /// A top-level port of a claimed binding
    Port(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(name) => write!(f, "{}", name),
            Self::Port(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Substitution {
    Literal(String),
    Target(Target),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePiece<'t> {
    Text(&'t str),
    Placeholder(&'t str),
}

/// A platform-specific command with `{name}` placeholders. `{{` and `}}`
/// stand for literal braces, which Tcl-based toolchains use a lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandTemplate {
    template: String,
    substitutions: Vec<(String, Substitution)>,
}

impl CommandTemplate {
    pub fn new(template: &str) -> Self {
        Self { template: template.to_string(), substitutions: Vec::new() }
    }

    pub fn literal(mut self, placeholder: &str, value: &str) -> Self {
        self.substitutions.push(
            (placeholder.to_string(), Substitution::Literal(value.to_string()))
        );
        self
    }

    pub fn target(mut self, placeholder: &str, target: Target) -> Self {
        self.substitutions.push((placeholder.to_string(), Substitution::Target(target)));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn targets<'s>(&'s self) -> impl Iterator<Item = &'s Target> + 's {
        self.substitutions.iter()
            .filter_map(|(_, s)| match s {
                Substitution::Target(t) => Some(t),
                Substitution::Literal(_) => None,
            })
    }

    fn lookup(&self, placeholder: &str) -> Option<&Substitution> {
        self.substitutions.iter()
            .find(|(name, _)| name == placeholder)
            .map(|(_, s)| s)
    }

    /* An unterminated `{` is kept as text */
    fn pieces<'s>(&'s self) -> Vec<TemplatePiece<'s>> {
        let t = self.template.as_str();
        let mut pieces = Vec::new();
        let mut text_start = 0;
        let mut pos = 0;

        while pos < t.len() {
            let rest = &t[pos ..];
            if rest.starts_with("{{") || rest.starts_with("}}") {
                pieces.push(TemplatePiece::Text(&t[text_start .. pos + 1]));
                pos += 2;
                text_start = pos;
            } else if rest.starts_with('{') {
                match rest.find('}') {
                    Some(end) => {
                        pieces.push(TemplatePiece::Text(&t[text_start .. pos]));
                        pieces.push(TemplatePiece::Placeholder(&rest[1 .. end]));
                        pos += end + 1;
                        text_start = pos;
                    },
                    None => pos = t.len(),
                }
            } else {
                pos += rest.chars().next().map(char::len_utf8).unwrap_or(1);
            }
        }
        pieces.push(TemplatePiece::Text(&t[text_start ..]));
        pieces.retain(|p| *p != TemplatePiece::Text(""));
        pieces
    }

    /// Placeholders without a substitution, in order of appearance.
    pub fn unbound(&self) -> Vec<String> {
        self.pieces().into_iter()
            .filter_map(|p| match p {
                TemplatePiece::Placeholder(name) if self.lookup(name).is_none() =>
                    Some(name.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Substitutes every placeholder. Fails with the list of unbound ones.
    pub fn render(&self) -> Result<String, Vec<String>> {
        let unbound = self.unbound();
        if !unbound.is_empty() {
            return Err(unbound);
        }

        let mut out = String::with_capacity(self.template.len());
        for piece in self.pieces() {
            match piece {
                TemplatePiece::Text(text) => out.push_str(text),
                TemplatePiece::Placeholder(name) => match self.lookup(name) {
                    Some(Substitution::Literal(value)) => out.push_str(value),
                    Some(Substitution::Target(target)) => out.push_str(&target.to_string()),
                    None => unreachable!(),
                },
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintEntry {
    Period { target: Target, period: Period },
    FalsePath { from: Target, to: Target },
    PlatformCommand { command: CommandTemplate },
}

impl ConstraintEntry {
    pub fn targets<'s>(&'s self) -> Box<dyn Iterator<Item = &'s Target> + 's> {
        match self {
            Self::Period { target, .. } => Box::new(std::iter::once(target)),
            Self::FalsePath { from, to } => Box::new([from, to].into_iter()),
            Self::PlatformCommand { command } => Box::new(command.targets()),
        }
    }
}

/// Directive of a finalized constraint, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    Period(Period),
    FalsePath { to: Target },
    PlatformCommand(String),
}

/// `(target, directive, parameters)` tuple handed to the toolchain.
/// Platform commands have no single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedConstraint {
    pub target: Option<Target>,
    pub directive: Directive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    Domain { entry: usize, domain: String },
    Placeholder { entry: usize, placeholder: String },
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain { entry, domain } =>
                write!(f, "constraint #{}: clock domain \"{}\" does not exist", entry, domain),
            Self::Placeholder { entry, placeholder } =>
                write!(f, "constraint #{}: placeholder {{{}}} has no value", entry, placeholder),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    UnresolvedTarget(Vec<Unresolved>),
}

impl std::fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedTarget(unresolved) => {
                write!(f, "{} unresolved constraint target(s)", unresolved.len())?;
                for u in unresolved {
                    write!(f, "\n    {}", u)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConstraintError {}

/// Append-only constraint log. Entries are never deduplicated, later ones may
/// restate or extend earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    entries: Vec<ConstraintEntry>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: ConstraintEntry) {
        dbg_log!(DBG_EXTRA, "Constraint #{}: {:?}", self.entries.len(), entry);
        self.entries.push(entry);
    }

    pub fn add_period(&mut self, target: Target, period: Period) {
        self.add(ConstraintEntry::Period { target, period });
    }

    pub fn add_false_path(&mut self, from: Target, to: Target) {
        self.add(ConstraintEntry::FalsePath { from, to });
    }

    pub fn add_platform_command(&mut self, command: CommandTemplate) {
        self.add(ConstraintEntry::PlatformCommand { command });
    }

    pub fn entries(&self) -> &[ConstraintEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every entry against `domains` and renders platform commands.
    /// All problems are collected before failing, not only the first one.
    pub fn finalize(&self, domains: &DomainTable)
        -> Result<Vec<FinalizedConstraint>, ConstraintError>
    {
        let mut unresolved = Vec::new();
        let mut finalized = Vec::with_capacity(self.entries.len());

        for (idx, entry) in self.entries.iter().enumerate() {
            for target in entry.targets() {
                if let Target::Domain(domain) = target {
                    if !domains.contains(domain) {
                        unresolved.push(Unresolved::Domain {
                            entry: idx,
                            domain: domain.clone()
                        });
                    }
                }
            }

            let item = match entry {
                ConstraintEntry::Period { target, period } => FinalizedConstraint {
                    target: Some(target.clone()),
                    directive: Directive::Period(*period),
                },
                ConstraintEntry::FalsePath { from, to } => FinalizedConstraint {
                    target: Some(from.clone()),
                    directive: Directive::FalsePath { to: to.clone() },
                },
                ConstraintEntry::PlatformCommand { command } => match command.render() {
                    Ok(rendered) => FinalizedConstraint {
                        target: None,
                        directive: Directive::PlatformCommand(rendered),
                    },
                    Err(unbound) => {
                        unresolved.extend(unbound.into_iter().map(|placeholder| {
                            Unresolved::Placeholder { entry: idx, placeholder }
                        }));
                        continue;
                    },
                },
            };
            finalized.push(item);
        }

        if !unresolved.is_empty() {
            dbg_log!(DBG_WARN, "{} unresolved constraint target(s)", unresolved.len());
            return Err(ConstraintError::UnresolvedTarget(unresolved));
        }
        Ok(finalized)
    }
}
