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

use std::collections::{HashMap, HashSet};
use serde::Serialize;

use crate::catalogue::{Attribute, Catalogue, PinGroup, ResourceSpec, Signals};
use crate::constraints::Target;
#[allow(unused)]
use crate::log::*;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    DuplicateResource { name: String, index: u32 },
    DuplicateChannel { name: String, index: u32, channel: String },
}

impl std::fmt::Display for DeclarationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateResource { name, index } =>
                write!(f, "resource {}:{} is declared more than once", name, index),
            Self::DuplicateChannel { name, index, channel } =>
                write!(f, "resource {}:{} declares channel \"{}\" more than once",
                    name, index, channel),
        }
    }
}

impl std::error::Error for DeclarationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NotFound { name: String, index: Option<u32>, channel: Option<String> },
    /// `holder` names the claim that is in the way, which is not necessarily
    /// the requested resource when two resources share pins.
    AlreadyClaimed { name: String, index: u32, channel: Option<String>, holder: String },
    Ambiguous { name: String, candidates: Vec<String> },
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { name, index, channel } => {
                write!(f, "resource {}", name)?;
                if let Some(index) = index {
                    write!(f, ":{}", index)?;
                }
                if let Some(channel) = channel {
                    write!(f, " (channel \"{}\")", channel)?;
                }
                write!(f, " not found")
            },
            Self::AlreadyClaimed { name, index, channel: Some(channel), holder } =>
                write!(f, "channel \"{}\" of resource {}:{} is already claimed by {}",
                    channel, name, index, holder),
            Self::AlreadyClaimed { name, index, channel: None, holder } =>
                write!(f, "resource {}:{} is already claimed by {}", name, index, holder),
            Self::Ambiguous { name, candidates } =>
                write!(f, "resource name \"{}\" is ambiguous, candidates: {}",
                    name, candidates.join(", ")),
        }
    }
}

impl std::error::Error for LookupError {}

/// One electrically homogeneous part of a binding: a flat pin list or a
/// single sub-channel, with every attribute that applies to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundSignal {
    pub channel: Option<String>,
    /// Top-level port name the downstream toolchain knows this signal by
    pub port: String,
    pub pins: Vec<String>,
    pub attributes: Vec<Attribute>,
}

/// Result of a successful request. The requester owns it; the registry only
/// remembers that it was handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBinding {
    pub name: String,
    pub index: u32,
    pub channel: Option<String>,
    pub signals: Vec<BoundSignal>,
    /// Set for bindings obtained through a loose request
    pub read_only: bool,
}

impl ResolvedBinding {
    /// All pins of the binding in declaration order.
    pub fn pins(&self) -> Vec<&str> {
        self.signals.iter()
            .flat_map(|s| s.pins.iter().map(String::as_str))
            .collect()
    }

    pub fn signal<'s>(&'s self, channel: &str) -> Option<&'s BoundSignal> {
        self.signals.iter().find(|s| s.channel.as_deref() == Some(channel))
    }

    /// Narrows a whole-resource binding down to one of its channels.
    pub fn project(&self, channel: &str) -> Option<ResolvedBinding> {
        let signal = self.signal(channel)?.clone();
        Some(ResolvedBinding {
            name: self.name.clone(),
            index: self.index,
            channel: Some(channel.to_string()),
            signals: vec![signal],
            read_only: self.read_only,
        })
    }

    /// Timing target for the binding. Differential pairs are constrained on
    /// their positive leg.
    pub fn target(&self) -> Target {
        let signal = self.signal("p")
            .or_else(|| self.signals.first());
        match signal {
            Some(signal) => Target::Port(signal.port.clone()),
            None => Target::Port(self.name.clone()),
        }
    }
}

impl std::fmt::Display for ResolvedBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.index)?;
        if let Some(channel) = &self.channel {
            write!(f, ":{}", channel)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct ClaimState {
    whole: bool,
    channels: HashSet<String>,
    /* Port name prefix, fixed by the first claim */
    port_base: Option<String>,
}

/// Splits a `name:channel` request string.
pub fn parse_request<'s>(request: &'s str) -> (&'s str, Option<&'s str>) {
    match request.split_once(':') {
        Some((name, channel)) => (name, Some(channel)),
        None => (request, None),
    }
}

/// Resolves requests for catalogue resources and keeps track of which of them
/// were claimed. Declarations are borrowed from the catalogue and never
/// modified; claiming is the only mutation and it can't be undone.
pub struct ResourceRegistry<'c> {
    decls: Vec<&'c ResourceSpec>,
    by_key: HashMap<(&'c str, u32), usize>,
    claims: Vec<ClaimState>,
    /* pin -> description of the claim holding it */
    claimed_pins: HashMap<&'c str, String>,
    claim_order: Vec<(usize, Option<String>)>,
}

impl<'c> ResourceRegistry<'c> {
    pub fn empty() -> Self {
        Self {
            decls: Vec::new(),
            by_key: HashMap::new(),
            claims: Vec::new(),
            claimed_pins: HashMap::new(),
            claim_order: Vec::new(),
        }
    }

    /// Create a registry and declare every resource of `catalogue` in order.
    pub fn new(catalogue: &'c Catalogue) -> Result<Self, DeclarationError> {
        let mut registry = Self::empty();
        for spec in catalogue {
            registry.declare(spec)?;
        }
        dbg_log!(DBG_INFO, "Declared {} resources", registry.decls.len());
        Ok(registry)
    }

    pub fn declare(&mut self, spec: &'c ResourceSpec) -> Result<(), DeclarationError> {
        if self.by_key.contains_key(&(spec.name.as_str(), spec.index)) {
            return Err(DeclarationError::DuplicateResource {
                name: spec.name.clone(),
                index: spec.index,
            });
        }

        let mut seen = HashSet::new();
        for channel in spec.channel_names() {
            if !seen.insert(channel) {
                return Err(DeclarationError::DuplicateChannel {
                    name: spec.name.clone(),
                    index: spec.index,
                    channel: channel.to_string(),
                });
            }
        }

        self.by_key.insert((spec.name.as_str(), spec.index), self.decls.len());
        self.decls.push(spec);
        self.claims.push(ClaimState::default());
        Ok(())
    }

    /// Number of declared indices for `name`. Ports of resources declared
    /// only once don't carry their index in the name.
    fn index_count(&self, name: &str) -> usize {
        self.decls.iter().filter(|d| d.name == name).count()
    }

    fn port_base(&self, decl_idx: usize) -> String {
        if let Some(base) = &self.claims[decl_idx].port_base {
            return base.clone();
        }
        let spec = self.decls[decl_idx];
        if self.index_count(&spec.name) > 1 {
            format!("{}{}", spec.name, spec.index)
        } else {
            spec.name.clone()
        }
    }

    fn bound_signal(
        base: &str,
        spec: &ResourceSpec,
        channel: Option<&str>,
        group: &PinGroup
    ) -> BoundSignal {
        let port = match channel {
            Some(channel) => format!("{}_{}", base, channel),
            None => base.to_string(),
        };

        /* Resource-wide attributes come first, then the group's own */
        let attributes = spec.attributes.iter()
            .chain(group.attributes.iter())
            .cloned()
            .collect();

        BoundSignal {
            channel: channel.map(str::to_string),
            port,
            pins: group.pins.clone(),
            attributes,
        }
    }

    fn make_binding(
        &self,
        decl_idx: usize,
        channel: Option<&str>,
        read_only: bool
    ) -> Option<ResolvedBinding> {
        let spec = self.decls[decl_idx];
        let base = self.port_base(decl_idx);
        let signals = match (&spec.signals, channel) {
            (Signals::Flat(group), None) => vec![Self::bound_signal(&base, spec, None, group)],
            (Signals::Flat(_), Some(_)) => return None,
            (Signals::Subsignals(subsignals), None) => subsignals.iter()
                .map(|s| Self::bound_signal(&base, spec, Some(&s.name), &s.group))
                .collect(),
            (Signals::Subsignals(_), Some(channel)) =>
                vec![Self::bound_signal(&base, spec, Some(channel), spec.channel(channel)?)],
        };

        Some(ResolvedBinding {
            name: spec.name.clone(),
            index: spec.index,
            channel: channel.map(str::to_string),
            signals,
            read_only,
        })
    }

    /// Finds the declaration for `name`/`index`. Loose matching falls back to
    /// the only declared name that starts or ends with `name`.
    fn find(&self, name: &str, index: u32, loose: bool) -> Result<usize, LookupError> {
        if let Some(idx) = self.by_key.get(&(name, index)) {
            return Ok(*idx);
        }

        let not_found = || LookupError::NotFound {
            name: name.to_string(),
            index: Some(index),
            channel: None,
        };

        if !loose {
            return Err(not_found());
        }

        let candidates: Vec<&str> = self.decls.iter()
            .filter(|d| d.index == index)
            .map(|d| d.name.as_str())
            .filter(|n| n.starts_with(name) || n.ends_with(name))
            .collect();

        match candidates.as_slice() {
            [] => Err(not_found()),
            [only] => {
                dbg_log!(DBG_EXTRA, "Loose match: {} -> {}", name, only);
                Ok(self.by_key[&(*only, index)])
            },
            _ => Err(LookupError::Ambiguous {
                name: name.to_string(),
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    fn claim_conflict(&self, decl_idx: usize, channel: Option<&str>) -> Option<String> {
        let spec = self.decls[decl_idx];
        let claim = &self.claims[decl_idx];

        if claim.whole {
            return Some(spec.to_string());
        }
        match channel {
            None => if let Some(ch) = claim.channels.iter().next() {
                return Some(format!("{}:{}", spec, ch));
            },
            Some(channel) => if claim.channels.contains(channel) {
                return Some(format!("{}:{}", spec, channel));
            },
        }

        let mut pins: Box<dyn Iterator<Item = &str>> = match channel {
            None => spec.all_pins(),
            Some(channel) => Box::new(
                spec.channel(channel)
                    .into_iter()
                    .flat_map(|g| g.pins.iter().map(String::as_str))
            ),
        };
        pins.find_map(|pin| {
            self.claimed_pins.get(pin)
                .map(|holder| format!("{} (pin {})", holder, pin))
        })
    }

    /// Resolve `name`/`index` (or one of its channels) to a binding.
    ///
    /// A non-loose request claims the binding for good, and fails if the
    /// resource, the channel or any of the pins involved is claimed already.
    /// A loose request doesn't care about claims and doesn't make one: the
    /// binding it returns is read-only and meant for attaching constraints.
    pub fn request(
        &mut self,
        name: &str,
        index: u32,
        channel: Option<&str>,
        loose: bool
    ) -> Result<ResolvedBinding, LookupError> {
        let decl_idx = self.find(name, index, loose)?;
        let spec = self.decls[decl_idx];

        let binding = self.make_binding(decl_idx, channel, loose)
            .ok_or_else(|| LookupError::NotFound {
                name: spec.name.clone(),
                index: Some(index),
                channel: channel.map(str::to_string),
            })?;

        if loose {
            return Ok(binding);
        }

        if let Some(holder) = self.claim_conflict(decl_idx, channel) {
            return Err(LookupError::AlreadyClaimed {
                name: spec.name.clone(),
                index,
                channel: channel.map(str::to_string),
                holder,
            });
        }

        let holder = binding.to_string();
        let pins: Vec<&'c str> = match channel {
            None => spec.all_pins().collect(),
            Some(channel) => spec.channel(channel)
                .map(|g| g.pins.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        };
        for pin in pins {
            self.claimed_pins.insert(pin, holder.clone());
        }

        let base = self.port_base(decl_idx);
        let claim = &mut self.claims[decl_idx];
        match channel {
            None => claim.whole = true,
            Some(channel) => { claim.channels.insert(channel.to_string()); },
        }
        claim.port_base.get_or_insert(base);
        self.claim_order.push((decl_idx, channel.map(str::to_string)));

        dbg_log!(DBG_INFO, "Claimed {}", holder);
        Ok(binding)
    }

    /// Claims every declared index of `name`, in ascending order.
    pub fn request_all(&mut self, name: &str) -> Result<Vec<ResolvedBinding>, LookupError> {
        let mut indices: Vec<u32> = self.decls.iter()
            .filter(|d| d.name == name)
            .map(|d| d.index)
            .collect();
        if indices.is_empty() {
            return Err(LookupError::NotFound {
                name: name.to_string(),
                index: None,
                channel: None
            });
        }
        indices.sort_unstable();

        /* All or nothing: check every index, and the indices against each
         * other, before claiming the first one */
        let mut taken: HashMap<&'c str, String> = HashMap::new();
        for index in &indices {
            let decl_idx = self.by_key[&(name, *index)];
            let spec = self.decls[decl_idx];
            let conflict = self.claim_conflict(decl_idx, None).or_else(|| {
                spec.all_pins().find_map(|pin| {
                    taken.get(pin).map(|holder| format!("{} (pin {})", holder, pin))
                })
            });
            if let Some(holder) = conflict {
                return Err(LookupError::AlreadyClaimed {
                    name: name.to_string(),
                    index: *index,
                    channel: None,
                    holder,
                });
            }
            for pin in spec.all_pins() {
                taken.insert(pin, spec.to_string());
            }
        }

        indices.into_iter()
            .map(|index| self.request(name, index, None, false))
            .collect()
    }

    /// Read-only view of a binding some peripheral has claimed. `None` when
    /// the resource is undeclared or nobody claimed it (or the channel).
    pub fn lookup_request(
        &self,
        name: &str,
        index: u32,
        channel: Option<&str>
    ) -> Option<ResolvedBinding> {
        let decl_idx = *self.by_key.get(&(name, index))?;
        let claim = &self.claims[decl_idx];
        let claimed = match channel {
            None => claim.whole,
            Some(channel) => claim.whole || claim.channels.contains(channel),
        };
        if !claimed {
            return None;
        }
        self.make_binding(decl_idx, channel, true)
    }

    /// Every claimed binding, in claim order.
    pub fn claimed(&self) -> Vec<ResolvedBinding> {
        self.claim_order.iter()
            .filter_map(|(decl_idx, channel)| {
                self.make_binding(*decl_idx, channel.as_deref(), false)
            })
            .collect()
    }
}
